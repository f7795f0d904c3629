#![no_std]
#![deny(unsafe_code)]
#![deny(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, Address, BytesN, Env,
    Symbol,
};

mod book;
mod claims;
mod ledger;
mod period;

/// Centralized contract error codes. Auth failures are signaled by host panic (require_auth).
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[repr(u32)]
pub enum LedgerError {
    /// Contract is not initialized (config not set).
    NotInitialized = 1,
    /// `initialize` was already called.
    AlreadyInitialized = 2,
    /// Amount is negative.
    InvalidAmount = 3,
    /// Period length must be positive.
    InvalidPeriodLength = 4,
    /// Withdrawal exceeds the holder's balance.
    InsufficientBalance = 5,
    /// Withdrawal exceeds the holder's controlled amount.
    InsufficientControlled = 6,
    /// Withdrawal exceeds the asset's total supply plus its credited value.
    InsufficientSupply = 7,
    /// The holder's next distribution is still open. Retry after the period closes.
    DistributionNotClosed = 8,
    /// Intermediate share arithmetic does not fit in i128.
    ArithmeticOverflow = 9,
    /// Share basis can only be set once, before the asset has any distribution.
    ShareBasisLocked = 10,
    /// An asset cannot be its own explicit share basis.
    InvalidShareBasis = 11,
    /// Contract is paused; deposits, withdrawals and distributions are disabled.
    ContractPaused = 12,
}

// ── Event symbols ────────────────────────────────────────────
const EVENT_INIT: Symbol = symbol_short!("init");
const EVENT_ADD: Symbol = symbol_short!("add");
const EVENT_SUB: Symbol = symbol_short!("sub");
const EVENT_DIST_INCREASE: Symbol = symbol_short!("dist_inc");
const EVENT_CLAIM: Symbol = symbol_short!("claim");
const EVENT_BASIS_SET: Symbol = symbol_short!("basis_set");
const EVENT_ROLE_SET: Symbol = symbol_short!("role_set");
const EVENT_PAUSED: Symbol = symbol_short!("paused");
const EVENT_UNPAUSED: Symbol = symbol_short!("unpaused");

const ROLE_OPERATOR: Symbol = symbol_short!("operator");
const ROLE_DISTRIBUTOR: Symbol = symbol_short!("distrib");

/// Fixed-point scale for share ratios.
pub const PRECISION: i128 = 1_000_000_000_000_000_000;

// ── Data structures ──────────────────────────────────────────
/// Contract version identifier. Bumped when storage or semantics change.
pub const CONTRACT_VERSION: u32 = 1;

/// Written once by `initialize`.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LedgerConfig {
    pub admin: Address,
    /// May call `add` / `sub`.
    pub operator: Address,
    /// May call `increase_distribution` / `poke`.
    pub distributor: Address,
    /// Ledger timestamp of period 0.
    pub genesis: u64,
    /// Seconds per period.
    pub period_length: u64,
}

/// A holder's balance effective from `period` onward.
#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BalanceCheckpoint {
    pub balance: i128,
    /// Secondary counter tracked alongside `balance`. Never used for shares.
    pub controlled: i128,
    pub period: u64,
}

/// One period's pooled payout for an asset.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DistributionRecord {
    /// Share-basis supply when the record closed. 0 while open.
    pub denominator: i128,
    /// Amount pooled for this period.
    pub balance: i128,
    pub period: u64,
    pub closed: bool,
    /// Amount credited to holders so far. Never exceeds `balance`.
    pub claimed: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClaimCursor {
    pub balance_index: u32,
    pub distribution_index: u32,
}

/// Result of `next_user_distribution_details`.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NextDistribution {
    /// Share-basis balance that applies to the next distribution.
    pub balance: i128,
    pub balance_index: u32,
    pub distribution_index: u32,
    pub next_distribution_closed: bool,
}

/// Outcome of settling one distribution record for a holder.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClaimReceipt {
    pub distribution_index: u32,
    pub period: u64,
    pub applicable_balance: i128,
    pub credited: i128,
}

/// Storage keys. Checkpoints and distribution records are indexed lists
/// (`*Count` holds the length, `*Item` the entries) so reads are O(1) per entry.
#[contracttype]
pub enum DataKey {
    Config,
    Paused,
    /// Per asset: running total supply.
    Supply(BytesN<32>),
    /// Per (asset, holder): number of balance checkpoints.
    BalanceCount(BytesN<32>, Address),
    /// Per (asset, holder, index): balance checkpoint.
    BalanceItem(BytesN<32>, Address, u32),
    /// Per asset: number of distribution records.
    DistributionCount(BytesN<32>),
    /// Per (asset, index): distribution record.
    DistributionItem(BytesN<32>, u32),
    /// Per (asset, holder): claim cursor, stored after the first processed record.
    ClaimCursor(BytesN<32>, Address),
    /// Per asset: asset whose balances apportion its distributions.
    ShareBasis(BytesN<32>),
    /// Per basis asset: assets that use it as explicit share basis.
    BasisDependents(BytesN<32>),
    /// Per asset: pooled amount not yet credited to holders.
    Unclaimed(BytesN<32>),
    /// Per asset: credited distribution value still held, outside `Supply`.
    Credited(BytesN<32>),
}

// ── Contract ─────────────────────────────────────────────────
#[contract]
pub struct ProportionalLedger;

#[contractimpl]
impl ProportionalLedger {
    fn config(env: &Env) -> Result<LedgerConfig, LedgerError> {
        env.storage()
            .persistent()
            .get(&DataKey::Config)
            .ok_or(LedgerError::NotInitialized)
    }

    /// Returns error if the contract is paused. Call at start of deposit and distribution entrypoints.
    fn require_not_paused(env: &Env) -> Result<(), LedgerError> {
        if Self::is_paused(env.clone()) {
            return Err(LedgerError::ContractPaused);
        }
        Ok(())
    }

    /// Set up roles and the period clock. Genesis is the current ledger timestamp.
    pub fn initialize(
        env: Env,
        admin: Address,
        operator: Address,
        distributor: Address,
        period_length: u64,
    ) -> Result<(), LedgerError> {
        if env.storage().persistent().has(&DataKey::Config) {
            return Err(LedgerError::AlreadyInitialized);
        }
        if period_length == 0 {
            return Err(LedgerError::InvalidPeriodLength);
        }
        let config = LedgerConfig {
            admin: admin.clone(),
            operator,
            distributor,
            genesis: env.ledger().timestamp(),
            period_length,
        };
        env.storage().persistent().set(&DataKey::Config, &config);
        env.storage().persistent().set(&DataKey::Paused, &false);
        env.events()
            .publish((EVENT_INIT, admin), (config.genesis, period_length));
        Ok(())
    }

    pub fn get_config(env: Env) -> Option<LedgerConfig> {
        env.storage().persistent().get(&DataKey::Config)
    }

    // ── Admin ─────────────────────────────────────────────────

    /// Replace the address allowed to deposit and withdraw. Admin only.
    pub fn set_operator(env: Env, operator: Address) -> Result<(), LedgerError> {
        let mut config = Self::config(&env)?;
        config.admin.require_auth();
        config.operator = operator.clone();
        env.storage().persistent().set(&DataKey::Config, &config);
        env.events()
            .publish((EVENT_ROLE_SET, ROLE_OPERATOR), operator);
        Ok(())
    }

    /// Replace the address allowed to fund distributions. Admin only.
    pub fn set_distributor(env: Env, distributor: Address) -> Result<(), LedgerError> {
        let mut config = Self::config(&env)?;
        config.admin.require_auth();
        config.distributor = distributor.clone();
        env.storage().persistent().set(&DataKey::Config, &config);
        env.events()
            .publish((EVENT_ROLE_SET, ROLE_DISTRIBUTOR), distributor);
        Ok(())
    }

    /// Apportion `asset`'s distributions by balances of `basis` instead of its own.
    /// Admin only; allowed once, before `asset` has any distribution record.
    pub fn set_share_basis(
        env: Env,
        asset: BytesN<32>,
        basis: BytesN<32>,
    ) -> Result<(), LedgerError> {
        let config = Self::config(&env)?;
        config.admin.require_auth();
        book::set_share_basis(&env, &asset, &basis)?;
        env.events().publish((EVENT_BASIS_SET, asset), basis);
        Ok(())
    }

    pub fn share_basis(env: Env, asset: BytesN<32>) -> BytesN<32> {
        book::share_basis(&env, &asset)
    }

    /// Pause deposits, withdrawals and distributions (admin only). Idempotent.
    /// Claims and reads stay available.
    pub fn pause(env: Env) -> Result<(), LedgerError> {
        let config = Self::config(&env)?;
        config.admin.require_auth();
        env.storage().persistent().set(&DataKey::Paused, &true);
        env.events().publish((EVENT_PAUSED, config.admin), ());
        Ok(())
    }

    /// Unpause (admin only). Idempotent.
    pub fn unpause(env: Env) -> Result<(), LedgerError> {
        let config = Self::config(&env)?;
        config.admin.require_auth();
        env.storage().persistent().set(&DataKey::Paused, &false);
        env.events().publish((EVENT_UNPAUSED, config.admin), ());
        Ok(())
    }

    pub fn is_paused(env: Env) -> bool {
        env.storage()
            .persistent()
            .get::<DataKey, bool>(&DataKey::Paused)
            .unwrap_or(false)
    }

    // ── Period clock ──────────────────────────────────────────

    /// Current period index.
    pub fn period(env: Env) -> Result<u64, LedgerError> {
        let config = Self::config(&env)?;
        Ok(period::current_period(&env, &config))
    }

    // ── Balance ledger ────────────────────────────────────────

    /// Credit `amount` to `holder` and to the asset's supply; `controlled_amount`
    /// is tracked alongside. Operator only.
    pub fn add(
        env: Env,
        asset: BytesN<32>,
        holder: Address,
        amount: i128,
        controlled_amount: i128,
    ) -> Result<(), LedgerError> {
        Self::require_not_paused(&env)?;
        let config = Self::config(&env)?;
        config.operator.require_auth();

        let period = period::current_period(&env, &config);
        let checkpoint = ledger::add(&env, &asset, &holder, amount, controlled_amount, period)?;
        env.events().publish(
            (EVENT_ADD, asset, holder),
            (amount, controlled_amount, checkpoint.balance, period),
        );
        Ok(())
    }

    /// Debit `amount` from `holder`. Operator only.
    ///
    /// Principal supply is reduced first; any excess comes out of credited
    /// distribution value. Fails with `InsufficientBalance` or
    /// `InsufficientControlled` when the holder cannot cover it.
    pub fn sub(
        env: Env,
        asset: BytesN<32>,
        holder: Address,
        amount: i128,
        controlled_amount: i128,
    ) -> Result<(), LedgerError> {
        Self::require_not_paused(&env)?;
        let config = Self::config(&env)?;
        config.operator.require_auth();

        let period = period::current_period(&env, &config);
        let checkpoint = ledger::sub(&env, &asset, &holder, amount, controlled_amount, period)?;
        env.events().publish(
            (EVENT_SUB, asset, holder),
            (amount, controlled_amount, checkpoint.balance, period),
        );
        Ok(())
    }

    pub fn balance_of(env: Env, asset: BytesN<32>, holder: Address) -> i128 {
        ledger::latest(&env, &asset, &holder)
            .map(|checkpoint| checkpoint.balance)
            .unwrap_or(0)
    }

    pub fn controlled_of(env: Env, asset: BytesN<32>, holder: Address) -> i128 {
        ledger::latest(&env, &asset, &holder)
            .map(|checkpoint| checkpoint.controlled)
            .unwrap_or(0)
    }

    pub fn total_supply(env: Env, asset: BytesN<32>) -> i128 {
        ledger::total_supply(&env, &asset)
    }

    /// Distribution credits held by holders of `asset`, not counted in `total_supply`.
    pub fn credited_supply(env: Env, asset: BytesN<32>) -> i128 {
        ledger::credited_supply(&env, &asset)
    }

    pub fn user_balance_count(env: Env, asset: BytesN<32>, holder: Address) -> u32 {
        ledger::count(&env, &asset, &holder)
    }

    pub fn user_balance_at_index(
        env: Env,
        asset: BytesN<32>,
        holder: Address,
        index: u32,
    ) -> Option<BalanceCheckpoint> {
        ledger::at(&env, &asset, &holder, index)
    }

    // ── Distribution book ─────────────────────────────────────

    /// Add `amount` to the current period's pool for `asset`. Distributor only.
    ///
    /// On the first call in a new period the previous record is closed with the
    /// share-basis supply as its denominator and a new record is opened.
    pub fn increase_distribution(
        env: Env,
        asset: BytesN<32>,
        amount: i128,
    ) -> Result<(), LedgerError> {
        Self::require_not_paused(&env)?;
        let config = Self::config(&env)?;
        config.distributor.require_auth();

        let period = period::current_period(&env, &config);
        let index = book::increase(&env, &asset, amount, period)?;
        env.events()
            .publish((EVENT_DIST_INCREASE, asset), (index, amount, period));
        Ok(())
    }

    /// Close a stale record and open one for the current period without adding funds.
    /// Distributor only.
    pub fn poke(env: Env, asset: BytesN<32>) -> Result<(), LedgerError> {
        Self::require_not_paused(&env)?;
        let config = Self::config(&env)?;
        config.distributor.require_auth();

        let period = period::current_period(&env, &config);
        book::increase(&env, &asset, 0, period)?;
        Ok(())
    }

    pub fn distribution_count(env: Env, asset: BytesN<32>) -> u32 {
        book::count(&env, &asset)
    }

    pub fn distribution_at_index(
        env: Env,
        asset: BytesN<32>,
        index: u32,
    ) -> Option<DistributionRecord> {
        book::at(&env, &asset, index)
    }

    /// Pooled amount not yet credited to holders, including the open record and rounding dust.
    pub fn unclaimed_distribution(env: Env, asset: BytesN<32>) -> i128 {
        book::unclaimed(&env, &asset)
    }

    // ── Claims ────────────────────────────────────────────────

    /// Settle `holder`'s share of their next closed distribution record.
    ///
    /// Permissionless. Processes at most one record per call:
    /// - `Ok(Some(receipt))`: the record was settled and the cursor advanced by one.
    /// - `Ok(None)`: nothing pending.
    /// - `Err(DistributionNotClosed)`: the next record is still open; retry later.
    pub fn process_next_user_distribution(
        env: Env,
        asset: BytesN<32>,
        holder: Address,
    ) -> Result<Option<ClaimReceipt>, LedgerError> {
        let config = Self::config(&env)?;
        let period = period::current_period(&env, &config);
        let receipt = claims::process_next(&env, &asset, &holder, period)?;
        if let Some(r) = &receipt {
            env.events().publish(
                (EVENT_CLAIM, asset, holder),
                (r.distribution_index, r.period, r.credited),
            );
        }
        Ok(receipt)
    }

    /// Read-only: what `process_next_user_distribution` would return right now.
    pub fn preview_next_user_distribution(
        env: Env,
        asset: BytesN<32>,
        holder: Address,
    ) -> Result<Option<ClaimReceipt>, LedgerError> {
        claims::preview(&env, &asset, &holder)
    }

    pub fn next_user_distribution_details(
        env: Env,
        asset: BytesN<32>,
        holder: Address,
    ) -> NextDistribution {
        claims::next_details(&env, &asset, &holder)
    }

    /// Return the current contract version.
    pub fn get_version(env: Env) -> u32 {
        let _ = env;
        CONTRACT_VERSION
    }
}

mod test_auth;
mod test_props;
