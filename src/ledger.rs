//! Balance ledger: per (asset, holder) checkpoint history and per-asset supply.
//!
//! Checkpoints are stored as an indexed list (`BalanceCount` / `BalanceItem`).
//! A write in the same period as the latest checkpoint amends it in place;
//! a write in a later period appends, so "balance as of period P" is always the
//! last checkpoint with `period <= P`.

use soroban_sdk::{Address, BytesN, Env};

use crate::{book, BalanceCheckpoint, DataKey, LedgerError};

pub(crate) fn count(env: &Env, asset: &BytesN<32>, holder: &Address) -> u32 {
    let key = DataKey::BalanceCount(asset.clone(), holder.clone());
    env.storage().persistent().get(&key).unwrap_or(0)
}

pub(crate) fn at(
    env: &Env,
    asset: &BytesN<32>,
    holder: &Address,
    index: u32,
) -> Option<BalanceCheckpoint> {
    let key = DataKey::BalanceItem(asset.clone(), holder.clone(), index);
    env.storage().persistent().get(&key)
}

/// Latest checkpoint, or `None` if the holder never held this asset.
pub(crate) fn latest(env: &Env, asset: &BytesN<32>, holder: &Address) -> Option<BalanceCheckpoint> {
    match count(env, asset, holder) {
        0 => None,
        n => at(env, asset, holder, n - 1),
    }
}

pub(crate) fn total_supply(env: &Env, asset: &BytesN<32>) -> i128 {
    let key = DataKey::Supply(asset.clone());
    env.storage().persistent().get(&key).unwrap_or(0)
}

fn set_total_supply(env: &Env, asset: &BytesN<32>, supply: i128) {
    let key = DataKey::Supply(asset.clone());
    env.storage().persistent().set(&key, &supply);
}

/// Value credited to holders from distributions and not yet withdrawn.
/// Held outside `total_supply`, so it never enters a denominator.
pub(crate) fn credited_supply(env: &Env, asset: &BytesN<32>) -> i128 {
    let key = DataKey::Credited(asset.clone());
    env.storage().persistent().get(&key).unwrap_or(0)
}

fn set_credited_supply(env: &Env, asset: &BytesN<32>, amount: i128) {
    let key = DataKey::Credited(asset.clone());
    env.storage().persistent().set(&key, &amount);
}

/// Amend the latest checkpoint if it belongs to `period`, otherwise append a new one.
fn write(
    env: &Env,
    asset: &BytesN<32>,
    holder: &Address,
    balance: i128,
    controlled: i128,
    period: u64,
) -> BalanceCheckpoint {
    let checkpoint = BalanceCheckpoint {
        balance,
        controlled,
        period,
    };
    let count_key = DataKey::BalanceCount(asset.clone(), holder.clone());
    let n: u32 = env.storage().persistent().get(&count_key).unwrap_or(0);

    let same_period = n > 0
        && at(env, asset, holder, n - 1)
            .map(|last| last.period == period)
            .unwrap_or(false);

    if same_period {
        let item_key = DataKey::BalanceItem(asset.clone(), holder.clone(), n - 1);
        env.storage().persistent().set(&item_key, &checkpoint);
    } else {
        let item_key = DataKey::BalanceItem(asset.clone(), holder.clone(), n);
        env.storage().persistent().set(&item_key, &checkpoint);
        env.storage().persistent().set(&count_key, &(n + 1));
    }
    checkpoint
}

fn require_non_negative(amount: i128) -> Result<(), LedgerError> {
    if amount < 0 {
        return Err(LedgerError::InvalidAmount);
    }
    Ok(())
}

/// Deposit `amount` (and `controlled` alongside it) for `holder`.
///
/// Distribution records apportioned by this asset are sealed first, so a
/// record whose period has ended closes with the supply it had before this
/// deposit.
pub(crate) fn add(
    env: &Env,
    asset: &BytesN<32>,
    holder: &Address,
    amount: i128,
    controlled: i128,
    period: u64,
) -> Result<BalanceCheckpoint, LedgerError> {
    require_non_negative(amount)?;
    require_non_negative(controlled)?;

    let current = latest(env, asset, holder).unwrap_or_default();
    let balance = current
        .balance
        .checked_add(amount)
        .ok_or(LedgerError::ArithmeticOverflow)?;
    let controlled = current
        .controlled
        .checked_add(controlled)
        .ok_or(LedgerError::ArithmeticOverflow)?;
    let supply = total_supply(env, asset)
        .checked_add(amount)
        .ok_or(LedgerError::ArithmeticOverflow)?;

    book::seal_dependents(env, asset, period);
    set_total_supply(env, asset, supply);
    Ok(write(env, asset, holder, balance, controlled, period))
}

/// Withdraw `amount` (and `controlled`) from `holder`. Fails without side
/// effects if the holder cannot cover it.
///
/// The withdrawal is taken from the asset's supply first; whatever exceeds the
/// supply is drawn from credited value, which is how distributions paid in an
/// asset with a foreign share basis leave the ledger.
pub(crate) fn sub(
    env: &Env,
    asset: &BytesN<32>,
    holder: &Address,
    amount: i128,
    controlled: i128,
    period: u64,
) -> Result<BalanceCheckpoint, LedgerError> {
    require_non_negative(amount)?;
    require_non_negative(controlled)?;

    let current = latest(env, asset, holder).unwrap_or_default();
    if current.balance < amount {
        return Err(LedgerError::InsufficientBalance);
    }
    if current.controlled < controlled {
        return Err(LedgerError::InsufficientControlled);
    }
    let supply = total_supply(env, asset);
    let from_supply = amount.min(supply);
    let from_credited = amount - from_supply;
    let credited = credited_supply(env, asset);
    if credited < from_credited {
        return Err(LedgerError::InsufficientSupply);
    }

    book::seal_dependents(env, asset, period);
    set_total_supply(env, asset, supply - from_supply);
    if from_credited > 0 {
        set_credited_supply(env, asset, credited - from_credited);
    }
    Ok(write(
        env,
        asset,
        holder,
        current.balance - amount,
        current.controlled - controlled,
        period,
    ))
}

/// Settle a distribution share into the holder's balance. The amount was
/// already part of the pool, so total supply is left untouched; it is tracked
/// as credited value instead.
pub(crate) fn credit(
    env: &Env,
    asset: &BytesN<32>,
    holder: &Address,
    amount: i128,
    period: u64,
) -> Result<BalanceCheckpoint, LedgerError> {
    let current = latest(env, asset, holder).unwrap_or_default();
    let balance = current
        .balance
        .checked_add(amount)
        .ok_or(LedgerError::ArithmeticOverflow)?;
    let credited = credited_supply(env, asset)
        .checked_add(amount)
        .ok_or(LedgerError::ArithmeticOverflow)?;
    set_credited_supply(env, asset, credited);
    Ok(write(env, asset, holder, balance, current.controlled, period))
}
