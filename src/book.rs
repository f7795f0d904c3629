//! Distribution book: the per-asset, append-only list of distribution records.
//!
//! Records are only materialised when something happens in a new period, so
//! storage grows with activity rather than with elapsed time. The last record
//! is the only one that may be open; every earlier record is closed.

use soroban_sdk::{symbol_short, BytesN, Env, Symbol, Vec};

use crate::{ledger, DataKey, DistributionRecord, LedgerError};

const EVENT_DIST_OPEN: Symbol = symbol_short!("dist_open");
const EVENT_DIST_CLOSE: Symbol = symbol_short!("dist_cls");

pub(crate) fn count(env: &Env, asset: &BytesN<32>) -> u32 {
    let key = DataKey::DistributionCount(asset.clone());
    env.storage().persistent().get(&key).unwrap_or(0)
}

pub(crate) fn at(env: &Env, asset: &BytesN<32>, index: u32) -> Option<DistributionRecord> {
    let key = DataKey::DistributionItem(asset.clone(), index);
    env.storage().persistent().get(&key)
}

fn put(env: &Env, asset: &BytesN<32>, index: u32, record: &DistributionRecord) {
    let key = DataKey::DistributionItem(asset.clone(), index);
    env.storage().persistent().set(&key, record);
}

/// Asset whose balances apportion `asset`'s distributions. Defaults to `asset`.
pub(crate) fn share_basis(env: &Env, asset: &BytesN<32>) -> BytesN<32> {
    let key = DataKey::ShareBasis(asset.clone());
    env.storage()
        .persistent()
        .get(&key)
        .unwrap_or_else(|| asset.clone())
}

pub(crate) fn has_explicit_basis(env: &Env, asset: &BytesN<32>) -> bool {
    env.storage()
        .persistent()
        .has(&DataKey::ShareBasis(asset.clone()))
}

/// Assets that were explicitly configured to use `basis` as their share basis.
pub(crate) fn dependents(env: &Env, basis: &BytesN<32>) -> Vec<BytesN<32>> {
    let key = DataKey::BasisDependents(basis.clone());
    env.storage()
        .persistent()
        .get(&key)
        .unwrap_or_else(|| Vec::new(env))
}

pub(crate) fn set_share_basis(
    env: &Env,
    asset: &BytesN<32>,
    basis: &BytesN<32>,
) -> Result<(), LedgerError> {
    if asset == basis {
        return Err(LedgerError::InvalidShareBasis);
    }
    if count(env, asset) > 0 || has_explicit_basis(env, asset) {
        return Err(LedgerError::ShareBasisLocked);
    }
    env.storage()
        .persistent()
        .set(&DataKey::ShareBasis(asset.clone()), basis);

    let mut deps = dependents(env, basis);
    deps.push_back(asset.clone());
    env.storage()
        .persistent()
        .set(&DataKey::BasisDependents(basis.clone()), &deps);
    Ok(())
}

/// Pooled amount not yet credited to any holder, across all records.
pub(crate) fn unclaimed(env: &Env, asset: &BytesN<32>) -> i128 {
    let key = DataKey::Unclaimed(asset.clone());
    env.storage().persistent().get(&key).unwrap_or(0)
}

fn set_unclaimed(env: &Env, asset: &BytesN<32>, amount: i128) {
    let key = DataKey::Unclaimed(asset.clone());
    env.storage().persistent().set(&key, &amount);
}

/// Close the latest record if it is still open and `period` has moved past it.
/// Returns the latest record (after sealing) together with its index.
fn seal_stale(
    env: &Env,
    asset: &BytesN<32>,
    period: u64,
) -> Option<(u32, DistributionRecord)> {
    let n = count(env, asset);
    if n == 0 {
        return None;
    }
    let index = n - 1;
    let mut latest = at(env, asset, index)?;
    if !latest.closed && latest.period < period {
        let basis = share_basis(env, asset);
        latest.denominator = ledger::total_supply(env, &basis);
        latest.closed = true;
        put(env, asset, index, &latest);
        env.events().publish(
            (EVENT_DIST_CLOSE, asset.clone()),
            (index, latest.period, latest.balance, latest.denominator),
        );
    }
    Some((index, latest))
}

/// Seal stale records of every asset whose denominator is `basis`'s supply.
/// Runs before any change to `basis`'s supply.
pub(crate) fn seal_dependents(env: &Env, basis: &BytesN<32>, period: u64) {
    if !has_explicit_basis(env, basis) {
        seal_stale(env, basis, period);
    }
    for asset in dependents(env, basis).iter() {
        seal_stale(env, &asset, period);
    }
}

/// Add `amount` to the open record for `period`, closing the previous period's
/// record and opening a new one on a period transition. Returns the index of
/// the open record.
pub(crate) fn increase(
    env: &Env,
    asset: &BytesN<32>,
    amount: i128,
    period: u64,
) -> Result<u32, LedgerError> {
    if amount < 0 {
        return Err(LedgerError::InvalidAmount);
    }
    let unclaimed = unclaimed(env, asset)
        .checked_add(amount)
        .ok_or(LedgerError::ArithmeticOverflow)?;

    let index = match seal_stale(env, asset, period) {
        Some((index, mut latest)) if !latest.closed => {
            latest.balance = latest
                .balance
                .checked_add(amount)
                .ok_or(LedgerError::ArithmeticOverflow)?;
            put(env, asset, index, &latest);
            index
        }
        Some((index, _)) => open(env, asset, index + 1, amount, period),
        None => open(env, asset, 0, amount, period),
    };

    set_unclaimed(env, asset, unclaimed);
    Ok(index)
}

fn open(env: &Env, asset: &BytesN<32>, index: u32, amount: i128, period: u64) -> u32 {
    let record = DistributionRecord {
        denominator: 0,
        balance: amount,
        period,
        closed: false,
        claimed: 0,
    };
    put(env, asset, index, &record);
    env.storage()
        .persistent()
        .set(&DataKey::DistributionCount(asset.clone()), &(index + 1));
    env.events()
        .publish((EVENT_DIST_OPEN, asset.clone()), (index, period));
    index
}

/// Record `amount` as credited out of record `index`.
pub(crate) fn record_claim(
    env: &Env,
    asset: &BytesN<32>,
    index: u32,
    record: &mut DistributionRecord,
    amount: i128,
) {
    record.claimed += amount;
    put(env, asset, index, record);
    set_unclaimed(env, asset, unclaimed(env, asset) - amount);
}

/// Index of the first record whose period is `>= period`, or `count` if none.
pub(crate) fn first_index_from(env: &Env, asset: &BytesN<32>, period: u64) -> u32 {
    let mut lo = 0u32;
    let mut hi = count(env, asset);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match at(env, asset, mid) {
            Some(record) if record.period < period => lo = mid + 1,
            _ => hi = mid,
        }
    }
    lo
}
