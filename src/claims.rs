//! Claim processor: walks a holder's cursor over the distribution book, one
//! record per call.

use soroban_sdk::{Address, BytesN, Env, I256};

use crate::{
    book, ledger, ClaimCursor, ClaimReceipt, DataKey, DistributionRecord, LedgerError,
    NextDistribution, PRECISION,
};

/// Holder's share of a closed record.
///
/// `share_ratio = pooled * PRECISION / denominator`, then
/// `applicable * share_ratio / PRECISION`, flooring at both steps. The
/// intermediates are 256-bit; `applicable` is clamped to `denominator`, so the
/// result never exceeds `pooled` and always narrows back to i128.
/// A zero denominator pays nothing.
pub(crate) fn compute_share(
    env: &Env,
    pooled: i128,
    denominator: i128,
    applicable: i128,
) -> Result<i128, LedgerError> {
    if denominator <= 0 || pooled <= 0 || applicable <= 0 {
        return Ok(0);
    }
    let precision = I256::from_i128(env, PRECISION);
    let share_ratio = I256::from_i128(env, pooled)
        .mul(&precision)
        .div(&I256::from_i128(env, denominator));
    I256::from_i128(env, applicable.min(denominator))
        .mul(&share_ratio)
        .div(&precision)
        .to_i128()
        .ok_or(LedgerError::ArithmeticOverflow)
}

/// Stored cursor, or the lazily derived starting point for a holder who has
/// not claimed yet: the first record at or after their first share-basis
/// checkpoint. Holders with no checkpoint start past the end of the book.
pub(crate) fn cursor(env: &Env, asset: &BytesN<32>, holder: &Address) -> ClaimCursor {
    let key = DataKey::ClaimCursor(asset.clone(), holder.clone());
    if let Some(stored) = env.storage().persistent().get::<DataKey, ClaimCursor>(&key) {
        return stored;
    }
    let basis = book::share_basis(env, asset);
    let distribution_index = match ledger::at(env, &basis, holder, 0) {
        Some(first) => book::first_index_from(env, asset, first.period),
        None => book::count(env, asset),
    };
    ClaimCursor {
        balance_index: 0,
        distribution_index,
    }
}

/// Move `balance_index` forward to the last share-basis checkpoint with
/// `period <= record_period` and return its balance.
fn applicable_balance(
    env: &Env,
    basis: &BytesN<32>,
    holder: &Address,
    balance_index: &mut u32,
    record_period: u64,
) -> i128 {
    let n = ledger::count(env, basis, holder);
    let mut index = *balance_index;
    while index + 1 < n {
        match ledger::at(env, basis, holder, index + 1) {
            Some(next) if next.period <= record_period => index += 1,
            _ => break,
        }
    }
    *balance_index = index;
    match ledger::at(env, basis, holder, index) {
        Some(checkpoint) if checkpoint.period <= record_period => checkpoint.balance,
        _ => 0,
    }
}

struct PendingClaim {
    cursor: ClaimCursor,
    record: DistributionRecord,
    applicable: i128,
    credited: i128,
}

fn pending(
    env: &Env,
    asset: &BytesN<32>,
    holder: &Address,
) -> Result<Option<PendingClaim>, LedgerError> {
    let mut cursor = cursor(env, asset, holder);
    let record = match book::at(env, asset, cursor.distribution_index) {
        Some(record) => record,
        None => return Ok(None),
    };
    if !record.closed {
        return Err(LedgerError::DistributionNotClosed);
    }

    let basis = book::share_basis(env, asset);
    let applicable = applicable_balance(
        env,
        &basis,
        holder,
        &mut cursor.balance_index,
        record.period,
    );
    let share = compute_share(env, record.balance, record.denominator, applicable)?;
    let credited = share.min(record.balance - record.claimed);

    Ok(Some(PendingClaim {
        cursor,
        record,
        applicable,
        credited,
    }))
}

fn receipt(claim: &PendingClaim) -> ClaimReceipt {
    ClaimReceipt {
        distribution_index: claim.cursor.distribution_index,
        period: claim.record.period,
        applicable_balance: claim.applicable,
        credited: claim.credited,
    }
}

/// What the next claim would credit, without writing anything.
pub(crate) fn preview(
    env: &Env,
    asset: &BytesN<32>,
    holder: &Address,
) -> Result<Option<ClaimReceipt>, LedgerError> {
    Ok(pending(env, asset, holder)?.as_ref().map(receipt))
}

/// Settle exactly one closed record for `holder` and advance the cursor by one.
pub(crate) fn process_next(
    env: &Env,
    asset: &BytesN<32>,
    holder: &Address,
    period: u64,
) -> Result<Option<ClaimReceipt>, LedgerError> {
    let mut claim = match pending(env, asset, holder)? {
        Some(claim) => claim,
        None => return Ok(None),
    };
    let result = receipt(&claim);

    if claim.credited > 0 {
        ledger::credit(env, asset, holder, claim.credited, period)?;
        book::record_claim(
            env,
            asset,
            claim.cursor.distribution_index,
            &mut claim.record,
            claim.credited,
        );
    }

    claim.cursor.distribution_index += 1;
    env.storage().persistent().set(
        &DataKey::ClaimCursor(asset.clone(), holder.clone()),
        &claim.cursor,
    );
    Ok(Some(result))
}

pub(crate) fn next_details(env: &Env, asset: &BytesN<32>, holder: &Address) -> NextDistribution {
    let mut cursor = cursor(env, asset, holder);
    let basis = book::share_basis(env, asset);
    let (balance, closed) = match book::at(env, asset, cursor.distribution_index) {
        Some(record) => (
            applicable_balance(
                env,
                &basis,
                holder,
                &mut cursor.balance_index,
                record.period,
            ),
            record.closed,
        ),
        None => (
            ledger::latest(env, &basis, holder)
                .map(|checkpoint| checkpoint.balance)
                .unwrap_or(0),
            false,
        ),
    };
    NextDistribution {
        balance,
        balance_index: cursor.balance_index,
        distribution_index: cursor.distribution_index,
        next_distribution_closed: closed,
    }
}
