use soroban_sdk::Env;

use crate::LedgerConfig;

/// Period index for `now`, counted in whole `period_length` slots since `genesis`.
/// Timestamps before genesis map to period 0.
pub(crate) fn period_at(genesis: u64, period_length: u64, now: u64) -> u64 {
    if period_length == 0 {
        return 0;
    }
    now.saturating_sub(genesis) / period_length
}

/// Current period according to the ledger clock. Read fresh on every call.
pub(crate) fn current_period(env: &Env, config: &LedgerConfig) -> u64 {
    period_at(config.genesis, config.period_length, env.ledger().timestamp())
}
