#![cfg(test)]
//! Random operation sequences checked against the ledger's invariants.
extern crate std;

use arbitrary::{Arbitrary, Unstructured};
use soroban_sdk::{testutils::Address as _, testutils::Ledger as _, Address, BytesN, Env};
use std::vec::Vec as StdVec;

use crate::{DistributionRecord, LedgerError, ProportionalLedger, ProportionalLedgerClient};

const PERIOD_LENGTH: u64 = 7 * 86_400;
const HOLDERS: usize = 3;
/// 10^15: with `u32` amounts, single operations reach ~4.3 million tokens at 18 decimals.
const UNIT: i128 = 1_000_000_000_000_000;

#[derive(Arbitrary, Debug)]
enum Op {
    Add { holder: u8, amount: u32 },
    /// Withdraw `fraction / 200` of the holder's balance; above 200 overdraws.
    Sub { holder: u8, fraction: u8 },
    Distribute { amount: u32 },
    Poke,
    Claim { holder: u8 },
    Advance { days: u8 },
}

/// Deterministic byte stream for a seed (xorshift64).
fn seed_bytes(seed: u64, len: usize) -> StdVec<u8> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    let mut out = StdVec::with_capacity(len);
    for _ in 0..len {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        out.push((state >> 24) as u8);
    }
    out
}

struct Model {
    supply: i128,
    /// Credited value still held by holders.
    outstanding: i128,
    contributed: i128,
    credited: i128,
    frozen: StdVec<DistributionRecord>,
}

fn check_invariants(
    client: &ProportionalLedgerClient,
    asset: &BytesN<32>,
    holders: &[Address],
    model: &mut Model,
) {
    assert_eq!(client.total_supply(asset), model.supply);
    assert_eq!(client.credited_supply(asset), model.outstanding);
    assert!(model.supply >= 0 && model.outstanding >= 0);

    let held: i128 = holders.iter().map(|h| client.balance_of(asset, h)).sum();
    assert_eq!(held, model.supply + model.outstanding, "balances must be fully backed");
    assert_eq!(
        client.unclaimed_distribution(asset),
        model.contributed - model.credited
    );

    let count = client.distribution_count(asset);
    assert!(count as usize >= model.frozen.len());
    let mut last_period: Option<u64> = None;
    for i in 0..count {
        let record = client.distribution_at_index(asset, &i).unwrap();
        if let Some(prev) = last_period {
            assert!(record.period > prev, "record periods must strictly increase");
        }
        last_period = Some(record.period);
        assert!(record.claimed >= 0 && record.claimed <= record.balance);
        if i + 1 < count {
            assert!(record.closed, "only the last record may be open");
        }
        if let Some(frozen) = model.frozen.get(i as usize) {
            assert_eq!(record.denominator, frozen.denominator);
            assert_eq!(record.balance, frozen.balance);
            assert_eq!(record.period, frozen.period);
        } else if record.closed {
            model.frozen.push(record);
        }
    }
}

fn run(seed: u64) {
    let env = Env::default();
    env.mock_all_auths();
    env.ledger().with_mut(|li| li.timestamp = 1_000_000);
    let contract_id = env.register_contract(None, ProportionalLedger);
    let client = ProportionalLedgerClient::new(&env, &contract_id);
    let admin = Address::generate(&env);
    client.initialize(&admin, &admin, &admin, &PERIOD_LENGTH);

    let asset = BytesN::from_array(&env, &[0x48; 32]);
    let holders: StdVec<Address> = (0..HOLDERS).map(|_| Address::generate(&env)).collect();
    let mut model = Model {
        supply: 0,
        outstanding: 0,
        contributed: 0,
        credited: 0,
        frozen: StdVec::new(),
    };

    let bytes = seed_bytes(seed, 2_048);
    let mut u = Unstructured::new(&bytes);
    let ops: StdVec<Op> = u.arbitrary().expect("operations");

    for op in ops {
        match op {
            Op::Add { holder, amount } => {
                let holder = &holders[holder as usize % HOLDERS];
                let amount = amount as i128 * UNIT;
                client.add(&asset, holder, &amount, &0);
                model.supply += amount;
            }
            Op::Sub { holder, fraction } => {
                let holder = &holders[holder as usize % HOLDERS];
                let balance = client.balance_of(&asset, holder);
                let amount = balance * fraction as i128 / 200 + (fraction / 201) as i128;
                let result = client.try_sub(&asset, holder, &amount, &0);
                if amount > balance {
                    assert_eq!(result, Err(Ok(LedgerError::InsufficientBalance)));
                } else {
                    assert!(result.is_ok());
                    let from_supply = amount.min(model.supply);
                    model.supply -= from_supply;
                    model.outstanding -= amount - from_supply;
                }
            }
            Op::Distribute { amount } => {
                let amount = amount as i128 * UNIT;
                client.increase_distribution(&asset, &amount);
                model.contributed += amount;
            }
            Op::Poke => client.poke(&asset),
            Op::Claim { holder } => {
                let holder = &holders[holder as usize % HOLDERS];
                let before = client.next_user_distribution_details(&asset, holder);
                let balance_before = client.balance_of(&asset, holder);
                match client.try_process_next_user_distribution(&asset, holder) {
                    Ok(Ok(Some(receipt))) => {
                        assert_eq!(receipt.distribution_index, before.distribution_index);
                        assert!(receipt.credited >= 0);
                        model.credited += receipt.credited;
                        model.outstanding += receipt.credited;
                        let after = client.next_user_distribution_details(&asset, holder);
                        assert_eq!(after.distribution_index, before.distribution_index + 1);
                        assert_eq!(
                            client.balance_of(&asset, holder),
                            balance_before + receipt.credited
                        );
                    }
                    Ok(Ok(None)) => {
                        assert!(before.distribution_index >= client.distribution_count(&asset));
                    }
                    Err(Ok(LedgerError::DistributionNotClosed)) => {
                        assert!(!before.next_distribution_closed);
                        assert_eq!(client.balance_of(&asset, holder), balance_before);
                    }
                    other => panic!("unexpected claim result: {:?}", other),
                }
            }
            Op::Advance { days } => {
                let secs = (days as u64 % 45) * 86_400;
                env.ledger().with_mut(|li| li.timestamp += secs);
            }
        }
        check_invariants(&client, &asset, &holders, &mut model);
    }
}

#[test]
fn random_sequences_preserve_ledger_invariants() {
    for seed in 1..=12u64 {
        run(seed);
    }
}
