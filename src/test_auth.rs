#![cfg(test)]
use soroban_sdk::{testutils::Address as _, testutils::Ledger as _, Address, BytesN, Env};

use crate::{LedgerError, ProportionalLedger, ProportionalLedgerClient};

const PERIOD_LENGTH: u64 = 30 * 86_400;
const MONTH: u64 = 31 * 86_400;
const ONE: i128 = 1_000_000_000_000_000_000;

struct Roles {
    admin: Address,
    operator: Address,
    distributor: Address,
}

fn make_client(env: &Env) -> ProportionalLedgerClient<'_> {
    let id = env.register_contract(None, ProportionalLedger);
    ProportionalLedgerClient::new(env, &id)
}

fn init_roles(env: &Env, client: &ProportionalLedgerClient) -> Roles {
    let roles = Roles {
        admin: Address::generate(env),
        operator: Address::generate(env),
        distributor: Address::generate(env),
    };
    client.initialize(
        &roles.admin,
        &roles.operator,
        &roles.distributor,
        &PERIOD_LENGTH,
    );
    roles
}

fn asset(env: &Env) -> BytesN<32> {
    BytesN::from_array(env, &[0x48; 32])
}

#[test]
fn add_missing_auth_no_mutation() {
    let env = Env::default();
    let client = make_client(&env);
    let _roles = init_roles(&env, &client);
    let alice = Address::generate(&env);

    assert!(client.try_add(&asset(&env), &alice, &ONE, &0).is_err());
    assert_eq!(client.balance_of(&asset(&env), &alice), 0);
    assert_eq!(client.total_supply(&asset(&env)), 0);
}

#[test]
fn sub_missing_auth_no_mutation() {
    let env = Env::default();
    let client = make_client(&env);
    let _roles = init_roles(&env, &client);
    let alice = Address::generate(&env);

    assert!(client.try_sub(&asset(&env), &alice, &0, &0).is_err());
    assert_eq!(client.user_balance_count(&asset(&env), &alice), 0);
}

#[test]
fn increase_distribution_missing_auth_no_mutation() {
    let env = Env::default();
    let client = make_client(&env);
    let _roles = init_roles(&env, &client);

    assert!(client.try_increase_distribution(&asset(&env), &ONE).is_err());
    assert_eq!(client.distribution_count(&asset(&env)), 0);
}

#[test]
fn poke_missing_auth_no_mutation() {
    let env = Env::default();
    let client = make_client(&env);
    let _roles = init_roles(&env, &client);

    assert!(client.try_poke(&asset(&env)).is_err());
    assert_eq!(client.distribution_count(&asset(&env)), 0);
}

#[test]
fn add_is_authorized_by_the_operator() {
    let env = Env::default();
    env.mock_all_auths();
    let client = make_client(&env);
    let roles = init_roles(&env, &client);
    let alice = Address::generate(&env);

    client.add(&asset(&env), &alice, &ONE, &0);
    let auths = env.auths();
    assert_eq!(auths.len(), 1);
    assert_eq!(auths[0].0, roles.operator);
}

#[test]
fn increase_distribution_is_authorized_by_the_distributor() {
    let env = Env::default();
    env.mock_all_auths();
    let client = make_client(&env);
    let roles = init_roles(&env, &client);

    client.increase_distribution(&asset(&env), &ONE);
    let auths = env.auths();
    assert_eq!(auths.len(), 1);
    assert_eq!(auths[0].0, roles.distributor);
}

#[test]
fn claims_require_no_auth() {
    let env = Env::default();
    env.mock_all_auths();
    let client = make_client(&env);
    let _roles = init_roles(&env, &client);
    let alice = Address::generate(&env);

    client.add(&asset(&env), &alice, &ONE, &0);
    client.increase_distribution(&asset(&env), &ONE);
    env.ledger().with_mut(|li| li.timestamp += MONTH);
    client.poke(&asset(&env));

    client.process_next_user_distribution(&asset(&env), &alice);
    assert!(env.auths().is_empty());
    assert_eq!(client.balance_of(&asset(&env), &alice), 2 * ONE);
}

#[test]
fn set_operator_rotates_the_authorizer() {
    let env = Env::default();
    env.mock_all_auths();
    let client = make_client(&env);
    let roles = init_roles(&env, &client);
    let new_operator = Address::generate(&env);
    let alice = Address::generate(&env);

    client.set_operator(&new_operator);
    assert_eq!(env.auths()[0].0, roles.admin);
    assert_eq!(client.get_config().unwrap().operator, new_operator);

    client.add(&asset(&env), &alice, &ONE, &0);
    assert_eq!(env.auths()[0].0, new_operator);
}

#[test]
fn set_distributor_rotates_the_authorizer() {
    let env = Env::default();
    env.mock_all_auths();
    let client = make_client(&env);
    let _roles = init_roles(&env, &client);
    let new_distributor = Address::generate(&env);

    client.set_distributor(&new_distributor);
    client.poke(&asset(&env));
    assert_eq!(env.auths()[0].0, new_distributor);
}

#[test]
fn set_operator_missing_auth() {
    let env = Env::default();
    let client = make_client(&env);
    let roles = init_roles(&env, &client);
    let attacker = Address::generate(&env);

    assert!(client.try_set_operator(&attacker).is_err());
    assert_eq!(client.get_config().unwrap().operator, roles.operator);
}

#[test]
fn set_share_basis_missing_auth() {
    let env = Env::default();
    let client = make_client(&env);
    let _roles = init_roles(&env, &client);
    let quote = BytesN::from_array(&env, &[0xE7; 32]);

    assert!(client.try_set_share_basis(&quote, &asset(&env)).is_err());
    assert_eq!(client.share_basis(&quote), quote);
}

#[test]
fn pause_missing_auth() {
    let env = Env::default();
    let client = make_client(&env);
    let _roles = init_roles(&env, &client);

    assert!(client.try_pause().is_err());
    assert!(!client.is_paused());
}

#[test]
fn pause_blocks_ledger_and_book_but_not_claims() {
    let env = Env::default();
    env.mock_all_auths();
    let client = make_client(&env);
    let _roles = init_roles(&env, &client);
    let alice = Address::generate(&env);
    let a = asset(&env);

    client.add(&a, &alice, &ONE, &0);
    client.increase_distribution(&a, &ONE);
    env.ledger().with_mut(|li| li.timestamp += MONTH);
    client.poke(&a);

    client.pause();
    assert!(client.is_paused());
    assert_eq!(
        client.try_add(&a, &alice, &ONE, &0),
        Err(Ok(LedgerError::ContractPaused))
    );
    assert_eq!(
        client.try_sub(&a, &alice, &ONE, &0),
        Err(Ok(LedgerError::ContractPaused))
    );
    assert_eq!(
        client.try_increase_distribution(&a, &ONE),
        Err(Ok(LedgerError::ContractPaused))
    );
    assert_eq!(client.try_poke(&a), Err(Ok(LedgerError::ContractPaused)));

    let receipt = client.process_next_user_distribution(&a, &alice).unwrap();
    assert_eq!(receipt.credited, ONE);

    client.unpause();
    assert!(!client.is_paused());
    client.add(&a, &alice, &ONE, &0);
    assert_eq!(client.balance_of(&a, &alice), 3 * ONE);
}
