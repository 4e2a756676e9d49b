//! Integration tests for the yield farm.

use ferrum_contracts::{Farm, FarmCap, FarmError, NoRewards, RewardPolicy};
use ferrum_ledger::logging::{init_logging, LogFormat};
use ferrum_ledger::{Address, Key, Ledger, Lp, Owned, Owner, Shared, Sui, Supply, Usdc};

type SuiUsdc = Lp<Sui, Usdc>;

fn creator() -> Address {
    Address::from_label("farm-creator")
}

fn staker() -> Address {
    Address::from_label("staker")
}

/// Helper: a fresh ledger with an LP farm owned by `creator()`.
fn lp_farm() -> (Ledger, Shared<Farm<SuiUsdc>>, Owned<FarmCap>) {
    init_logging("debug", LogFormat::Pretty);
    let ledger = Ledger::new();
    let (farm, cap) = ledger
        .execute(creator(), |ctx| Farm::<SuiUsdc>::create(ctx))
        .unwrap();
    (ledger, farm, cap)
}

fn stake(ledger: &Ledger, farm: &Shared<Farm<SuiUsdc>>, from: Address, amount: u64) -> u64 {
    let coin = Supply::<SuiUsdc>::new().mint(amount).unwrap();
    ledger
        .execute(from, |ctx| farm.lock().stake(coin, ctx))
        .unwrap()
}

#[test]
fn farm_cap_bound_at_creation() {
    let (ledger, farm, cap) = lp_farm();

    assert_eq!(ledger.owner_of(cap.id()), Some(Owner::Address(creator())));
    assert_eq!(cap.object().farm_id(), farm.id());
    assert_eq!(farm.lock().cap_id(), cap.id());
    assert_eq!(farm.lock().policy().name(), NoRewards.name());
    assert_eq!(ledger.events_of_kind("farm_created").len(), 1);
}

#[test]
fn stake_and_unstake_round_trip() {
    let (ledger, farm, _cap) = lp_farm();

    assert_eq!(stake(&ledger, &farm, staker(), 300), 300);
    assert_eq!(stake(&ledger, &farm, staker(), 200), 500);
    assert_eq!(farm.lock().total_staked(), 500);

    let out = ledger
        .execute(staker(), |ctx| farm.lock().unstake(500, ctx))
        .unwrap();
    assert_eq!(out.value(), 500);
    assert_eq!(farm.lock().stake_of(&staker()), 0);
    assert_eq!(farm.lock().total_staked(), 0);

    let unstaked = ledger.events_of_kind("unstaked");
    assert_eq!(unstaked[0].amount("total_staked"), Some(0));
}

#[test]
fn wrong_token_rejected_at_boundary() {
    let (ledger, farm, _cap) = lp_farm();
    let coin = Supply::<Usdc>::new().mint(1_000).unwrap().into_any();

    let result = ledger.execute(staker(), |ctx| farm.lock().stake_any(coin, ctx));
    match result {
        Err(FarmError::TypeMismatch(mismatch)) => {
            assert_eq!(mismatch.coin().value(), 1_000);
        }
        other => panic!("expected TypeMismatch, got {other:?}"),
    }
    assert_eq!(farm.lock().total_staked(), 0);
}

#[test]
fn pause_blocks_stake_but_not_unstake() {
    let (ledger, farm, cap) = lp_farm();
    stake(&ledger, &farm, staker(), 1_000);

    ledger
        .execute(creator(), |ctx| farm.lock().set_paused(&cap, true, ctx))
        .unwrap();

    let coin = Supply::<SuiUsdc>::new().mint(10).unwrap();
    let result = ledger.execute(staker(), |ctx| farm.lock().stake(coin, ctx));
    assert!(matches!(result, Err(FarmError::Paused(id)) if id == farm.id()));

    let out = ledger
        .execute(staker(), |ctx| farm.lock().unstake(1_000, ctx))
        .unwrap();
    assert_eq!(out.value(), 1_000);
}

#[test]
fn only_cap_holder_administers() {
    let (ledger, farm, cap) = lp_farm();

    let result = ledger.execute(staker(), |ctx| farm.lock().set_paused(&cap, true, ctx));
    assert!(matches!(result, Err(FarmError::Unauthorized(_))));

    let result = ledger.execute(staker(), |ctx| {
        farm.lock()
            .set_reward_policy(&cap, Box::new(NoRewards), ctx)
    });
    assert!(matches!(result, Err(FarmError::Unauthorized(_))));
    assert!(!farm.lock().is_paused());
}

#[test]
fn cap_of_another_farm_rejected() {
    let (ledger, farm, _cap) = lp_farm();
    let (_other, other_cap) = ledger
        .execute(creator(), |ctx| Farm::<SuiUsdc>::create(ctx))
        .unwrap();

    let result = ledger.execute(creator(), |ctx| {
        farm.lock().set_paused(&other_cap, true, ctx)
    });
    assert!(matches!(result, Err(FarmError::Unauthorized(_))));
}

#[test]
fn rotation_moves_authority() {
    let (ledger, farm, cap) = lp_farm();
    let old_id = cap.id();
    let successor = Address::from_label("successor");

    let rotated = ledger
        .execute(creator(), |ctx| farm.lock().rotate_cap(&cap, successor, ctx))
        .unwrap();

    assert!(ledger.object(old_id).is_none());
    let result = ledger.execute(creator(), |ctx| farm.lock().set_paused(&cap, true, ctx));
    assert!(matches!(result, Err(FarmError::Unauthorized(_))));
    assert_eq!(farm.lock().cap_id(), rotated.id());
    assert_eq!(
        ledger.live_bound(FarmCap::type_tag(), farm.id()),
        vec![rotated.id()]
    );

    ledger
        .execute(successor, |ctx| farm.lock().set_paused(&rotated, true, ctx))
        .unwrap();
    assert!(farm.lock().is_paused());
}

#[test]
fn refused_rotation_keeps_cap_usable() {
    let (ledger, farm, cap) = lp_farm();
    let (other, _other_cap) = ledger
        .execute(creator(), |ctx| Farm::<SuiUsdc>::create(ctx))
        .unwrap();

    let result = ledger.execute(creator(), |ctx| {
        other.lock().rotate_cap(&cap, staker(), ctx)
    });
    assert!(matches!(result, Err(FarmError::Unauthorized(_))));

    ledger
        .execute(creator(), |ctx| farm.lock().set_paused(&cap, true, ctx))
        .unwrap();
    assert!(farm.lock().is_paused());
}

#[test]
fn aborted_rotation_leaves_authority_in_place() {
    let (ledger, farm, cap) = lp_farm();
    let successor = Address::from_label("successor");

    let result = ledger.execute(creator(), |ctx| {
        farm.lock().rotate_cap(&cap, successor, ctx)?;
        farm.lock().unstake(1, ctx)
    });
    assert!(matches!(result, Err(FarmError::InsufficientStake { .. })));

    assert_eq!(farm.lock().cap_id(), cap.id());
    assert_eq!(
        ledger.live_bound(FarmCap::type_tag(), farm.id()),
        vec![cap.id()]
    );
    ledger
        .execute(creator(), |ctx| farm.lock().set_paused(&cap, true, ctx))
        .unwrap();
    assert!(farm.lock().is_paused());
}
