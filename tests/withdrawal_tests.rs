mod context;

use bank_ledger::{LedgerError, LedgerEvent, TransactionError, Wei};
use context::{ether, TestContext};

/// Deploys and lets the owner deposit 0.1 ether.
fn funded() -> TestContext {
    let mut ctx = TestContext::new();
    let owner = ctx.owner.clone();
    ctx.deposit(&owner, ether("0.1")).unwrap();
    ctx
}

#[test]
fn non_owner_cannot_withdraw() {
    let mut ctx = funded();
    let user1 = ctx.user1.clone();
    let err = ctx.withdraw(&user1, ether("0.1")).unwrap_err();
    assert!(matches!(
        err,
        TransactionError::Ledger(LedgerError::Unauthorized { .. })
    ));
    assert_eq!(ctx.bank_balance(), ether("0.1"));
    assert_eq!(ctx.wallet(&user1.address()), ether("100"));
}

#[test]
fn cannot_withdraw_more_than_balance() {
    let mut ctx = funded();
    let owner = ctx.owner.clone();
    let err = ctx.withdraw(&owner, ether("0.2")).unwrap_err();
    assert_eq!(err.to_string(), "you cannot withdraw this much");
    assert_eq!(ctx.bank_balance(), ether("0.1"));
    assert_eq!(ctx.log.events().len(), 1);
}

#[test]
fn owner_withdraw_emits_event() {
    let mut ctx = funded();
    let owner = ctx.owner.clone();
    ctx.withdraw(&owner, ether("0.1")).unwrap();

    assert_eq!(
        ctx.log.events().last(),
        Some(&LedgerEvent::Withdraw {
            to: owner.address(),
            amount: ether("0.1"),
        })
    );
    assert_eq!(ctx.bank_balance(), Wei::ZERO);
    assert_eq!(ctx.wallet(&owner.address()), ether("100"));
}

#[test]
fn partial_withdrawals_drain_the_pool() {
    let mut ctx = TestContext::new();
    let owner = ctx.owner.clone();
    ctx.deposit(&owner, ether("1")).unwrap();
    ctx.withdraw(&owner, ether("0.25")).unwrap();
    ctx.withdraw(&owner, ether("0.75")).unwrap();
    assert_eq!(ctx.bank_balance(), Wei::ZERO);
    assert!(ctx.withdraw(&owner, Wei::from_wei(1)).is_err());

    let sequences: Vec<u64> = ctx
        .transactor
        .bank()
        .events()
        .iter()
        .map(|record| record.sequence)
        .collect();
    assert_eq!(sequences, vec![1, 2, 3]);
}

#[test]
fn deposit_then_withdraw_round_trip() {
    let mut ctx = TestContext::new();
    let owner = ctx.owner.clone();

    ctx.deposit(&owner, ether("0.1")).unwrap();
    assert_eq!(ctx.bank_balance(), ether("0.1"));

    ctx.withdraw(&owner, ether("0.1")).unwrap();
    assert_eq!(ctx.bank_balance(), Wei::ZERO);
    assert_eq!(
        ctx.log.events(),
        vec![
            LedgerEvent::Deposit {
                from: owner.address(),
                amount: ether("0.1"),
            },
            LedgerEvent::Withdraw {
                to: owner.address(),
                amount: ether("0.1"),
            },
        ]
    );
}
