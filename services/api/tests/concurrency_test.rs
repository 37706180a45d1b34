mod common;

use futures::future::join_all;
use rust_decimal_macros::dec;

use common::{immediate, Harness};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_withdraws_never_overdraw() {
    let h = Harness::new();
    let account = h.account(dec!(100)).await;

    let results = join_all((0..10).map(|_| h.engine.submit(immediate(account.id, dec!(15))))).await;

    let withdrawals: Vec<_> = results.into_iter().map(Result::unwrap).collect();
    let succeeded = withdrawals.iter().filter(|w| w.succeeded()).count();
    let denied = withdrawals
        .iter()
        .filter(|w| w.error_reason() == Some("Insufficient balance"))
        .count();

    assert_eq!(succeeded, 6);
    assert_eq!(denied, 4);
    assert_eq!(h.balance(&account).await, dec!(10));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn accounts_are_debited_independently() {
    let h = Harness::new();
    let mut accounts = Vec::new();
    for _ in 0..4 {
        accounts.push(h.account(dec!(50)).await);
    }

    let requests = accounts
        .iter()
        .flat_map(|account| (0..5).map(move |_| immediate(account.id, dec!(10))));
    let results = join_all(requests.map(|request| h.engine.submit(request))).await;

    assert!(results.iter().all(|r| r.as_ref().is_ok_and(|w| w.succeeded())));
    for account in &accounts {
        assert_eq!(h.balance(account).await, dec!(0));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dropping_the_caller_does_not_abandon_the_lock() {
    let h = Harness::new();
    let account = h.account(dec!(100)).await;

    // Poll once and drop; whatever was started must still finish.
    let abandoned = h.engine.submit(immediate(account.id, dec!(30)));
    let _ = tokio::time::timeout(std::time::Duration::from_millis(1), abandoned).await;

    let next = h.engine.submit(immediate(account.id, dec!(20))).await.unwrap();
    assert!(next.succeeded());

    let balance = h.balance(&account).await;
    assert!(balance == dec!(80) || balance == dec!(50), "unexpected balance {balance}");
}
