//! Runs the engine against a real Postgres. Needs a database with the
//! `libs/postgres_models` migrations applied:
//!
//! DATABASE_URL=postgres://... cargo test --test postgres_test -- --ignored

mod common;

use chrono::{Duration, SubsecRound, Utc};
use diesel::ExpressionMethods;
use diesel_async::RunQueryDsl;
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use common::{immediate, scheduled, settings};
use postgres_models::schema::account;
use postgres_models::{create_pool_with, DbPool, PoolOptions};
use withdraw_api::{
    clock::ManualClock,
    domain::{WithdrawEvent, WithdrawState},
    engine::{EngineError, WithdrawEngine},
    store::{PgStorage, Storage},
};

struct PgHarness {
    pool: DbPool,
    storage: PgStorage,
    clock: ManualClock,
    engine: WithdrawEngine,
    events: mpsc::Receiver<WithdrawEvent>,
}

impl PgHarness {
    async fn new() -> Self {
        dotenvy::dotenv().ok();
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a migrated database");
        let pool = create_pool_with(
            &url,
            PoolOptions {
                max_size: 32,
                min_idle: None,
                connection_timeout: std::time::Duration::from_secs(10),
            },
        )
        .await
        .expect("Failed to create database pool");

        let storage = PgStorage::new(pool.clone());
        // Postgres keeps microseconds; whole seconds compare exactly.
        let clock = ManualClock::new(Utc::now().trunc_subsecs(0));
        let (tx, events) = mpsc::channel(1024);
        let engine = WithdrawEngine::new(Arc::new(storage.clone()), Arc::new(clock.clone()), tx, settings());
        Self {
            pool,
            storage,
            clock,
            engine,
            events,
        }
    }

    async fn account(&self, balance: Decimal) -> Uuid {
        let id = Uuid::new_v4();
        let mut conn = self.pool.get().await.unwrap();
        diesel::insert_into(account::table)
            .values((
                account::id.eq(id),
                account::name.eq("Postgres test account"),
                account::balance.eq(balance),
            ))
            .execute(&mut *conn)
            .await
            .unwrap();
        id
    }

    async fn balance(&self, id: Uuid) -> Decimal {
        self.storage.find_account(id).await.unwrap().unwrap().balance
    }

    fn now(&self) -> chrono::DateTime<Utc> {
        use withdraw_api::clock::Clock;
        self.clock.now()
    }

    fn processed_per_withdraw(&mut self) -> HashMap<Uuid, usize> {
        let mut seen = HashMap::new();
        while let Ok(event) = self.events.try_recv() {
            if matches!(event, WithdrawEvent::Processed { .. }) {
                *seen.entry(event.withdrawal().id).or_default() += 1;
            }
        }
        seen
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore = "requires Postgres with migrations applied (DATABASE_URL)"]
async fn concurrent_immediate_withdraws_serialize_on_the_account() {
    let h = PgHarness::new().await;
    let account_id = h.account(dec!(100.00)).await;

    let results = join_all((0..10).map(|_| h.engine.submit(immediate(account_id, dec!(15.00))))).await;

    let withdrawals: Vec<_> = results
        .into_iter()
        .map(|r| r.expect("no submission should fail under contention"))
        .collect();
    let succeeded = withdrawals.iter().filter(|w| w.succeeded()).count();
    let denied = withdrawals
        .iter()
        .filter(|w| w.error_reason() == Some("Insufficient balance"))
        .count();
    assert_eq!((succeeded, denied), (6, 4));
    assert_eq!(h.balance(account_id).await, dec!(10.00));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore = "requires Postgres with migrations applied (DATABASE_URL)"]
async fn overlapping_sweeps_and_submits_settle_each_withdraw_once() {
    let mut h = PgHarness::new().await;
    let account_id = h.account(dec!(1000.00)).await;

    let mut scheduled_ids = Vec::new();
    for _ in 0..5 {
        let w = h
            .engine
            .submit(scheduled(account_id, dec!(10.00), h.now() + Duration::minutes(1)))
            .await
            .unwrap();
        scheduled_ids.push(w.id);
    }
    h.processed_per_withdraw();
    h.clock.advance(Duration::minutes(2));

    let sweeps = join_all((0..2).map(|_| h.engine.sweep_due()));
    let submits = join_all((0..5).map(|_| h.engine.submit(immediate(account_id, dec!(14.00)))));
    let (sweeps, submits) = tokio::join!(sweeps, submits);

    for sweep in sweeps {
        sweep.unwrap();
    }
    for submit in submits {
        assert!(submit.unwrap().succeeded());
    }

    let processed = h.processed_per_withdraw();
    for id in &scheduled_ids {
        assert_eq!(processed.get(id), Some(&1), "withdraw {id} settled once");
        let w = h.engine.withdraw(account_id, *id).await.unwrap();
        assert_eq!(w.state(), WithdrawState::DoneSuccess);
    }
    assert_eq!(h.balance(account_id).await, dec!(880.00));
}

#[tokio::test]
#[ignore = "requires Postgres with migrations applied (DATABASE_URL)"]
async fn due_query_includes_the_exact_schedule_instant() {
    let h = PgHarness::new().await;
    let account_id = h.account(dec!(50.00)).await;
    let at = h.now() + Duration::hours(1);
    let w = h.engine.submit(scheduled(account_id, dec!(5.00), at)).await.unwrap();

    let due_ids = |rows: Vec<withdraw_api::domain::Withdrawal>| rows.into_iter().map(|w| w.id).collect::<Vec<_>>();

    let before = due_ids(h.storage.find_due(at - Duration::seconds(1)).await.unwrap());
    assert!(!before.contains(&w.id));

    let exact = h.storage.find_due(at).await.unwrap();
    let found = exact.iter().find(|row| row.id == w.id).expect("due at its own instant");
    assert_eq!(found.payment_key, w.payment_key);
    assert_eq!(found.scheduled_for, Some(at));
}

#[tokio::test]
#[ignore = "requires Postgres with migrations applied (DATABASE_URL)"]
async fn unknown_account_is_rejected_by_postgres_storage() {
    let h = PgHarness::new().await;

    let err = h.engine.submit(immediate(Uuid::new_v4(), dec!(1.00))).await.unwrap_err();

    assert!(matches!(err, EngineError::AccountNotFound(_)));
}
