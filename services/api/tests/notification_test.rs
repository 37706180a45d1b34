mod common;

use async_trait::async_trait;
use chrono::Duration;
use redis_cache::RedisError;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::mpsc;

use common::{dispatcher, immediate, scheduled, Harness, RecordingMailer, DEDUP_TTL};
use withdraw_api::{
    domain::{PaymentKey, PaymentKeyType, WithdrawEvent},
    notifications::{DedupStore, DispatchOutcome, EmailTemplates, InMemoryDedup, NotificationDispatcher},
};

async fn success_event() -> WithdrawEvent {
    let mut h = Harness::new();
    let account = h.account(dec!(100)).await;
    h.engine.submit(immediate(account.id, dec!(10))).await.unwrap();
    h.drain_events().remove(0)
}

#[tokio::test]
async fn redelivered_event_sends_one_email() {
    let event = success_event().await;
    let mailer = RecordingMailer::new();
    let dispatcher = dispatcher(InMemoryDedup::new(), mailer.clone());

    assert_eq!(dispatcher.dispatch(&event).await, DispatchOutcome::Sent);
    assert_eq!(dispatcher.dispatch(&event).await, DispatchOutcome::Duplicate);

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "client@example.com");
    assert!(sent[0].subject.contains("confirmed"));
}

#[tokio::test]
async fn dispatchers_sharing_a_dedup_store_send_once() {
    let event = success_event().await;
    let dedup = InMemoryDedup::new();
    let mailer = RecordingMailer::new();
    let first = dispatcher(dedup.clone(), mailer.clone());
    let second = dispatcher(dedup.clone(), mailer.clone());

    let (a, b) = tokio::join!(first.dispatch(&event), second.dispatch(&event));

    let mut outcomes = [a, b];
    outcomes.sort_by_key(|o| *o == DispatchOutcome::Duplicate);
    assert_eq!(outcomes, [DispatchOutcome::Sent, DispatchOutcome::Duplicate]);
    assert_eq!(mailer.sent().len(), 1);
}

#[tokio::test]
async fn failed_send_releases_the_claim_for_a_retry() {
    let event = success_event().await;
    let dedup = InMemoryDedup::new();
    let mailer = RecordingMailer::failing(1);
    let dispatcher = dispatcher(dedup.clone(), mailer.clone());

    assert_eq!(dispatcher.dispatch(&event).await, DispatchOutcome::Failed);
    assert!(!dedup.is_claimed(&event.dedup_key()).await);

    assert_eq!(dispatcher.dispatch(&event).await, DispatchOutcome::Sent);
    assert_eq!(dispatcher.dispatch(&event).await, DispatchOutcome::Duplicate);
    assert_eq!(mailer.sent().len(), 1);
}

#[tokio::test]
async fn each_outcome_of_a_withdraw_is_notified_separately() {
    let mut h = Harness::new();
    let account = h.account(dec!(100)).await;
    let w = h
        .engine
        .submit(scheduled(account.id, dec!(10), h.now() + Duration::hours(1)))
        .await
        .unwrap();
    h.advance(Duration::hours(1));
    h.engine.sweep_due().await.unwrap();
    let events = h.drain_events();
    assert_eq!(events.len(), 2);

    let keys: Vec<String> = events.iter().map(WithdrawEvent::dedup_key).collect();
    assert_eq!(
        keys,
        vec![
            format!("email_sent:{}_scheduled", w.id),
            format!("email_sent:{}_success", w.id),
        ]
    );

    let mailer = RecordingMailer::new();
    let dispatcher = dispatcher(InMemoryDedup::new(), mailer.clone());
    for event in &events {
        assert_eq!(dispatcher.dispatch(event).await, DispatchOutcome::Sent);
    }

    let subjects: Vec<String> = mailer.sent().into_iter().map(|m| m.subject).collect();
    assert!(subjects[0].contains("scheduled"));
    assert!(subjects[1].contains("confirmed"));
}

#[tokio::test]
async fn denied_withdraw_mail_carries_the_reason() {
    let mut h = Harness::new();
    let account = h.account(dec!(5)).await;
    h.engine.submit(immediate(account.id, dec!(10))).await.unwrap();
    let event = h.drain_events().remove(0);
    assert!(event.dedup_key().ends_with("_error"));

    let mailer = RecordingMailer::new();
    dispatcher(InMemoryDedup::new(), mailer.clone()).dispatch(&event).await;

    let sent = mailer.sent();
    assert!(sent[0].subject.contains("denied"));
    assert!(sent[0].html.contains("Insufficient balance"));
}

#[tokio::test]
async fn undeliverable_recipient_is_skipped_without_claiming() {
    let event = match success_event().await {
        WithdrawEvent::Processed {
            mut withdrawal,
            success,
            reason,
        } => {
            withdrawal.payment_key = PaymentKey {
                key_type: PaymentKeyType::Email,
                value: "broken-address".to_string(),
            };
            WithdrawEvent::Processed {
                withdrawal,
                success,
                reason,
            }
        }
        other => panic!("unexpected event {other:?}"),
    };
    let dedup = InMemoryDedup::new();
    let mailer = RecordingMailer::new();

    let outcome = dispatcher(dedup.clone(), mailer.clone()).dispatch(&event).await;

    assert_eq!(outcome, DispatchOutcome::Skipped);
    assert!(!dedup.is_claimed(&event.dedup_key()).await);
    assert!(mailer.sent().is_empty());
}

struct UnreachableDedup;

#[async_trait]
impl DedupStore for UnreachableDedup {
    async fn claim(&self, _key: &str, _ttl: std::time::Duration) -> Result<bool, RedisError> {
        Err(RedisError::Config("connection refused".to_string()))
    }

    async fn release(&self, _key: &str) -> Result<(), RedisError> {
        Err(RedisError::Config("connection refused".to_string()))
    }
}

#[tokio::test]
async fn nothing_is_sent_when_the_claim_cannot_be_made() {
    let event = success_event().await;
    let mailer = RecordingMailer::new();
    let dispatcher = NotificationDispatcher::new(
        Arc::new(UnreachableDedup),
        Arc::new(mailer.clone()),
        EmailTemplates::new(common::brt(), "PIX Withdrawals"),
        DEDUP_TTL,
    );

    assert_eq!(dispatcher.dispatch(&event).await, DispatchOutcome::Failed);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn run_drains_the_channel_until_closed() {
    let event = success_event().await;
    let mailer = RecordingMailer::new();
    let (tx, rx) = mpsc::channel(8);
    let worker = tokio::spawn(dispatcher(InMemoryDedup::new(), mailer.clone()).run(rx));

    tx.send(event.clone()).await.unwrap();
    tx.send(event).await.unwrap();
    drop(tx);
    worker.await.unwrap();

    assert_eq!(mailer.sent().len(), 1);
}
