//! Remote update processor behavior: settling delay, channel-specific
//! refresh and rebinding, worker resilience.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ledgerlink_client::RemoteUpdateProcessor;
use ledgerlink_engine::{EngineError, LocalEngine, MessageBus};
use ledgerlink_wire::{
    ChannelEvent, EntityKind, EntityRef, Message, MessageChannel, MessageProperty,
};

const SETTLING_DELAY: Duration = Duration::from_millis(100);

/// Engine that records refresh calls and answers lookups with a marker
/// snapshot, so tests can tell a rebound property from the wire payload.
struct RecordingEngine {
    refreshed: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl RecordingEngine {
    fn new() -> Arc<Self> {
        Arc::new(Self { refreshed: Mutex::new(Vec::new()), closed: AtomicBool::new(false) })
    }

    fn record(&self, kind: &str, id: &str) -> Result<(), EngineError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }
        self.refreshed.lock().expect("lock").push(format!("{kind}:{id}"));
        Ok(())
    }

    fn refreshed(&self) -> Vec<String> {
        self.refreshed.lock().expect("lock").clone()
    }
}

#[async_trait]
impl LocalEngine for RecordingEngine {
    fn own_identity(&self) -> String {
        "uuid-local".to_string()
    }

    async fn refresh_account(&self, id: &str) -> Result<(), EngineError> {
        self.record("account", id)
    }

    async fn refresh_budget(&self, id: &str) -> Result<(), EngineError> {
        self.record("budget", id)
    }

    async fn refresh_commodity(&self, id: &str) -> Result<(), EngineError> {
        self.record("commodity", id)
    }

    async fn refresh_exchange_rate(&self, id: &str) -> Result<(), EngineError> {
        self.record("exchange_rate", id)
    }

    async fn refresh_reminder(&self, id: &str) -> Result<(), EngineError> {
        self.record("reminder", id)
    }

    async fn refresh_transaction(&self, id: &str) -> Result<(), EngineError> {
        self.record("transaction", id)
    }

    async fn lookup(&self, kind: EntityKind, id: &str) -> Result<EntityRef, EngineError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }
        let mut local = EntityRef::new(kind, id);
        local.snapshot = Some(serde_json::json!({ "resident": true }));
        Ok(local)
    }
}

fn entity(kind: EntityKind, id: &str) -> EntityRef {
    EntityRef::new(kind, id)
}

#[tokio::test]
async fn publishes_no_earlier_than_settling_delay_and_exactly_once() {
    let engine = RecordingEngine::new();
    let bus = MessageBus::new();
    let mut rx = bus.subscribe();
    let processor = RemoteUpdateProcessor::new(engine, bus, SETTLING_DELAY);

    let started = Instant::now();
    processor.schedule(Message::new(
        MessageChannel::System,
        ChannelEvent::FileLoadSuccess,
        "uuid-remote",
    ));

    let published = rx.recv().await.expect("publish");
    assert!(started.elapsed() >= SETTLING_DELAY);
    assert!(published.remote);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err(), "message must publish exactly once");
}

#[tokio::test]
async fn account_add_refreshes_account_and_parent() {
    let engine = RecordingEngine::new();
    let bus = MessageBus::new();
    let mut rx = bus.subscribe();
    let processor = RemoteUpdateProcessor::new(engine.clone(), bus, SETTLING_DELAY);

    let mut account = entity(EntityKind::Account, "acct-9");
    account.parent_id = Some("root".to_string());
    processor.schedule(
        Message::new(MessageChannel::Account, ChannelEvent::AccountAdd, "uuid-remote")
            .with_property(MessageProperty::Account, account),
    );

    let published = rx.recv().await.expect("publish");
    assert_eq!(engine.refreshed(), vec!["account:acct-9", "account:root"]);

    let rebound = published.property(MessageProperty::Account).expect("property");
    assert_eq!(rebound.snapshot, Some(serde_json::json!({ "resident": true })));
}

#[tokio::test]
async fn account_modify_refreshes_account_only() {
    let engine = RecordingEngine::new();
    let bus = MessageBus::new();
    let mut rx = bus.subscribe();
    let processor = RemoteUpdateProcessor::new(engine.clone(), bus, SETTLING_DELAY);

    let mut account = entity(EntityKind::Account, "acct-9");
    account.parent_id = Some("root".to_string());
    processor.schedule(
        Message::new(MessageChannel::Account, ChannelEvent::AccountModify, "uuid-remote")
            .with_property(MessageProperty::Account, account),
    );

    rx.recv().await.expect("publish");
    assert_eq!(engine.refreshed(), vec!["account:acct-9"]);
}

#[tokio::test]
async fn transaction_add_refreshes_owning_account_and_transaction() {
    let engine = RecordingEngine::new();
    let bus = MessageBus::new();
    let mut rx = bus.subscribe();
    let processor = RemoteUpdateProcessor::new(engine.clone(), bus, SETTLING_DELAY);

    processor.schedule(
        Message::new(MessageChannel::Transaction, ChannelEvent::TransactionAdd, "uuid-remote")
            .with_property(MessageProperty::Account, entity(EntityKind::Account, "acct-1"))
            .with_property(
                MessageProperty::Transaction,
                entity(EntityKind::Transaction, "txn-7"),
            ),
    );

    let published = rx.recv().await.expect("publish");
    assert_eq!(engine.refreshed(), vec!["account:acct-1", "transaction:txn-7"]);
    assert!(published
        .property(MessageProperty::Transaction)
        .and_then(|t| t.snapshot.as_ref())
        .is_some());
}

#[tokio::test]
async fn commodity_channel_distinguishes_rate_events() {
    let engine = RecordingEngine::new();
    let bus = MessageBus::new();
    let mut rx = bus.subscribe();
    let processor = RemoteUpdateProcessor::new(engine.clone(), bus, SETTLING_DELAY);

    processor.schedule(
        Message::new(MessageChannel::Commodity, ChannelEvent::SecurityModify, "uuid-remote")
            .with_property(MessageProperty::Commodity, entity(EntityKind::Commodity, "aapl")),
    );
    rx.recv().await.expect("publish");

    processor.schedule(
        Message::new(MessageChannel::Commodity, ChannelEvent::ExchangeRateAdd, "uuid-remote")
            .with_property(
                MessageProperty::ExchangeRate,
                entity(EntityKind::ExchangeRate, "usd-eur"),
            ),
    );
    rx.recv().await.expect("publish");

    assert_eq!(engine.refreshed(), vec!["commodity:aapl", "exchange_rate:usd-eur"]);
}

#[tokio::test]
async fn uncovered_events_republish_unchanged() {
    let engine = RecordingEngine::new();
    let bus = MessageBus::new();
    let mut rx = bus.subscribe();
    let processor = RemoteUpdateProcessor::new(engine.clone(), bus, SETTLING_DELAY);

    let original =
        Message::new(MessageChannel::Budget, ChannelEvent::BudgetAddFailed, "uuid-remote")
            .with_property(MessageProperty::Budget, entity(EntityKind::Budget, "b-1"));
    processor.schedule(original.clone());

    let published = rx.recv().await.expect("publish");
    assert!(engine.refreshed().is_empty());
    assert_eq!(published.property(MessageProperty::Budget), original.property(MessageProperty::Budget));
    assert!(published.remote);
}

#[tokio::test]
async fn worker_survives_a_failing_message() {
    let engine = RecordingEngine::new();
    let bus = MessageBus::new();
    let mut rx = bus.subscribe();
    let processor = RemoteUpdateProcessor::new(engine.clone(), bus, Duration::from_millis(10));

    // first message fails at refresh time against a closed engine
    engine.closed.store(true, Ordering::SeqCst);
    processor.schedule(
        Message::new(MessageChannel::Reminder, ChannelEvent::ReminderAdd, "uuid-remote")
            .with_property(MessageProperty::Reminder, entity(EntityKind::Reminder, "r-1")),
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.closed.store(false, Ordering::SeqCst);

    processor.schedule(Message::new(
        MessageChannel::System,
        ChannelEvent::FileLoadSuccess,
        "uuid-remote",
    ));

    let published = rx.recv().await.expect("worker kept going");
    assert_eq!(published.event, ChannelEvent::FileLoadSuccess);
    assert!(rx.try_recv().is_err(), "failed message must not publish");
}

#[tokio::test]
async fn scheduling_order_is_application_order() {
    let engine = RecordingEngine::new();
    let bus = MessageBus::new();
    let mut rx = bus.subscribe();
    let processor = RemoteUpdateProcessor::new(engine, bus, Duration::from_millis(10));

    for n in 0..5 {
        processor.schedule(Message::new(
            MessageChannel::System,
            ChannelEvent::FileLoadSuccess,
            format!("uuid-{n}"),
        ));
    }

    for n in 0..5 {
        let published = rx.recv().await.expect("publish");
        assert_eq!(published.source, format!("uuid-{n}"));
    }
}
