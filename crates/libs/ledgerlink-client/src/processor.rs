//! Delayed application of remote domain messages.
//!
//! Replication into the shared store and the change notification are not
//! atomically ordered, so a message may arrive before the entities it
//! references are locally resident. Each accepted message is therefore
//! applied after a settling delay, on one dedicated worker: refresh every
//! referenced entity by stable identity, rebind the property slots to the
//! refreshed local instances, mark the message remote, and republish it on
//! the local bus for UI and business-logic consumers.

use std::sync::Arc;
use std::time::Duration;

use ledgerlink_engine::{EngineError, LocalEngine, MessageBus};
use ledgerlink_wire::{ChannelEvent, EntityKind, Message, MessageChannel, MessageProperty};
use tokio::sync::mpsc;
use tokio::time::Instant;

struct Job {
    due: Instant,
    message: Message,
}

/// Handle to the single delayed-update worker. Cloning shares the worker;
/// the worker exits once every handle is dropped and its queue drains.
#[derive(Clone)]
pub struct RemoteUpdateProcessor {
    jobs: mpsc::UnboundedSender<Job>,
    settling_delay: Duration,
}

impl RemoteUpdateProcessor {
    pub fn new(engine: Arc<dyn LocalEngine>, bus: MessageBus, settling_delay: Duration) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        tokio::spawn(worker(engine, bus, rx));
        Self { jobs, settling_delay }
    }

    /// Accept a remote message for application after the settling delay.
    /// Submission order is the order the worker applies messages in.
    pub fn schedule(&self, message: Message) {
        let job = Job { due: Instant::now() + self.settling_delay, message };
        if self.jobs.send(job).is_err() {
            log::error!("remote update worker is gone; dropping message");
        }
    }
}

async fn worker(
    engine: Arc<dyn LocalEngine>,
    bus: MessageBus,
    mut jobs: mpsc::UnboundedReceiver<Job>,
) {
    while let Some(job) = jobs.recv().await {
        tokio::time::sleep_until(job.due).await;

        let mut message = job.message;
        match rebind(engine.as_ref(), &mut message).await {
            Ok(()) => {
                message.remote = true;
                bus.publish(message);
            }
            // a refresh racing a torn-down engine lands here as well
            Err(err) => {
                log::warn!(
                    "dropping remote {:?}/{:?} message: {err}",
                    message.channel,
                    message.event
                );
            }
        }
    }
}

/// Channel-specific refresh and property rebinding. Events outside these
/// rules republish unchanged.
async fn rebind(engine: &dyn LocalEngine, message: &mut Message) -> Result<(), EngineError> {
    match message.channel {
        MessageChannel::Account => rebind_account(engine, message).await,
        MessageChannel::Budget => match message.event {
            ChannelEvent::BudgetAdd
            | ChannelEvent::BudgetUpdate
            | ChannelEvent::BudgetRemove
            | ChannelEvent::BudgetGoalUpdate => {
                if let Some(budget) = message.property(MessageProperty::Budget).cloned() {
                    engine.refresh_budget(&budget.id).await?;
                    let local = engine.lookup(EntityKind::Budget, &budget.id).await?;
                    message.set_property(MessageProperty::Budget, local);
                }
                Ok(())
            }
            _ => Ok(()),
        },
        MessageChannel::Commodity => rebind_commodity(engine, message).await,
        MessageChannel::Reminder => match message.event {
            ChannelEvent::ReminderAdd | ChannelEvent::ReminderRemove => {
                if let Some(reminder) = message.property(MessageProperty::Reminder).cloned() {
                    engine.refresh_reminder(&reminder.id).await?;
                    let local = engine.lookup(EntityKind::Reminder, &reminder.id).await?;
                    message.set_property(MessageProperty::Reminder, local);
                }
                Ok(())
            }
            _ => Ok(()),
        },
        MessageChannel::Transaction => match message.event {
            ChannelEvent::TransactionAdd | ChannelEvent::TransactionRemove => {
                if let Some(account) = message.property(MessageProperty::Account).cloned() {
                    engine.refresh_account(&account.id).await?;
                    let local = engine.lookup(EntityKind::Account, &account.id).await?;
                    message.set_property(MessageProperty::Account, local);
                }
                if let Some(tx) = message.property(MessageProperty::Transaction).cloned() {
                    engine.refresh_transaction(&tx.id).await?;
                    let local = engine.lookup(EntityKind::Transaction, &tx.id).await?;
                    message.set_property(MessageProperty::Transaction, local);
                }
                Ok(())
            }
            _ => Ok(()),
        },
        MessageChannel::System => Ok(()),
    }
}

async fn rebind_account(engine: &dyn LocalEngine, message: &mut Message) -> Result<(), EngineError> {
    let Some(account) = message.property(MessageProperty::Account).cloned() else {
        return Ok(());
    };

    match message.event {
        ChannelEvent::AccountAdd | ChannelEvent::AccountRemove => {
            engine.refresh_account(&account.id).await?;
            let local = engine.lookup(EntityKind::Account, &account.id).await?;
            message.set_property(MessageProperty::Account, local);
            // structural change: the parent's child list moved too
            if let Some(parent_id) = &account.parent_id {
                engine.refresh_account(parent_id).await?;
            }
            Ok(())
        }
        ChannelEvent::AccountModify
        | ChannelEvent::AccountSecurityAdd
        | ChannelEvent::AccountSecurityRemove
        | ChannelEvent::AccountVisibilityChange => {
            engine.refresh_account(&account.id).await?;
            let local = engine.lookup(EntityKind::Account, &account.id).await?;
            message.set_property(MessageProperty::Account, local);
            Ok(())
        }
        _ => Ok(()),
    }
}

async fn rebind_commodity(
    engine: &dyn LocalEngine,
    message: &mut Message,
) -> Result<(), EngineError> {
    match message.event {
        ChannelEvent::CurrencyModify
        | ChannelEvent::SecurityModify
        | ChannelEvent::SecurityHistoryAdd
        | ChannelEvent::SecurityHistoryRemove => {
            if let Some(commodity) = message.property(MessageProperty::Commodity).cloned() {
                engine.refresh_commodity(&commodity.id).await?;
                let local = engine.lookup(EntityKind::Commodity, &commodity.id).await?;
                message.set_property(MessageProperty::Commodity, local);
            }
            Ok(())
        }
        ChannelEvent::ExchangeRateAdd | ChannelEvent::ExchangeRateRemove => {
            if let Some(rate) = message.property(MessageProperty::ExchangeRate).cloned() {
                engine.refresh_exchange_rate(&rate.id).await?;
                let local = engine.lookup(EntityKind::ExchangeRate, &rate.id).await?;
                message.set_property(MessageProperty::ExchangeRate, local);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
