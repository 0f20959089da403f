use async_trait::async_trait;
use ledgerlink_wire::{EntityKind, EntityRef};

use crate::error::EngineError;

/// The consumed contract between the transport and the host ledger engine.
///
/// All entity arguments are stable identities, never snapshots: a remote
/// message may reference state that has not yet replicated into the local
/// durable store, so the transport asks the engine to refresh its view and
/// then looks the entity back up rather than trusting the payload.
#[async_trait]
pub trait LocalEngine: Send + Sync {
    /// This engine instance's identity, carried as the `source` of every
    /// locally authored message. Used for self-echo suppression.
    fn own_identity(&self) -> String;

    /// Re-read an account from the shared store.
    async fn refresh_account(&self, id: &str) -> Result<(), EngineError>;

    /// Re-read a budget from the shared store.
    async fn refresh_budget(&self, id: &str) -> Result<(), EngineError>;

    /// Re-read a currency or security node from the shared store.
    async fn refresh_commodity(&self, id: &str) -> Result<(), EngineError>;

    /// Re-read an exchange rate from the shared store.
    async fn refresh_exchange_rate(&self, id: &str) -> Result<(), EngineError>;

    /// Re-read a reminder from the shared store.
    async fn refresh_reminder(&self, id: &str) -> Result<(), EngineError>;

    /// Re-read a transaction from the shared store.
    async fn refresh_transaction(&self, id: &str) -> Result<(), EngineError>;

    /// Resolve the locally-resident entity for a refreshed identity. The
    /// returned reference replaces the wire payload before republication.
    async fn lookup(&self, kind: EntityKind, id: &str) -> Result<EntityRef, EngineError>;
}
