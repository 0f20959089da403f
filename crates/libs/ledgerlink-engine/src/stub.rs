use async_trait::async_trait;
use ledgerlink_wire::{EntityKind, EntityRef};

use crate::error::EngineError;
use crate::traits::LocalEngine;

/// An engine returning `NotImplemented` for every operation.
///
/// Wire it into a host first, then replace methods one at a time. Tests
/// that only care about identity (self-echo suppression, source stamping)
/// use it as-is.
pub struct StubEngine {
    identity: String,
}

impl StubEngine {
    pub fn new(identity: impl Into<String>) -> Self {
        Self { identity: identity.into() }
    }
}

#[async_trait]
impl LocalEngine for StubEngine {
    fn own_identity(&self) -> String {
        self.identity.clone()
    }

    async fn refresh_account(&self, _id: &str) -> Result<(), EngineError> {
        Err(EngineError::not_implemented("refresh_account"))
    }

    async fn refresh_budget(&self, _id: &str) -> Result<(), EngineError> {
        Err(EngineError::not_implemented("refresh_budget"))
    }

    async fn refresh_commodity(&self, _id: &str) -> Result<(), EngineError> {
        Err(EngineError::not_implemented("refresh_commodity"))
    }

    async fn refresh_exchange_rate(&self, _id: &str) -> Result<(), EngineError> {
        Err(EngineError::not_implemented("refresh_exchange_rate"))
    }

    async fn refresh_reminder(&self, _id: &str) -> Result<(), EngineError> {
        Err(EngineError::not_implemented("refresh_reminder"))
    }

    async fn refresh_transaction(&self, _id: &str) -> Result<(), EngineError> {
        Err(EngineError::not_implemented("refresh_transaction"))
    }

    async fn lookup(&self, _kind: EntityKind, _id: &str) -> Result<EntityRef, EngineError> {
        Err(EngineError::not_implemented("lookup"))
    }
}
