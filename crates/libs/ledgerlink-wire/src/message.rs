//! Domain messages exchanged between ledger engine instances.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::frame::MESSAGE_PREFIX;
use crate::{WireError, WIRE_VERSION};

/// Coarse category of domain entity a message concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageChannel {
    Account,
    Budget,
    Commodity,
    Reminder,
    Transaction,
    System,
}

/// The specific kind of change within a channel.
///
/// Wire names are the upper-snake tokens (`ACCOUNT_ADD`, ...), so the
/// event vocabulary is a compile-time-checked contract rather than an
/// incidental artifact of reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelEvent {
    AccountAdd,
    AccountAddFailed,
    AccountModify,
    AccountModifyFailed,
    AccountRemove,
    AccountRemoveFailed,
    AccountSecurityAdd,
    AccountSecurityAddFailed,
    AccountSecurityRemove,
    AccountSecurityRemoveFailed,
    AccountVisibilityChange,
    AccountVisibilityChangeFailed,
    BudgetAdd,
    BudgetAddFailed,
    BudgetGoalUpdate,
    BudgetGoalUpdateFailed,
    BudgetUpdate,
    BudgetUpdateFailed,
    BudgetRemove,
    CurrencyAdd,
    CurrencyAddFailed,
    CurrencyModify,
    CurrencyModifyFailed,
    CurrencyRemove,
    CurrencyRemoveFailed,
    SecurityAdd,
    SecurityAddFailed,
    SecurityModify,
    SecurityModifyFailed,
    SecurityRemove,
    SecurityRemoveFailed,
    SecurityHistoryAdd,
    SecurityHistoryAddFailed,
    SecurityHistoryRemove,
    SecurityHistoryRemoveFailed,
    ExchangeRateAdd,
    ExchangeRateRemove,
    ExchangeRateRemoveFailed,
    ReminderAdd,
    ReminderAddFailed,
    ReminderRemove,
    ReminderRemoveFailed,
    TransactionAdd,
    TransactionAddFailed,
    TransactionRemove,
    TransactionRemoveFailed,
    FileClosing,
    FileNotFound,
    FileIoError,
    FileLoadFailed,
    FileLoadSuccess,
    FileNewSuccess,
    UiRestarting,
    UiRestarted,
}

/// Named property slots a message may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageProperty {
    Account,
    Budget,
    Commodity,
    ExchangeRate,
    Reminder,
    Transaction,
}

/// Kinds of durable entities the local engine can resolve by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Account,
    Budget,
    Commodity,
    ExchangeRate,
    Reminder,
    Transaction,
}

/// A reference to a domain entity by stable identity.
///
/// `parent_id` is carried for accounts so the receiving side can refresh
/// the parent on add/remove. `snapshot` is an opaque payload blob owned by
/// the domain layer; the transport never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<serde_json::Value>,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into(), parent_id: None, snapshot: None }
    }
}

/// A domain change notification.
///
/// `remote` is never serialized: it is set only by the remote update
/// processor after a message has crossed the transport, so `remote ==
/// true` always means "received from a peer, never locally authored".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub channel: MessageChannel,
    pub event: ChannelEvent,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<MessageProperty, EntityRef>,
    pub source: String,
    #[serde(skip)]
    pub remote: bool,
}

/// Version envelope wrapped around every JSON body on the wire.
#[derive(Serialize, Deserialize)]
struct Versioned<T> {
    v: u8,
    #[serde(flatten)]
    body: T,
}

impl Message {
    pub fn new(channel: MessageChannel, event: ChannelEvent, source: impl Into<String>) -> Self {
        Self {
            channel,
            event,
            properties: BTreeMap::new(),
            source: source.into(),
            remote: false,
        }
    }

    /// Attach an entity reference under a property slot.
    pub fn with_property(mut self, property: MessageProperty, entity: EntityRef) -> Self {
        self.properties.insert(property, entity);
        self
    }

    pub fn property(&self, property: MessageProperty) -> Option<&EntityRef> {
        self.properties.get(&property)
    }

    pub fn set_property(&mut self, property: MessageProperty, entity: EntityRef) {
        self.properties.insert(property, entity);
    }

    /// Serialize to frame text (prefix plus versioned JSON body, no
    /// terminator).
    pub fn to_frame(&self) -> Result<String, WireError> {
        Ok(format!("{MESSAGE_PREFIX}{}", to_versioned_json(self)?))
    }

    /// Parse the JSON body of a `<Message>` frame.
    pub fn from_body(body: &str) -> Result<Self, WireError> {
        from_versioned_json(body)
    }
}

pub(crate) fn to_versioned_json<T: Serialize>(body: &T) -> Result<String, WireError> {
    Ok(serde_json::to_string(&Versioned { v: WIRE_VERSION, body })?)
}

pub(crate) fn from_versioned_json<T: for<'de> Deserialize<'de>>(
    body: &str,
) -> Result<T, WireError> {
    let envelope: Versioned<T> = serde_json::from_str(body)?;
    if envelope.v != WIRE_VERSION {
        return Err(WireError::UnsupportedVersion(envelope.v));
    }
    Ok(envelope.body)
}
