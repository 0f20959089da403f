//! Cluster-visible resource lock state.

use serde::{Deserialize, Serialize};

use crate::frame::LOCK_STATE_PREFIX;
use crate::message::{from_versioned_json, to_versioned_json};
use crate::WireError;

/// A named boolean flag announcing whether a shared resource is held by
/// some participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    pub lock_id: String,
    pub locked: bool,
}

impl LockState {
    pub fn new(lock_id: impl Into<String>, locked: bool) -> Self {
        Self { lock_id: lock_id.into(), locked }
    }

    /// Serialize to frame text (prefix plus versioned JSON body, no
    /// terminator).
    pub fn to_frame(&self) -> Result<String, WireError> {
        Ok(format!("{LOCK_STATE_PREFIX}{}", to_versioned_json(self)?))
    }

    /// Parse the JSON body of a `<LockState>` frame.
    pub fn from_body(body: &str) -> Result<Self, WireError> {
        from_versioned_json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let state = LockState::new("ledger-file", true);
        let frame = state.to_frame().expect("encode");
        assert!(frame.starts_with(LOCK_STATE_PREFIX));

        let decoded = LockState::from_body(&frame[LOCK_STATE_PREFIX.len()..]).expect("decode");
        assert_eq!(decoded, state);
    }

    #[test]
    fn rejects_malformed_body() {
        assert!(LockState::from_body("{\"v\":1,\"lock_id\":17}").is_err());
    }
}
