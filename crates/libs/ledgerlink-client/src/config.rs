//! Client configuration.

use std::time::Duration;

use ledgerlink_crypt::EncryptionFilter;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

const DEFAULT_PORT: u16 = 5300;
const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Default forced latency before a remote message is applied, giving the
/// underlying replicated store time to catch up with the notification.
const DEFAULT_SETTLING_DELAY_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub connection_timeout_secs: u64,
    /// Transport-security toggle. The encryption filter activates only
    /// when this is set and `credential` is non-empty.
    pub secure: bool,
    pub credential: Option<String>,
    pub settling_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            secure: false,
            credential: None,
            settling_delay_ms: DEFAULT_SETTLING_DELAY_MS,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, ..Self::default() }
    }

    pub fn from_toml(text: &str) -> Result<Self, ClientError> {
        Ok(toml::from_str(text)?)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn settling_delay(&self) -> Duration {
        Duration::from_millis(self.settling_delay_ms)
    }

    /// Build the outbound/inbound filter when transport security is on and
    /// a usable credential was supplied; `None` means plaintext frames.
    pub fn encryption_filter(&self) -> Option<EncryptionFilter> {
        match (self.secure, self.credential.as_deref()) {
            (true, Some(credential)) if !credential.is_empty() => {
                Some(EncryptionFilter::new(credential))
            }
            _ => None,
        }
    }
}
