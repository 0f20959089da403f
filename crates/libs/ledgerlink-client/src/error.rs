use ledgerlink_wire::WireError;

/// Errors surfaced to callers of the message-bus client.
///
/// Inbound-path faults (oversized frames, malformed bodies, unknown
/// discriminators) are handled on the reader task per frame and never
/// appear here; only connection lifecycle and outbound failures do.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ClientError {
    #[error("connection attempt timed out")]
    Timeout,

    #[error("failed to connect: {0}")]
    Connect(#[source] std::io::Error),

    #[error("not connected")]
    NotConnected,

    #[error("already connected")]
    AlreadyConnected,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}
