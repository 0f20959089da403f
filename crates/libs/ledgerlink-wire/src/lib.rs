//! Ledgerlink wire format.
//!
//! Text frames exchanged between ledger engine instances sharing a remote
//! database session. Each frame is a single line: a discriminator prefix
//! followed by either a versioned JSON body (`<Message>`, `<LockState>`),
//! a plain value (`<DataPath>`, `<DataStoreType>`), or nothing at all for
//! the control markers (`<DecryptError>`, `<Stop>`).
//!
//! This crate is a leaf: it interprets text, never sockets.

pub mod frame;
pub mod lock;
pub mod message;

pub use frame::{classify, encode_frame, DataStoreType, Frame, FrameDecoder};
pub use lock::LockState;
pub use message::{ChannelEvent, EntityKind, EntityRef, Message, MessageChannel, MessageProperty};

/// Wire schema version carried in every JSON body.
pub const WIRE_VERSION: u8 = 1;

/// Maximum length of a single frame, terminator excluded. Lines longer
/// than this are dropped by the decoder to bound memory against a
/// malformed peer.
pub const MAX_FRAME_LENGTH: usize = 8192;

/// Frame terminator appended to every outbound frame.
pub const FRAME_TERMINATOR: &str = "\r\n";

/// Errors from encoding or decoding wire text.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("unsupported wire version: {0}")]
    UnsupportedVersion(u8),

    #[error("unknown data store type token: {0:?}")]
    UnknownDataStoreType(String),

    #[error("frame too long: {0} bytes (maximum {MAX_FRAME_LENGTH})")]
    FrameTooLong(usize),

    #[error("frame is not valid UTF-8")]
    NotText(#[from] std::string::FromUtf8Error),

    #[error("malformed body: {0}")]
    Body(#[from] serde_json::Error),
}
