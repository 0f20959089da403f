//! Frame prefixes and discriminator classification.
//!
//! A frame is one line of text. The first matching prefix decides how the
//! rest of the line is interpreted; classification never parses a body, so
//! a recognized prefix with a malformed body stays a recoverable per-frame
//! error at the dispatch layer.

use serde::{Deserialize, Serialize};

use crate::{WireError, FRAME_TERMINATOR, MAX_FRAME_LENGTH};

/// Discriminator for domain messages.
pub const MESSAGE_PREFIX: &str = "<Message>";

/// Discriminator for lock-state updates.
pub const LOCK_STATE_PREFIX: &str = "<LockState>";

/// Announcement of the remote database path.
pub const PATH_PREFIX: &str = "<DataPath>";

/// Announcement of the remote storage backend type.
pub const DATA_STORE_TYPE_PREFIX: &str = "<DataStoreType>";

/// Marker a peer emits when it could not decrypt a frame. Fatal for the
/// session: later frames cannot be trusted to decode.
pub const DECRYPT_ERROR_TAG: &str = "<DecryptError>";

/// Server-initiated session stop.
pub const STOP_MESSAGE: &str = "<Stop>";

/// Storage backend types a remote server may announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataStoreType {
    BinaryXstream,
    H2Database,
    HsqlDatabase,
    Xml,
}

impl DataStoreType {
    /// Parse an announced backend token. Unknown tokens are a loud error;
    /// a session against an unrecognized backend must not proceed quietly.
    pub fn from_token(token: &str) -> Result<Self, WireError> {
        match token {
            "BINARY_XSTREAM" => Ok(Self::BinaryXstream),
            "H2_DATABASE" => Ok(Self::H2Database),
            "HSQL_DATABASE" => Ok(Self::HsqlDatabase),
            "XML" => Ok(Self::Xml),
            other => Err(WireError::UnknownDataStoreType(other.to_string())),
        }
    }

    pub fn as_token(&self) -> &'static str {
        match self {
            Self::BinaryXstream => "BINARY_XSTREAM",
            Self::H2Database => "H2_DATABASE",
            Self::HsqlDatabase => "HSQL_DATABASE",
            Self::Xml => "XML",
        }
    }
}

/// A classified inbound frame. Bodies are borrowed, unparsed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    Message(&'a str),
    LockState(&'a str),
    DataPath(&'a str),
    DataStoreType(&'a str),
    DecryptError,
    Stop,
    Unknown(&'a str),
}

/// Classify one decoded, decrypted line. First matching prefix wins, in
/// dispatch priority order.
pub fn classify(line: &str) -> Frame<'_> {
    if let Some(body) = line.strip_prefix(MESSAGE_PREFIX) {
        Frame::Message(body)
    } else if let Some(body) = line.strip_prefix(LOCK_STATE_PREFIX) {
        Frame::LockState(body)
    } else if let Some(path) = line.strip_prefix(PATH_PREFIX) {
        Frame::DataPath(path)
    } else if let Some(token) = line.strip_prefix(DATA_STORE_TYPE_PREFIX) {
        Frame::DataStoreType(token)
    } else if line.starts_with(DECRYPT_ERROR_TAG) {
        Frame::DecryptError
    } else if line.starts_with(STOP_MESSAGE) {
        Frame::Stop
    } else {
        Frame::Unknown(line)
    }
}

/// Append the frame terminator to an encoded payload.
pub fn encode_frame(payload: &str) -> String {
    format!("{payload}{FRAME_TERMINATOR}")
}

/// Incremental line framer for the inbound byte stream.
///
/// TCP can deliver partial or multiple frames per read; the decoder
/// buffers until a terminator appears. A frame growing past
/// [`MAX_FRAME_LENGTH`] is reported once as [`WireError::FrameTooLong`]
/// and the decoder discards until the next terminator, so one malformed
/// peer frame never takes the connection down.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    discarding: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every frame completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<String, WireError>> {
        self.buf.extend_from_slice(bytes);

        let mut frames = Vec::new();
        loop {
            let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else {
                if self.discarding {
                    self.buf.clear();
                } else if self.buf.len() > MAX_FRAME_LENGTH {
                    frames.push(Err(WireError::FrameTooLong(self.buf.len())));
                    self.buf.clear();
                    self.discarding = true;
                }
                break;
            };

            let line: Vec<u8> = self.buf.drain(..=pos).collect();

            if self.discarding {
                // tail of an already-reported oversized frame
                self.discarding = false;
                continue;
            }

            let mut end = line.len() - 1;
            if end > 0 && line[end - 1] == b'\r' {
                end -= 1;
            }

            if end > MAX_FRAME_LENGTH {
                frames.push(Err(WireError::FrameTooLong(end)));
                continue;
            }

            frames.push(String::from_utf8(line[..end].to_vec()).map_err(WireError::from));
        }

        frames
    }
}
