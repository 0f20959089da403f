//! Inbound frame dispatch.
//!
//! Runs on the single reader task, one frame at a time in arrival order.
//! Classification is prefix-based with first-match-wins priority; a known
//! prefix with a malformed body is a recoverable per-frame error, while
//! decryption failure and the server stop token end the session.

use std::sync::{Arc, Mutex};

use ledgerlink_wire::{classify, DataStoreType, Frame, LockState, Message};

use crate::lock_cache::LockStateCache;
use crate::processor::RemoteUpdateProcessor;

/// Why a session ended from the inbound side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// A frame failed decryption, locally or at the peer. Later frames
    /// cannot be trusted to decode, so the session must not continue.
    DecryptionFailure,
    /// The server announced it is shutting the session down.
    ServerStop,
}

/// Connection metadata announced by the server after the socket is up.
#[derive(Debug, Default)]
pub(crate) struct SessionInfo {
    path: Mutex<Option<String>>,
    store_type: Mutex<Option<DataStoreType>>,
}

impl SessionInfo {
    pub(crate) fn path(&self) -> Option<String> {
        self.path.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn store_type(&self) -> Option<DataStoreType> {
        *self.store_type.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn clear(&self) {
        *self.path.lock().unwrap_or_else(|e| e.into_inner()) = None;
        *self.store_type.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn set_path(&self, path: &str) {
        *self.path.lock().unwrap_or_else(|e| e.into_inner()) = Some(path.to_string());
    }

    fn set_store_type(&self, store_type: DataStoreType) {
        *self.store_type.lock().unwrap_or_else(|e| e.into_inner()) = Some(store_type);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DispatchOutcome {
    Continue,
    EndSession(SessionEnd),
}

pub(crate) struct Dispatcher {
    /// Local engine identity, captured at connect time for self-echo
    /// suppression.
    identity: String,
    processor: RemoteUpdateProcessor,
    locks: Arc<LockStateCache>,
    session: Arc<SessionInfo>,
}

impl Dispatcher {
    pub(crate) fn new(
        identity: String,
        processor: RemoteUpdateProcessor,
        locks: Arc<LockStateCache>,
        session: Arc<SessionInfo>,
    ) -> Self {
        Self { identity, processor, locks, session }
    }

    /// Route one decoded, decrypted frame.
    pub(crate) fn dispatch(&self, line: &str) -> DispatchOutcome {
        match classify(line) {
            Frame::Message(body) => {
                match Message::from_body(body) {
                    Ok(message) if message.source == self.identity => {
                        // our own change echoed back; already applied locally
                        log::debug!("suppressing self-echo of {:?}", message.event);
                    }
                    Ok(message) => self.processor.schedule(message),
                    Err(err) => log::warn!("dropping malformed message frame: {err}"),
                }
                DispatchOutcome::Continue
            }
            Frame::LockState(body) => {
                match LockState::from_body(body) {
                    Ok(state) => self.locks.upsert(&state),
                    Err(err) => log::warn!("dropping malformed lock state frame: {err}"),
                }
                DispatchOutcome::Continue
            }
            Frame::DataPath(path) => {
                log::info!("remote data path is: {path}");
                self.session.set_path(path);
                DispatchOutcome::Continue
            }
            Frame::DataStoreType(token) => {
                match DataStoreType::from_token(token) {
                    Ok(store_type) => {
                        log::info!("remote data store type is: {token}");
                        self.session.set_store_type(store_type);
                    }
                    Err(err) => log::error!("{err}"),
                }
                DispatchOutcome::Continue
            }
            Frame::DecryptError => {
                log::error!("peer was unable to decrypt a frame; ending session");
                DispatchOutcome::EndSession(SessionEnd::DecryptionFailure)
            }
            Frame::Stop => {
                log::info!("server is shutting down");
                DispatchOutcome::EndSession(SessionEnd::ServerStop)
            }
            Frame::Unknown(line) => {
                log::error!("unknown message: {line}");
                DispatchOutcome::Continue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use ledgerlink_engine::{MessageBus, StubEngine};
    use ledgerlink_wire::{ChannelEvent, MessageChannel};

    use super::*;

    fn dispatcher(bus: &MessageBus) -> Dispatcher {
        let engine = Arc::new(StubEngine::new("uuid-a"));
        let processor =
            RemoteUpdateProcessor::new(engine, bus.clone(), Duration::from_millis(10));
        Dispatcher::new(
            "uuid-a".to_string(),
            processor,
            Arc::new(LockStateCache::new()),
            Arc::new(SessionInfo::default()),
        )
    }

    fn message_frame(source: &str) -> String {
        Message::new(MessageChannel::System, ChannelEvent::FileLoadSuccess, source)
            .to_frame()
            .expect("encode")
    }

    #[tokio::test]
    async fn self_echo_is_suppressed() {
        let bus = MessageBus::new();
        let mut rx = bus.subscribe();
        let dispatcher = dispatcher(&bus);

        assert_eq!(dispatcher.dispatch(&message_frame("uuid-a")), DispatchOutcome::Continue);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn foreign_message_is_scheduled_and_republished() {
        let bus = MessageBus::new();
        let mut rx = bus.subscribe();
        let dispatcher = dispatcher(&bus);

        dispatcher.dispatch(&message_frame("uuid-b"));

        let published = rx.recv().await.expect("publish");
        assert_eq!(published.source, "uuid-b");
        assert!(published.remote);
    }

    #[tokio::test]
    async fn malformed_message_body_is_dropped_not_fatal() {
        let bus = MessageBus::new();
        let dispatcher = dispatcher(&bus);
        assert_eq!(
            dispatcher.dispatch("<Message>{\"v\":1,\"garbage\":true}"),
            DispatchOutcome::Continue
        );
    }

    #[tokio::test]
    async fn lock_state_applies_immediately() {
        let bus = MessageBus::new();
        let dispatcher = dispatcher(&bus);

        let frame = LockState::new("L1", true).to_frame().expect("encode");
        dispatcher.dispatch(&frame);
        assert_eq!(dispatcher.locks.query("L1"), Some(true));

        let frame = LockState::new("L1", false).to_frame().expect("encode");
        dispatcher.dispatch(&frame);
        assert_eq!(dispatcher.locks.query("L1"), Some(false));
    }

    #[tokio::test]
    async fn announcements_populate_session_info() {
        let bus = MessageBus::new();
        let dispatcher = dispatcher(&bus);

        dispatcher.dispatch("<DataPath>/var/ledger/book.db");
        dispatcher.dispatch("<DataStoreType>H2_DATABASE");

        assert_eq!(dispatcher.session.path().as_deref(), Some("/var/ledger/book.db"));
        assert_eq!(dispatcher.session.store_type(), Some(DataStoreType::H2Database));
    }

    #[tokio::test]
    async fn unknown_store_type_is_loud_but_not_fatal() {
        let bus = MessageBus::new();
        let dispatcher = dispatcher(&bus);

        assert_eq!(dispatcher.dispatch("<DataStoreType>MONGO"), DispatchOutcome::Continue);
        assert_eq!(dispatcher.session.store_type(), None);
    }

    #[tokio::test]
    async fn control_frames_end_the_session() {
        let bus = MessageBus::new();
        let dispatcher = dispatcher(&bus);

        assert_eq!(
            dispatcher.dispatch("<DecryptError>"),
            DispatchOutcome::EndSession(SessionEnd::DecryptionFailure)
        );
        assert_eq!(
            dispatcher.dispatch("<Stop>"),
            DispatchOutcome::EndSession(SessionEnd::ServerStop)
        );
    }

    #[tokio::test]
    async fn unknown_frame_is_ignored() {
        let bus = MessageBus::new();
        let dispatcher = dispatcher(&bus);
        assert_eq!(dispatcher.dispatch("ping"), DispatchOutcome::Continue);
    }
}
