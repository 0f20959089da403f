//! Connection lifecycle and the outbound write path.

use std::sync::Arc;

use ledgerlink_crypt::EncryptionFilter;
use ledgerlink_engine::{LocalEngine, MessageBus};
use ledgerlink_wire::frame::STOP_MESSAGE;
use ledgerlink_wire::{encode_frame, DataStoreType, FrameDecoder, LockState, Message};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::dispatch::{DispatchOutcome, Dispatcher, SessionEnd, SessionInfo};
use crate::error::ClientError;
use crate::lock_cache::{LockHandle, LockStateCache};
use crate::processor::RemoteUpdateProcessor;

/// Per-connection state. Exists only between `connect` and `disconnect`.
struct Connection {
    writer: Arc<Mutex<OwnedWriteHalf>>,
    filter: Option<EncryptionFilter>,
    /// Most recent outstanding write. The writer mutex orders writes, so
    /// awaiting this handle means every earlier write has completed.
    pending_write: Option<JoinHandle<std::io::Result<()>>>,
    reader: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Client side of the shared-session message bus.
///
/// Owns the socket and the outbound write path. Inbound frames are decoded
/// and dispatched sequentially on one reader task; accepted remote domain
/// messages are applied by the shared delayed-update worker and republished
/// on the local bus handed in at construction.
pub struct MessageBusClient {
    config: ClientConfig,
    engine: Arc<dyn LocalEngine>,
    processor: RemoteUpdateProcessor,
    locks: Arc<LockStateCache>,
    session: Arc<SessionInfo>,
    state: Mutex<Option<Connection>>,
    session_end: watch::Sender<Option<SessionEnd>>,
}

impl MessageBusClient {
    /// Build a client bound to a session context: the local engine
    /// collaborator and the local event bus remote messages republish on.
    pub fn new(config: ClientConfig, engine: Arc<dyn LocalEngine>, bus: MessageBus) -> Self {
        let processor =
            RemoteUpdateProcessor::new(Arc::clone(&engine), bus, config.settling_delay());
        let (session_end, _) = watch::channel(None);

        Self {
            config,
            engine,
            processor,
            locks: Arc::new(LockStateCache::new()),
            session: Arc::new(SessionInfo::default()),
            state: Mutex::new(None),
            session_end,
        }
    }

    /// Open the connection, blocking until success, refusal, or the
    /// configured timeout. On failure no session state remains.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        if state.is_some() {
            return Err(ClientError::AlreadyConnected);
        }

        let endpoint = (self.config.host.as_str(), self.config.port);
        let stream =
            match tokio::time::timeout(self.config.connection_timeout(), TcpStream::connect(endpoint))
                .await
            {
                Ok(Ok(stream)) => stream,
                Ok(Err(err)) => {
                    log::error!("failed to connect to remote message bus: {err}");
                    return Err(ClientError::Connect(err));
                }
                Err(_) => {
                    log::error!(
                        "connection to {}:{} timed out",
                        self.config.host,
                        self.config.port
                    );
                    return Err(ClientError::Timeout);
                }
            };

        let (read_half, write_half) = stream.into_split();

        self.session.clear();
        self.session_end.send_replace(None);

        let filter = self.config.encryption_filter();
        let cancel = CancellationToken::new();
        let dispatcher = Dispatcher::new(
            self.engine.own_identity(),
            self.processor.clone(),
            Arc::clone(&self.locks),
            Arc::clone(&self.session),
        );
        let reader = tokio::spawn(read_loop(
            read_half,
            filter.clone(),
            dispatcher,
            cancel.clone(),
            self.session_end.clone(),
        ));

        *state = Some(Connection {
            writer: Arc::new(Mutex::new(write_half)),
            filter,
            pending_write: None,
            reader,
            cancel,
        });

        log::info!(
            "connected to remote message server at {}:{}",
            self.config.host,
            self.config.port
        );
        Ok(())
    }

    /// Close the session. The pending write is awaited first so the peer
    /// always observes a complete final frame. No-op when already
    /// disconnected.
    pub async fn disconnect(&self) {
        let conn = self.state.lock().await.take();
        let Some(mut conn) = conn else { return };

        if let Some(handle) = conn.pending_write.take() {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => log::error!("final write failed: {err}"),
                Err(err) => log::error!("write task failed: {err}"),
            }
        }

        conn.cancel.cancel();

        {
            let mut writer = conn.writer.lock().await;
            if let Err(err) = writer.shutdown().await {
                log::warn!("error closing connection: {err}");
            }
        }

        if let Err(err) = conn.reader.await {
            log::warn!("reader task failed: {err}");
        }

        log::info!("disconnected from remote message server");
    }

    /// Send a domain message to the server for fan-out to the other
    /// connected instances.
    pub async fn send(&self, message: &Message) -> Result<(), ClientError> {
        self.send_frame(message.to_frame()?).await
    }

    /// Announce a lock-state change cluster-wide.
    pub async fn send_lock_state(&self, state: &LockState) -> Result<(), ClientError> {
        self.send_frame(state.to_frame()?).await
    }

    /// Ask the remote server to shut itself down.
    pub async fn send_stop_request(&self) -> Result<(), ClientError> {
        self.send_frame(STOP_MESSAGE.to_string()).await
    }

    async fn send_frame(&self, payload: String) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        let conn = state.as_mut().ok_or(ClientError::NotConnected)?;

        let payload = match &conn.filter {
            Some(filter) => filter.encrypt(&payload),
            None => payload,
        };
        let frame = encode_frame(&payload);

        // Acquire the writer before spawning so concurrent sends hit the
        // socket in call order; the write itself completes in background.
        let guard = Arc::clone(&conn.writer).lock_owned().await;
        let handle = tokio::spawn(write_frame(guard, frame));
        conn.pending_write.replace(handle);

        Ok(())
    }

    /// Await the most recent write, surfacing its outcome. The writer
    /// mutex orders writes, so success here covers every earlier send too.
    pub async fn flush(&self) -> Result<(), ClientError> {
        let handle = {
            let mut state = self.state.lock().await;
            state.as_mut().and_then(|conn| conn.pending_write.take())
        };

        match handle {
            None => Ok(()),
            Some(handle) => match handle.await {
                Ok(result) => Ok(result?),
                Err(err) => {
                    log::error!("write task failed: {err}");
                    Ok(())
                }
            },
        }
    }

    /// Current cluster-visible state of a named lock, if any peer has
    /// announced one.
    pub fn query_lock(&self, lock_id: &str) -> Option<bool> {
        self.locks.query(lock_id)
    }

    /// A live handle onto one lock's state; observes later updates.
    pub fn lock_handle(&self, lock_id: &str) -> Option<LockHandle> {
        self.locks.handle(lock_id)
    }

    /// Database path announced by the server after connect.
    pub fn announced_path(&self) -> Option<String> {
        self.session.path()
    }

    /// Storage backend type announced by the server after connect.
    pub fn announced_store_type(&self) -> Option<DataStoreType> {
        self.session.store_type()
    }

    /// Watch for inbound session-end conditions (peer decryption failure,
    /// server stop). The owner is expected to call `disconnect` and tear
    /// down its engine context when one fires.
    pub fn session_end(&self) -> watch::Receiver<Option<SessionEnd>> {
        self.session_end.subscribe()
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.is_some()
    }
}

async fn write_frame(
    mut writer: OwnedMutexGuard<OwnedWriteHalf>,
    frame: String,
) -> std::io::Result<()> {
    writer.write_all(frame.as_bytes()).await
}

/// Single-threaded inbound path: bytes to frames to dispatch, in arrival
/// order. Ends on cancellation, peer close, socket error, or a fatal
/// session condition.
async fn read_loop(
    mut read_half: OwnedReadHalf,
    filter: Option<EncryptionFilter>,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
    session_end: watch::Sender<Option<SessionEnd>>,
) {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 4096];

    'session: loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = read_half.read(&mut buf) => match result {
                Ok(0) => {
                    log::warn!("connection closed by peer");
                    break;
                }
                Ok(n) => {
                    for frame in decoder.feed(&buf[..n]) {
                        let line = match frame {
                            Ok(line) => line,
                            Err(err) => {
                                log::warn!("dropping frame: {err}");
                                continue;
                            }
                        };

                        let plain = match &filter {
                            Some(filter) => match filter.decrypt(&line) {
                                Ok(plain) => plain,
                                Err(err) => {
                                    log::error!("unable to decrypt the remote message: {err}");
                                    session_end.send_replace(Some(SessionEnd::DecryptionFailure));
                                    break 'session;
                                }
                            },
                            None => line,
                        };

                        match dispatcher.dispatch(&plain) {
                            DispatchOutcome::Continue => {}
                            DispatchOutcome::EndSession(end) => {
                                session_end.send_replace(Some(end));
                                break 'session;
                            }
                        }
                    }
                }
                Err(err) => {
                    log::warn!("read error: {err}");
                    break;
                }
            }
        }
    }
}
