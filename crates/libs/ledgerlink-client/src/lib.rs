//! Message-bus client for shared ledgerlink sessions.
//!
//! Several instances of a single-writer ledger engine can work against one
//! remote, shared database. This crate keeps them consistent: every
//! locally-committed domain change is propagated to the other connected
//! instances, and resource-lock state is visible cluster-wide.
//!
//! The moving parts, inbound order:
//!
//! - [`MessageBusClient`] owns the socket, the connect/disconnect
//!   lifecycle, and the outbound write path (serialize, optionally
//!   encrypt, frame, send).
//! - A single reader task turns bytes into frames, decrypts when the
//!   session is secured, and routes each frame by its discriminator
//!   prefix.
//! - Lock-state frames land in the [`lock_cache`] immediately; domain
//!   messages go to the [`processor`], which applies them after a
//!   settling delay and republishes on the local
//!   [`MessageBus`](ledgerlink_engine::MessageBus).
//!
//! Reconnection is deliberately not provided; it is caller policy on top
//! of [`MessageBusClient::connect`].

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod lock_cache;
pub mod processor;

pub use client::MessageBusClient;
pub use config::ClientConfig;
pub use dispatch::SessionEnd;
pub use error::ClientError;
pub use lock_cache::{LockHandle, LockStateCache};
pub use processor::RemoteUpdateProcessor;
