//! Local engine boundary for the ledgerlink transport.
//!
//! The transport never owns accounting state. It consumes a narrow
//! contract (refresh an entity's local view by stable identity, look the
//! entity back up, publish on the local event bus) and this crate defines
//! that contract:
//!
//! - [`LocalEngine`]: async trait the host ledger engine implements
//! - [`MessageBus`]: local republish fan-out over `tokio::sync::broadcast`
//! - [`StubEngine`]: returns `NotImplemented` for every method; the
//!   starting point for host integration and the default test double
//! - [`EngineError`]: carries a `NotImplemented` variant for incremental
//!   bring-up and a `Closed` variant for a torn-down engine context

pub mod bus;
pub mod error;
pub mod traits;

pub use bus::MessageBus;
pub use error::EngineError;
pub use traits::LocalEngine;

mod stub;
pub use stub::StubEngine;
