use ledgerlink_wire::EntityKind;

/// Errors returned by local engine operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("not implemented: {method}")]
    NotImplemented { method: String },

    /// The engine context has been shut down. A remote update scheduled
    /// before disconnect may still fire after it; the processor drops the
    /// message on this error instead of crashing.
    #[error("engine context is closed")]
    Closed,

    #[error("{kind:?} {id} is not resident locally")]
    NotFound { kind: EntityKind, id: String },

    #[error("internal engine error: {message}")]
    Internal { message: String },
}

impl EngineError {
    /// Convenience constructor for `NotImplemented`.
    pub fn not_implemented(method: impl Into<String>) -> Self {
        Self::NotImplemented { method: method.into() }
    }

    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }
}
