//! Error types for adapter operations.

use thiserror::Error;

use crate::adapter::AdapterType;
use crate::snapshot::SnapshotId;

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Result type for calls into a wrapped engine.
pub type EngineResult<T> = Result<T, EngineFault>;

/// Errors surfaced by the adapter contract.
///
/// Everything except [`AdapterError::Engine`] is a contract violation and is
/// always returned to the immediate caller. Engine failures are the only
/// variant the recovery coordinator intercepts.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The engine library for this adapter type is not registered.
    #[error("Engine not loaded: {0}")]
    NotLoaded(AdapterType),

    /// `initialize` was called on an initialized session.
    #[error("Adapter already initialized")]
    AlreadyInitialized,

    /// Operation invoked before `initialize` or after `destroy`.
    #[error("Adapter not initialized")]
    NotInitialized,

    /// Caller supplied an unusable argument.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No snapshot with this id exists in the session history.
    #[error("State not found: {0}")]
    StateNotFound(SnapshotId),

    /// The requested adapter type name is not recognized.
    #[error("Unknown adapter type: {0}")]
    UnknownAdapterType(String),

    /// The wrapped engine failed while executing an operation.
    #[error("Engine failure: {0}")]
    Engine(#[from] EngineFault),
}

impl AdapterError {
    /// Returns the engine fault if this error originated inside the engine.
    #[must_use]
    pub fn engine_fault(&self) -> Option<&EngineFault> {
        match self {
            Self::Engine(fault) => Some(fault),
            _ => None,
        }
    }

    /// Returns true for errors that break the adapter contract.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, Self::Engine(_))
    }
}

/// An opaque failure raised by a wrapped engine.
///
/// Carries the engine's message and, when the engine provides one, a stack
/// trace. The classifier inspects both.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EngineFault {
    message: String,
    stack: Option<String>,
}

impl EngineFault {
    /// Create a fault with a message only.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    /// Attach a stack trace.
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// The failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The stack trace, if any.
    #[must_use]
    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }
}
