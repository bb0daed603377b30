use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// A lost compare-and-swap race is deliberately absent: the store reports it
/// as `Ok(false)` and the scheduler treats it as a silent no-op.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WeaverError {
    /// Input was rejected before any mutation (cycle, self-dependency,
    /// cross-mission dependency, unknown status/step token).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A status transition was attempted from a disallowed source state.
    #[error("Guard violation: {0}")]
    GuardViolation(String),

    /// A referenced Mission, Todo or Step does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An external collaborator (git, worker session) failed. Logged and
    /// reported, never re-thrown into the synchronous status-update path.
    #[error("External operation failed: {0}")]
    External(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, WeaverError>;

impl WeaverError {
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{kind} {id} does not exist"))
    }
}
