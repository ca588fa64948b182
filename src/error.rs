use crate::gate::Denial;
use crate::types::{EntityKind, Guard};
use thiserror::Error;

/// Store-layer error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Store error wrapper. Never masked as "no permissions".
    #[error("store error: {0}")]
    Store(#[source] StoreError),
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Invalid requirement string.
    #[error("invalid requirement: {0}")]
    InvalidRequirement(String),
    /// A named role or permission does not exist.
    #[error("there is no {kind} named `{name}` for guard `{guard}`")]
    NotFound {
        kind: EntityKind,
        name: String,
        guard: Guard,
    },
    /// Two entities from different guards were linked.
    #[error("guard `{found}` does not match expected guard `{expected}`")]
    GuardMismatch { expected: Guard, found: Guard },
    /// The request was rejected at the gate.
    #[error("{0}")]
    Denied(Denial),
}

impl Error {
    pub(crate) fn not_found(kind: EntityKind, name: impl Into<String>, guard: &Guard) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
            guard: guard.clone(),
        }
    }

    /// Returns the denial if this error came from a gate rejection.
    pub fn denial(&self) -> Option<&Denial> {
        match self {
            Self::Denied(denial) => Some(denial),
            _ => None,
        }
    }
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}

impl From<Denial> for Error {
    fn from(denial: Denial) -> Self {
        Self::Denied(denial)
    }
}
