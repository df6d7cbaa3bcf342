//! Error types for the courseware core

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by core operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced course, chapter, lab or progress record does not exist
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of entity that was looked up
        entity: &'static str,
        /// Identifier that was not found
        id: u64,
    },

    /// Input rejected before any read or write took place
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The storage layer failed
    #[error("Storage failure: {0}")]
    Storage(#[source] StoreError),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Missing { entity, id } => CoreError::NotFound { entity, id },
            other => CoreError::Storage(other),
        }
    }
}

impl CoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<u64>) -> Self {
        CoreError::NotFound { entity, id: id.into() }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        CoreError::InvalidArgument(message.into())
    }

    /// Check if this error maps to a 404-style response
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound { .. })
    }

    /// Check if the caller sent something unusable
    pub fn is_client_error(&self) -> bool {
        matches!(self, CoreError::InvalidArgument(_)) || self.is_not_found()
    }
}

/// Result alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
