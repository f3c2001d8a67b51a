//! Datastore error type

/// Failure at the datastore boundary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("constraint conflict: {0}")]
    Conflict(String),

    /// The row being updated or referenced does not exist
    #[error("missing row during {0}")]
    Missing(&'static str),

    /// Backend failure (I/O, locking, driver)
    #[error("storage error during {operation}: {message}")]
    Storage {
        /// Operation that failed
        operation: &'static str,
        /// Driver message
        message: String,
    },

    /// A stored value could not be decoded
    #[error("corrupt {0} in datastore")]
    Corruption(String),
}

impl StoreError {
    /// Backend failure helper
    #[inline]
    pub fn storage(operation: &'static str, message: impl ToString) -> Self {
        Self::Storage {
            operation,
            message: message.to_string(),
        }
    }

    /// Decoding failure helper
    #[inline]
    pub fn corruption(what: impl Into<String>) -> Self {
        Self::Corruption(what.into())
    }

    /// Uniqueness violation
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Worth retrying the whole operation from scratch
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}

/// Result alias for datastore calls
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(StoreError::Conflict("dup".into()).is_conflict());
        assert!(StoreError::storage("commit", "disk full").is_transient());
        assert!(!StoreError::corruption("status").is_transient());
    }

    #[test]
    fn display_names_operation() {
        let err = StoreError::storage("commit", "locked");
        assert_eq!(err.to_string(), "storage error during commit: locked");
    }
}
