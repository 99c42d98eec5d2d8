use thiserror::Error;

/// Crate-wide result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness constraint was violated (typically a concurrent create).
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// A stored row could not be mapped back into a domain value.
    #[error("corrupt {entity} row: {message}")]
    Corrupt {
        entity: &'static str,
        message: String,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The durable layer is unreachable or failed. Fatal for the request;
    /// never retried at this layer.
    #[error("store unavailable: {0}")]
    Unavailable(sqlx::Error),
}

impl StoreError {
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn corrupt(entity: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Corrupt {
            entity,
            message: message.to_string(),
        }
    }

    /// True when the error came from a uniqueness constraint, meaning a
    /// concurrent caller won the insert and a fallback lookup is safe.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict {
                message: db.message().to_string(),
            },
            _ => Self::Unavailable(e),
        }
    }
}
