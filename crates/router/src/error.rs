use switchboard_common::InvalidId;
use switchboard_store::StoreError;

/// Crate-wide result type for routing operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or missing input. Rejected before any store mutation.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// Durable-layer failure, including not-found and conflict outcomes.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No title-generation collaborator was configured.
    #[error("no title generator configured")]
    NoTitleGenerator,

    /// The external title-generation call failed.
    #[error("title generation failed: {source}")]
    TitleGeneration {
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    #[must_use]
    pub fn validation(message: impl std::fmt::Display) -> Self {
        Self::Validation {
            message: message.to_string(),
        }
    }
}

impl From<InvalidId> for Error {
    fn from(e: InvalidId) -> Self {
        Self::validation(e)
    }
}
