use uuid::Uuid;

/// Failures surfaced by the record store, query path and undo ledger.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("classification not found: {0}")]
    NotFound(Uuid),

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("seed data could not be loaded: {reason}")]
    SeedLoad { reason: String },

    #[error("no undo available for {0}")]
    NoUndoAvailable(Uuid),

    #[error("undo window expired for {0}")]
    UndoExpired(Uuid),

    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl StoreError {
    /// HTTP status the transport layer reports for this kind.
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::InvalidInput { .. }
            | Self::SeedLoad { .. }
            | Self::NoUndoAvailable(_)
            | Self::UndoExpired(_) => 400,
            Self::Internal(_) => 500,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
