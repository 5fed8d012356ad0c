use containers::Slot;
use storage::StorageError;
use thiserror::Error;

/// Failure of a single remote call attempt.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    #[error("transport error calling {method}: {message}")]
    Transport { method: String, message: String },

    #[error("{method} returned error {code}: {message}")]
    Remote {
        method: String,
        code: i64,
        message: String,
    },

    #[error("malformed {method} response: {message}")]
    Malformed { method: String, message: String },

    #[error("{method} result not yet available")]
    NotAvailable { method: String },
}

impl RpcError {
    pub fn transport(method: &str, message: impl ToString) -> Self {
        RpcError::Transport {
            method: method.to_string(),
            message: message.to_string(),
        }
    }

    pub fn malformed(method: &str, message: impl ToString) -> Self {
        RpcError::Malformed {
            method: method.to_string(),
            message: message.to_string(),
        }
    }

    pub fn not_available(method: &str) -> Self {
        RpcError::NotAvailable {
            method: method.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("{method} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        method: String,
        attempts: u32,
        source: RpcError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("consumer failed: {0}")]
    Consumer(anyhow::Error),

    #[error("cursor {name} would move backwards from {from} to {to}")]
    CursorRegression {
        name: &'static str,
        from: Slot,
        to: Slot,
    },

    #[error("worker pool lost a task: {0}")]
    WorkerLost(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cancelled")]
    Cancelled,
}

impl IndexerError {
    /// Errors a later cycle can recover from by starting over from the
    /// persisted cursors. Everything else points at a bug or bad setup.
    pub fn is_transient(&self) -> bool {
        match self {
            IndexerError::RetriesExhausted { .. } | IndexerError::Consumer(_) => true,
            IndexerError::Storage(err) => err.is_transient(),
            IndexerError::CursorRegression { .. }
            | IndexerError::WorkerLost(_)
            | IndexerError::Config(_)
            | IndexerError::Cancelled => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, IndexerError::Cancelled)
    }
}

pub type IndexerResult<T> = Result<T, IndexerError>;
