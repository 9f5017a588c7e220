use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("No wallet provider available")]
    WalletUnavailable,

    #[error("Wallet request was rejected")]
    UserRejected,

    #[error("Ledger call `{call}` failed: {reason}")]
    CallFailed { call: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum TodoError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Storage unavailable: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Failed to encode todos: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Todo with ID {0} not found")]
    NotFound(String),

    #[error("No todo at position {0}")]
    InvalidIndex(usize),

    #[error("Stake of todo {0} is not a finite amount")]
    InvalidStake(String),
}
