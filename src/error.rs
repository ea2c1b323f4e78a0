use thiserror::Error;

#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Credential encryption failed: {0}")]
    Encryption(String),

    #[error("Account {account_id} already has a schedule")]
    Conflict { account_id: i64 },

    #[error("Unknown account: {0}")]
    UnknownAccount(i64),

    #[error("Unknown schedule: {0}")]
    UnknownSchedule(i64),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CycleError>;
