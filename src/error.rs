//! Error types for the banking assistant

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, BankBotError>;

#[derive(Error, Debug)]
pub enum BankBotError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Resolution error: {0}")]
    ResolutionError(String),

    #[error("Oracle error: {0}")]
    OracleError(String),

    #[error("Dialogue error: {0}")]
    DialogueError(String),

    #[error("Ledger error: {0}")]
    LedgerError(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Responder error: {0}")]
    ResponderError(String),

    #[error("Audit error: {0}")]
    AuditError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
