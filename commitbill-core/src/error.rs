//! Error types for commitbill-core

use thiserror::Error;

/// Main error type for the commitbill-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Invoice store error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Settings or invoice configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// No invoice configuration with the requested id
    #[error("invoice configuration not found: {0}")]
    ConfigNotFound(String),

    /// Schedule descriptor cannot be evaluated
    #[error("schedule error: {0}")]
    Schedule(String),

    /// Remote or local commit source failure
    #[error("commit source error: {0}")]
    Source(String),

    /// Text generation failure
    #[error("AI error: {0}")]
    Ai(String),

    /// Email delivery failure
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Saved invoice not found
    #[error("invoice not found: {0}")]
    InvoiceNotFound(String),
}

/// Result type alias for commitbill-core
pub type Result<T> = std::result::Result<T, Error>;
