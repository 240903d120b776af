use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardrailsError {
    #[error("plan import produced no usable rows after filtering")]
    NoRowsProduced,

    #[error("no actual entry recorded for {0}")]
    ActualNotFound(NaiveDate),

    #[error("invalid guardrail percentage {0}: must be finite and non-negative")]
    InvalidPercentage(f64),

    #[error("unrecognized date value: {0}")]
    InvalidDate(String),

    #[error("migration to schema version {version} failed: {details}")]
    Migration { version: u32, details: String },

    #[error("remote storage returned status {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GuardrailsError>;
