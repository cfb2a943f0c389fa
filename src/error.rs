use crate::schema::Side;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Invalid reconciler configuration: {0}")]
    InvalidConfig(String),

    #[error("Unparsable period label '{label}' in {side} row #{row}")]
    UnparsablePeriod {
        side: Side,
        row: usize,
        label: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
