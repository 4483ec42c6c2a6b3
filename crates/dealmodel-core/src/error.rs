use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelGenError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Missing reference: key '{key}' not registered (required by {stage})")]
    MissingReference { key: String, stage: String },

    #[error("Sheet error on '{sheet}': {reason}")]
    SheetError { sheet: String, reason: String },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Completion provider error: {0}")]
    CompletionError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for ModelGenError {
    fn from(e: serde_json::Error) -> Self {
        ModelGenError::SerializationError(e.to_string())
    }
}
