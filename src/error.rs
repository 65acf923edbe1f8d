use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown account code: {0}")]
    UnknownCode(String),

    #[error("Account {0} is a grouping account and cannot carry a direct value")]
    DirectValueNotAllowed(String),

    #[error("Invalid fiscal year end month {0}: must be between 1 and 12")]
    InvalidFiscalYearEndMonth(u32),

    #[error("Invalid segment rule: codes of length {code_len} cannot have a parent of length {parent_len}")]
    InvalidSegmentRule { code_len: usize, parent_len: usize },

    #[error("Invalid pass count {0}: fixed-point evaluation needs at least one pass")]
    InvalidPassCount(usize),

    #[error("Circular reference between formula rows: {}", .labels.join(" -> "))]
    FormulaCycle { labels: Vec<String> },

    #[error("Formula row label defined more than once: {0}")]
    DuplicateFormulaLabel(String),

    #[error("Rollup mismatch at {code}: expected {expected}, found {actual}")]
    RollupMismatch {
        code: String,
        expected: f64,
        actual: f64,
    },

    #[error("Selection is inconsistent: {code} is selected but its ancestor {missing} is not")]
    SelectionInconsistent { code: String, missing: String },

    #[error("Invalid tree snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
