use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = RepairError> = std::result::Result<T, E>;

/// Everything that can go wrong in a repair session.
///
/// Compile failures and exhausted attempt budgets are not errors: they travel
/// as status values through the search controller.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error("statement pool is empty (total weight is zero)")]
    EmptyPool,
    #[error("statement weight must be finite and non-negative, got {0}")]
    InvalidWeight(f64),
    #[error("unsupported source file: {0}")]
    UnsupportedLanguage(PathBuf),
    #[error("failed to parse {path}")]
    Parse { path: PathBuf },
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed coverage file {path}: {source}")]
    Coverage {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown statement {index} in {document}")]
    UnknownStatement { document: String, index: usize },
    #[error("mutation state error: {0}")]
    MutationState(&'static str),
    #[error("edit {edit} is not the most recent edit applied to {path}")]
    UndoOutOfOrder { edit: u64, path: String },
    #[error("test execution failed: {0}")]
    TestExecution(String),
    #[error("collaborator failed: {0}")]
    Collaborator(String),
    #[error("setup failed: {0}")]
    Setup(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RepairError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RepairError::Io {
            path: path.into(),
            source,
        }
    }

    /// Bad user input (flags, sources, coverage data) rather than a failure
    /// of the session's machinery.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            RepairError::Config(_)
                | RepairError::UnsupportedLanguage(_)
                | RepairError::Coverage { .. }
                | RepairError::InvalidWeight(_)
        )
    }
}
