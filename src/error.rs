//! Error taxonomy shared by the training pipeline and the dashboard

use std::path::{Path, PathBuf};

/// Errors raised by the library. None of them are retried; callers abort.
#[derive(Debug, thiserror::Error)]
pub enum ChurnError {
    /// Input file missing, unreadable or lacking required columns
    #[error("failed to load data from {path}: {message}")]
    DataLoad { path: PathBuf, message: String },

    /// Model or report could not be serialized or written
    #[error("failed to persist {path}: {message}")]
    Persist { path: PathBuf, message: String },

    /// Evaluation image could not be drawn or written
    #[error("failed to render {path}: {message}")]
    Render { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("training failed: {0}")]
    Training(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

impl ChurnError {
    pub fn data_load(path: impl AsRef<Path>, message: impl ToString) -> Self {
        Self::DataLoad {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn persist(path: impl AsRef<Path>, message: impl ToString) -> Self {
        Self::Persist {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn render(path: impl AsRef<Path>, message: impl ToString) -> Self {
        Self::Render {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_path() {
        let err = ChurnError::data_load("data/missing.csv", "file not found");
        assert_eq!(
            err.to_string(),
            "failed to load data from data/missing.csv: file not found"
        );

        let err = ChurnError::render("out/roc_curve.png", "disk full");
        assert!(err.to_string().contains("out/roc_curve.png"));
    }
}
