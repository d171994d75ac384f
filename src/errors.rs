//! Error types for the conversion engine.

use std::path::{Path, PathBuf};

/// Result type with [`PinyinError`] as the default error.
pub type Result<T, E = PinyinError> = std::result::Result<T, E>;

/// Errors raised while loading, mutating or persisting dictionaries.
///
/// Conversion itself never fails: units that cannot be resolved degrade to
/// the literal input. Everything here comes from construction or from one of
/// the mutation operations.
#[derive(Debug, thiserror::Error)]
pub enum PinyinError {
    /// A configured table or config file is missing and has no empty default.
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// A table exists but could not be parsed, or a write did not complete.
    #[error("failed to load or persist dictionary {}: {message}", path.display())]
    DictLoadFail { path: PathBuf, message: String },

    /// A caller supplied an argument that cannot be stored.
    #[error("invalid input for {arg}: {message}")]
    InvalidInput { arg: &'static str, message: String },

    /// Anything that does not fit the categories above, such as a failed
    /// backup copy or an unreadable config file.
    #[error("{0}")]
    Unknown(String),
}

impl PinyinError {
    pub(crate) fn invalid_input<S>(arg: &'static str, message: S) -> Self
    where
        S: Into<String>,
    {
        Self::InvalidInput {
            arg,
            message: message.into(),
        }
    }

    pub(crate) fn load_fail<S>(path: &Path, message: S) -> Self
    where
        S: Into<String>,
    {
        Self::DictLoadFail {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub(crate) fn unknown<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self::Unknown(message.into())
    }

    pub(crate) fn not_found(path: &Path) -> Self {
        Self::FileNotFound {
            path: path.to_path_buf(),
        }
    }
}
