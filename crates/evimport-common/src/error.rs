//! Error types for evimport

use thiserror::Error;

/// Result type alias for evimport operations
pub type Result<T> = std::result::Result<T, ImportError>;

/// Main error type for evimport
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Archive is empty: {0}")]
    EmptyArchive(String),

    #[error("Malformed event at row {row}: {message}")]
    Parse { row: u64, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upload failed: {0}")]
    Upload(String),
}

impl ImportError {
    /// Create a parse error for a given source row
    pub fn parse(row: u64, message: impl Into<String>) -> Self {
        Self::Parse {
            row,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an upload error
    pub fn upload(msg: impl Into<String>) -> Self {
        Self::Upload(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_names_row() {
        let err = ImportError::parse(42, "expected value at line 1 column 1");
        assert_eq!(
            err.to_string(),
            "Malformed event at row 42: expected value at line 1 column 1"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.zip");
        let err: ImportError = io.into();
        assert!(matches!(err, ImportError::Io(_)));
    }

    #[test]
    fn test_variant_messages() {
        let errors = [
            ImportError::EmptyArchive("events.zip".to_string()),
            ImportError::config("Must set API key"),
            ImportError::upload("group ending at row 100"),
            ImportError::Archive(zip::result::ZipError::FileNotFound),
        ];

        for err in errors {
            let expected = match &err {
                ImportError::Io(_) | ImportError::Parse { .. } => unreachable!(),
                ImportError::Archive(_) => "Archive error",
                ImportError::EmptyArchive(_) => "Archive is empty: events.zip",
                ImportError::Config(_) => "Configuration error: Must set API key",
                ImportError::Upload(_) => "Upload failed: group ending at row 100",
            };
            assert!(err.to_string().starts_with(expected), "{err}");
        }
    }
}
