use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the tria library.
///
/// Only configuration- and root-level failures escape a run. Per-file
/// failures ([`Error::Parse`], unreadable files) are caught at the file
/// boundary and turned into a skip or a raw-chunking fallback.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// Invalid exclusion pattern.
    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The invalid pattern
        pattern: String,
        /// Reason why it's invalid
        reason: String,
    },

    /// A language parser could not decompose a file.
    #[error("Failed to parse {language} source: {message}")]
    Parse {
        /// Parser that failed
        language: &'static str,
        /// Error message
        message: String,
    },

    /// Git history could not be collected.
    #[error("Git history unavailable: {message}")]
    History {
        /// Error message
        message: String,
    },

    /// Template rendering error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// JSON serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },

    /// No processable files found in directory.
    #[error("No processable files found in '{path}'. Check exclude patterns, .gitignore rules or file permissions.")]
    NoFiles {
        /// Directory that was scanned
        path: PathBuf,
    },
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid pattern error.
    #[must_use]
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Creates a parse error for the named language.
    #[must_use]
    pub fn parse(language: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            language,
            message: message.into(),
        }
    }

    /// Creates a git history error.
    #[must_use]
    pub fn history(message: impl Into<String>) -> Self {
        Self::History {
            message: message.into(),
        }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, source: tera::Error) -> Self {
        // tera keeps the useful detail in the source chain
        let mut message = source.to_string();
        let mut cause = std::error::Error::source(&source);
        while let Some(inner) = cause {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            cause = inner.source();
        }

        Self::Template {
            template: template.into(),
            message,
        }
    }

    /// Creates a no files error.
    #[must_use]
    pub fn no_files(path: impl Into<PathBuf>) -> Self {
        Self::NoFiles { path: path.into() }
    }

    /// Returns true if this is an IO error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::InvalidPattern { .. })
    }
}

impl From<tera::Error> for Error {
    fn from(e: tera::Error) -> Self {
        Self::template("unknown", e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

impl From<git2::Error> for Error {
    fn from(e: git2::Error) -> Self {
        Self::History {
            message: e.message().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("test message");
        assert!(err.is_config());
        assert!(err.to_string().contains("test message"));
    }

    #[test]
    fn test_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io("/tmp/test.txt", io_err);
        assert!(err.is_io());
        assert!(err.to_string().contains("/tmp/test.txt"));
    }

    #[test]
    fn test_invalid_pattern_counts_as_config() {
        let err = Error::invalid_pattern("[", "unclosed character class");
        assert!(err.is_config());
        assert!(err.to_string().contains("'['"));
    }

    #[test]
    fn test_parse_error_names_language() {
        let err = Error::parse("python", "syntax error at line 3");
        assert_eq!(
            err.to_string(),
            "Failed to parse python source: syntax error at line 3"
        );
    }

    #[test]
    fn test_serialization_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.to_string().contains("Serialization error"));
    }

    #[test]
    fn test_git_error_becomes_history_error() {
        let err: Error = git2::Error::from_str("not a repository").into();
        assert!(matches!(err, Error::History { .. }));
        assert!(err.to_string().contains("not a repository"));
    }

    #[test]
    fn test_error_clone() {
        let err = Error::no_files("/repo");
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
