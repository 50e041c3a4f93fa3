use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the library
///
/// Configuration errors abort a run before extraction starts. Errors tied to a
/// single class or a single operation are caught by the collector, logged, and
/// only drop the offending unit.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no input classes matched the configured selector")]
    NoInputClasses,

    #[error("class {class}: cannot resolve type `{type_name}`")]
    MissingType { class: String, type_name: String },

    #[error("{method}: parameter #{index} has no resolvable name")]
    MissingParameterName { method: String, index: usize },

    #[error("invalid type reference `{0}`")]
    InvalidTypeRef(String),

    #[error("failed to load manifest {file}: {message}")]
    Manifest { file: PathBuf, message: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("failed to parse source {file}: {message}")]
    SourceParse { file: PathBuf, message: String },
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(format!("JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(format!("YAML: {}", err))
    }
}

impl Error {
    /// Whether this error only invalidates a single class or operation.
    pub fn is_contained(&self) -> bool {
        matches!(
            self,
            Error::MissingType { .. } | Error::MissingParameterName { .. } | Error::InvalidTypeRef(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parameter_name_message() {
        let err = Error::MissingParameterName {
            method: "UserController.find".to_string(),
            index: 1,
        };
        assert_eq!(
            err.to_string(),
            "UserController.find: parameter #1 has no resolvable name"
        );
        assert!(err.is_contained());
    }

    #[test]
    fn test_config_errors_are_not_contained() {
        assert!(!Error::NoInputClasses.is_contained());
        assert!(!Error::Config("title".to_string()).is_contained());
    }
}
