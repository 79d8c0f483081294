//! Error types for site configuration and compilation.

use std::path::PathBuf;
use thiserror::Error;

/// `staticweb.toml` errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Compilation errors.
///
/// Only [`CompileError::InvalidSourceRoot`] aborts a run. Every other variant
/// is collected while the remaining pages keep compiling, and the run returns
/// them together as [`CompileError::Aggregate`].
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("src must be a directory: {}", .0.display())]
    InvalidSourceRoot(PathBuf),

    #[error("invalid layout config `{}`: {source}", path.display())]
    LayoutConfig {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid front matter in `{}`: {source}", path.display())]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("cannot write `{}`: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot compress `{}`: {source}", path.display())]
    Compression {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", join_lines(.0))]
    Aggregate(Vec<CompileError>),
}

impl CompileError {
    /// Flattened view of the individual errors in this error.
    pub fn errors(&self) -> Vec<&CompileError> {
        match self {
            Self::Aggregate(errors) => errors.iter().flat_map(CompileError::errors).collect(),
            other => vec![other],
        }
    }
}

fn join_lines(errors: &[CompileError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_config_error_display() {
        let io_err = ConfigError::Io(
            PathBuf::from("staticweb.toml"),
            Error::new(ErrorKind::NotFound, "file not found"),
        );
        let display = format!("{io_err}");
        assert!(display.contains("IO error"));
        assert!(display.contains("staticweb.toml"));

        let validation_err = ConfigError::Validation("port out of range".to_string());
        assert!(format!("{validation_err}").contains("port out of range"));
    }

    #[test]
    fn test_aggregate_display_joins_lines() {
        let err = CompileError::Aggregate(vec![
            CompileError::InvalidSourceRoot(PathBuf::from("/nope")),
            CompileError::FileOpen {
                path: PathBuf::from("/dist/index.html"),
                source: Error::new(ErrorKind::PermissionDenied, "denied"),
            },
        ]);
        let display = err.to_string();

        assert_eq!(display.lines().count(), 2);
        assert!(display.contains("src must be a directory: /nope"));
        assert!(display.contains("cannot write `/dist/index.html`: denied"));
    }

    #[test]
    fn test_errors_flattens_nested_aggregates() {
        let err = CompileError::Aggregate(vec![
            CompileError::InvalidSourceRoot(PathBuf::from("a")),
            CompileError::Aggregate(vec![CompileError::InvalidSourceRoot(PathBuf::from("b"))]),
        ]);
        assert_eq!(err.errors().len(), 2);
    }
}
