//! DM-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, MonError>;

/// Top-level error type for the disk alert monitor.
#[derive(Debug, Error)]
pub enum MonError {
    #[error("[DM-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[DM-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[DM-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[DM-1101] unsupported platform: {details}")]
    UnsupportedPlatform { details: String },

    #[error("[DM-2001] filesystem stats failure for {location}: {details}")]
    FsStats { location: String, details: String },

    #[error("[DM-2003] volume {location} reports zero total capacity")]
    EmptyVolume { location: String },

    #[error("[DM-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[DM-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[DM-3101] notification delivery to {recipient} failed: {details}")]
    Delivery { recipient: String, details: String },
}

impl MonError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "DM-1001",
            Self::MissingConfig { .. } => "DM-1002",
            Self::ConfigParse { .. } => "DM-1003",
            Self::UnsupportedPlatform { .. } => "DM-1101",
            Self::FsStats { .. } => "DM-2001",
            Self::EmptyVolume { .. } => "DM-2003",
            Self::Serialization { .. } => "DM-2101",
            Self::Io { .. } => "DM-3002",
            Self::Delivery { .. } => "DM-3101",
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for MonError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for MonError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<MonError> {
        vec![
            MonError::InvalidConfig {
                details: String::new(),
            },
            MonError::MissingConfig {
                path: PathBuf::new(),
            },
            MonError::ConfigParse {
                context: "",
                details: String::new(),
            },
            MonError::UnsupportedPlatform {
                details: String::new(),
            },
            MonError::FsStats {
                location: String::new(),
                details: String::new(),
            },
            MonError::EmptyVolume {
                location: String::new(),
            },
            MonError::Serialization {
                context: "",
                details: String::new(),
            },
            MonError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            MonError::Delivery {
                recipient: String::new(),
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = all_variants();
        let codes: Vec<&str> = errors.iter().map(MonError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_display_includes_code() {
        for err in all_variants() {
            let msg = err.to_string();
            assert!(
                msg.contains(err.code()),
                "display should contain error code {}: {msg}",
                err.code()
            );
        }
    }

    #[test]
    fn empty_volume_names_location() {
        let err = MonError::EmptyVolume {
            location: "/proc".to_string(),
        };
        assert_eq!(err.code(), "DM-2003");
        assert!(err.to_string().contains("/proc"));
    }

    #[test]
    fn io_convenience_constructor() {
        let err = MonError::io(
            "/tmp/test.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "DM-3002");
        assert!(err.to_string().contains("/tmp/test.txt"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: MonError = json_err.into();
        assert_eq!(err.code(), "DM-2101");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: MonError = toml_err.into();
        assert_eq!(err.code(), "DM-1003");
    }
}
