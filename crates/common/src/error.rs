//! Common error types

use std::path::PathBuf;

use thiserror::Error;

/// Config file errors; file-level variants name the file involved.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error in {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Error::Toml {
            path: path.into(),
            source,
        }
    }
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = Error::Config("base_url must be set".into());
        assert_eq!(err.to_string(), "Configuration error: base_url must be set");
    }

    #[test]
    fn file_errors_name_the_path() {
        let io = Error::io(
            "/etc/harvest.toml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        );
        assert_eq!(io.to_string(), "cannot read /etc/harvest.toml: file not found");

        let parse: std::result::Result<toml::Value, _> = toml::from_str("not = = toml");
        let toml = Error::toml("harvest.toml", parse.unwrap_err());
        assert!(
            toml.to_string().starts_with("TOML parse error in harvest.toml:"),
            "got: {toml}"
        );
        assert!(std::error::Error::source(&toml).is_some());
    }
}
