//! Error taxonomy shared by the installer library
//!
//! Library modules return [`Result<T>`]; the binary and the terminal
//! front-end wrap these in `anyhow` with extra context.

use std::path::PathBuf;
use thiserror::Error;

/// Every fallible installer operation reports one of these.
#[derive(Debug, Error)]
pub enum InstallerError {
    // ── Filesystem ──────────────────────────────────────
    #[error("{context} ({path:?}): {source}")]
    Io {
        context: String,
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Archives ────────────────────────────────────────
    #[error("Unable to read archive: {0}")]
    ArchiveRead(String),

    // ── Network ─────────────────────────────────────────
    #[error("{0}")]
    Network(String),

    // ── Documents ───────────────────────────────────────
    #[error("Unable to parse {0}")]
    Parse(String),

    // ── Lookup ──────────────────────────────────────────
    #[error("{0}")]
    NotFound(String),

    // ── Platform ────────────────────────────────────────
    #[error("Not supported on this platform: {0}")]
    PlatformUnsupported(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, InstallerError>;

impl InstallerError {
    /// Wrap an io error with a short description of what was attempted.
    pub fn io(context: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InstallerError::Io {
            context: context.into(),
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            InstallerError::NotFound(_) => true,
            InstallerError::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl From<std::io::Error> for InstallerError {
    fn from(source: std::io::Error) -> Self {
        InstallerError::Io {
            context: "Filesystem error".to_string(),
            path: PathBuf::new(),
            source,
        }
    }
}

impl From<reqwest::Error> for InstallerError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return InstallerError::Network("Unauthorized to do web request".to_string());
            }
            return InstallerError::Network(format!("Web request returned {}", status));
        }
        InstallerError::Network(format!("Web request failed: {}", err))
    }
}

impl From<serde_json::Error> for InstallerError {
    fn from(err: serde_json::Error) -> Self {
        InstallerError::Parse(format!("JSON: {}", err))
    }
}

impl From<toml::de::Error> for InstallerError {
    fn from(err: toml::de::Error) -> Self {
        InstallerError::Parse(format!("TOML: {}", err))
    }
}

impl From<zip::result::ZipError> for InstallerError {
    fn from(err: zip::result::ZipError) -> Self {
        InstallerError::ArchiveRead(err.to_string())
    }
}

/// Attach context to io results, in the spirit of `anyhow::Context`.
pub trait IoContext<T> {
    fn io_context(self, context: &str, path: &std::path::Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context(self, context: &str, path: &std::path::Path) -> Result<T> {
        self.map_err(|e| InstallerError::io(context, path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(InstallerError::NotFound("x".into()).is_not_found());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(InstallerError::io("Reading", "/tmp/x", io).is_not_found());
        assert!(!InstallerError::Network("down".into()).is_not_found());
    }

    #[test]
    fn test_io_context_keeps_path() {
        let res: std::io::Result<()> =
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"));
        let err = res
            .io_context("Writing install data", std::path::Path::new("/x/config.json"))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Writing install data"));
        assert!(msg.contains("config.json"));
    }
}
