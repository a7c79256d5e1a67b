use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use serde_yaml::Error as YamlError;
use thiserror::Error;
use tokio::sync::mpsc::error::SendError as TokioSendError;

use crate::event::VaultEvent;

/// Fatal error conditions for the kinship engine.
///
/// Recoverable conditions (malformed properties, cycles, conflicting parents,
/// per-node write failures) are *not* errors, they travel as
/// [`crate::diagnostic::SyncDiagnostic`]s inside reconciliation results. An
/// error from this enum aborts the operation that raised it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum KinshipError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Document store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Watch service error: {0}")]
    Service(String),
}

impl From<io::Error> for KinshipError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => KinshipError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => KinshipError::PermissionDenied,
            _ => KinshipError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<YamlError> for KinshipError {
    fn from(src: YamlError) -> KinshipError {
        KinshipError::Serialization(format!("YAML (de)serialization error: {src}"))
    }
}

impl From<JsonError> for KinshipError {
    fn from(src: JsonError) -> KinshipError {
        KinshipError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<toml::de::Error> for KinshipError {
    fn from(src: toml::de::Error) -> KinshipError {
        KinshipError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for KinshipError {
    fn from(src: toml::ser::Error) -> KinshipError {
        KinshipError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<uuid::Error> for KinshipError {
    fn from(src: uuid::Error) -> KinshipError {
        KinshipError::Serialization(format!("UUID conversion failed: {src}"))
    }
}

impl From<TokioSendError<VaultEvent>> for KinshipError {
    fn from(x: TokioSendError<VaultEvent>) -> Self {
        KinshipError::Io(format!(
            "Channel update send Error, could not transmit state update event {:?}",
            x.0
        ))
    }
}

#[cfg(feature = "service")]
impl From<notify::Error> for KinshipError {
    fn from(notify_error: notify::Error) -> Self {
        use notify::ErrorKind as NotifyErrorKind;
        match notify_error.kind {
            NotifyErrorKind::Generic(msg) => KinshipError::Service(format!(
                "notify-debouncer: {}, paths: {:?}",
                msg, notify_error.paths
            )),
            NotifyErrorKind::Io(io_error) => KinshipError::Service(format!(
                "notify-debouncer: io error {}, paths: {:?}",
                io_error.kind(),
                notify_error.paths
            )),
            NotifyErrorKind::PathNotFound => KinshipError::NotFound(format!(
                "notify-debouncer: path(s) not found: {:?}",
                notify_error.paths
            )),
            NotifyErrorKind::WatchNotFound => KinshipError::NotFound(format!(
                "notify-debouncer: watch not found, paths: {:?}",
                notify_error.paths
            )),
            NotifyErrorKind::InvalidConfig(_) => {
                KinshipError::Service("notify-debouncer invalid config".to_string())
            }
            NotifyErrorKind::MaxFilesWatch => {
                KinshipError::Service("notify-debouncer max file watch limit reached".to_string())
            }
        }
    }
}
