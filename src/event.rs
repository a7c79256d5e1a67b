use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{diagnostic::SyncDiagnostic, properties::VaultPath};

/// Change notifications emitted after a reconciliation pass commits, for
/// consuming view layers (graph renderers, status panes). Events describe
/// state that has already been applied; they are never a write channel back
/// into the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VaultEvent {
    /// A node's relationship state changed during reconciliation.
    NodeReconciled(VaultPath),
    /// Documents disappeared from the store; inverse edges were cleaned.
    NodesRemoved(Vec<VaultPath>),
    /// A write-back for this document reached the store.
    PropertiesWritten(VaultPath),
    /// A full rescan finished (possibly partially, when cancelled).
    RescanCompleted { processed: usize, cancelled: bool },
    /// A recoverable condition was recorded.
    Diagnostic(SyncDiagnostic),
}

impl Display for VaultEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            VaultEvent::NodeReconciled(_) => write!(f, "NodeReconciled"),
            VaultEvent::NodesRemoved(_) => write!(f, "NodesRemoved"),
            VaultEvent::PropertiesWritten(_) => write!(f, "PropertiesWritten"),
            VaultEvent::RescanCompleted { .. } => write!(f, "RescanCompleted"),
            VaultEvent::Diagnostic(_) => write!(f, "Diagnostic"),
        }
    }
}

/// Top-level event wrapper for channel consumers that need a keepalive.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    #[default]
    Ping,
    Vault(VaultEvent),
}
