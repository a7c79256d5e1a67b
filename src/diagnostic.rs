//! Diagnostic types for relationship reconciliation.
//!
//! Diagnostics represent non-fatal issues discovered while reconciling a
//! changeset. They allow the engine to continue processing while tracking
//! problems that need attention: a malformed front-matter value, a reference
//! to a missing document, a rejected cycle-forming edge. None of them abort a
//! reconciliation pass.

use serde::{Deserialize, Serialize};

use crate::properties::VaultPath;

/// A non-fatal condition recorded during a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncDiagnostic {
    /// A relationship property held a value of an unexpected shape or type.
    /// The offending value is treated as empty and reconciliation continues.
    MalformedProperty {
        /// Document whose front-matter carried the value.
        path: VaultPath,
        /// The configured property name (e.g. `parent`, `related`).
        property: String,
        /// Human-readable description of what was found.
        found: String,
    },

    /// A relationship refers to a path absent from the document store.
    ///
    /// The reference is kept as-is and re-reported on subsequent passes. It
    /// is never auto-removed, so a transient store error cannot cause a
    /// destructive edit.
    DanglingReference {
        path: VaultPath,
        property: String,
        reference: VaultPath,
    },

    /// A parent-edge addition would have made a node its own ancestor. The
    /// specific edge was rejected and both endpoints keep their prior state.
    CyclicRelationship {
        /// The node whose parent property triggered the check.
        path: VaultPath,
        /// The rejected parent candidate.
        parent: VaultPath,
    },

    /// Multiple parent candidates without a priority marker. Resolution fell
    /// back to the first candidate in stable order.
    ConflictingParent {
        path: VaultPath,
        candidates: Vec<VaultPath>,
        chosen: VaultPath,
    },

    /// The document store rejected a write-back for one node. The write is
    /// queued for retry on the next full rescan; the in-memory graph is not
    /// rolled back.
    StoreWriteFailure { path: VaultPath, message: String },
}

impl SyncDiagnostic {
    pub fn malformed(path: &VaultPath, property: impl Into<String>, found: impl Into<String>) -> Self {
        Self::MalformedProperty {
            path: path.clone(),
            property: property.into(),
            found: found.into(),
        }
    }

    pub fn dangling(path: &VaultPath, property: impl Into<String>, reference: &VaultPath) -> Self {
        Self::DanglingReference {
            path: path.clone(),
            property: property.into(),
            reference: reference.clone(),
        }
    }

    pub fn cyclic(path: &VaultPath, parent: &VaultPath) -> Self {
        Self::CyclicRelationship {
            path: path.clone(),
            parent: parent.clone(),
        }
    }

    pub fn conflicting(path: &VaultPath, candidates: Vec<VaultPath>, chosen: &VaultPath) -> Self {
        Self::ConflictingParent {
            path: path.clone(),
            candidates,
            chosen: chosen.clone(),
        }
    }

    pub fn write_failure(path: &VaultPath, message: impl Into<String>) -> Self {
        Self::StoreWriteFailure {
            path: path.clone(),
            message: message.into(),
        }
    }

    /// The document the diagnostic is about.
    pub fn path(&self) -> &VaultPath {
        match self {
            Self::MalformedProperty { path, .. }
            | Self::DanglingReference { path, .. }
            | Self::CyclicRelationship { path, .. }
            | Self::ConflictingParent { path, .. }
            | Self::StoreWriteFailure { path, .. } => path,
        }
    }

    pub fn is_cyclic(&self) -> bool {
        matches!(self, Self::CyclicRelationship { .. })
    }

    pub fn is_conflicting_parent(&self) -> bool {
        matches!(self, Self::ConflictingParent { .. })
    }

    pub fn is_dangling(&self) -> bool {
        matches!(self, Self::DanglingReference { .. })
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedProperty { .. })
    }

    pub fn is_write_failure(&self) -> bool {
        matches!(self, Self::StoreWriteFailure { .. })
    }
}

impl std::fmt::Display for SyncDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedProperty {
                path,
                property,
                found,
            } => write!(
                f,
                "Malformed property '{property}' in {path}: found {found}, treated as empty"
            ),
            Self::DanglingReference {
                path,
                property,
                reference,
            } => write!(
                f,
                "Dangling reference in {path} '{property}': {reference} is not in the store"
            ),
            Self::CyclicRelationship { path, parent } => write!(
                f,
                "Rejected parent edge {path} -> {parent}: the node would become its own ancestor"
            ),
            Self::ConflictingParent {
                path,
                candidates,
                chosen,
            } => write!(
                f,
                "Conflicting parents for {path}: {candidates:?} without priority marker, defaulted to {chosen}"
            ),
            Self::StoreWriteFailure { path, message } => {
                write!(f, "Write-back failed for {path}: {message}")
            }
        }
    }
}
