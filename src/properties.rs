//! [crate::properties] contains the basic identity building blocks shared by
//! the rest of the crate: vault-relative document paths and the one-shot
//! stable identifiers injected into documents.

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
    path::Path,
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::KinshipError;

/// Raw front-matter as read from the document store: property name to
/// dynamically-typed YAML value.
pub type RawProperties = BTreeMap<String, serde_yaml::Value>;

/// A vault-relative document path, the stable key of a node.
///
/// Paths are stored with forward slashes regardless of platform so that the
/// same vault produces the same graph everywhere. Ordering is plain
/// lexicographic, which is also the stable order parent-conflict resolution
/// falls back to.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VaultPath(String);

impl VaultPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The display name of the document: file stem without extension.
    pub fn display_name(&self) -> &str {
        let file = self.0.rsplit('/').next().unwrap_or(&self.0);
        match file.rsplit_once('.') {
            Some((stem, _ext)) if !stem.is_empty() => stem,
            _ => file,
        }
    }

    /// The containing directory, empty string for vault-root documents.
    pub fn directory(&self) -> &str {
        match self.0.rsplit_once('/') {
            Some((dir, _)) => dir,
            None => "",
        }
    }

    /// Whether this path lives under `prefix` (or is `prefix` itself).
    /// `prefix` covers itself and all subdirectories.
    pub fn is_under(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return true;
        }
        self.0 == prefix
            || self
                .0
                .strip_prefix(prefix)
                .map(|rest| rest.starts_with('/'))
                .unwrap_or(false)
    }
}

impl From<&str> for VaultPath {
    fn from(s: &str) -> Self {
        VaultPath(s.replace('\\', "/"))
    }
}

impl From<String> for VaultPath {
    fn from(s: String) -> Self {
        VaultPath::from(s.as_str())
    }
}

impl From<&Path> for VaultPath {
    fn from(p: &Path) -> Self {
        VaultPath::from(p.to_string_lossy().as_ref())
    }
}

impl Display for VaultPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for VaultPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Zettel ID
///
/// A UUIDv7 assigned exactly once when a node is first observed without an
/// identifier. The v7 layout orders ids chronologically by creation time with
/// millisecond resolution plus random bits, which is practically unique
/// within a vault without any coordination.
///
/// Immutability beats format: an identifier already present in a document is
/// preserved verbatim even when it does not parse as a UUID, via
/// [`ZettelId::Foreign`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZettelId {
    Native(Uuid),
    /// An identifier minted by another tool. Carried through untouched.
    Foreign(String),
}

impl ZettelId {
    /// Mint a fresh identifier from the current creation time.
    pub fn generate() -> Self {
        ZettelId::Native(Uuid::now_v7())
    }

    /// Accept whatever identifier the document already carries. Returns
    /// `None` for empty or all-whitespace strings.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match Uuid::parse_str(trimmed) {
            Ok(uuid) => Some(ZettelId::Native(uuid)),
            Err(_) => Some(ZettelId::Foreign(trimmed.to_string())),
        }
    }
}

impl Display for ZettelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ZettelId::Native(uuid) => {
                write!(f, "{}", uuid.hyphenated().encode_lower(&mut Uuid::encode_buffer()))
            }
            ZettelId::Foreign(s) => write!(f, "{s}"),
        }
    }
}

impl TryFrom<&str> for ZettelId {
    type Error = KinshipError;

    fn try_from(string: &str) -> Result<Self, Self::Error> {
        ZettelId::parse(string)
            .ok_or_else(|| KinshipError::Serialization("Empty zettel identifier".to_string()))
    }
}

impl From<&ZettelId> for String {
    fn from(val: &ZettelId) -> Self {
        format!("{val}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_strips_extension() {
        assert_eq!(VaultPath::from("Notes/Parent - Child.md").display_name(), "Parent - Child");
        assert_eq!(VaultPath::from("README").display_name(), "README");
        assert_eq!(VaultPath::from("a/.hidden").display_name(), ".hidden");
    }

    #[test]
    fn test_directory() {
        assert_eq!(VaultPath::from("Projects/x/y.md").directory(), "Projects/x");
        assert_eq!(VaultPath::from("y.md").directory(), "");
    }

    #[test]
    fn test_is_under_covers_subdirectories_only() {
        let p = VaultPath::from("Projects/plan.md");
        assert!(p.is_under("Projects"));
        assert!(p.is_under("Projects/"));
        assert!(!p.is_under("Proj"));
        assert!(!p.is_under("Notes"));
        assert!(p.is_under(""));
    }

    #[test]
    fn test_zettel_round_trip() {
        let id = ZettelId::generate();
        let rendered = id.to_string();
        assert_eq!(ZettelId::parse(&rendered), Some(id));
    }

    #[test]
    fn test_foreign_id_preserved_verbatim() {
        let id = ZettelId::parse(" 202608301234 \n").unwrap();
        assert_eq!(id, ZettelId::Foreign("202608301234".to_string()));
        assert_eq!(id.to_string(), "202608301234");
        assert!(ZettelId::parse("   ").is_none());
    }

    #[test]
    fn test_generated_ids_are_chronologically_ordered() {
        let a = ZettelId::generate();
        let b = ZettelId::generate();
        match (&a, &b) {
            (ZettelId::Native(ua), ZettelId::Native(ub)) => assert!(ua <= ub),
            _ => unreachable!("generate always mints Native ids"),
        }
    }
}
