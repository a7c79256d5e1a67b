//! Explicit engine configuration.
//!
//! There is no ambient settings singleton: a [`SyncConfig`] value is threaded
//! into the [`crate::engine::SyncEngine`] and [`crate::indexer::VaultIndexer`]
//! at call time, so two callers can drive the same vault with different
//! property names or scopes without global state.

use std::{
    fs::{read_to_string, write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{error::KinshipError, properties::VaultPath};

/// The wildcard entry denoting unrestricted directory scope.
pub const SCOPE_ALL: &str = "*";

/// Which directories the indexer covers.
///
/// `"*"` denotes unrestricted scope. Otherwise the scope is an explicit set
/// of path prefixes, each covering itself and all subdirectories. Adding
/// `"*"` clears all explicit entries; removing the last explicit entry
/// reverts the set to `"*"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryScope {
    entries: Vec<String>,
}

impl Default for DirectoryScope {
    fn default() -> Self {
        DirectoryScope {
            entries: vec![SCOPE_ALL.to_string()],
        }
    }
}

impl DirectoryScope {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut scope = DirectoryScope { entries: vec![] };
        for p in prefixes {
            scope.add(p.into());
        }
        if scope.entries.is_empty() {
            scope = Self::default();
        }
        scope
    }

    pub fn is_unrestricted(&self) -> bool {
        self.entries.iter().any(|e| e == SCOPE_ALL)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Add an entry. Adding `"*"` clears all explicit entries.
    pub fn add(&mut self, entry: impl Into<String>) {
        let entry = entry.into();
        if entry == SCOPE_ALL {
            self.entries.clear();
            self.entries.push(entry);
            return;
        }
        // An explicit entry replaces the wildcard.
        self.entries.retain(|e| e != SCOPE_ALL);
        if !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
    }

    /// Remove an entry. Removing the last explicit entry reverts to `"*"`.
    pub fn remove(&mut self, entry: &str) {
        self.entries.retain(|e| e != entry);
        if self.entries.is_empty() {
            self.entries.push(SCOPE_ALL.to_string());
        }
    }

    pub fn contains(&self, path: &VaultPath) -> bool {
        if self.is_unrestricted() {
            return true;
        }
        self.entries.iter().any(|prefix| path.is_under(prefix))
    }
}

/// Configuration for one reconciliation surface: the six renameable property
/// names, the directory scope, and the derivation toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Front-matter property holding parent reference(s).
    pub parent_property: String,
    /// Front-matter property holding children references.
    pub children_property: String,
    /// Front-matter property holding related references.
    pub related_property: String,
    /// Front-matter property naming which parent candidate is canonical.
    pub priority_property: String,
    /// Front-matter property holding the stable identifier.
    pub id_property: String,
    /// Front-matter property holding the derived title.
    pub title_property: String,
    /// Directories the indexer covers.
    pub scope: DirectoryScope,
    /// Generate sibling-derived related edges.
    pub infer_siblings: bool,
    /// Compute derived titles at all.
    pub derive_titles: bool,
    /// Separator between parent display name and the title remainder.
    pub title_separator: String,
    /// Directory prefixes opted out of title derivation.
    pub excluded_title_dirs: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            parent_property: "parent".to_string(),
            children_property: "children".to_string(),
            related_property: "related".to_string(),
            priority_property: "main-parent".to_string(),
            id_property: "zettel-id".to_string(),
            title_property: "title".to_string(),
            scope: DirectoryScope::default(),
            infer_siblings: true,
            derive_titles: true,
            title_separator: " - ".to_string(),
            excluded_title_dirs: vec![],
        }
    }
}

impl SyncConfig {
    /// Whether title derivation applies to this path.
    pub fn titles_enabled_for(&self, path: &VaultPath) -> bool {
        self.derive_titles
            && !self
                .excluded_title_dirs
                .iter()
                .any(|prefix| path.is_under(prefix))
    }

    /// Reject property-name collisions. Two managed properties sharing a
    /// front-matter key would make every write-back clobber the other.
    pub fn validate(&self) -> Result<(), KinshipError> {
        let names = [
            &self.parent_property,
            &self.children_property,
            &self.related_property,
            &self.priority_property,
            &self.id_property,
            &self.title_property,
        ];
        for name in names {
            if name.trim().is_empty() {
                return Err(KinshipError::Config(
                    "property names must be non-empty".to_string(),
                ));
            }
        }
        for (i, a) in names.iter().enumerate() {
            if names[i + 1..].contains(a) {
                return Err(KinshipError::Config(format!(
                    "property name {a:?} is used for more than one managed property"
                )));
            }
        }
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, KinshipError> {
        tracing::debug!("[config] Reading {:?}", path.as_ref());
        let content = read_to_string(path)?;
        let config: SyncConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), KinshipError> {
        tracing::debug!("[config] Writing {:?}", path.as_ref());
        let toml_string = toml::to_string(self)?;
        write(path, toml_string)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_wildcard_clears_explicit_entries() {
        let mut scope = DirectoryScope::new(["Projects", "Notes"]);
        assert!(!scope.is_unrestricted());
        scope.add(SCOPE_ALL);
        assert!(scope.is_unrestricted());
        assert_eq!(scope.entries(), &[SCOPE_ALL.to_string()]);
    }

    #[test]
    fn test_scope_revert_semantics() {
        // Adding "*" then removing it reverts to the explicit set only if at
        // least one explicit entry remains, otherwise to ["*"].
        let mut scope = DirectoryScope::new(["Projects"]);
        scope.add("Notes");
        scope.remove("Notes");
        assert_eq!(scope.entries(), &["Projects".to_string()]);

        scope.remove("Projects");
        assert!(scope.is_unrestricted());
    }

    #[test]
    fn test_scope_contains_prefix_and_subdirs() {
        let scope = DirectoryScope::new(["Projects"]);
        assert!(scope.contains(&VaultPath::from("Projects/plan.md")));
        assert!(scope.contains(&VaultPath::from("Projects/sub/deep.md")));
        assert!(!scope.contains(&VaultPath::from("Notes/foo.md")));
        assert!(DirectoryScope::all().contains(&VaultPath::from("Notes/foo.md")));
    }

    #[test]
    fn test_title_exclusion() {
        let cfg = SyncConfig {
            excluded_title_dirs: vec!["Archive".to_string()],
            ..Default::default()
        };
        assert!(cfg.titles_enabled_for(&VaultPath::from("Notes/a.md")));
        assert!(!cfg.titles_enabled_for(&VaultPath::from("Archive/a.md")));

        let disabled = SyncConfig {
            derive_titles: false,
            ..Default::default()
        };
        assert!(!disabled.titles_enabled_for(&VaultPath::from("Notes/a.md")));
    }

    #[test]
    fn test_validate_rejects_colliding_names() {
        assert!(SyncConfig::default().validate().is_ok());
        let clashing = SyncConfig {
            related_property: "parent".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            clashing.validate(),
            Err(KinshipError::Config(_))
        ));
    }

    #[test]
    fn test_config_toml_round_trip() {
        let cfg = SyncConfig {
            parent_property: "up".to_string(),
            scope: DirectoryScope::new(["Projects"]),
            ..Default::default()
        };
        let rendered = toml::to_string(&cfg).unwrap();
        let parsed: SyncConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: SyncConfig = toml::from_str("parent_property = \"up\"").unwrap();
        assert_eq!(parsed.parent_property, "up");
        assert_eq!(parsed.children_property, "children");
        assert!(parsed.scope.is_unrestricted());
        assert_eq!(parsed.title_separator, " - ");
    }
}
