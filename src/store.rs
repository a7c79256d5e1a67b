//! The document store seam.
//!
//! The engine never owns persistence: it reads raw front-matter through
//! [`DocumentStore`] and applies write-back plans through the same trait,
//! leaving every other part of a document untouched. [`FileStore`] is the
//! standard implementation over a directory of Markdown files with YAML
//! front-matter.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use walkdir::WalkDir;

use crate::{
    config::DirectoryScope,
    error::KinshipError,
    properties::{RawProperties, VaultPath},
};

/// Leading YAML front-matter block: `---` fence, body, closing `---` fence.
static FRONTMATTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A---\r?\n(.*?)\r?\n---(?:\r?\n|\z)").expect("static pattern"));

/// External collaborator contract for reading and writing structured
/// document properties.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document's property mapping. Documents without front-matter
    /// read as empty.
    async fn read_properties(&self, path: &VaultPath) -> Result<RawProperties, KinshipError>;

    /// Apply only the named properties, leaving other front-matter keys and
    /// the document body untouched. A `Value::Null` removes the key.
    async fn write_properties(
        &self,
        path: &VaultPath,
        props: &RawProperties,
    ) -> Result<(), KinshipError>;

    /// Enumerate document paths within the directory scope.
    async fn enumerate(&self, scope: &DirectoryScope) -> Result<Vec<VaultPath>, KinshipError>;
}

/// Markdown-on-disk implementation of [`DocumentStore`].
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, KinshipError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(KinshipError::StoreUnavailable(format!(
                "vault root {root:?} is not a directory"
            )));
        }
        Ok(FileStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn absolute(&self, path: &VaultPath) -> PathBuf {
        self.root.join(path.as_str())
    }
}

/// Split a document into its front-matter mapping and body. Unparseable
/// front-matter reads as an empty mapping with a warning; the engine then
/// treats the document as relationship-free instead of failing the pass.
fn split_frontmatter(path: &VaultPath, content: &str) -> (Mapping, String) {
    let Some(captures) = FRONTMATTER_RE.captures(content) else {
        return (Mapping::new(), content.to_string());
    };
    let block = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
    let body = content[captures.get(0).map(|m| m.end()).unwrap_or(0)..].to_string();
    match serde_yaml::from_str::<Mapping>(block) {
        Ok(mapping) => (mapping, body),
        Err(e) => {
            tracing::warn!("[store] Unparseable front-matter in {path}: {e}");
            (Mapping::new(), body)
        }
    }
}

fn render_document(frontmatter: &Mapping, body: &str) -> Result<String, KinshipError> {
    if frontmatter.is_empty() {
        return Ok(body.to_string());
    }
    let yaml = serde_yaml::to_string(frontmatter)?;
    Ok(format!("---\n{yaml}---\n{body}"))
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn read_properties(&self, path: &VaultPath) -> Result<RawProperties, KinshipError> {
        let content = tokio::fs::read_to_string(self.absolute(path)).await?;
        let (mapping, _body) = split_frontmatter(path, &content);
        let mut props = RawProperties::new();
        for (key, value) in mapping {
            if let Value::String(name) = key {
                props.insert(name, value);
            }
        }
        Ok(props)
    }

    async fn write_properties(
        &self,
        path: &VaultPath,
        props: &RawProperties,
    ) -> Result<(), KinshipError> {
        let absolute = self.absolute(path);
        let content = tokio::fs::read_to_string(&absolute).await?;
        let (mut mapping, body) = split_frontmatter(path, &content);
        for (name, value) in props {
            let key = Value::String(name.clone());
            match value {
                Value::Null => {
                    mapping.remove(&key);
                }
                other => {
                    mapping.insert(key, other.clone());
                }
            }
        }
        let rendered = render_document(&mapping, &body)?;
        tokio::fs::write(&absolute, rendered).await?;
        tracing::debug!("[store] Wrote {} propert(ies) to {path}", props.len());
        Ok(())
    }

    async fn enumerate(&self, scope: &DirectoryScope) -> Result<Vec<VaultPath>, KinshipError> {
        if !self.root.is_dir() {
            return Err(KinshipError::StoreUnavailable(format!(
                "vault root {:?} disappeared",
                self.root
            )));
        }
        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                // Dot files and dot directories (.git, .obsidian) are never
                // documents. The root itself is exempt, its name is not part
                // of any vault path.
                e.depth() == 0
                    || !e
                        .file_name()
                        .to_str()
                        .map(|s| s.starts_with('.'))
                        .unwrap_or(false)
            })
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("[store] Skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().and_then(|ext| ext.to_str()) != Some("md") {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| KinshipError::Io(format!("Strip prefix failed: {e}")))?;
            let vault_path = VaultPath::from(relative);
            if scope.contains(&vault_path) {
                paths.push(vault_path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_frontmatter_round_trip() {
        let content = "---\nparent: root.md\ntags:\n- a\n---\nBody text.\n";
        let (mapping, body) = split_frontmatter(&VaultPath::from("x.md"), content);
        assert_eq!(
            mapping.get(Value::String("parent".into())),
            Some(&Value::String("root.md".into()))
        );
        assert_eq!(body, "Body text.\n");
        let rendered = render_document(&mapping, &body).unwrap();
        let (again, body_again) = split_frontmatter(&VaultPath::from("x.md"), &rendered);
        assert_eq!(again, mapping);
        assert_eq!(body_again, body);
    }

    #[test]
    fn test_no_frontmatter_is_empty_mapping() {
        let (mapping, body) = split_frontmatter(&VaultPath::from("x.md"), "# Just a doc\n");
        assert!(mapping.is_empty());
        assert_eq!(body, "# Just a doc\n");
    }

    #[test]
    fn test_unparseable_frontmatter_reads_empty() {
        let content = "---\n: : :\n---\nBody.\n";
        let (mapping, body) = split_frontmatter(&VaultPath::from("x.md"), content);
        assert!(mapping.is_empty());
        assert_eq!(body, "Body.\n");
    }

    #[tokio::test]
    async fn test_write_merges_and_preserves_body() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("note.md"),
            "---\ntags:\n- keep\n---\n# Heading\n\nBody stays.\n",
        )
        .unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let path = VaultPath::from("note.md");

        let mut props = RawProperties::new();
        props.insert("parent".to_string(), Value::String("root.md".into()));
        store.write_properties(&path, &props).await.unwrap();

        let read = store.read_properties(&path).await.unwrap();
        assert_eq!(read.get("parent"), Some(&Value::String("root.md".into())));
        assert!(read.contains_key("tags"));
        let raw = std::fs::read_to_string(dir.path().join("note.md")).unwrap();
        assert!(raw.ends_with("# Heading\n\nBody stays.\n"));
    }

    #[tokio::test]
    async fn test_null_removes_property() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("note.md"), "---\nparent: root.md\n---\nx\n").unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let path = VaultPath::from("note.md");

        let mut props = RawProperties::new();
        props.insert("parent".to_string(), Value::Null);
        store.write_properties(&path, &props).await.unwrap();
        let read = store.read_properties(&path).await.unwrap();
        assert!(!read.contains_key("parent"));
    }

    #[tokio::test]
    async fn test_enumerate_filters_scope_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Projects/sub")).unwrap();
        std::fs::create_dir_all(dir.path().join("Notes")).unwrap();
        std::fs::create_dir_all(dir.path().join(".obsidian")).unwrap();
        std::fs::write(dir.path().join("Projects/plan.md"), "").unwrap();
        std::fs::write(dir.path().join("Projects/sub/deep.md"), "").unwrap();
        std::fs::write(dir.path().join("Projects/data.json"), "").unwrap();
        std::fs::write(dir.path().join("Notes/foo.md"), "").unwrap();
        std::fs::write(dir.path().join(".obsidian/hidden.md"), "").unwrap();

        let store = FileStore::new(dir.path()).unwrap();
        let scoped = store
            .enumerate(&DirectoryScope::new(["Projects"]))
            .await
            .unwrap();
        assert_eq!(
            scoped,
            vec![
                VaultPath::from("Projects/plan.md"),
                VaultPath::from("Projects/sub/deep.md")
            ]
        );

        let all = store.enumerate(&DirectoryScope::all()).await.unwrap();
        assert_eq!(all.len(), 3);
    }
}
