//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::collections::BTreeMap;
use std::path::Path;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times, subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Write a markdown document under the vault, creating parent directories.
/// `frontmatter` is raw YAML without the `---` fences; pass `""` for a
/// document without front-matter.
#[allow(dead_code)]
pub fn write_doc(root: &Path, rel: &str, frontmatter: &str, body: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let content = if frontmatter.is_empty() {
        body.to_string()
    } else {
        format!("---\n{}---\n{}", frontmatter, body)
    };
    std::fs::write(path, content).unwrap();
}

/// Read back a document's front-matter as a key/value mapping. Documents
/// without front-matter read as empty.
#[allow(dead_code)]
pub fn read_frontmatter(root: &Path, rel: &str) -> BTreeMap<String, serde_yaml::Value> {
    let content = std::fs::read_to_string(root.join(rel)).unwrap();
    let Some(rest) = content.strip_prefix("---\n") else {
        return BTreeMap::new();
    };
    let Some((yaml, _body)) = rest.split_once("\n---") else {
        return BTreeMap::new();
    };
    serde_yaml::from_str(yaml).unwrap_or_default()
}

/// The string entries of a YAML sequence property, sorted.
#[allow(dead_code)]
pub fn reference_list(
    props: &BTreeMap<String, serde_yaml::Value>,
    key: &str,
) -> Vec<String> {
    let mut refs: Vec<String> = match props.get(key) {
        Some(serde_yaml::Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(serde_yaml::Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    };
    refs.sort();
    refs
}
