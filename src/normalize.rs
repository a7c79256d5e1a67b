//! Property normalization: raw, dynamically-typed front-matter values become
//! canonical ordered sequences of non-empty reference strings.
//!
//! The normalizer never fails. Inputs it cannot use are reported as
//! [`SyncDiagnostic::MalformedProperty`] and treated as empty, so one broken
//! document cannot abort reconciliation of the rest of the vault.

use std::collections::BTreeSet;

use serde_yaml::Value;

use crate::{
    config::SyncConfig,
    diagnostic::SyncDiagnostic,
    properties::{RawProperties, VaultPath, ZettelId},
};

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Normalize one property value into an ordered sequence of non-empty
/// reference strings.
///
/// Tolerated shapes: absent/null (empty), a single string (one element after
/// trimming, or empty for all-whitespace), a sequence (string elements kept,
/// everything else dropped with a diagnostic). Any other type yields an empty
/// sequence plus a diagnostic naming the property and the type found.
///
/// Idempotent: normalizing an already-normalized sequence is a no-op. Runs in
/// time linear in the input size.
pub fn normalize_reference_list(
    path: &VaultPath,
    property: &str,
    value: Option<&Value>,
) -> (Vec<VaultPath>, Vec<SyncDiagnostic>) {
    let mut diagnostics = Vec::new();
    let refs = match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![VaultPath::from(trimmed)]
            }
        }
        Some(Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|element| match element {
                Value::String(s) => {
                    let trimmed = s.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        Some(VaultPath::from(trimmed))
                    }
                }
                other => {
                    diagnostics.push(SyncDiagnostic::malformed(
                        path,
                        property,
                        format!("{} element in sequence", value_type_name(other)),
                    ));
                    None
                }
            })
            .collect(),
        Some(other) => {
            diagnostics.push(SyncDiagnostic::malformed(
                path,
                property,
                value_type_name(other),
            ));
            Vec::new()
        }
    };
    (refs, diagnostics)
}

/// Normalize a scalar string property (priority marker, identifier, title).
/// Sequences and other shapes are malformed here.
pub fn normalize_scalar(
    path: &VaultPath,
    property: &str,
    value: Option<&Value>,
) -> (Option<String>, Vec<SyncDiagnostic>) {
    match value {
        None | Some(Value::Null) => (None, vec![]),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                (None, vec![])
            } else {
                (Some(trimmed.to_string()), vec![])
            }
        }
        Some(other) => (
            None,
            vec![SyncDiagnostic::malformed(
                path,
                property,
                value_type_name(other),
            )],
        ),
    }
}

/// The canonical relationship state extracted from one document's raw
/// front-matter, using the configured property names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedRelations {
    pub parents: BTreeSet<VaultPath>,
    pub children: BTreeSet<VaultPath>,
    pub related: BTreeSet<VaultPath>,
    pub priority_marker: Option<VaultPath>,
    pub zettel_id: Option<ZettelId>,
    pub title: Option<String>,
}

impl NormalizedRelations {
    pub fn from_raw(
        path: &VaultPath,
        raw: &RawProperties,
        config: &SyncConfig,
    ) -> (Self, Vec<SyncDiagnostic>) {
        let mut diagnostics = Vec::new();

        let (parents, d) =
            normalize_reference_list(path, &config.parent_property, raw.get(&config.parent_property));
        diagnostics.extend(d);
        let (children, d) = normalize_reference_list(
            path,
            &config.children_property,
            raw.get(&config.children_property),
        );
        diagnostics.extend(d);
        let (related, d) = normalize_reference_list(
            path,
            &config.related_property,
            raw.get(&config.related_property),
        );
        diagnostics.extend(d);

        let (marker, d) = normalize_scalar(
            path,
            &config.priority_property,
            raw.get(&config.priority_property),
        );
        diagnostics.extend(d);
        let (id, d) = normalize_scalar(path, &config.id_property, raw.get(&config.id_property));
        diagnostics.extend(d);
        let (title, d) =
            normalize_scalar(path, &config.title_property, raw.get(&config.title_property));
        diagnostics.extend(d);

        let relations = NormalizedRelations {
            parents: parents.into_iter().collect(),
            children: children.into_iter().collect(),
            related: related.into_iter().collect(),
            priority_marker: marker.map(|m| VaultPath::from(m.as_str())),
            zettel_id: id.as_deref().and_then(ZettelId::parse),
            title,
        };
        (relations, diagnostics)
    }
}
