//! Kubeconfig merge operations
//!
//! The document is handled as a `serde_yaml::Value` so that top-level keys
//! and entry fields this tool knows nothing about survive a round trip.
//! Entries of `clusters`, `contexts` and `users` are reconciled by name:
//!
//! 1. entries already in the target, in file order
//! 2. entries from source files whose names are not present yet
//! 3. generated entries, replacing same-named ones
//!
//! YAML comments are not preserved; the banner is re-emitted on every write.

use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};
use crate::merge::{reconcile, render_document, Fragment, MergeStats, Record};

/// Banner written at the top of every generated kubeconfig
pub const KUBE_BANNER: &str = "\
# This file is maintained by cfgweave. Clusters, contexts and users it
# generates are replaced on every run; other entries are preserved.";

/// Named list sections reconciled by this module
pub const SECTIONS: [&str; 3] = ["clusters", "contexts", "users"];

const CURRENT_CONTEXT: &str = "current-context";

/// One item of a named list, kept whole
#[derive(Clone, Debug, PartialEq)]
pub struct NamedEntry {
    pub name: String,
    pub value: Value,
}

impl NamedEntry {
    /// Wrap a list item, reading its `name` field.
    pub fn from_value(value: Value) -> Self {
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self { name, value }
    }
}

impl Record for NamedEntry {
    fn identity_key(&self) -> &str {
        &self.name
    }

    fn is_managed(&self) -> bool {
        false
    }
}

/// Generated entries per section
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KubeEntries {
    pub clusters: Vec<NamedEntry>,
    pub contexts: Vec<NamedEntry>,
    pub users: Vec<NamedEntry>,
}

impl KubeEntries {
    pub fn section(&self, section: &str) -> &[NamedEntry] {
        match section {
            "clusters" => &self.clusters,
            "contexts" => &self.contexts,
            "users" => &self.users,
            _ => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.clusters.len() + self.contexts.len() + self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn load_document(content: &str, what: &str) -> Result<Mapping> {
    if content.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(content)? {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        _ => Err(Error::Merge {
            operation: "parse kubeconfig".to_string(),
            message: format!("{} is not a YAML mapping", what),
        }),
    }
}

fn entries_of(document: &Mapping, section: &str) -> Vec<NamedEntry> {
    match document.get(section) {
        Some(Value::Sequence(items)) => items.iter().cloned().map(NamedEntry::from_value).collect(),
        _ => Vec::new(),
    }
}

fn context_names(document: &Mapping) -> Vec<String> {
    entries_of(document, "contexts")
        .into_iter()
        .map(|entry| entry.name)
        .collect()
}

/// Put a missing `apiVersion` or `kind` in front of the existing keys. A new
/// document also gets empty `preferences`.
fn ensure_header(document: &mut Mapping) {
    let mut header = Mapping::new();
    for (key, value) in [("apiVersion", "v1"), ("kind", "Config")] {
        if !document.contains_key(key) {
            header.insert(key.into(), value.into());
        }
    }
    if document.is_empty() {
        header.insert("preferences".into(), Value::Mapping(Mapping::new()));
    }
    if header.is_empty() {
        return;
    }
    header.extend(std::mem::take(document));
    *document = header;
}

fn render(document: Mapping) -> Result<String> {
    let yaml = serde_yaml::to_string(&Value::Mapping(document))?;
    Ok(render_document(KUBE_BANNER, &[], &[yaml]))
}

/// Merge generated entries and source kubeconfigs into the previous target.
///
/// `current_context` is the configured context to select; without it the
/// existing selection is kept while it still names a context, otherwise
/// the first generated context is selected.
pub fn merge_kubeconfig(
    previous: &str,
    sources: &[String],
    generated: &KubeEntries,
    current_context: Option<&str>,
) -> Result<(String, MergeStats)> {
    let mut document = load_document(previous, "existing kubeconfig")?;
    let source_documents = sources
        .iter()
        .map(|source| load_document(source, "source kubeconfig"))
        .collect::<Result<Vec<_>>>()?;

    ensure_header(&mut document);
    let mut stats = MergeStats {
        generated: generated.len(),
        ..MergeStats::default()
    };

    for section in SECTIONS {
        let mut entries = entries_of(&document, section);
        for source in &source_documents {
            for entry in entries_of(source, section) {
                if !entries.iter().any(|existing| existing.name == entry.name) {
                    entries.push(entry);
                }
            }
        }

        let fresh = generated.section(section);
        let reconciled = reconcile(entries.into_iter().map(Fragment::Record).collect(), fresh);
        stats.kept += reconciled.stats.kept;
        stats.replaced_managed += reconciled.stats.superseded.len();

        let mut items: Vec<Value> = reconciled
            .fragments
            .into_iter()
            .filter_map(|fragment| match fragment {
                Fragment::Record(entry) => Some(entry.value),
                Fragment::Text(_) => None,
            })
            .collect();
        items.extend(fresh.iter().map(|entry| entry.value.clone()));
        document.insert(section.into(), Value::Sequence(items));
    }

    let existing = document
        .get(CURRENT_CONTEXT)
        .and_then(Value::as_str)
        .map(str::to_string);
    let selected = match current_context {
        Some(name) => Some(name.to_string()),
        None => existing
            .filter(|name| context_names(&document).contains(name))
            .or_else(|| generated.contexts.first().map(|entry| entry.name.clone())),
    };
    if let Some(name) = selected {
        document.insert(CURRENT_CONTEXT.into(), name.into());
    }

    Ok((render(document)?, stats))
}

/// Remove the entries named in `targets` from the previous target.
///
/// A `current-context` left pointing at a removed context is dropped.
pub fn remove_kube_entries(previous: &str, targets: &KubeEntries) -> Result<(String, MergeStats)> {
    let mut document = load_document(previous, "existing kubeconfig")?;
    let mut stats = MergeStats::default();

    for section in SECTIONS {
        if document.get(section).is_none() {
            continue;
        }
        let entries = entries_of(&document, section);
        let reconciled = reconcile(
            entries.into_iter().map(Fragment::Record).collect(),
            targets.section(section),
        );
        stats.kept += reconciled.stats.kept;
        stats.superseded.extend(reconciled.stats.superseded);

        let items: Vec<Value> = reconciled
            .fragments
            .into_iter()
            .filter_map(|fragment| match fragment {
                Fragment::Record(entry) => Some(entry.value),
                Fragment::Text(_) => None,
            })
            .collect();
        document.insert(section.into(), Value::Sequence(items));
    }

    let dangling = document
        .get(CURRENT_CONTEXT)
        .and_then(Value::as_str)
        .is_some_and(|name| !context_names(&document).iter().any(|c| c == name));
    if dangling {
        document.remove(CURRENT_CONTEXT);
    }

    Ok((render(document)?, stats))
}
