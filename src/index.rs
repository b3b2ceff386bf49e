use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::types::{FileRecord, ProjectSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Record(usize),
    ImplicitFolder,
}

/// Result of looking a path up in the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathEntry<'a> {
    Record(&'a FileRecord),
    /// A directory inferred from file paths, never listed by the server
    ImplicitFolder,
}

/// Hierarchical view over a snapshot's flat file list
///
/// Every proper ancestor directory of a record has an entry, either the
/// record the server listed for it or an implicit folder marker.
#[derive(Debug, Clone)]
pub struct PathIndex {
    snapshot: Arc<ProjectSnapshot>,
    entries: HashMap<String, Slot>,
}

impl PathIndex {
    pub fn build(snapshot: Arc<ProjectSnapshot>) -> Self {
        let mut entries = HashMap::with_capacity(snapshot.files.len());

        for (i, record) in snapshot.files.iter().enumerate() {
            entries.insert(record.path.clone(), Slot::Record(i));
        }

        for record in &snapshot.files {
            for ancestor in ancestors(&record.path) {
                entries
                    .entry(ancestor.to_string())
                    .or_insert(Slot::ImplicitFolder);
            }
        }

        debug!("Path index built ({} entries)", entries.len());
        Self { snapshot, entries }
    }

    pub fn lookup(&self, path: &str) -> Option<PathEntry<'_>> {
        self.entries.get(path).map(|slot| match slot {
            Slot::Record(i) => PathEntry::Record(&self.snapshot.files[*i]),
            Slot::ImplicitFolder => PathEntry::ImplicitFolder,
        })
    }

    /// The root is always a folder; otherwise a path is a folder when it is an
    /// implicit folder or some other record lives beneath it.
    pub fn is_folder(&self, path: &str) -> bool {
        if path.is_empty() {
            return true;
        }
        if matches!(self.entries.get(path), Some(Slot::ImplicitFolder)) {
            return true;
        }

        let prefix = folder_prefix(path);
        self.snapshot
            .files
            .iter()
            .any(|f| f.path != path && f.path.starts_with(&prefix))
    }

    pub fn snapshot(&self) -> &Arc<ProjectSnapshot> {
        &self.snapshot
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `"a/b/c"` yields `"a"` and `"a/b"`
fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/')
        .map(move |(i, _)| &path[..i])
        .filter(|ancestor| !ancestor.is_empty())
}

/// `""` stays empty, anything else gains a single trailing slash
pub(crate) fn folder_prefix(path: &str) -> String {
    if path.is_empty() || path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}
