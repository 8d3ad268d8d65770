//! Set-based comparison of two file manifests.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::torrent::FileManifest;

/// Classified differences between an old and a new manifest.
///
/// The four sets are disjoint. Paths present on both sides with identical
/// attributes appear in none of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    pub modified: BTreeSet<String>,
    pub type_modified: BTreeSet<String>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.modified.is_empty()
            && self.type_modified.is_empty()
    }

    /// Number of paths across all four sets.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len() + self.type_modified.len()
    }

    /// One line per changed path, sorted by path.
    ///
    /// `+` added, `-` removed, `~` size changed, `?` file/directory swap.
    pub fn render_lines(&self) -> Vec<String> {
        let mut lines: Vec<(&str, char)> = Vec::with_capacity(self.len());
        lines.extend(self.added.iter().map(|p| (p.as_str(), '+')));
        lines.extend(self.removed.iter().map(|p| (p.as_str(), '-')));
        lines.extend(self.modified.iter().map(|p| (p.as_str(), '~')));
        lines.extend(self.type_modified.iter().map(|p| (p.as_str(), '?')));
        lines.sort();
        lines
            .into_iter()
            .map(|(path, sign)| format!("{} {}", sign, path))
            .collect()
    }
}

/// Compare two manifests.
pub fn diff(old: &FileManifest, new: &FileManifest) -> Diff {
    let mut result = Diff::default();

    for (path, old_attrs) in old {
        match new.get(path) {
            None => {
                result.removed.insert(path.clone());
            }
            Some(new_attrs) => match (old_attrs, new_attrs) {
                (Some(a), Some(b)) if a.size != b.size => {
                    result.modified.insert(path.clone());
                }
                (Some(_), None) | (None, Some(_)) => {
                    result.type_modified.insert(path.clone());
                }
                _ => {}
            },
        }
    }

    for path in new.keys() {
        if !old.contains_key(path) {
            result.added.insert(path.clone());
        }
    }

    result
}
