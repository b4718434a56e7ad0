//! Directory detection for path specifications
//!
//! Detection predicates answer "which directories under the root contain a
//! marker file / a file with a given extension". They are side-effect free
//! and therefore safe to evaluate in collect phase.

use std::collections::BTreeSet;
use std::path::Path;

use walkdir::{DirEntry, WalkDir};

use super::resolve::{PathResolver, CONFIG_DIR};

/// Detection never descends deeper than this below the project root.
const MAX_DETECT_DEPTH: usize = 16;

impl PathResolver {
    /// Directories under the root containing at least one of the named
    /// files, as sorted root-relative paths. The root itself is `"."`.
    pub fn detect_by_file(&self, names: &[&str]) -> Vec<String> {
        self.detect(|entry| names.iter().any(|n| entry.file_name() == *n))
    }

    /// Directories containing any file whose name ends in one of the given
    /// suffixes (e.g. `".py"`), as sorted root-relative paths.
    pub fn detect_by_extension(&self, exts: &[&str]) -> Vec<String> {
        self.detect(|entry| {
            let name = entry.file_name().to_string_lossy();
            exts.iter().any(|ext| name.ends_with(ext))
        })
    }

    fn detect<F>(&self, matches: F) -> Vec<String>
    where
        F: Fn(&DirEntry) -> bool,
    {
        // BTreeSet gives deduplication and lexicographic order in one go.
        let mut found = BTreeSet::new();
        let walker = WalkDir::new(self.root())
            .max_depth(MAX_DETECT_DEPTH)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !prune(e));

        for entry in walker.flatten() {
            if !entry.file_type().is_file() || !matches(&entry) {
                continue;
            }
            let dir = entry.path().parent().unwrap_or_else(|| self.root());
            if let Ok(rel) = dir.strip_prefix(self.root()) {
                found.insert(relative_name(rel));
            }
        }
        found.into_iter().collect()
    }
}

/// Hidden directories are pruned from the walk, except the configuration
/// directory itself (its contents may carry detectable modules).
fn prune(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() || entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') && name != CONFIG_DIR
}

fn relative_name(rel: &Path) -> String {
    if rel.as_os_str().is_empty() {
        ".".to_string()
    } else {
        rel.to_string_lossy().replace('\\', "/")
    }
}
