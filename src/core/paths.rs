//! Wildcard path expansion.
//!
//! Package commands address files with shell-style patterns (`*`, `?`,
//! `[...]`) that match within a single path component. A trailing `/`
//! restricts matches to directories and the results keep the trailing
//! slash. Patterns with wildcards in several components are expanded by
//! recursive descent: each wildcard component is enumerated at its level
//! before descending into the next.

use crate::core::strings;
use glob::Pattern;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// Expands wildcard patterns against the filesystem.
///
/// Carries a directory-type cache so repeated expansions over the same tree
/// do not re-stat entries. The cache is never invalidated; the engine's
/// path cardinality is small and process-scoped, which makes that
/// acceptable. The cache is mutex-wrapped so the resolver stays correct if
/// a host ever drives it from more than one thread.
#[derive(Debug, Default)]
pub struct PathResolver {
    dir_type_cache: Mutex<HashMap<String, bool>>,
}

impl PathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `path` is a directory, consulting the cache first.
    pub fn is_directory(&self, path: &str) -> bool {
        let key = strings::strip_trailing_slash(path).to_string();
        if let Some(&cached) = self
            .dir_type_cache
            .lock()
            .expect("dir-type cache poisoned")
            .get(&key)
        {
            return cached;
        }
        let is_dir = Path::new(&key).is_dir();
        self.dir_type_cache
            .lock()
            .expect("dir-type cache poisoned")
            .insert(key, is_dir);
        is_dir
    }

    /// Expands a wildcard pattern to the sorted list of matching paths.
    ///
    /// A pattern ending in `/` yields only directories, each suffixed with
    /// `/`; otherwise only files are returned. A pattern with no wildcard
    /// at all acts as an existence-and-type check on the literal path.
    pub fn list_by_wildcards(&self, pattern: &str) -> Vec<String> {
        let dirs_only = pattern.ends_with('/');
        let trimmed = strings::strip_trailing_slash(pattern);
        if trimmed.is_empty() {
            return Vec::new();
        }

        // The leading component anchors the walk: "sdmc:" style prefixes,
        // "/" for absolute paths, or "." style relative roots.
        let (base, remainder) = match trimmed.find('/') {
            Some(0) => ("/".to_string(), &trimmed[1..]),
            Some(pos) => (format!("{}/", &trimmed[..pos]), &trimmed[pos + 1..]),
            None => ("".to_string(), trimmed),
        };
        let components: Vec<&str> = remainder.split('/').filter(|c| !c.is_empty()).collect();

        let mut out = Vec::new();
        self.expand(&base, &components, dirs_only, &mut out);
        out.sort();
        out
    }

    fn expand(&self, base: &str, components: &[&str], dirs_only: bool, out: &mut Vec<String>) {
        let Some((component, rest)) = components.split_first() else {
            // The pattern was fully consumed; `base` names a directory.
            if dirs_only && self.is_directory(base) {
                out.push(base.to_string());
            }
            return;
        };

        if !has_wildcard(component) {
            let candidate = format!("{base}{component}");
            if rest.is_empty() {
                self.push_terminal(candidate, dirs_only, out);
            } else if self.is_directory(&candidate) {
                self.expand(&format!("{candidate}/"), rest, dirs_only, out);
            }
            return;
        }

        let Ok(matcher) = Pattern::new(component) else {
            log::warn!("invalid wildcard component: {component}");
            return;
        };
        let Ok(entries) = fs::read_dir(if base.is_empty() { "." } else { base }) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !matcher.matches(&name) {
                continue;
            }
            let candidate = format!("{base}{name}");
            if rest.is_empty() {
                self.push_terminal(candidate, dirs_only, out);
            } else if self.is_directory(&candidate) {
                self.expand(&format!("{candidate}/"), rest, dirs_only, out);
            }
        }
    }

    fn push_terminal(&self, candidate: String, dirs_only: bool, out: &mut Vec<String>) {
        let is_dir = self.is_directory(&candidate);
        if dirs_only && is_dir {
            out.push(format!("{candidate}/"));
        } else if !dirs_only && !is_dir && Path::new(&candidate).exists() {
            out.push(candidate);
        }
    }
}

fn has_wildcard(component: &str) -> bool {
    component.contains(['*', '?', '['])
}

/// All files beneath `dir`, recursively, with forward-slash paths.
pub fn list_files_recursive(dir: &str) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_string_lossy().replace('\\', "/"))
        .collect();
    files.sort();
    files
}

/// Immediate subdirectory names of `dir` (names only, not paths).
pub fn subdirectories(dir: &str) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
