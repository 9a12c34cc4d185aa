//! INI store: the dialect package and config files are written in.
//!
//! Parsing is line-oriented: `[section]` headers open sections, `key=value`
//! lines populate them, `#` comments and blank lines are skipped, and
//! anything before the first header is discarded. Mutations never operate
//! on the parsed document; they splice the raw file text line by line so
//! comments and unknown lines survive, then land atomically via a temp file
//! in the target directory renamed over the original.
//!
//! Concurrency: one `RwLock` per canonical file path, held shared for reads
//! and exclusive for mutations. The path→lock registry itself sits behind a
//! small mutex taken only for the lookup moment.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IniError {
    #[error("cannot read '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot write '{path}': {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// Ordered sections of ordered key/value pairs. Section order and
/// key-insertion order survive a parse/serialize round trip, and a section
/// declared with no keys is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: Vec<(String, Vec<(String, String)>)>,
}

impl IniDocument {
    pub fn parse(text: &str) -> Self {
        let mut doc = Self::default();
        let mut current: Option<usize> = None;
        for raw in text.replace("\r\n", "\n").split('\n') {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(name) = section_header(line) {
                // A repeated header re-opens the existing section in place.
                current = match doc.sections.iter().position(|(n, _)| n == name) {
                    Some(pos) => Some(pos),
                    None => {
                        doc.sections.push((name.to_string(), Vec::new()));
                        Some(doc.sections.len() - 1)
                    }
                };
                continue;
            }
            let Some(pos) = line.find('=') else {
                continue;
            };
            let Some((_, keys)) = current.and_then(|i| doc.sections.get_mut(i)) else {
                continue;
            };
            let key = line[..pos].trim().to_string();
            let value = line[pos + 1..].trim().to_string();
            match keys.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => keys.push((key, value)),
            }
        }
        doc
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (i, (name, keys)) in self.sections.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&format!("[{name}]\n"));
            for (key, value) in keys {
                out.push_str(&format!("{key}={value}\n"));
            }
        }
        out
    }

    pub fn section_names(&self) -> Vec<String> {
        self.sections.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn section(&self, name: &str) -> Option<&[(String, String)]> {
        self.sections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, keys)| keys.as_slice())
    }

    pub fn value(&self, section: &str, key: &str) -> &str {
        self.section(section)
            .and_then(|keys| keys.iter().find(|(k, _)| k == key))
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

fn section_header(line: &str) -> Option<&str> {
    line.strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .map(str::trim)
}

/// Per-path serialized access to INI files on disk.
#[derive(Debug, Default)]
pub struct IniStore {
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl IniStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, path: &str) -> Arc<RwLock<()>> {
        let mut registry = self.locks.lock().expect("ini lock registry poisoned");
        registry
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Parses a file; an unreadable file is "no configuration yet" and
    /// yields an empty document.
    pub fn parse_file(&self, path: &str) -> IniDocument {
        let lock = self.lock_for(path);
        let _guard = lock.read().expect("ini file lock poisoned");
        match fs::read_to_string(path) {
            Ok(text) => IniDocument::parse(&text),
            Err(_) => IniDocument::default(),
        }
    }

    /// Extracts one section without building the whole document, stopping
    /// as soon as the next header follows the target section.
    pub fn section_from_file(&self, path: &str, section: &str) -> Vec<(String, String)> {
        let lock = self.lock_for(path);
        let _guard = lock.read().expect("ini file lock poisoned");
        let Ok(text) = fs::read_to_string(path) else {
            return Vec::new();
        };
        let mut inside = false;
        let mut keys = Vec::new();
        for raw in text.replace("\r\n", "\n").split('\n') {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(name) = section_header(line) {
                if inside {
                    break;
                }
                inside = name == section;
                continue;
            }
            if !inside {
                continue;
            }
            if let Some(pos) = line.find('=') {
                keys.push((
                    line[..pos].trim().to_string(),
                    line[pos + 1..].trim().to_string(),
                ));
            }
        }
        keys
    }

    pub fn value_from_file(&self, path: &str, section: &str, key: &str) -> String {
        self.section_from_file(path, section)
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .unwrap_or_default()
    }

    pub fn list_sections(&self, path: &str) -> Vec<String> {
        self.parse_file(path).section_names()
    }

    /// Upserts `key=value` in `section`, creating the file or section as
    /// needed. Splices the raw text so surrounding lines are preserved.
    pub fn set_value(
        &self,
        path: &str,
        section: &str,
        key: &str,
        value: &str,
    ) -> Result<(), IniError> {
        self.splice_key(path, section, key, Upsert::SetValue(value))
    }

    /// Renames `key` to `new_key` within `section`, keeping its value.
    /// Missing key falls back to inserting `new_key` with an empty value.
    pub fn set_key(
        &self,
        path: &str,
        section: &str,
        key: &str,
        new_key: &str,
    ) -> Result<(), IniError> {
        self.splice_key(path, section, key, Upsert::RenameKey(new_key))
    }

    fn splice_key(
        &self,
        path: &str,
        section: &str,
        key: &str,
        action: Upsert<'_>,
    ) -> Result<(), IniError> {
        let lock = self.lock_for(path);
        let _guard = lock.write().expect("ini file lock poisoned");

        let original = match fs::read_to_string(path) {
            Ok(text) => text.replace("\r\n", "\n"),
            Err(_) => String::new(),
        };

        let mut lines: Vec<String> = Vec::new();
        let mut in_target = false;
        let mut handled = false;
        let mut section_seen = false;

        for raw in original.split('\n') {
            let trimmed = raw.trim();
            if let Some(name) = section_header(trimmed) {
                if in_target && !handled {
                    // Target section ends here without the key: insert
                    // before the next header, after any trailing blanks.
                    let insert_at = lines
                        .iter()
                        .rposition(|l| !l.trim().is_empty())
                        .map(|p| p + 1)
                        .unwrap_or(lines.len());
                    lines.insert(insert_at, action.new_line(key, ""));
                    handled = true;
                }
                in_target = name == section;
                section_seen |= in_target;
                lines.push(raw.to_string());
                continue;
            }
            if in_target && !handled {
                if let Some(pos) = trimmed.find('=') {
                    if trimmed[..pos].trim() == key {
                        let existing = trimmed[pos + 1..].trim();
                        lines.push(action.new_line(key, existing));
                        handled = true;
                        continue;
                    }
                }
            }
            lines.push(raw.to_string());
        }

        // Drop the artifact of split() on trailing newline.
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }

        if !handled {
            if !section_seen {
                if !lines.is_empty() {
                    lines.push(String::new());
                }
                lines.push(format!("[{section}]"));
            }
            lines.push(action.new_line(key, ""));
        }

        let mut content = lines.join("\n");
        content.push('\n');
        self.write_atomic(path, &content)
    }

    /// Appends an empty section unless one with that exact name exists.
    pub fn add_section(&self, path: &str, section: &str) -> Result<(), IniError> {
        let lock = self.lock_for(path);
        let _guard = lock.write().expect("ini file lock poisoned");
        let original = fs::read_to_string(path).unwrap_or_default();
        let header = format!("[{section}]");
        if original.lines().any(|l| l.trim() == header) {
            return Ok(());
        }
        let mut content = original;
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&header);
        content.push('\n');
        self.write_atomic(path, &content)
    }

    pub fn rename_section(&self, path: &str, from: &str, to: &str) -> Result<(), IniError> {
        self.transform_lines(path, |line| {
            if section_header(line.trim()) == Some(from) {
                LineEdit::Replace(format!("[{to}]"))
            } else {
                LineEdit::Keep
            }
        })
    }

    /// Removes the section header and every line up to the next header.
    pub fn remove_section(&self, path: &str, section: &str) -> Result<(), IniError> {
        let mut dropping = false;
        self.transform_lines(path, move |line| {
            if let Some(name) = section_header(line.trim()) {
                dropping = name == section;
            }
            if dropping {
                LineEdit::Drop
            } else {
                LineEdit::Keep
            }
        })
    }

    /// Removes one `key=` line from one section.
    pub fn remove_key(&self, path: &str, section: &str, key: &str) -> Result<(), IniError> {
        let mut inside = false;
        self.transform_lines(path, move |line| {
            let trimmed = line.trim();
            if let Some(name) = section_header(trimmed) {
                inside = name == section;
                return LineEdit::Keep;
            }
            if inside {
                if let Some(pos) = trimmed.find('=') {
                    if trimmed[..pos].trim() == key {
                        return LineEdit::Drop;
                    }
                }
            }
            LineEdit::Keep
        })
    }

    /// Normalizes layout: no blank lines inside sections, exactly one blank
    /// line between sections. Not invoked by the mutation functions.
    pub fn clean_formatting(&self, path: &str) -> Result<(), IniError> {
        let lock = self.lock_for(path);
        let _guard = lock.write().expect("ini file lock poisoned");
        let original = match fs::read_to_string(path) {
            Ok(text) => text.replace("\r\n", "\n"),
            Err(e) => {
                return Err(IniError::Read {
                    path: path.to_string(),
                    source: e,
                });
            }
        };
        let mut out = String::new();
        let mut first_section = true;
        for raw in original.split('\n') {
            let line = raw.trim_end();
            if line.trim().is_empty() {
                continue;
            }
            if section_header(line.trim()).is_some() && !first_section {
                out.push('\n');
            }
            if section_header(line.trim()).is_some() {
                first_section = false;
            }
            out.push_str(line);
            out.push('\n');
        }
        self.write_atomic(path, &out)
    }

    fn transform_lines<F>(&self, path: &str, mut edit: F) -> Result<(), IniError>
    where
        F: FnMut(&str) -> LineEdit,
    {
        let lock = self.lock_for(path);
        let _guard = lock.write().expect("ini file lock poisoned");
        let original = match fs::read_to_string(path) {
            Ok(text) => text.replace("\r\n", "\n"),
            Err(e) => {
                return Err(IniError::Read {
                    path: path.to_string(),
                    source: e,
                });
            }
        };
        let had_trailing_newline = original.ends_with('\n');
        let mut lines: Vec<String> = Vec::new();
        for raw in original.split('\n') {
            match edit(raw) {
                LineEdit::Keep => lines.push(raw.to_string()),
                LineEdit::Replace(new) => lines.push(new),
                LineEdit::Drop => {}
            }
        }
        if had_trailing_newline {
            while lines.last().is_some_and(|l| l.is_empty()) {
                lines.pop();
            }
        }
        let mut content = lines.join("\n");
        if had_trailing_newline && !content.is_empty() {
            content.push('\n');
        }
        self.write_atomic(path, &content)
    }

    fn write_atomic(&self, path: &str, content: &str) -> Result<(), IniError> {
        let target = Path::new(path);
        let dir = target.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = dir {
            fs::create_dir_all(dir).map_err(|e| IniError::Write {
                path: path.to_string(),
                source: e,
            })?;
        }
        let mut tmp = NamedTempFile::new_in(dir.unwrap_or(Path::new("."))).map_err(|e| {
            IniError::Write {
                path: path.to_string(),
                source: e,
            }
        })?;
        tmp.write_all(content.as_bytes()).map_err(|e| IniError::Write {
            path: path.to_string(),
            source: e,
        })?;
        tmp.persist(target).map_err(|e| IniError::Write {
            path: path.to_string(),
            source: e.error,
        })?;
        Ok(())
    }
}

enum Upsert<'a> {
    SetValue(&'a str),
    RenameKey(&'a str),
}

impl Upsert<'_> {
    fn new_line(&self, key: &str, existing_value: &str) -> String {
        match self {
            Upsert::SetValue(value) => format!("{key}={value}"),
            Upsert::RenameKey(new_key) => format!("{new_key}={existing_value}"),
        }
    }
}

enum LineEdit {
    Keep,
    Replace(String),
    Drop,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn path_in(tmp: &TempDir, name: &str) -> String {
        tmp.path().join(name).to_string_lossy().into_owned()
    }

    #[test]
    fn parse_preserves_order_and_empty_sections() {
        let doc = IniDocument::parse("[B]\nz=1\na=2\n[A]\n[C]\nk=v\n");
        assert_eq!(doc.section_names(), vec!["B", "A", "C"]);
        assert_eq!(doc.section("A"), Some(&[][..]));
        assert_eq!(doc.value("B", "z"), "1");
        let reparsed = IniDocument::parse(&doc.serialize());
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn parse_skips_preamble_and_comments() {
        let doc = IniDocument::parse(";title=My Pkg\norphan=1\n# note\n[S]\nk=v=w\n");
        assert_eq!(doc.section_names(), vec!["S"]);
        assert_eq!(doc.value("S", "k"), "v=w");
    }

    #[test]
    fn set_value_creates_file_with_single_entry() {
        let tmp = TempDir::new().unwrap();
        let path = path_in(&tmp, "cfg.ini");
        let store = IniStore::new();
        store.set_value(&path, "main", "enabled", "true").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[main]\nenabled=true\n");
    }

    #[test]
    fn set_value_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let path = path_in(&tmp, "cfg.ini");
        let store = IniStore::new();
        store.set_value(&path, "s", "k", "v").unwrap();
        let once = fs::read_to_string(&path).unwrap();
        store.set_value(&path, "s", "k", "v").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), once);
    }

    #[test]
    fn set_value_appends_key_before_next_section() {
        let tmp = TempDir::new().unwrap();
        let path = path_in(&tmp, "cfg.ini");
        fs::write(&path, "[a]\nx=1\n\n[b]\ny=2\n").unwrap();
        let store = IniStore::new();
        store.set_value(&path, "a", "new", "3").unwrap();
        let doc = store.parse_file(&path);
        assert_eq!(doc.value("a", "new"), "3");
        assert_eq!(doc.value("b", "y"), "2");
        // The spliced line lands inside [a], not after [b].
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.find("new=3").unwrap() < text.find("[b]").unwrap());
    }

    #[test]
    fn set_value_preserves_comments() {
        let tmp = TempDir::new().unwrap();
        let path = path_in(&tmp, "cfg.ini");
        fs::write(&path, "# keep me\n[s]\nk=old\n").unwrap();
        let store = IniStore::new();
        store.set_value(&path, "s", "k", "new").unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("# keep me"));
        assert!(text.contains("k=new"));
        assert!(!text.contains("k=old"));
    }

    #[test]
    fn set_key_renames_preserving_value() {
        let tmp = TempDir::new().unwrap();
        let path = path_in(&tmp, "cfg.ini");
        fs::write(&path, "[s]\nold=value\n").unwrap();
        let store = IniStore::new();
        store.set_key(&path, "s", "old", "fresh").unwrap();
        let doc = store.parse_file(&path);
        assert_eq!(doc.value("s", "fresh"), "value");
        assert_eq!(doc.value("s", "old"), "");
    }

    #[test]
    fn remove_section_is_total() {
        let tmp = TempDir::new().unwrap();
        let path = path_in(&tmp, "cfg.ini");
        fs::write(&path, "[gone]\na=1\nb=2\n[kept]\nc=3\n").unwrap();
        let store = IniStore::new();
        store.remove_section(&path, "gone").unwrap();
        assert_eq!(store.list_sections(&path), vec!["kept"]);
        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("a=1"));
        assert!(!text.contains("b=2"));
        assert!(text.contains("c=3"));
    }

    #[test]
    fn remove_key_leaves_neighbors() {
        let tmp = TempDir::new().unwrap();
        let path = path_in(&tmp, "cfg.ini");
        fs::write(&path, "[s]\na=1\nb=2\n[t]\na=9\n").unwrap();
        let store = IniStore::new();
        store.remove_key(&path, "s", "a").unwrap();
        let doc = store.parse_file(&path);
        assert_eq!(doc.value("s", "a"), "");
        assert_eq!(doc.value("s", "b"), "2");
        assert_eq!(doc.value("t", "a"), "9");
    }

    #[test]
    fn section_from_file_stops_at_next_header() {
        let tmp = TempDir::new().unwrap();
        let path = path_in(&tmp, "cfg.ini");
        fs::write(&path, "[x]\nk=1\n[y]\nk=2\n").unwrap();
        let store = IniStore::new();
        let keys = store.section_from_file(&path, "x");
        assert_eq!(keys, vec![("k".to_string(), "1".to_string())]);
        assert_eq!(store.value_from_file(&path, "y", "k"), "2");
    }

    #[test]
    fn missing_file_reads_empty() {
        let store = IniStore::new();
        assert!(store.parse_file("/nonexistent/nope.ini").is_empty());
        assert_eq!(store.value_from_file("/nonexistent/nope.ini", "a", "b"), "");
    }

    #[test]
    fn clean_formatting_normalizes_blank_lines() {
        let tmp = TempDir::new().unwrap();
        let path = path_in(&tmp, "cfg.ini");
        fs::write(&path, "[a]\n\n\nk=1\n\n\n\n[b]\nv=2\n").unwrap();
        let store = IniStore::new();
        store.clean_formatting(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[a]\nk=1\n\n[b]\nv=2\n");
    }

    #[test]
    fn rename_section_keeps_keys() {
        let tmp = TempDir::new().unwrap();
        let path = path_in(&tmp, "cfg.ini");
        fs::write(&path, "[old]\nk=v\n").unwrap();
        let store = IniStore::new();
        store.rename_section(&path, "old", "new").unwrap();
        let doc = store.parse_file(&path);
        assert_eq!(doc.section_names(), vec!["new"]);
        assert_eq!(doc.value("new", "k"), "v");
    }
}
