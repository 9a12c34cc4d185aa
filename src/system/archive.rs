//! ZIP extraction with progress reporting and cooperative abort.
//!
//! Extraction is two-pass: the first pass sums uncompressed entry sizes so
//! progress has a denominator, the second writes entries in fixed-size
//! chunks. Aborting deletes the file being written at that moment and
//! stops; already-extracted entries stay on disk.

use crate::constants::COPY_BUFFER_SIZE;
use crate::core::signals::ProgressSignals;
use crate::core::strings;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::ZipArchive;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("cannot open archive '{path}': {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("extraction aborted")]
    Aborted,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extracts every entry of `archive_path` under `dest_dir`. Entry names are
/// sanitized: path traversal entries are skipped and characters the target
/// filesystem rejects are stripped from each component.
pub fn extract_zip(
    archive_path: &str,
    dest_dir: &str,
    signals: &ProgressSignals,
) -> Result<(), ArchiveError> {
    signals.unzip.begin();
    let result = extract_inner(archive_path, dest_dir, signals);
    match &result {
        Ok(()) => signals.unzip.finish(),
        Err(_) => signals.unzip.reset(),
    }
    result
}

fn extract_inner(
    archive_path: &str,
    dest_dir: &str,
    signals: &ProgressSignals,
) -> Result<(), ArchiveError> {
    let file = File::open(archive_path).map_err(|e| ArchiveError::Open {
        path: archive_path.to_string(),
        source: e,
    })?;
    let mut archive = ZipArchive::new(file)?;

    let mut total: u64 = 0;
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if !entry.is_dir() {
            total += entry.size();
        }
    }

    let root = Path::new(strings::strip_trailing_slash(dest_dir));
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut written: u64 = 0;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let Some(relative) = entry.enclosed_name() else {
            log::warn!("skipping traversal entry: {}", entry.name());
            continue;
        };
        let out_path = root.join(sanitize(&relative));
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = File::create(&out_path)?;
        loop {
            let read = entry.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            out.write_all(&buffer[..read])?;
            written += read as u64;
            if total > 0 {
                signals.unzip.set_percent(((written * 100) / total) as i32);
            }
            if signals.unzip.abort_requested() {
                drop(out);
                let _ = fs::remove_file(&out_path);
                return Err(ArchiveError::Aborted);
            }
        }
    }
    log::info!("extracted {archive_path} -> {dest_dir}");
    Ok(())
}

/// Strips characters the console filesystem refuses from each path
/// component.
fn sanitize(relative: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in relative.components() {
        let name = component.as_os_str().to_string_lossy();
        let cleaned: String = name
            .chars()
            .filter(|c| !matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\\'))
            .collect();
        if !cleaned.is_empty() {
            out.push(cleaned);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::signals::PROGRESS_IDLE;
    use std::io::Write as _;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn extracts_nested_entries_and_finishes_progress() {
        let tmp = TempDir::new().unwrap();
        let zip_path = tmp.path().join("bundle.zip");
        build_zip(
            &zip_path,
            &[("a.txt", b"alpha"), ("sub/dir/b.bin", &[1, 2, 3, 4])],
        );
        let dest = tmp.path().join("out");
        let signals = ProgressSignals::new();
        extract_zip(
            &zip_path.to_string_lossy(),
            &dest.to_string_lossy(),
            &signals,
        )
        .unwrap();
        assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(dest.join("sub/dir/b.bin")).unwrap(), [1, 2, 3, 4]);
        assert_eq!(signals.unzip.percent(), 100);
    }

    #[test]
    fn illegal_characters_are_stripped_from_entry_names() {
        let tmp = TempDir::new().unwrap();
        let zip_path = tmp.path().join("odd.zip");
        build_zip(&zip_path, &[("we?ird:na*me.txt", b"x")]);
        let dest = tmp.path().join("out");
        let signals = ProgressSignals::new();
        extract_zip(
            &zip_path.to_string_lossy(),
            &dest.to_string_lossy(),
            &signals,
        )
        .unwrap();
        assert!(dest.join("weirdname.txt").exists());
    }

    #[test]
    fn abort_deletes_in_flight_file_and_resets() {
        let tmp = TempDir::new().unwrap();
        let zip_path = tmp.path().join("big.zip");
        build_zip(&zip_path, &[("big.bin", &vec![0u8; COPY_BUFFER_SIZE * 2])]);
        let dest = tmp.path().join("out");
        let signals = ProgressSignals::new();
        // begin() clears the flag, so pre-set it through the channel the
        // extractor polls mid-write.
        signals.unzip.begin();
        signals.unzip.request_abort();
        let err = extract_inner(
            &zip_path.to_string_lossy(),
            &dest.to_string_lossy(),
            &signals,
        );
        assert!(matches!(err, Err(ArchiveError::Aborted)));
        assert!(!dest.join("big.bin").exists());
        signals.unzip.reset();
        assert_eq!(signals.unzip.percent(), PROGRESS_IDLE);
    }

    #[test]
    fn missing_archive_is_an_open_error() {
        let signals = ProgressSignals::new();
        let err = extract_zip("/nonexistent/a.zip", "/tmp/out", &signals);
        assert!(matches!(err, Err(ArchiveError::Open { .. })));
        assert_eq!(signals.unzip.percent(), PROGRESS_IDLE);
    }
}
