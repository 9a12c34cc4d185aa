//! HTTPS downloads with progress reporting and cooperative abort.
//!
//! The body streams into a temp file next to the destination; only a
//! validated, non-empty download is renamed into place, so an aborted or
//! failed transfer never leaves a partial destination file.

use crate::constants::DOWNLOAD_CHUNK_SIZE;
use crate::core::signals::ProgressSignals;
use crate::core::strings;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("url contains an unresolved placeholder: {0}")]
    UnresolvedUrl(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server answered {0}")]
    Status(reqwest::StatusCode),
    #[error("response body was empty")]
    EmptyBody,
    #[error("download aborted")]
    Aborted,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Downloads `url` to `destination`. A destination ending in `/` is a
/// directory; the filename then comes from the last URL path segment.
/// Progress lands in `signals.download` as a percentage of the declared
/// content length; the abort flag is honored between chunks. On any error
/// the progress channel reads the idle sentinel.
pub fn download(
    url: &str,
    destination: &str,
    signals: &ProgressSignals,
) -> Result<(), DownloadError> {
    signals.download.begin();
    let result = download_inner(url, destination, signals);
    match &result {
        Ok(()) => signals.download.finish(),
        Err(_) => signals.download.reset(),
    }
    result
}

fn download_inner(
    url: &str,
    destination: &str,
    signals: &ProgressSignals,
) -> Result<(), DownloadError> {
    if url.contains('{') || url.contains('}') {
        return Err(DownloadError::UnresolvedUrl(url.to_string()));
    }

    let final_path = if destination.ends_with('/') {
        format!("{destination}{}", filename_from_url(url))
    } else {
        destination.to_string()
    };
    let target = Path::new(&final_path);
    let dir = target.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        fs::create_dir_all(dir)?;
    }

    let client = reqwest::blocking::Client::builder()
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .timeout(Duration::from_secs(600))
        .connect_timeout(Duration::from_secs(20))
        .build()?;
    let mut response = client.get(url).send()?;
    if !response.status().is_success() {
        return Err(DownloadError::Status(response.status()));
    }
    let total = response.content_length().unwrap_or(0);

    let mut tmp = NamedTempFile::new_in(dir.unwrap_or(Path::new(".")))?;
    let mut buffer = vec![0u8; DOWNLOAD_CHUNK_SIZE];
    let mut written: u64 = 0;
    loop {
        let read = response.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        tmp.write_all(&buffer[..read])?;
        written += read as u64;
        if total > 0 {
            signals.download.set_percent(((written * 100) / total) as i32);
        }
        if signals.download.abort_requested() {
            // Dropping the temp file removes it.
            return Err(DownloadError::Aborted);
        }
    }

    if written == 0 {
        return Err(DownloadError::EmptyBody);
    }
    tmp.flush()?;
    tmp.persist(target).map_err(|e| DownloadError::Io(e.error))?;
    log::info!("downloaded {url} -> {final_path} ({written} bytes)");
    Ok(())
}

/// Last path segment of a URL, without query or fragment.
fn filename_from_url(url: &str) -> &str {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
    strings::name_from_path(without_query)
}
