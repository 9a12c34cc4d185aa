//! Binary search-and-patch over files.
//!
//! Patterns are even-length hex strings; an odd-length pattern matches
//! nothing. Files are scanned in fixed-size chunks with a carry window of
//! `pattern_len - 1` bytes so matches spanning a chunk boundary are found.
//! Patches write bytes in place at absolute offsets and never change the
//! file length.
//!
//! Found offsets are cached by (path, pattern, occurrence) for the life of
//! the process; package authors re-run the same lookups constantly and the
//! key space is small. The cache is mutex-wrapped for multi-thread hosts.

use crate::constants::HEX_SCAN_CHUNK_SIZE;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct HexPatcher {
    offset_cache: Mutex<HashMap<(String, String, usize), u64>>,
}

impl HexPatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte offsets of every match of `hex_pattern` in the file, in order.
    /// Odd-length or undecodable patterns and unreadable files yield an
    /// empty list.
    pub fn find_pattern_offsets(&self, path: &str, hex_pattern: &str) -> Vec<u64> {
        if hex_pattern.len() % 2 != 0 {
            return Vec::new();
        }
        let Ok(pattern) = hex::decode(hex_pattern) else {
            log::warn!("undecodable hex pattern: {hex_pattern}");
            return Vec::new();
        };
        if pattern.is_empty() {
            return Vec::new();
        }
        let Ok(mut file) = File::open(path) else {
            return Vec::new();
        };

        let mut offsets = Vec::new();
        // Window = previous carry + fresh chunk; carry keeps the last
        // pattern_len - 1 bytes so boundary-spanning matches are seen.
        let mut window: Vec<u8> = Vec::with_capacity(HEX_SCAN_CHUNK_SIZE + pattern.len());
        let mut chunk = vec![0u8; HEX_SCAN_CHUNK_SIZE];
        let mut window_start: u64 = 0;
        loop {
            let read = match file.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    log::warn!("hex scan read {path}: {e}");
                    return Vec::new();
                }
            };
            window.extend_from_slice(&chunk[..read]);
            if window.len() >= pattern.len() {
                for i in 0..=window.len() - pattern.len() {
                    if window[i..i + pattern.len()] == pattern[..] {
                        offsets.push(window_start + i as u64);
                    }
                }
                let keep = pattern.len() - 1;
                let drop = window.len() - keep;
                window.drain(..drop);
                window_start += drop as u64;
            }
        }
        // Matches that end exactly at EOF were already found above; the
        // final carry alone can never hold a full pattern.
        offsets
    }

    /// Offset of the occurrence-indexed match, through the cache.
    /// `occurrence` 0 and 1 both mean the first match.
    pub fn cached_offset(&self, path: &str, hex_pattern: &str, occurrence: usize) -> Option<u64> {
        let key = (path.to_string(), hex_pattern.to_string(), occurrence);
        if let Some(&offset) = self
            .offset_cache
            .lock()
            .expect("hex offset cache poisoned")
            .get(&key)
        {
            return Some(offset);
        }
        let index = occurrence.saturating_sub(1);
        let offset = *self.find_pattern_offsets(path, hex_pattern).get(index)?;
        self.offset_cache
            .lock()
            .expect("hex offset cache poisoned")
            .insert(key, offset);
        Some(offset)
    }

    /// Writes decoded `hex_data` over the file content at `offset`.
    pub fn patch_at_offset(&self, path: &str, offset: u64, hex_data: &str) -> bool {
        let Ok(data) = hex::decode(hex_data) else {
            log::warn!("undecodable hex replacement: {hex_data}");
            return false;
        };
        let mut file = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("hex patch open {path}: {e}");
                return false;
            }
        };
        if let Err(e) = file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| file.write_all(&data))
        {
            log::warn!("hex patch write {path} at {offset}: {e}");
            return false;
        }
        true
    }

    /// Patches relative to an occurrence-indexed pattern match. The found
    /// offset comes through the cache; `relative_offset` may be negative.
    pub fn patch_at_pattern_offset(
        &self,
        path: &str,
        hex_pattern: &str,
        relative_offset: i64,
        hex_data: &str,
        occurrence: usize,
    ) -> bool {
        let Some(base) = self.cached_offset(path, hex_pattern, occurrence) else {
            log::warn!("pattern not found in {path}: {hex_pattern}");
            return false;
        };
        let Some(target) = base.checked_add_signed(relative_offset) else {
            return false;
        };
        self.patch_at_offset(path, target, hex_data)
    }

    /// Replaces matches of `find_hex` with `replace_hex`. `occurrence` 0
    /// replaces every match, N replaces only the N-th (1-based). Returns
    /// false when nothing matched or any write failed.
    pub fn find_and_replace(
        &self,
        path: &str,
        find_hex: &str,
        replace_hex: &str,
        occurrence: usize,
    ) -> bool {
        let offsets = self.find_pattern_offsets(path, find_hex);
        if offsets.is_empty() {
            return false;
        }
        let targets: Vec<u64> = if occurrence == 0 {
            offsets
        } else {
            match offsets.get(occurrence - 1) {
                Some(&off) => vec![off],
                None => return false,
            }
        };
        targets
            .iter()
            .all(|&off| self.patch_at_offset(path, off, replace_hex))
    }

    /// Reads `length` bytes at `offset` and returns them as uppercase hex.
    pub fn read_hex_at_offset(&self, path: &str, offset: u64, length: usize) -> Option<String> {
        let mut file = File::open(path).ok()?;
        file.seek(SeekFrom::Start(offset)).ok()?;
        let mut buf = vec![0u8; length];
        file.read_exact(&mut buf).ok()?;
        Some(hex::encode_upper(buf))
    }
}

/// Hex encoding of an ASCII string, uppercase.
pub fn ascii_to_hex(ascii: &str) -> String {
    hex::encode_upper(ascii.as_bytes())
}

/// Decimal string to uppercase hex, zero-padded to an even digit count so
/// it decodes to whole bytes. Non-decimal input yields `None`.
pub fn decimal_to_hex(decimal: &str) -> Option<String> {
    let value: u64 = decimal.trim().parse().ok()?;
    let mut out = format!("{value:X}");
    if out.len() % 2 != 0 {
        out.insert(0, '0');
    }
    Some(out)
}

/// Decimal string to hex with reversed byte order (little-endian byte
/// groups), zero-padded on the left to `order` bytes before reversal.
pub fn decimal_to_reversed_hex(decimal: &str, order: usize) -> Option<String> {
    let value: u64 = decimal.trim().parse().ok()?;
    let padded = format!("{value:0width$X}", width = order * 2);
    if padded.len() > order * 2 {
        return None;
    }
    let bytes: Vec<&str> = (0..order).map(|i| &padded[i * 2..i * 2 + 2]).collect();
    Some(bytes.into_iter().rev().collect())
}
