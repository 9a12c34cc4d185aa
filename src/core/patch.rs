//! pchtxt to IPS conversion.
//!
//! A `.pchtxt` file is the human-editable patch format used by game mods:
//! an `@nsobid-<id>` line naming the target executable, then `ADDRESS
//! VALUE` lines with a hex offset and hex replacement bytes. The output is
//! an `IPS32` container: 5-byte `IPS32` magic, then one record per patch
//! (little-endian u32 address, little-endian u16 length, raw bytes), closed
//! with `EEOF`.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::core::strings;

const IPS32_HEAD_MAGIC: &[u8] = b"IPS32";
const IPS32_FOOT_MAGIC: &[u8] = b"EEOF";

/// Converts a pchtxt file into an IPS patch placed in `out_dir`, named
/// after the nsobid (falling back to the pchtxt file stem). Lines that are
/// not `@nsobid-` headers or `ADDRESS VALUE` pairs are ignored. Returns
/// false when the input is unreadable or the output cannot be written.
pub fn pchtxt_to_ips(pchtxt_path: &str, out_dir: &str) -> bool {
    let text = match fs::read_to_string(pchtxt_path) {
        Ok(t) => t,
        Err(e) => {
            log::warn!("pchtxt read {pchtxt_path}: {e}");
            return false;
        }
    };

    let mut nsobid = String::new();
    let mut patches: Vec<(u32, Vec<u8>)> = Vec::new();
    for raw in text.replace("\r\n", "\n").split('\n') {
        let line = raw.trim();
        if let Some(id) = line.strip_prefix("@nsobid-") {
            nsobid = id.trim().to_string();
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(addr_str), Some(value_str)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Ok(address) = u32::from_str_radix(addr_str, 16) else {
            continue;
        };
        if value_str.len() % 2 != 0 {
            continue;
        }
        let Ok(value) = hex::decode(value_str) else {
            continue;
        };
        if value.is_empty() || value.len() > u16::MAX as usize {
            continue;
        }
        patches.push((address, value));
    }

    if patches.is_empty() {
        log::warn!("no patch lines in {pchtxt_path}");
        return false;
    }

    let name = if nsobid.is_empty() {
        strings::drop_extension(strings::name_from_path(pchtxt_path)).to_string()
    } else {
        nsobid
    };
    let out_path = Path::new(strings::strip_trailing_slash(out_dir)).join(format!("{name}.ips"));
    if let Some(parent) = out_path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let mut out = match File::create(&out_path) {
        Ok(f) => f,
        Err(e) => {
            log::warn!("ips create {}: {e}", out_path.display());
            return false;
        }
    };
    let write = (|| -> std::io::Result<()> {
        out.write_all(IPS32_HEAD_MAGIC)?;
        for (address, value) in &patches {
            out.write_all(&address.to_le_bytes())?;
            out.write_all(&(value.len() as u16).to_le_bytes())?;
            out.write_all(value)?;
        }
        out.write_all(IPS32_FOOT_MAGIC)
    })();
    if let Err(e) = write {
        log::warn!("ips write {}: {e}", out_path.display());
        let _ = fs::remove_file(&out_path);
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn converts_patch_lines_into_ips_records() {
        let tmp = TempDir::new().unwrap();
        let pchtxt = tmp.path().join("fix.pchtxt");
        fs::write(
            &pchtxt,
            "@nsobid-ABC123\n@enabled\n00400000 DEADBEEF\n// comment\n00400010 FF\n",
        )
        .unwrap();

        assert!(pchtxt_to_ips(
            &pchtxt.to_string_lossy(),
            &tmp.path().to_string_lossy()
        ));
        let data = fs::read(tmp.path().join("ABC123.ips")).unwrap();
        assert_eq!(&data[..5], b"IPS32");
        assert_eq!(&data[data.len() - 4..], b"EEOF");
        // First record: address 0x00400000, length 4, DEADBEEF.
        assert_eq!(&data[5..9], &0x0040_0000u32.to_le_bytes());
        assert_eq!(&data[9..11], &4u16.to_le_bytes());
        assert_eq!(&data[11..15], &[0xDE, 0xAD, 0xBE, 0xEF]);
        // Second record: address 0x00400010, length 1, FF.
        assert_eq!(&data[15..19], &0x0040_0010u32.to_le_bytes());
        assert_eq!(&data[19..21], &1u16.to_le_bytes());
        assert_eq!(data[21], 0xFF);
    }

    #[test]
    fn missing_nsobid_falls_back_to_file_stem() {
        let tmp = TempDir::new().unwrap();
        let pchtxt = tmp.path().join("mymod.pchtxt");
        fs::write(&pchtxt, "100 AB\n").unwrap();
        assert!(pchtxt_to_ips(
            &pchtxt.to_string_lossy(),
            &tmp.path().to_string_lossy()
        ));
        assert!(tmp.path().join("mymod.ips").exists());
    }

    #[test]
    fn file_without_patch_lines_fails() {
        let tmp = TempDir::new().unwrap();
        let pchtxt = tmp.path().join("empty.pchtxt");
        fs::write(&pchtxt, "@nsobid-X\njust text\n").unwrap();
        assert!(!pchtxt_to_ips(
            &pchtxt.to_string_lossy(),
            &tmp.path().to_string_lossy()
        ));
    }
}
