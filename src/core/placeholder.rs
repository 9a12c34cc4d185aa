//! Placeholder substitution inside command tokens.
//!
//! A placeholder is `{verb(` ... `)}` — the closing delimiter is the
//! two-character sequence `)}`, not the brace alone. Within a token,
//! placeholders of one family are resolved left to right, non-overlapping.
//! Any resolution failure (missing key, bad index, non-string terminal,
//! unreadable file, pattern not found) leaves that placeholder
//! byte-identical to its input; nothing is ever partially substituted.
//!
//! For the JSON families the text between `{verb(` and the first `),` is
//! the payload (inline JSON or a file path) and what follows the `),` is a
//! comma-separated key path. An argument that itself contains `,`, `)` or
//! `)}` cannot be expressed; that is a limitation of the file format, not
//! of this scanner.

use crate::core::hexpatch::{self, HexPatcher};
use serde_json::Value;
use std::fs;

/// Resolves `{json(...)}`, `{json_file(...)}` and `{hex_file(...)}` in one
/// token, immediately before the owning command dispatches. `hex_target` is
/// the file the enclosing command list most recently addressed with a
/// `hex_file` command; without one, hex placeholders stay unresolved.
pub fn resolve_command_token(
    token: &str,
    hex_target: Option<&str>,
    patcher: &HexPatcher,
) -> String {
    let mut out = resolve_family(token, "{json(", |inner| json_lookup(inner, false));
    out = resolve_family(&out, "{json_file(", |inner| json_lookup(inner, true));
    resolve_family(&out, "{hex_file(", |inner| {
        hex_lookup(inner, hex_target?, patcher)
    })
}

/// Replaces every occurrence of a literal placeholder such as `{source}`
/// with the selected item's text.
pub fn replace_literal(token: &str, placeholder: &str, value: &str) -> String {
    token.replace(placeholder, value)
}

/// Resolves `{json_source(key,...)}` / `{json_file_source(key,...)}`
/// against an already-materialized item from the option's candidate list.
/// The key path navigates the item itself; there is no payload argument.
pub fn resolve_source_json(token: &str, head: &str, item: &Value) -> String {
    resolve_family(token, head, |inner| {
        let keys: Vec<&str> = inner.split(',').map(str::trim).collect();
        navigate(item, &keys)
    })
}

/// Resolves `{list_source(index)}` against the materialized list itself,
/// by zero-based index.
pub fn resolve_source_list(token: &str, items: &[String]) -> String {
    resolve_family(token, "{list_source(", |inner| {
        items.get(inner.trim().parse::<usize>().ok()?).cloned()
    })
}

fn json_lookup(inner: &str, payload_is_path: bool) -> Option<String> {
    let (payload, keys) = split_payload(inner);
    let document: Value = if payload_is_path {
        let text = fs::read_to_string(payload.trim()).ok()?;
        serde_json::from_str(&text).ok()?
    } else {
        serde_json::from_str(payload).ok()?
    };
    navigate(&document, &keys)
}

fn hex_lookup(inner: &str, file: &str, patcher: &HexPatcher) -> Option<String> {
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    let [pattern, offset, length] = parts.as_slice() else {
        return None;
    };
    let hex_pattern = match pattern.strip_prefix('#') {
        Some(raw) => raw.to_string(),
        None => hexpatch::ascii_to_hex(pattern),
    };
    let offset: i64 = offset.parse().ok()?;
    let length: usize = length.parse().ok()?;
    let base = patcher.cached_offset(file, &hex_pattern, 0)?;
    let position = base.checked_add_signed(offset)?;
    patcher.read_hex_at_offset(file, position, length)
}

/// Splits `payload),key1,key2` into the payload and the key path. Without
/// a `),` separator the whole inner text is the payload.
fn split_payload(inner: &str) -> (&str, Vec<&str>) {
    match inner.find("),") {
        Some(pos) => (
            &inner[..pos],
            inner[pos + 2..].split(',').map(str::trim).collect(),
        ),
        None => (inner, Vec::new()),
    }
}

/// Walks a JSON value by object keys and array indices. Only a string
/// terminal is substitutable.
fn navigate(value: &Value, keys: &[&str]) -> Option<String> {
    let mut current = value;
    for key in keys {
        if key.is_empty() {
            return None;
        }
        current = match current {
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            Value::Object(map) => map.get(*key)?,
            _ => return None,
        };
    }
    match current {
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Rewrites each `head`...`)}` span in the token through `resolve`,
/// leaving spans that fail to resolve untouched.
fn resolve_family<F>(token: &str, head: &str, mut resolve: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::new();
    let mut pos = 0;
    while let Some(start) = token[pos..].find(head).map(|p| p + pos) {
        let inner_start = start + head.len();
        let Some(close) = token[inner_start..].find(")}").map(|p| p + inner_start) else {
            break;
        };
        out.push_str(&token[pos..start]);
        match resolve(&token[inner_start..close]) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&token[start..close + 2]),
        }
        pos = close + 2;
    }
    out.push_str(&token[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn inline_json_navigation() {
        let token = r#"{json([{"name":"A"},{"name":"B"}]),1,name)}"#;
        assert_eq!(resolve_command_token(token, None, &HexPatcher::new()), "B");
    }

    #[test]
    fn json_file_navigation() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(br#"{"top":{"inner":"found"}}"#).unwrap();
        let token = format!("{{json_file({}),top,inner)}}", f.path().display());
        assert_eq!(
            resolve_command_token(&token, None, &HexPatcher::new()),
            "found"
        );
    }

    #[test]
    fn failed_lookup_is_byte_identical() {
        let patcher = HexPatcher::new();
        let missing_key = r#"{json({"a":"1"}),b)}"#;
        assert_eq!(
            resolve_command_token(missing_key, None, &patcher),
            missing_key
        );
        let non_string = r#"{json({"a":{"b":"c"}}),a)}"#;
        assert_eq!(
            resolve_command_token(non_string, None, &patcher),
            non_string
        );
        let no_target = "{hex_file(#DEAD,0,2)}";
        assert_eq!(resolve_command_token(no_target, None, &patcher), no_target);
    }

    #[test]
    fn multiple_placeholders_resolve_left_to_right() {
        let token = r#"pre-{json({"k":"x"}),k)}-mid-{json({"k":"y"}),k)}-post"#;
        assert_eq!(
            resolve_command_token(token, None, &HexPatcher::new()),
            "pre-x-mid-y-post"
        );
    }

    #[test]
    fn hex_placeholder_reads_from_target() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(&[0x00, 0xDE, 0xAD, 0x42, 0x43, 0x00]).unwrap();
        let patcher = HexPatcher::new();
        let path = f.path().to_string_lossy().into_owned();
        let token = "{hex_file(#DEAD,2,2)}";
        assert_eq!(
            resolve_command_token(token, Some(&path), &patcher),
            "4243"
        );
    }

    #[test]
    fn ascii_hex_pattern_is_encoded_first() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"xxMAGICyy").unwrap();
        let patcher = HexPatcher::new();
        let path = f.path().to_string_lossy().into_owned();
        // "MAGIC" found at 2; offset 5 lands on "yy".
        let token = "{hex_file(MAGIC,5,2)}";
        assert_eq!(
            resolve_command_token(token, Some(&path), &patcher),
            "7979"
        );
    }

    #[test]
    fn list_source_navigation_is_index_based() {
        let items = vec!["alpha".to_string(), "beta".to_string()];
        assert_eq!(
            resolve_source_list("pick {list_source(1)}", &items),
            "pick beta"
        );
        let out_of_range = "pick {list_source(7)}";
        assert_eq!(resolve_source_list(out_of_range, &items), out_of_range);
    }

    #[test]
    fn source_item_navigation() {
        let item: Value = serde_json::from_str(r#"{"name":"y","value":"2"}"#).unwrap();
        assert_eq!(
            resolve_source_json("enable {json_source(name)}", "{json_source(", &item),
            "enable y"
        );
        assert_eq!(
            replace_literal("copy {source} /dst/", "{source}", "/src/a.bin"),
            "copy /src/a.bin /dst/"
        );
    }
}
