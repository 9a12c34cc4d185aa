//! Package file loading: section-grouped command lists and the header
//! metadata block.
//!
//! A package's primary file is the INI dialect of [`crate::core::ini`], but
//! command sections are not key/value maps: every non-comment line inside a
//! section is one command, tokenized with the single-quote rule below. The
//! `;key=value` comment lines before the first section header carry package
//! metadata.

use crate::core::strings;
use crate::models::{Command, PackageHeader};
use std::fs;

/// Splits a command line into tokens. The line is split on `'`: segments at
/// even split-index are whitespace-split into individual tokens, segments at
/// odd split-index (inside a quote pair) become one verbatim token with
/// embedded spaces preserved. An unterminated quote makes the remainder of
/// the line a single literal token.
pub fn parse_command_line(line: &str) -> Command {
    let mut tokens = Vec::new();
    for (index, segment) in line.split('\'').enumerate() {
        if index % 2 == 1 {
            tokens.push(segment.to_string());
        } else {
            tokens.extend(segment.split_whitespace().map(str::to_string));
        }
    }
    tokens
}

/// All sections of a package file in order, each with its command list.
/// A section declared with no commands still appears, with an empty list.
/// Returns an empty vector when the file cannot be read.
pub fn load_all_sections(path: &str) -> Vec<(String, Vec<Command>)> {
    let Ok(text) = fs::read_to_string(path) else {
        log::debug!("package file unreadable: {path}");
        return Vec::new();
    };
    let mut sections: Vec<(String, Vec<Command>)> = Vec::new();
    for raw in text.replace("\r\n", "\n").split('\n') {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(name) = header_name(line) {
            sections.push((name.to_string(), Vec::new()));
            continue;
        }
        if let Some((_, commands)) = sections.last_mut() {
            let command = parse_command_line(line);
            if !command.is_empty() {
                commands.push(command);
            }
        }
    }
    sections
}

/// One section's command list, scanning no further than the header that
/// follows it. Missing section or unreadable file yields an empty list.
pub fn load_section(path: &str, section: &str) -> Vec<Command> {
    let Ok(text) = fs::read_to_string(path) else {
        return Vec::new();
    };
    let mut inside = false;
    let mut commands = Vec::new();
    for raw in text.replace("\r\n", "\n").split('\n') {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(name) = header_name(line) {
            if inside {
                break;
            }
            inside = name == section;
            continue;
        }
        if inside {
            let command = parse_command_line(line);
            if !command.is_empty() {
                commands.push(command);
            }
        }
    }
    commands
}

/// Header metadata from the `;key=value` lines before the first section.
/// Values may be quoted; quotes are stripped. Missing file or fields yield
/// the defaults.
pub fn package_header(path: &str) -> PackageHeader {
    let mut header = PackageHeader::default();
    let Ok(text) = fs::read_to_string(path) else {
        return header;
    };
    for raw in text.replace("\r\n", "\n").split('\n') {
        let line = raw.trim();
        if line.starts_with('[') {
            break;
        }
        let Some(rest) = line.strip_prefix(';') else {
            continue;
        };
        let Some(pos) = rest.find('=') else {
            continue;
        };
        let key = rest[..pos].trim();
        let value = strings::remove_quotes(rest[pos + 1..].trim()).to_string();
        match key {
            "title" => header.title = value,
            "version" => header.version = value,
            "creator" => header.creator = value,
            "about" => header.about = value,
            "credits" => header.credits = value,
            "color" => header.color = value,
            "show_version" => header.show_version = value == "true",
            "show_widget" => header.show_widget = value == "true",
            _ => {}
        }
    }
    header
}

fn header_name(line: &str) -> Option<&str> {
    line.strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .map(str::trim)
}
