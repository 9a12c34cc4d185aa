//! # Command-Line Interface
//!
//! Argument definitions and handler functions for the `handpack` binary.
//! The binary's registry maps action names to the handlers in
//! [`handlers`]; each handler receives its raw argument list and does its
//! own validation.

use clap::Parser;

/// Developer-facing driver for the package command engine. The first
/// positional argument selects the action; everything after it belongs to
/// that action's handler.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run, inspect and debug declarative package files",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Action to perform (run, sections, info, fetch, extract, pchtxt2ips).
    pub action: Option<String>,

    /// Arguments for the selected action.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

pub mod handlers {
    use crate::constants::{PACKAGE_FILENAME, PAGE_MARKER_PREFIX, SELECTION_PREFIX};
    use crate::core::interpreter::{Interpreter, SourceItem, SourceKind};
    use crate::core::{package, patch};
    use crate::models::{ExecutionReport, OptionMode, OutcomeStatus};
    use crate::system::{archive, download};
    use anyhow::{Context, Result, bail};
    use colored::Colorize;
    use std::path::Path;

    /// Volume prefix prepended to absolute paths in package commands.
    /// Empty on a development host; `sdmc:` when driving a console tree.
    fn root_prefix() -> String {
        std::env::var("HANDPACK_ROOT").unwrap_or_default()
    }

    /// Accepts either a package directory or the package file itself.
    fn package_file(path: &str) -> String {
        if Path::new(path).is_dir() {
            format!("{}/{PACKAGE_FILENAME}", path.trim_end_matches('/'))
        } else {
            path.to_string()
        }
    }

    fn print_report(report: &ExecutionReport) {
        for outcome in &report.outcomes {
            let marker = match outcome.status {
                OutcomeStatus::Succeeded => "ok".green(),
                OutcomeStatus::Failed => "failed".red().bold(),
                OutcomeStatus::Skipped => "skipped".dimmed(),
            };
            println!("  [{marker}] {}", outcome.command);
        }
    }

    /// `handpack run <package> <section> [item] [on|off]`
    pub fn run(args: Vec<String>) -> Result<()> {
        let (Some(package_path), Some(section)) = (args.first(), args.get(1)) else {
            bail!("usage: run <package> <section> [item] [on|off]");
        };
        let file = package_file(package_path);
        let commands = package::load_section(&file, section);
        if commands.is_empty() {
            bail!("section '{section}' is empty or missing in {file}");
        }

        let interpreter = Interpreter::new(root_prefix());
        let option = interpreter.resolve_option(&commands);

        let report = match args.get(2) {
            Some(item) => {
                let bucket = match args.get(3).map(String::as_str) {
                    Some("on") => &option.on_commands,
                    Some("off") => &option.off_commands,
                    Some(other) => bail!("unknown toggle state '{other}'"),
                    None if option.mode == OptionMode::Toggle => &option.on_commands,
                    None => &option.commands,
                };
                let selected = option
                    .json_items
                    .iter()
                    .zip(&option.candidates)
                    .find(|(_, label)| *label == item)
                    .map(|(value, _)| value);
                let source_item = match (selected, option.source) {
                    (Some(value), _) => SourceItem::Json(value),
                    (None, SourceKind::List) => SourceItem::List {
                        items: &option.candidates,
                        selected: item,
                    },
                    (None, _) => SourceItem::Literal(item),
                };
                let report = interpreter.execute_for_item(bucket, &source_item);
                if option.mode == OptionMode::Option {
                    let dir = Path::new(&file)
                        .parent()
                        .map(|p| p.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    interpreter.remember_selection(&dir, section, item);
                }
                report
            }
            None => {
                if !option.candidates.is_empty() {
                    println!("{}", "candidates:".bold());
                    for candidate in &option.candidates {
                        println!("  {candidate}");
                    }
                }
                interpreter.execute(&option.commands)
            }
        };

        print_report(&report);
        if let Some(request) = interpreter.take_control_request() {
            println!("{} {request:?}", "control request:".yellow());
        }
        if !report.success() {
            bail!("section '{section}' finished with failures");
        }
        Ok(())
    }

    /// `handpack sections <package>`
    pub fn sections(args: Vec<String>) -> Result<()> {
        let Some(package_path) = args.first() else {
            bail!("usage: sections <package>");
        };
        let file = package_file(package_path);
        let sections = package::load_all_sections(&file);
        if sections.is_empty() {
            bail!("no sections in {file}");
        }
        for (name, commands) in sections {
            let kind = if name.starts_with(SELECTION_PREFIX) {
                "selection".cyan()
            } else if name.starts_with(PAGE_MARKER_PREFIX) {
                "page".dimmed()
            } else {
                "commands".normal()
            };
            println!("{} ({kind}, {} commands)", name.bold(), commands.len());
        }
        Ok(())
    }

    /// `handpack info <package>`
    pub fn info(args: Vec<String>) -> Result<()> {
        let Some(package_path) = args.first() else {
            bail!("usage: info <package>");
        };
        let header = package::package_header(&package_file(package_path));
        println!("{} {}", "title:".bold(), header.title);
        println!("{} {}", "version:".bold(), header.version);
        println!("{} {}", "creator:".bold(), header.creator);
        if !header.about.is_empty() {
            println!("{} {}", "about:".bold(), header.about);
        }
        if !header.credits.is_empty() {
            println!("{} {}", "credits:".bold(), header.credits);
        }
        Ok(())
    }

    /// `handpack fetch <url> <destination>`
    pub fn fetch(args: Vec<String>) -> Result<()> {
        let (Some(url), Some(dest)) = (args.first(), args.get(1)) else {
            bail!("usage: fetch <url> <destination>");
        };
        let interpreter = Interpreter::new(root_prefix());
        download::download(url, dest, interpreter.signals())
            .with_context(|| format!("downloading {url}"))?;
        println!("{} {url} -> {dest}", "fetched".green());
        Ok(())
    }

    /// `handpack extract <archive.zip> <destination-dir>`
    pub fn extract(args: Vec<String>) -> Result<()> {
        let (Some(archive_path), Some(dest)) = (args.first(), args.get(1)) else {
            bail!("usage: extract <archive.zip> <destination-dir>");
        };
        let interpreter = Interpreter::new(root_prefix());
        archive::extract_zip(archive_path, dest, interpreter.signals())
            .with_context(|| format!("extracting {archive_path}"))?;
        println!("{} {archive_path} -> {dest}", "extracted".green());
        Ok(())
    }

    /// `handpack pchtxt2ips <file.pchtxt> <output-dir>`
    pub fn pchtxt2ips(args: Vec<String>) -> Result<()> {
        let (Some(pchtxt), Some(out_dir)) = (args.first(), args.get(1)) else {
            bail!("usage: pchtxt2ips <file.pchtxt> <output-dir>");
        };
        if !patch::pchtxt_to_ips(pchtxt, out_dir) {
            bail!("conversion failed for {pchtxt}");
        }
        println!("{} {pchtxt} -> {out_dir}", "converted".green());
        Ok(())
    }
}
