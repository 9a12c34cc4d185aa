// src/bin/handpack.rs

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use handpack::cli::{Cli, handlers};

/// Defines one action, its aliases, and its handler. The handler signature
/// is the same for every action so the registry stays a flat table.
struct ActionDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>) -> Result<()>,
}

/// The single source of truth for the binary's actions. Adding an action
/// is one new entry here.
static ACTION_REGISTRY: &[ActionDefinition] = &[
    ActionDefinition {
        name: "run",
        aliases: &[],
        handler: handlers::run,
    },
    ActionDefinition {
        name: "sections",
        aliases: &["ls"],
        handler: handlers::sections,
    },
    ActionDefinition {
        name: "info",
        aliases: &[],
        handler: handlers::info,
    },
    ActionDefinition {
        name: "fetch",
        aliases: &["download"],
        handler: handlers::fetch,
    },
    ActionDefinition {
        name: "extract",
        aliases: &["unzip"],
        handler: handlers::extract,
    },
    ActionDefinition {
        name: "pchtxt2ips",
        aliases: &[],
        handler: handlers::pchtxt2ips,
    },
];

fn find_action(name: &str) -> Option<&'static ActionDefinition> {
    ACTION_REGISTRY
        .iter()
        .find(|action| action.name == name || action.aliases.contains(&name))
}

fn main() {
    env_logger::init();

    if let Err(e) = run_cli(Cli::parse()) {
        eprintln!("\n{}: {e:#}", "Error".red().bold());
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {cli:?}");

    let Some(action_name) = cli.action else {
        // arg_required_else_help shows usage before we ever get here.
        return Ok(());
    };

    match find_action(&action_name) {
        Some(action) => (action.handler)(cli.args),
        None => anyhow::bail!(
            "unknown action '{}'; expected one of: {}",
            action_name,
            ACTION_REGISTRY
                .iter()
                .map(|a| a.name)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}
