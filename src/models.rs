// src/models.rs

use serde::Serialize;

/// A single package command: an ordered list of string tokens. The first
/// token is the verb, the rest are verb-specific arguments. Tokens may still
/// contain unresolved `{...}` placeholder expressions.
pub type Command = Vec<String>;

/// Metadata extracted from the `;key=value` comment lines at the top of a
/// package's primary file. Re-derived on every inspection, never persisted.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PackageHeader {
    pub title: String,
    pub version: String,
    pub creator: String,
    pub about: String,
    pub credits: String,
    pub color: String,
    pub show_version: bool,
    pub show_widget: bool,
}

/// How a menu option behaves when activated.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OptionMode {
    /// Run the whole command list immediately.
    #[default]
    Default,
    /// Stateful on/off switch; commands are bucketed into `on:`/`off:` lists.
    Toggle,
    /// Single-select with memory of the last chosen item.
    Option,
}

impl OptionMode {
    pub fn parse(value: &str) -> Self {
        match value {
            "toggle" => OptionMode::Toggle,
            "option" => OptionMode::Option,
            _ => OptionMode::Default,
        }
    }
}

/// Presentation grouping for selection candidates. Inert to execution.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    #[default]
    Default,
    /// Group candidates under per-parent-directory headers.
    Split,
}

impl Grouping {
    pub fn parse(value: &str) -> Self {
        match value {
            "split" => Grouping::Split,
            _ => Grouping::Default,
        }
    }
}

/// Every verb the interpreter knows how to dispatch. Resolved once per
/// command through [`CommandVerb::parse`]; anything not in the table becomes
/// [`CommandVerb::Unknown`] and is skipped, which keeps old engines
/// forward-compatible with newer package files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandVerb {
    MakeDir,
    Copy,
    Delete,
    Move,
    Download,
    Unzip,
    IniFile,
    SetIniValue,
    SetIniKey,
    HexFile,
    PchtxtToIps,
    Reboot,
    Shutdown,
    Refresh,
    Source,
    SourceOn,
    SourceOff,
    JsonSource,
    JsonFileSource,
    ListSource,
    Filter,
    FilterOn,
    FilterOff,
    ModeDirective,
    GroupingDirective,
    Unknown,
}

/// Verb lookup table. Aliases share a row with their canonical spelling.
static VERB_TABLE: &[(&str, CommandVerb)] = &[
    ("make", CommandVerb::MakeDir),
    ("mkdir", CommandVerb::MakeDir),
    ("make_dir", CommandVerb::MakeDir),
    ("copy", CommandVerb::Copy),
    ("cp", CommandVerb::Copy),
    ("delete", CommandVerb::Delete),
    ("del", CommandVerb::Delete),
    ("move", CommandVerb::Move),
    ("mv", CommandVerb::Move),
    ("rename", CommandVerb::Move),
    ("download", CommandVerb::Download),
    ("unzip", CommandVerb::Unzip),
    ("ini_file", CommandVerb::IniFile),
    ("set-ini-val", CommandVerb::SetIniValue),
    ("set-ini-value", CommandVerb::SetIniValue),
    ("set-ini-key", CommandVerb::SetIniKey),
    ("hex_file", CommandVerb::HexFile),
    ("pchtxt2ips", CommandVerb::PchtxtToIps),
    ("reboot", CommandVerb::Reboot),
    ("shutdown", CommandVerb::Shutdown),
    ("refresh", CommandVerb::Refresh),
    ("source", CommandVerb::Source),
    ("file_source", CommandVerb::Source),
    ("source_on", CommandVerb::SourceOn),
    ("source_off", CommandVerb::SourceOff),
    ("json_source", CommandVerb::JsonSource),
    ("json_file_source", CommandVerb::JsonFileSource),
    ("list_source", CommandVerb::ListSource),
    ("filter", CommandVerb::Filter),
    ("filter_on", CommandVerb::FilterOn),
    ("filter_off", CommandVerb::FilterOff),
];

impl CommandVerb {
    /// Maps a verb token to its handler variant. The `mode=`/`grouping=`
    /// directives carry their value inside the token itself, so they are
    /// matched by prefix rather than by table row.
    pub fn parse(token: &str) -> Self {
        if token.starts_with("mode=") {
            return CommandVerb::ModeDirective;
        }
        if token.starts_with("grouping=") {
            return CommandVerb::GroupingDirective;
        }
        VERB_TABLE
            .iter()
            .find(|(name, _)| *name == token)
            .map(|(_, verb)| *verb)
            .unwrap_or(CommandVerb::Unknown)
    }

    /// Source-family verbs are consumed during option resolution and are
    /// no-ops when encountered in the dispatch loop.
    pub fn is_source_directive(self) -> bool {
        matches!(
            self,
            CommandVerb::Source
                | CommandVerb::SourceOn
                | CommandVerb::SourceOff
                | CommandVerb::JsonSource
                | CommandVerb::JsonFileSource
                | CommandVerb::ListSource
                | CommandVerb::Filter
                | CommandVerb::FilterOn
                | CommandVerb::FilterOff
                | CommandVerb::ModeDirective
                | CommandVerb::GroupingDirective
        )
    }
}

/// Outcome of one dispatched command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
    /// Unknown verb or source directive; never counts against success.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// The command as written (tokens joined), for logging and reporting.
    pub command: String,
    pub status: OutcomeStatus,
}

/// Result of interpreting a full command list. Execution is best-effort:
/// every command runs regardless of earlier failures, and the aggregate
/// success is derived from the per-command outcomes.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub outcomes: Vec<CommandOutcome>,
}

impl ExecutionReport {
    pub fn success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| o.status != OutcomeStatus::Failed)
    }
}

/// Host actions requested by control verbs. Console power management is the
/// host's business; the interpreter only records the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    Reboot,
    Shutdown,
}
