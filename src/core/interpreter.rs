//! The command interpreter: walks a section's command list in file order,
//! resolves placeholders per token just before dispatch, and routes each
//! verb to its engine. Execution is best-effort: a failed command is logged
//! and recorded, never fatal to the rest of the list.

use crate::constants::CONFIG_FILENAME;
use crate::core::fileops::{self, FileOps};
use crate::core::hexpatch::HexPatcher;
use crate::core::ini::IniStore;
use crate::core::patch;
use crate::core::paths::PathResolver;
use crate::core::placeholder;
use crate::core::signals::ProgressSignals;
use crate::core::strings;
use crate::models::{
    Command, CommandOutcome, CommandVerb, ControlRequest, ExecutionReport, Grouping, OptionMode,
    OutcomeStatus,
};
use crate::system::{archive, download};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// One option's command list after directive extraction and candidate
/// resolution. Produced by [`Interpreter::resolve_option`]; the host
/// renders `candidates` (or the toggle partitions) and then calls back
/// into [`Interpreter::execute`] / [`Interpreter::execute_for_item`].
#[derive(Debug, Default)]
pub struct ResolvedOption {
    pub mode: OptionMode,
    pub grouping: Grouping,
    pub source: SourceKind,
    /// Selection candidates after filtering, in expansion order.
    pub candidates: Vec<String>,
    /// Toggle mode: items currently on / currently available to turn on.
    pub toggle_on: Vec<String>,
    pub toggle_off: Vec<String>,
    /// Parsed items backing a JSON source, index-aligned with `candidates`.
    pub json_items: Vec<Value>,
    /// Commands shared by both toggle states (and the whole list for
    /// non-toggle options).
    pub commands: Vec<Command>,
    pub on_commands: Vec<Command>,
    pub off_commands: Vec<Command>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    #[default]
    None,
    Files,
    List,
    Json,
    JsonFile,
}

/// The selected item an option's commands are re-run against.
pub enum SourceItem<'a> {
    /// File path or list entry; substitutes `{source}`, `{name}` and
    /// `{folder_name}`.
    Literal(&'a str),
    /// JSON object from a `json_source`; substitutes
    /// `{json_source(key,...)}` navigation.
    Json(&'a Value),
    /// Entry of a `list_source`; substitutes `{source}` with the selected
    /// entry and `{list_source(index)}` against the whole list.
    List {
        items: &'a [String],
        selected: &'a str,
    },
}

pub struct Interpreter {
    signals: Arc<ProgressSignals>,
    ini: Arc<IniStore>,
    hex: Arc<HexPatcher>,
    fileops: FileOps,
    /// Volume prefix (`sdmc:` on console, empty on hosts) prepended to
    /// absolute paths in commands.
    root_prefix: String,
    control: Mutex<Option<ControlRequest>>,
}

impl Interpreter {
    pub fn new(root_prefix: impl Into<String>) -> Self {
        let signals = Arc::new(ProgressSignals::new());
        let resolver = Arc::new(PathResolver::new());
        Self {
            fileops: FileOps::new(resolver, signals.clone()),
            signals,
            ini: Arc::new(IniStore::new()),
            hex: Arc::new(HexPatcher::new()),
            root_prefix: root_prefix.into(),
            control: Mutex::new(None),
        }
    }

    pub fn signals(&self) -> &Arc<ProgressSignals> {
        &self.signals
    }

    pub fn ini(&self) -> &Arc<IniStore> {
        &self.ini
    }

    /// The reboot/shutdown request recorded by the last execution, if any.
    /// Reading clears it.
    pub fn take_control_request(&self) -> Option<ControlRequest> {
        self.control.lock().expect("control slot poisoned").take()
    }

    /// Normalizes a path argument: strips quotes, collapses `//`, and
    /// prefixes the volume root on absolute paths.
    pub fn preprocess_path(&self, token: &str) -> String {
        let cleaned = strings::collapse_slashes(strings::remove_quotes(token));
        if !self.root_prefix.is_empty()
            && cleaned.starts_with('/')
            && !cleaned.starts_with(&self.root_prefix)
        {
            format!("{}{cleaned}", self.root_prefix)
        } else {
            cleaned
        }
    }

    /// Extracts directives and candidate sources from an option's command
    /// list without executing anything.
    pub fn resolve_option(&self, commands: &[Command]) -> ResolvedOption {
        let mut option = ResolvedOption::default();
        let mut bucket = Bucket::Global;
        let mut explicit_on: Vec<String> = Vec::new();
        let mut explicit_off: Vec<String> = Vec::new();
        let mut filters: Vec<String> = Vec::new();
        let mut filters_on: Vec<String> = Vec::new();
        let mut filters_off: Vec<String> = Vec::new();
        let mut partitioned = false;

        for command in commands {
            let Some(first) = command.first() else {
                continue;
            };
            match first.as_str() {
                "on:" => {
                    bucket = Bucket::On;
                    if command.len() > 1 {
                        option.on_commands.push(command[1..].to_vec());
                    }
                    continue;
                }
                "off:" => {
                    bucket = Bucket::Off;
                    if command.len() > 1 {
                        option.off_commands.push(command[1..].to_vec());
                    }
                    continue;
                }
                _ => {}
            }

            match CommandVerb::parse(first) {
                CommandVerb::ModeDirective => {
                    option.mode = OptionMode::parse(strings::value_from_line(first));
                }
                CommandVerb::GroupingDirective => {
                    option.grouping = Grouping::parse(strings::value_from_line(first));
                }
                CommandVerb::Source => {
                    if let Some(pattern) = command.get(1) {
                        option.source = SourceKind::Files;
                        option.candidates = self
                            .fileops
                            .resolver()
                            .list_by_wildcards(&self.preprocess_path(pattern));
                    }
                }
                CommandVerb::SourceOn => {
                    if let Some(pattern) = command.get(1) {
                        partitioned = true;
                        explicit_on = self
                            .fileops
                            .resolver()
                            .list_by_wildcards(&self.preprocess_path(pattern));
                    }
                }
                CommandVerb::SourceOff => {
                    if let Some(pattern) = command.get(1) {
                        partitioned = true;
                        explicit_off = self
                            .fileops
                            .resolver()
                            .list_by_wildcards(&self.preprocess_path(pattern));
                    }
                }
                CommandVerb::ListSource => {
                    if let Some(list) = command.get(1) {
                        option.source = SourceKind::List;
                        option.candidates = list
                            .split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(str::to_string)
                            .collect();
                    }
                }
                CommandVerb::JsonSource | CommandVerb::JsonFileSource => {
                    let from_file = CommandVerb::parse(first) == CommandVerb::JsonFileSource;
                    self.load_json_source(&mut option, command, from_file);
                }
                CommandVerb::Filter => {
                    if let Some(prefix) = command.get(1) {
                        filters.push(self.preprocess_path(prefix));
                    }
                }
                CommandVerb::FilterOn => {
                    if let Some(prefix) = command.get(1) {
                        partitioned = true;
                        filters_on.push(self.preprocess_path(prefix));
                    }
                }
                CommandVerb::FilterOff => {
                    if let Some(prefix) = command.get(1) {
                        partitioned = true;
                        filters_off.push(self.preprocess_path(prefix));
                    }
                }
                _ => match bucket {
                    Bucket::Global => {
                        option.commands.push(command.clone());
                        option.on_commands.push(command.clone());
                        option.off_commands.push(command.clone());
                    }
                    Bucket::On => option.on_commands.push(command.clone()),
                    Bucket::Off => option.off_commands.push(command.clone()),
                },
            }
        }

        // Filters collect during the pass and apply only once every source
        // has resolved, so a filter written above its source still takes.
        option
            .candidates
            .retain(|c| !filters.iter().any(|f| c.starts_with(f.as_str())));
        explicit_on.retain(|c| !filters_on.iter().any(|f| c.starts_with(f.as_str())));
        explicit_off.retain(|c| !filters_off.iter().any(|f| c.starts_with(f.as_str())));

        // Partition directives imply a toggle even without mode=toggle.
        if partitioned && option.mode == OptionMode::Default {
            option.mode = OptionMode::Toggle;
        }
        if option.mode == OptionMode::Toggle {
            if explicit_on.is_empty() && explicit_off.is_empty() {
                // No explicit partitions: everything starts available-off.
                option.toggle_off = option.candidates.clone();
            } else {
                if option.candidates.is_empty() {
                    option.candidates = explicit_on.iter().chain(&explicit_off).cloned().collect();
                }
                option.toggle_on = explicit_on;
                option.toggle_off = explicit_off;
                if option.source == SourceKind::None {
                    option.source = SourceKind::Files;
                }
            }
        }
        option
    }

    fn load_json_source(&self, option: &mut ResolvedOption, command: &Command, from_file: bool) {
        let Some(payload) = command.get(1) else {
            return;
        };
        let parsed: Option<Value> = if from_file {
            std::fs::read_to_string(self.preprocess_path(payload))
                .ok()
                .and_then(|text| serde_json::from_str(&text).ok())
        } else {
            serde_json::from_str(payload).ok()
        };
        let Some(Value::Array(items)) = parsed else {
            log::warn!("json source is not an array");
            return;
        };
        option.source = if from_file {
            SourceKind::JsonFile
        } else {
            SourceKind::Json
        };
        let key = command.get(2).map(String::as_str).unwrap_or("name");
        for item in &items {
            if let Some(Value::String(label)) = item.get(key) {
                option.candidates.push(label.clone());
            }
        }
        option.json_items = items;
    }

    /// Runs a command list in order. Placeholders are resolved per token
    /// immediately before each dispatch, so a command can consume values
    /// produced by its predecessors.
    pub fn execute(&self, commands: &[Command]) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        let mut hex_target: Option<String> = None;

        for command in commands {
            let Some(first) = command.first() else {
                continue;
            };
            let verb = CommandVerb::parse(first);
            // hex_file placeholders in this and later commands read from
            // the file this command names.
            if verb == CommandVerb::HexFile {
                if let Some(path) = command.get(1) {
                    hex_target = Some(self.preprocess_path(path));
                }
            }

            let resolved: Command = command
                .iter()
                .map(|token| {
                    placeholder::resolve_command_token(token, hex_target.as_deref(), &self.hex)
                })
                .collect();

            let status = self.dispatch(verb, &resolved);
            if status == OutcomeStatus::Failed {
                log::warn!("command failed: {}", resolved.join(" "));
            }
            report.outcomes.push(CommandOutcome {
                command: resolved.join(" "),
                status,
            });
        }
        report
    }

    /// Substitutes the selected item into every token, then executes.
    pub fn execute_for_item(&self, commands: &[Command], item: &SourceItem<'_>) -> ExecutionReport {
        let substituted: Vec<Command> = commands
            .iter()
            .map(|command| {
                command
                    .iter()
                    .map(|token| self.substitute_item(token, item))
                    .collect()
            })
            .collect();
        self.execute(&substituted)
    }

    fn substitute_item(&self, token: &str, item: &SourceItem<'_>) -> String {
        match item {
            SourceItem::Literal(value) => {
                let mut out = placeholder::replace_literal(token, "{source}", value);
                out = placeholder::replace_literal(
                    &out,
                    "{name}",
                    strings::drop_extension(strings::name_from_path(value)),
                );
                placeholder::replace_literal(
                    &out,
                    "{folder_name}",
                    &strings::parent_dir_name_from_path(value),
                )
            }
            SourceItem::Json(value) => {
                let out = placeholder::resolve_source_json(token, "{json_source(", value);
                placeholder::resolve_source_json(&out, "{json_file_source(", value)
            }
            SourceItem::List { items, selected } => {
                let out = placeholder::replace_literal(token, "{source}", selected);
                placeholder::resolve_source_list(&out, items)
            }
        }
    }

    fn dispatch(&self, verb: CommandVerb, command: &Command) -> OutcomeStatus {
        use OutcomeStatus::{Failed, Skipped, Succeeded};

        if verb.is_source_directive() {
            return Skipped;
        }
        let args = &command[1..];
        let done = |ok: bool| if ok { Succeeded } else { Failed };

        match verb {
            CommandVerb::MakeDir => {
                let Some(path) = args.first() else {
                    return Failed;
                };
                done(self.fileops.make_directory(&self.preprocess_path(path)))
            }
            CommandVerb::Copy => {
                let (Some(src), Some(dst)) = (args.first(), args.get(1)) else {
                    return Failed;
                };
                let src = self.preprocess_path(src);
                let dst = self.preprocess_path(dst);
                if src.contains('*') {
                    done(self.fileops.copy_by_pattern(&src, &dst))
                } else {
                    done(self.fileops.copy_path(&src, &dst))
                }
            }
            CommandVerb::Delete => {
                let Some(target) = args.first() else {
                    return Failed;
                };
                let target = self.preprocess_path(target);
                if fileops::is_dangerous_combination(&target, &self.root_prefix) {
                    log::warn!("refusing to delete protected path: {target}");
                    return Failed;
                }
                if target.contains('*') {
                    done(self.fileops.delete_by_pattern(&target))
                } else {
                    done(self.fileops.delete(&target))
                }
            }
            CommandVerb::Move => {
                let (Some(src), Some(dst)) = (args.first(), args.get(1)) else {
                    return Failed;
                };
                let src = self.preprocess_path(src);
                let dst = self.preprocess_path(dst);
                if fileops::is_dangerous_combination(&src, &self.root_prefix)
                    || fileops::is_dangerous_combination(&dst, &self.root_prefix)
                {
                    log::warn!("refusing to move protected path: {src} -> {dst}");
                    return Failed;
                }
                if src.contains('*') {
                    done(self.fileops.move_by_pattern(&src, &dst))
                } else {
                    done(self.fileops.move_path(&src, &dst))
                }
            }
            CommandVerb::Download => {
                let (Some(url), Some(dest)) = (args.first(), args.get(1)) else {
                    return Failed;
                };
                let dest = self.preprocess_path(dest);
                match download::download(strings::remove_quotes(url), &dest, &self.signals) {
                    Ok(()) => Succeeded,
                    Err(e) => {
                        log::warn!("download failed: {e}");
                        Failed
                    }
                }
            }
            CommandVerb::Unzip => {
                let (Some(archive_path), Some(dest)) = (args.first(), args.get(1)) else {
                    return Failed;
                };
                let archive_path = self.preprocess_path(archive_path);
                let dest = self.preprocess_path(dest);
                match archive::extract_zip(&archive_path, &dest, &self.signals) {
                    Ok(()) => Succeeded,
                    Err(e) => {
                        log::warn!("unzip failed: {e}");
                        Failed
                    }
                }
            }
            CommandVerb::IniFile => self.dispatch_ini_file(args),
            CommandVerb::SetIniValue => {
                let [path, section, key, value] = args else {
                    return Failed;
                };
                let path = self.preprocess_path(path);
                let ok = self.ini.set_value(&path, section, key, value);
                self.signals.mark_needs_refresh();
                done(log_ini(ok))
            }
            CommandVerb::SetIniKey => {
                let [path, section, key, new_key] = args else {
                    return Failed;
                };
                let path = self.preprocess_path(path);
                let ok = self.ini.set_key(&path, section, key, new_key);
                self.signals.mark_needs_refresh();
                done(log_ini(ok))
            }
            CommandVerb::HexFile => self.dispatch_hex_file(args),
            CommandVerb::PchtxtToIps => {
                let (Some(pchtxt), Some(out_dir)) = (args.first(), args.get(1)) else {
                    return Failed;
                };
                done(patch::pchtxt_to_ips(
                    &self.preprocess_path(pchtxt),
                    &self.preprocess_path(out_dir),
                ))
            }
            CommandVerb::Reboot => {
                *self.control.lock().expect("control slot poisoned") =
                    Some(ControlRequest::Reboot);
                Succeeded
            }
            CommandVerb::Shutdown => {
                *self.control.lock().expect("control slot poisoned") =
                    Some(ControlRequest::Shutdown);
                Succeeded
            }
            CommandVerb::Refresh => {
                self.signals.mark_needs_refresh();
                Succeeded
            }
            CommandVerb::Unknown => {
                log::debug!("skipping unknown verb: {}", command.join(" "));
                Skipped
            }
            _ => Skipped,
        }
    }

    /// `ini_file <subcommand> <path> <args...>`: set, set_key, remove_key,
    /// remove_section, add_section, rename_section, clean.
    fn dispatch_ini_file(&self, args: &[String]) -> OutcomeStatus {
        use OutcomeStatus::{Failed, Succeeded};
        let (Some(sub), Some(path)) = (args.first(), args.get(1)) else {
            return Failed;
        };
        let path = self.preprocess_path(path);
        let ok = match (sub.as_str(), &args[2..]) {
            ("set", [section, key, value]) => log_ini(self.ini.set_value(&path, section, key, value)),
            ("set_key", [section, key, new_key]) => {
                log_ini(self.ini.set_key(&path, section, key, new_key))
            }
            ("remove_key", [section, key]) => log_ini(self.ini.remove_key(&path, section, key)),
            ("remove_section", [section]) => log_ini(self.ini.remove_section(&path, section)),
            ("add_section", [section]) => log_ini(self.ini.add_section(&path, section)),
            ("rename_section", [from, to]) => log_ini(self.ini.rename_section(&path, from, to)),
            ("clean", []) => log_ini(self.ini.clean_formatting(&path)),
            _ => {
                log::warn!("malformed ini_file command: {}", args.join(" "));
                false
            }
        };
        self.signals.mark_needs_refresh();
        if ok { Succeeded } else { Failed }
    }

    /// `hex_file <path> offset <offset> <hexdata>` patches at an absolute
    /// offset; `hex_file <path> <findhex> <replacehex> [occurrence]` does a
    /// find/replace where occurrence 0 (the default) means every match.
    fn dispatch_hex_file(&self, args: &[String]) -> OutcomeStatus {
        use OutcomeStatus::{Failed, Succeeded};
        let Some(path) = args.first() else {
            return Failed;
        };
        let path = self.preprocess_path(path);
        let ok = match &args[1..] {
            [keyword, offset, data] if keyword.as_str() == "offset" => match offset.parse::<u64>() {
                Ok(offset) => self.hex.patch_at_offset(&path, offset, data),
                Err(_) => false,
            },
            [find, replace] => self.hex.find_and_replace(&path, find, replace, 0),
            [find, replace, occurrence] => match occurrence.parse::<usize>() {
                Ok(n) => self.hex.find_and_replace(&path, find, replace, n),
                Err(_) => false,
            },
            _ => false,
        };
        if ok { Succeeded } else { Failed }
    }

    /// Persists the last chosen item of a `mode=option` option in the
    /// package's config file, and reads it back.
    pub fn remember_selection(&self, package_dir: &str, option: &str, item: &str) -> bool {
        let config = format!(
            "{}/{CONFIG_FILENAME}",
            strings::strip_trailing_slash(package_dir)
        );
        log_ini(self.ini.set_value(&config, option, "footer", item))
    }

    pub fn last_selection(&self, package_dir: &str, option: &str) -> String {
        let config = format!(
            "{}/{CONFIG_FILENAME}",
            strings::strip_trailing_slash(package_dir)
        );
        self.ini.value_from_file(&config, option, "footer")
    }
}

enum Bucket {
    Global,
    On,
    Off,
}

fn log_ini(result: Result<(), crate::core::ini::IniError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::warn!("{e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::package;
    use std::fs;
    use tempfile::TempDir;

    fn run(interpreter: &Interpreter, lines: &[&str]) -> ExecutionReport {
        let commands: Vec<Command> = lines
            .iter()
            .map(|l| package::parse_command_line(l))
            .collect();
        interpreter.execute(&commands)
    }

    #[test]
    fn ini_file_set_produces_expected_file() {
        let tmp = TempDir::new().unwrap();
        let cfg = tmp.path().join("cfg.ini");
        let interpreter = Interpreter::new("");
        let line = format!("ini_file set '{}' 'main' 'enabled' 'true'", cfg.display());
        let report = run(&interpreter, &[&line]);
        assert!(report.success());
        assert_eq!(fs::read_to_string(&cfg).unwrap(), "[main]\nenabled=true\n");
    }

    #[test]
    fn hex_find_replace_all() {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("target.bin");
        fs::write(&bin, [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        let interpreter = Interpreter::new("");
        let line = format!("hex_file '{}' 'DEADBEEF' 'C0FFEE00'", bin.display());
        assert!(run(&interpreter, &[&line]).success());
        let data = fs::read(&bin).unwrap();
        assert_eq!(&data[..4], &[0xC0, 0xFF, 0xEE, 0x00]);
        assert_eq!(&data[5..], &[0xC0, 0xFF, 0xEE, 0x00]);
    }

    #[test]
    fn copy_wildcard_section_end_to_end() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        for i in 0..10 {
            fs::write(src.join(format!("f{i}.bin")), [i as u8; 32]).unwrap();
        }
        let dst = tmp.path().join("dst");
        fs::create_dir_all(&dst).unwrap();

        let interpreter = Interpreter::new("");
        let line = format!("copy '{}/*' '{}/'", src.display(), dst.display());
        assert!(run(&interpreter, &[&line]).success());
        for i in 0..10 {
            assert_eq!(fs::read(dst.join(format!("f{i}.bin"))).unwrap(), [i as u8; 32]);
        }
        assert_eq!(interpreter.signals().copy.percent(), 100);
    }

    #[test]
    fn failures_do_not_stop_later_commands() {
        let tmp = TempDir::new().unwrap();
        let made = tmp.path().join("made");
        let interpreter = Interpreter::new("");
        let report = run(
            &interpreter,
            &[
                "delete '/nonexistent/definitely/missing.bin'",
                &format!("mkdir '{}'", made.display()),
            ],
        );
        assert!(!report.success());
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[0].status, OutcomeStatus::Failed);
        assert_eq!(report.outcomes[1].status, OutcomeStatus::Succeeded);
        assert!(made.is_dir());
    }

    #[test]
    fn unknown_verbs_and_source_directives_are_skipped() {
        let interpreter = Interpreter::new("");
        let report = run(
            &interpreter,
            &["frobnicate 'x'", "json_source '[]' 'name'", "mode=toggle"],
        );
        assert!(report.success());
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.status == OutcomeStatus::Skipped));
    }

    #[test]
    fn protected_roots_are_refused() {
        let interpreter = Interpreter::new("");
        let report = run(&interpreter, &["delete '/config/'"]);
        assert_eq!(report.outcomes[0].status, OutcomeStatus::Failed);
    }

    #[test]
    fn control_verbs_record_requests() {
        let interpreter = Interpreter::new("");
        assert!(run(&interpreter, &["reboot"]).success());
        assert_eq!(
            interpreter.take_control_request(),
            Some(ControlRequest::Reboot)
        );
        assert_eq!(interpreter.take_control_request(), None);
    }

    #[test]
    fn option_resolution_buckets_toggle_commands() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("mods/a")).unwrap();
        fs::create_dir_all(tmp.path().join("mods/b")).unwrap();

        let interpreter = Interpreter::new("");
        let commands: Vec<Command> = [
            "mode=toggle".to_string(),
            format!("source '{}/mods/*/'", tmp.path().display()),
            "mkdir '/tmp/shared/'".to_string(),
            "on:".to_string(),
            "copy '{source}' '/active/'".to_string(),
            "off:".to_string(),
            "delete '/active/{name}/'".to_string(),
        ]
        .iter()
        .map(|l| package::parse_command_line(l))
        .collect();

        let option = interpreter.resolve_option(&commands);
        assert_eq!(option.mode, OptionMode::Toggle);
        assert_eq!(option.source, SourceKind::Files);
        assert_eq!(option.candidates.len(), 2);
        assert_eq!(option.toggle_off.len(), 2);
        // Global command lands in both buckets, on:/off: only in theirs.
        assert_eq!(option.on_commands.len(), 2);
        assert_eq!(option.off_commands.len(), 2);
        assert_eq!(option.commands.len(), 1);
    }

    #[test]
    fn filter_applies_regardless_of_position() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("mods/a")).unwrap();
        fs::create_dir_all(tmp.path().join("mods/b")).unwrap();

        let interpreter = Interpreter::new("");
        let commands: Vec<Command> = [
            format!("filter '{}/mods/a/'", tmp.path().display()),
            format!("source '{}/mods/*/'", tmp.path().display()),
        ]
        .iter()
        .map(|l| package::parse_command_line(l))
        .collect();

        let option = interpreter.resolve_option(&commands);
        assert_eq!(option.candidates.len(), 1);
        assert!(option.candidates[0].ends_with("mods/b/"));
    }

    #[test]
    fn explicit_partitions_imply_toggle_and_union_candidates() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("on/x")).unwrap();
        fs::create_dir_all(tmp.path().join("off/y")).unwrap();

        let interpreter = Interpreter::new("");
        let commands: Vec<Command> = [
            format!("source_on '{}/on/*/'", tmp.path().display()),
            format!("source_off '{}/off/*/'", tmp.path().display()),
        ]
        .iter()
        .map(|l| package::parse_command_line(l))
        .collect();

        let option = interpreter.resolve_option(&commands);
        assert_eq!(option.mode, OptionMode::Toggle);
        assert_eq!(option.source, SourceKind::Files);
        assert_eq!(option.toggle_on.len(), 1);
        assert_eq!(option.toggle_off.len(), 1);
        // The selection list is the union of both partitions.
        assert_eq!(option.candidates.len(), 2);
        assert!(option.candidates[0].ends_with("on/x/"));
        assert!(option.candidates[1].ends_with("off/y/"));
    }

    #[test]
    fn json_source_items_drive_substitution() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out.ini");
        let interpreter = Interpreter::new("");
        let commands: Vec<Command> = [
            r#"json_source '[{"name":"x","value":"1"},{"name":"y","value":"2"}]' 'name'"#
                .to_string(),
            format!(
                "ini_file set '{}' 'sel' 'chosen' '{{json_source(name)}}'",
                out.display()
            ),
        ]
        .iter()
        .map(|l| package::parse_command_line(l))
        .collect();

        let option = interpreter.resolve_option(&commands);
        assert_eq!(option.candidates, vec!["x", "y"]);
        let selected = &option.json_items[1];
        let report =
            interpreter.execute_for_item(&option.commands, &SourceItem::Json(selected));
        assert!(report.success());
        assert_eq!(
            interpreter.ini().value_from_file(&out.to_string_lossy(), "sel", "chosen"),
            "y"
        );
    }

    #[test]
    fn option_memory_round_trips() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().to_string_lossy().into_owned();
        let interpreter = Interpreter::new("");
        assert_eq!(interpreter.last_selection(&dir, "My Option"), "");
        assert!(interpreter.remember_selection(&dir, "My Option", "variant-b"));
        assert_eq!(interpreter.last_selection(&dir, "My Option"), "variant-b");
    }

    #[test]
    fn root_prefix_is_prepended_once() {
        let interpreter = Interpreter::new("sdmc:");
        assert_eq!(interpreter.preprocess_path("'/config/x'"), "sdmc:/config/x");
        assert_eq!(interpreter.preprocess_path("sdmc:/config/x"), "sdmc:/config/x");
        assert_eq!(interpreter.preprocess_path("relative/x"), "relative/x");
    }
}
