// src/main.rs

use grocery_keeper::app_logic::{
    APP_NAME, AppLogicError, AutosaveOutcome, GroceryAppLogic, NewItem, SortKey, SortOrder,
};
use grocery_keeper::core::config::{ConfigManagerOperations, CoreConfigManager};
use grocery_keeper::core::export::stats_rows;
use grocery_keeper::core::{
    AppConfig, CoreGroceryStore, ExportDocument, FileStorageBackend, ListTransition,
    RepeatingTimer, SystemClock, Theme, path_utils, write_export,
};

use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

const LOG_FILENAME: &str = "grocery_keeper.log";

const USAGE: &str = "\
Usage: grocery_keeper <command>
  list [search] [name|category] [asc|desc]
  add <name> [quantity] [category] [notes]
  toggle <id>
  remove <id>
  keep                     commit checked items and uncheck them
  clear                    commit checked items and remove them
  uncheck                  uncheck every item without committing
  history [yyyy-mm-dd]
  top
  stats
  export <list|history|day|top|stats> [yyyy-mm-dd] [dir]
  theme [light|dark]
  reset <all|history|top>
  watch <seconds>          run the autosave loop";

#[derive(Debug)]
enum CommandError {
    Usage(String),
    App(AppLogicError),
}

impl From<AppLogicError> for CommandError {
    fn from(err: AppLogicError) -> Self {
        CommandError::App(err)
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Usage(message) => write!(f, "{message}\n\n{USAGE}"),
            CommandError::App(e) => write!(f, "{e}"),
        }
    }
}

type CommandResult = Result<(), CommandError>;

/*
 * Sets up a combined logger: the terminal at the configured level, and a
 * debug-level log file in the application config directory when it can be
 * opened.
 */
fn init_logging(config: &AppConfig) {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        config.log_level_filter(),
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    let log_file = path_utils::get_base_app_config_local_dir(APP_NAME).and_then(|dir| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILENAME))
            .ok()
    });
    if let Some(file) = log_file {
        loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file));
    }

    if let Err(e) = CombinedLogger::init(loggers) {
        eprintln!("Failed to initialize logger: {e}");
    }
}

fn load_config() -> AppConfig {
    let config_manager = CoreConfigManager::new();
    match config_manager.load_config(APP_NAME) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Could not load configuration ({e}); using defaults.");
            AppConfig::default()
        }
    }
}

fn store_dir(config: &AppConfig) -> Option<PathBuf> {
    config
        .data_dir
        .clone()
        .or_else(|| path_utils::get_default_store_dir(APP_NAME))
}

fn arg<'a>(args: &'a [String], index: usize, what: &str) -> Result<&'a str, CommandError> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| CommandError::Usage(format!("Missing {what}.")))
}

fn parse_id(text: &str) -> Result<i64, CommandError> {
    text.parse()
        .map_err(|_| CommandError::Usage(format!("'{text}' is not an item id.")))
}

fn report_transition(transition: ListTransition, verb: &str) {
    match transition {
        ListTransition::NothingToDo => println!("No checked item to {verb}."),
        ListTransition::Committed(result) => println!(
            "{} item(s) added to the history ({} records).",
            result.committed, result.history_len
        ),
    }
}

fn cmd_list(logic: &GroceryAppLogic, args: &[String]) -> CommandResult {
    let search = args.first().map(String::as_str).unwrap_or("");
    let key = match args.get(1).map(String::as_str) {
        None | Some("name") => SortKey::Name,
        Some("category") => SortKey::Category,
        Some(other) => return Err(CommandError::Usage(format!("Unknown sort key '{other}'."))),
    };
    let order = match args.get(2).map(String::as_str) {
        None | Some("asc") => SortOrder::Ascending,
        Some("desc") => SortOrder::Descending,
        Some(other) => return Err(CommandError::Usage(format!("Unknown order '{other}'."))),
    };

    for item in logic.visible_items(search, key, order) {
        let mark = if item.checked { "x" } else { " " };
        let notes = if item.notes.is_empty() {
            String::new()
        } else {
            format!(" - {}", item.notes)
        };
        println!(
            "[{mark}] {:>13}  {} x{} ({}){notes}",
            item.id,
            item.name,
            item.quantity,
            item.display_category()
        );
    }
    println!(
        "{}/{} checked, {}/{} units.",
        logic.checked_count(),
        logic.items().len(),
        logic.checked_quantity(),
        logic.total_quantity()
    );
    if logic.is_complete() {
        println!("Everything is in the basket.");
    }
    Ok(())
}

fn cmd_add(logic: &mut GroceryAppLogic, args: &[String]) -> CommandResult {
    let name = arg(args, 0, "item name")?;
    let quantity = match args.get(1) {
        Some(text) => text
            .parse()
            .map_err(|_| CommandError::Usage(format!("'{text}' is not a quantity.")))?,
        None => 1,
    };
    let id = logic.add_item(NewItem {
        name: name.to_string(),
        quantity,
        category: args.get(2).cloned().unwrap_or_default(),
        notes: args.get(3).cloned().unwrap_or_default(),
    })?;
    println!("Added '{name}' with id {id}.");
    Ok(())
}

fn cmd_history(logic: &GroceryAppLogic, args: &[String]) -> CommandResult {
    if let Some(day) = args.first() {
        for record in logic.history().iter().filter(|r| r.is_on_day(day)) {
            println!(
                "{}  {} x{} ({})",
                grocery_keeper::core::models::display_time(record.purchased_at),
                record.name,
                record.quantity,
                record.display_category()
            );
        }
        return Ok(());
    }
    for (day, records) in logic.history_by_day() {
        let units: u64 = records.iter().map(|r| r.effective_quantity()).sum();
        println!("{day}: {} purchase(s), {units} unit(s)", records.len());
    }
    Ok(())
}

fn cmd_export(logic: &GroceryAppLogic, args: &[String]) -> CommandResult {
    let kind = arg(args, 0, "export kind")?;
    let (document, dir_index): (Option<ExportDocument>, usize) = match kind {
        "list" => (logic.export_active_list(), 1),
        "history" => (logic.export_full_history(), 1),
        "day" => (logic.export_day_history(arg(args, 1, "day")?), 2),
        "top" => (logic.export_frequency(), 1),
        "stats" => (Some(logic.export_stats()), 1),
        other => return Err(CommandError::Usage(format!("Unknown export '{other}'."))),
    };
    let Some(document) = document else {
        println!("Nothing to export.");
        return Ok(());
    };
    let directory = PathBuf::from(args.get(dir_index).map(String::as_str).unwrap_or("."));
    let path = write_export(&directory, &document).map_err(AppLogicError::from)?;
    println!("Exported {}.", path.display());
    Ok(())
}

fn cmd_reset(logic: &mut GroceryAppLogic, args: &[String]) -> CommandResult {
    match arg(args, 0, "what to reset")? {
        "all" => logic.reset_all()?,
        "history" => logic.reset_history()?,
        "top" => logic.reset_frequency_counters()?,
        other => return Err(CommandError::Usage(format!("Unknown reset '{other}'."))),
    }
    println!("Reset done.");
    Ok(())
}

/*
 * Runs the autosave loop for the given number of seconds. The timer only
 * ticks; saving happens here on the main thread.
 */
fn cmd_watch(logic: &GroceryAppLogic, config: &AppConfig, args: &[String]) -> CommandResult {
    let text = arg(args, 0, "duration in seconds")?;
    let seconds: u64 = text
        .parse()
        .map_err(|_| CommandError::Usage(format!("'{text}' is not a number of seconds.")))?;
    let deadline = Instant::now() + Duration::from_secs(seconds);
    let mut timer = RepeatingTimer::start(config.autosave_interval());

    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        if !timer.wait_tick(remaining) {
            continue;
        }
        match logic.autosave()? {
            AutosaveOutcome::Skipped => log::debug!("Watch: Empty list, autosave skipped."),
            AutosaveOutcome::Saved => log::info!("Watch: Session saved."),
            AutosaveOutcome::StorageFull {
                megabytes,
                ceiling_mb,
            } => println!(
                "Storage full! History takes {megabytes} MB (limit {ceiling_mb} MB). Export and clear the history."
            ),
        }
    }
    timer.stop();
    Ok(())
}

fn run(logic: &mut GroceryAppLogic, config: &AppConfig, args: &[String]) -> CommandResult {
    let Some((command, rest)) = args.split_first() else {
        return Err(CommandError::Usage("No command given.".to_string()));
    };
    match command.as_str() {
        "list" => cmd_list(logic, rest),
        "add" => cmd_add(logic, rest),
        "toggle" => {
            let checked = logic.toggle_item(parse_id(arg(rest, 0, "item id")?)?)?;
            println!("{}", if checked { "Checked." } else { "Unchecked." });
            Ok(())
        }
        "remove" => {
            let removed = logic.delete_item(parse_id(arg(rest, 0, "item id")?)?)?;
            println!("Removed '{}'.", removed.name);
            Ok(())
        }
        "keep" => {
            report_transition(logic.validate_and_keep()?, "validate");
            Ok(())
        }
        "clear" => {
            report_transition(logic.validate_and_clear()?, "clear");
            Ok(())
        }
        "uncheck" => {
            if !logic.reset_checked()? {
                println!("No checked item to reset.");
            }
            Ok(())
        }
        "history" => cmd_history(logic, rest),
        "top" => {
            for (name, count) in logic.counters().ranked() {
                println!("{count:>6}  {name}");
            }
            Ok(())
        }
        "stats" => {
            for (label, value) in stats_rows(&logic.stats()) {
                println!("{label}: {value}");
            }
            Ok(())
        }
        "export" => cmd_export(logic, rest),
        "theme" => {
            let theme = match rest.first() {
                Some(value) => {
                    let theme = Theme::parse(value);
                    logic.set_theme(theme)?;
                    theme
                }
                None => logic.toggle_theme()?,
            };
            println!("Theme: {}", theme.as_str());
            Ok(())
        }
        "reset" => cmd_reset(logic, rest),
        "watch" => cmd_watch(logic, config, rest),
        other => Err(CommandError::Usage(format!("Unknown command '{other}'."))),
    }
}

fn main() -> ExitCode {
    let config = load_config();
    init_logging(&config);
    log::debug!("Main: Configuration: {config:?}");

    let Some(dir) = store_dir(&config) else {
        log::error!("Main: Could not determine a directory for the grocery data.");
        return ExitCode::FAILURE;
    };
    let backend = match FileStorageBackend::open(&dir) {
        Ok(backend) => backend,
        Err(e) => {
            log::error!("Main: Could not open the store at {dir:?}: {e}");
            return ExitCode::FAILURE;
        }
    };
    let store = Arc::new(CoreGroceryStore::with_history_ceiling(
        Arc::new(backend),
        config.history_ceiling_mb,
    ));
    let mut logic = GroceryAppLogic::new(store, Arc::new(SystemClock::new()))
        .with_safety_alert_threshold(config.safety_alert_history_len);

    if let Some(warning) = logic.load() {
        println!(
            "WARNING: {} purchases ({} MB) are stored. Export and clear the history to avoid running out of space.",
            warning.records, warning.megabytes
        );
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&mut logic, &config, &args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
