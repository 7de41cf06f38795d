// Callout Wizard
// Main library entry point

pub mod config;
pub mod models;
pub mod storage;
mod tui;
pub mod utils;
pub mod wizard;

use anyhow::Result;
use log::{error, info};
use std::path::{Path, PathBuf};

use config::AppConfig;
use storage::{CalloutQuery, CalloutStore};

/// Initialize logging system with dual format (JSON + human-readable)
///
/// `with_console` adds a human-readable stderr sink (Info and above). It stays off for the
/// terminal UI so log lines never corrupt the screen.
fn init_logging(with_console: bool, log_dir_override: Option<&Path>) -> Result<PathBuf> {
    let log_dir = utils::path_resolver::resolve_log_folder(log_dir_override)?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%d-%H%M%S");
    let session_id = uuid::Uuid::new_v4().to_string();

    // JSON log file for structured parsing
    let json_log_file = log_dir.join(format!("callout-wizard-{}.log", timestamp));

    // Human-readable log file (.txt)
    let txt_log_file = log_dir.join(format!("callout-wizard-{}.txt", timestamp));

    let mut dispatch = fern::Dispatch::new().level(log::LevelFilter::Debug);

    if with_console {
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .level(log::LevelFilter::Info)
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line = utils::logging::format_human_readable_log(
                        &timestamp_local.to_string(),
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}", txt_line));
                })
                .chain(std::io::stderr()),
        );
    }

    dispatch = dispatch
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_utc = chrono::Utc::now().to_rfc3339();
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let json_line = utils::logging::format_json_log(
                        &timestamp_utc,
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                        Some(session_id.as_str()),
                    );
                    out.finish(format_args!("{}\n", json_line));
                })
                .chain(fern::log_file(json_log_file)?),
        )
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line = utils::logging::format_human_readable_log(
                        &timestamp_local.to_string(),
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}\n", txt_line));
                })
                .chain(fern::log_file(txt_log_file)?),
        );

    dispatch.apply()?;

    info!(
        "[PHASE: initialization] Logging initialized, log directory: {:?}",
        log_dir
    );
    Ok(log_dir)
}

/// Load configuration and start logging. Exits with status 2 on a broken config file.
fn startup(mode: &str, with_console: bool) -> AppConfig {
    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Callout Wizard: invalid configuration: {:#}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = init_logging(with_console, config.log_dir.as_deref()) {
        eprintln!("Failed to initialize logging: {:#}", e);
    }

    info!(
        "[PHASE: initialization] Callout Wizard ({}) starting at {}",
        mode,
        chrono::Utc::now()
    );
    info!(
        "[PHASE: initialization] [STEP: config] catalog_dir={:?} data_dir={:?} retreat_policy={:?}",
        config.catalog_dir, config.data_dir, config.retreat_policy
    );
    info!(
        "[PHASE: initialization] [STEP: deployment_folder] Deployment folder: {:?}",
        utils::path_resolver::resolve_deployment_folder()
    );
    config
}

/// Interactive terminal wizard.
pub fn run_tui() {
    // No console logging: it would corrupt the TUI
    let config = startup("tui", false);

    if let Err(e) = tui::run(&config) {
        error!("[PHASE: tui] [STEP: fatal] TUI exited with error: {:?}", e);
        eprintln!("Callout Wizard error: {}", e);
        std::process::exit(1);
    }
}

/// Non-interactive TUI smoke mode (for automated checks).
/// Renders a single frame on an in-memory backend and exits.
pub fn run_tui_smoke(target: Option<String>) {
    let config = startup("tui-smoke", false);

    let target = target.as_deref().unwrap_or("map");
    if let Err(e) = tui::smoke(&config, target) {
        error!(
            "[PHASE: tui] [STEP: smoke] TUI smoke exited with error: {:?}",
            e
        );
        eprintln!("Callout Wizard error: {}", e);
        std::process::exit(1);
    }
}

/// Print saved callouts matching `query`, oldest first.
pub fn run_list(query: CalloutQuery) {
    let config = startup("list", true);
    let store = CalloutStore::new(config.data_dir.clone());

    match list_callouts(&store, &query) {
        Ok(lines) if lines.is_empty() => {
            println!("No saved callouts in {}", store.dir().display());
        }
        Ok(lines) => {
            for line in lines {
                println!("{}", line);
            }
        }
        Err(e) => {
            error!("[PHASE: list] [STEP: query] Listing failed: {:#}", e);
            eprintln!("Callout Wizard error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn list_callouts(store: &CalloutStore, query: &CalloutQuery) -> Result<Vec<String>> {
    let records = store.query(query)?;
    info!(
        "[PHASE: list] [STEP: query] {} callout(s) match {:?}",
        records.len(),
        query
    );
    Ok(records
        .iter()
        .map(|r| {
            format!(
                "{}  {}  {}",
                r.created_at.format("%Y-%m-%d %H:%M"),
                r.id,
                r.summary()
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::callout::{CalloutForm, CalloutRecord};
    use crate::models::catalog::Catalog;
    use crate::models::selection::Side;

    #[test]
    fn list_lines_include_id_and_summary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CalloutStore::new(dir.path());
        let catalog = Catalog::builtin();
        let hero = catalog.hero("brimstone").cloned().expect("hero");
        let record = CalloutRecord {
            id: uuid::Uuid::new_v4(),
            created_at: chrono::Utc::now(),
            map: catalog.map("fracture").cloned().expect("map"),
            ability: hero.abilities[1].clone(),
            hero,
            side: Side::Attack,
            form: CalloutForm {
                position: "Dish".to_string(),
                ..CalloutForm::default()
            },
        };
        store.save(&record).expect("save");

        let lines = list_callouts(&store, &CalloutQuery::default()).expect("list");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(&record.id.to_string()));
        assert!(
            lines[0].ends_with("Fracture | Brimstone | Attack | Incendiary | Dish"),
            "{}",
            lines[0]
        );

        let none = CalloutQuery {
            side: Some(Side::Defense),
            ..CalloutQuery::default()
        };
        assert!(list_callouts(&store, &none).expect("list").is_empty());
    }
}
