//! Command-line entry point for the reconciliation engine.
//!
//! # Responsibility
//! - Expose health checks and offline record management over the SQLite store.
//! - Run a scripted conflict walkthrough against the in-memory remote.

use recordsync_core::{
    default_log_level, init_logging, Conflict, EngineConfig, LocalStore, MemoryRemoteStore,
    PresentationSink, Record, ResolutionChoice, SqliteLocalStore, SyncEngine, SyncOutcome,
    SyncReport,
};
use std::process::ExitCode;
use std::sync::Arc;

const DEFAULT_DB_PATH: &str = "recordsync.sqlite3";
const USAGE: &str = "usage: recordsync <ping|version|list|add <text> <category>|demo>";

/// Prints every engine notification to stdout.
struct StdoutSink;

impl PresentationSink for StdoutSink {
    fn on_status(&self, report: &SyncReport) {
        println!(
            "[cycle {}] status={} {}",
            report.cycle, report.status, report.detail
        );
    }

    fn on_records(&self, records: &[Record]) {
        println!("  records={}", records.len());
    }

    fn on_conflicts(&self, conflicts: &[Conflict]) {
        for (index, conflict) in conflicts.iter().enumerate() {
            println!(
                "  conflict #{index} id={} local=`{}` v{} remote=`{}` v{}",
                conflict.record_id(),
                conflict.local.text,
                conflict.local.version,
                conflict.remote.text,
                conflict.remote.version
            );
        }
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    if let Ok(log_dir) = std::env::var("RECORDSYNC_LOG_DIR") {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["ping"] => {
            println!("recordsync_core ping={}", recordsync_core::ping());
            Ok(())
        }
        ["version"] => {
            println!("recordsync_core version={}", recordsync_core::core_version());
            Ok(())
        }
        ["list"] => list_records(),
        ["add", text, category] => add_record(text, category),
        ["demo"] => run_demo(),
        _ => Err(USAGE.to_string()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn db_path() -> String {
    std::env::var("RECORDSYNC_DB").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string())
}

fn list_records() -> Result<(), String> {
    let store = SqliteLocalStore::open(db_path()).map_err(|err| err.to_string())?;
    let records = store.load().map_err(|err| err.to_string())?;
    let rendered = serde_json::to_string_pretty(&records).map_err(|err| err.to_string())?;
    println!("{rendered}");
    Ok(())
}

fn add_record(text: &str, category: &str) -> Result<(), String> {
    let store = SqliteLocalStore::open(db_path()).map_err(|err| err.to_string())?;
    let engine = SyncEngine::open(
        Box::new(store),
        Arc::new(MemoryRemoteStore::new()),
        Arc::new(StdoutSink),
        EngineConfig::from_env(),
    );
    let record = engine
        .add_record(text, category)
        .map_err(|err| err.to_string())?;
    if engine.has_unsaved_changes() {
        return Err(format!("record {} kept in memory only: save failed", record.id));
    }
    println!("added id={} version={}", record.id, record.version);
    Ok(())
}

fn run_demo() -> Result<(), String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("failed to start runtime: {err}"))?;
    runtime.block_on(demo())
}

/// Local edit races a newer server edit, the user keeps the local text, and
/// the next cycle publishes it.
async fn demo() -> Result<(), String> {
    let store = SqliteLocalStore::in_memory().map_err(|err| err.to_string())?;
    let remote = Arc::new(MemoryRemoteStore::new());
    let config = EngineConfig {
        seed_defaults_when_empty: true,
        ..EngineConfig::from_env()
    };
    let engine = SyncEngine::open(Box::new(store), remote.clone(), Arc::new(StdoutSink), config);

    println!("== first sync: publish seeded records");
    report(engine.run_sync().await);

    let shared = remote
        .records()
        .into_iter()
        .next()
        .ok_or("remote store is empty after first sync")?;
    remote.update_remote(
        &shared.id,
        &format!("{} (edited elsewhere)", shared.text),
        &shared.category,
        shared.last_modified + 1,
    );

    println!("== second sync: remote edit wins, conflict recorded");
    report(engine.run_sync().await);

    println!("== resolve conflict #0 keeping the local text");
    let resolved = engine
        .resolve_conflict(0, ResolutionChoice::Local)
        .map_err(|err| err.to_string())?;
    println!("  resolved id={} version={}", resolved.id, resolved.version);

    println!("== third sync: resolution pushed");
    report(engine.run_sync().await);

    let server_copy = remote
        .records()
        .into_iter()
        .find(|record| record.id == shared.id)
        .ok_or("shared record missing on remote")?;
    println!(
        "  remote now holds `{}` v{}",
        server_copy.text, server_copy.version
    );
    Ok(())
}

fn report(outcome: SyncOutcome) {
    println!("  outcome={outcome:?}");
}
