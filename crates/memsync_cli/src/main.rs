//! memsync command-line entry point.
//!
//! # Responsibility
//! - Resolve the workspace, start logging, and dispatch to the core.
//! - Translate core results into process exit codes.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use log::error;
use memsync_core::{init_logging, run_full_sync, DriftAuditor, LoggingConfig, SyncConfig};
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit code for a pass that could not run at all.
const EXIT_FATAL: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let workspace = match resolve_workspace(cli.workspace) {
        Ok(workspace) => workspace,
        Err(err) => {
            eprintln!("error: cannot resolve workspace: {err}");
            return ExitCode::from(EXIT_FATAL);
        }
    };
    let config = SyncConfig::for_workspace(&workspace);

    let mut logging = LoggingConfig::new(config.log_dir.clone());
    logging.duplicate_to_stderr = cli.log_stderr;
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: logging disabled: {err}");
    }

    match cli.command {
        Commands::Sync { json } => cmd_sync(&config, json),
        Commands::Status { verbose } => cmd_status(&config, verbose),
    }
}

fn resolve_workspace(requested: Option<PathBuf>) -> std::io::Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(match requested {
        Some(path) if path.is_absolute() => path,
        Some(path) => cwd.join(path),
        None => cwd,
    })
}

fn cmd_sync(config: &SyncConfig, json: bool) -> ExitCode {
    let report = match run_full_sync(config) {
        Ok(report) => report,
        Err(err) => {
            error!("event=cli_sync module=cli status=fatal error={err}");
            eprintln!("error: {err}");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    if json {
        print_json(&report);
    } else {
        let summary = report.summary();
        println!(
            "success={} processed={} errors={} quarantined={} skipped={}",
            summary.success, summary.processed, summary.errors, report.quarantined, report.skipped
        );
        for failure in &report.errors {
            println!("  {} [{}] {}", failure.path, failure.kind.as_str(), failure.message);
        }
    }
    exit_code(report.exit_code())
}

fn cmd_status(config: &SyncConfig, verbose: bool) -> ExitCode {
    let report = DriftAuditor::new(config).check();

    if verbose {
        print_json(&report);
    } else {
        println!(
            "files={} synced={} out_of_sync={} never_synced={} orphaned={}",
            report.total(),
            report.synced,
            report.out_of_sync,
            report.never_synced,
            report.orphaned.len()
        );
        match report.last_sync {
            Some(at) => println!("last_sync={}", at.to_rfc3339()),
            None => println!("last_sync=never"),
        }
    }
    exit_code(report.exit_code.code())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("error: cannot encode report: {err}"),
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(EXIT_FATAL))
}
