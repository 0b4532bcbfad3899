// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Threadbound - run statements on thread-affine resources.
//!
//! This is the binary entry point for the threadbound command line tool.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod demo;
mod query;
mod resources;
mod setup;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use threadbound_config::ThreadboundConfig;
use threadbound_core::ThreadboundError;
use threadbound_worker::Registry;
use tracing::error;

/// Threadbound - run statements on thread-affine resources.
#[derive(Parser, Debug)]
#[command(name = "threadbound", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one statement and print its records.
    Query {
        /// Statement text.
        sql: String,
        /// Resource to run on.
        #[arg(long, default_value = setup::FALLBACK_RESOURCE)]
        resource: String,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
        /// Bind a value: `VALUE` for the next `?`, `:name=VALUE` for a named placeholder.
        #[arg(long = "bind", value_name = "VALUE")]
        binds: Vec<String>,
    },
    /// Insert random rows asynchronously and query them through a result model.
    Demo {
        /// Number of rows to insert.
        #[arg(long, default_value_t = 100)]
        rows: usize,
        /// Resource to run on.
        #[arg(long, default_value = setup::FALLBACK_RESOURCE)]
        resource: String,
    },
    /// List registered resources and their state.
    Resources {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => threadbound_config::load_and_validate_path(path),
        None => threadbound_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            threadbound_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config.logging.log_level);

    let Some(command) = cli.command else {
        println!("threadbound: use --help for available commands");
        return;
    };

    let registry = match start(config).await {
        Ok(registry) => registry,
        Err(err) => {
            eprintln!("threadbound: {err}");
            std::process::exit(1);
        }
    };

    let outcome = run(command, Arc::clone(&registry)).await;

    // Workers join their threads; that must not happen on a runtime thread.
    let stopped = tokio::task::spawn_blocking(move || registry.shutdown())
        .await
        .map_err(|e| ThreadboundError::Internal(e.to_string()))
        .and_then(|r| r);
    if let Err(err) = &stopped {
        error!(error = %err, "registry shutdown failed");
    }

    match outcome {
        Ok(true) if stopped.is_ok() => {}
        Ok(_) => std::process::exit(1),
        Err(err) => {
            eprintln!("threadbound: {err}");
            std::process::exit(1);
        }
    }
}

async fn start(config: ThreadboundConfig) -> Result<Arc<Registry>, ThreadboundError> {
    tokio::task::spawn_blocking(move || setup::build_registry(&config))
        .await
        .map_err(|e| ThreadboundError::Internal(e.to_string()))?
}

/// Run one subcommand. Returns whether it succeeded.
async fn run(command: Commands, registry: Arc<Registry>) -> Result<bool, ThreadboundError> {
    match command {
        Commands::Query {
            sql,
            resource,
            json,
            binds,
        } => {
            let binds: Vec<query::BindArg> = binds.iter().map(|b| query::BindArg::parse(b)).collect();
            let output = blocking(move || query::execute(&registry, &resource, &sql, &binds)).await?;
            if json {
                println!("{}", to_json(&output)?);
            } else {
                print!("{}", query::render_plain(&output));
            }
            Ok(output.success)
        }
        Commands::Demo { rows, resource } => {
            let report = demo::run(registry, &resource, rows).await?;
            println!("inserted {} rows; model holds {}", report.inserted, report.model_rows);
            for (label, score) in &report.top {
                println!("{label}\t{score:.2}");
            }
            Ok(true)
        }
        Commands::Resources { json } => {
            let statuses = blocking(move || resources::list(&registry)).await?;
            if json {
                println!("{}", to_json(&statuses)?);
            } else {
                print!("{}", resources::render_plain(&statuses));
            }
            Ok(!resources::any_failed(&statuses))
        }
    }
}

/// Run `f` where blocking round trips to workers are allowed.
async fn blocking<F, T>(f: F) -> Result<T, ThreadboundError>
where
    F: FnOnce() -> Result<T, ThreadboundError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ThreadboundError::Internal(e.to_string()))?
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ThreadboundError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ThreadboundError::Internal(format!("failed to encode JSON: {e}")))
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("threadbound={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc can advance the stats epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_parses_query_with_binds() {
        let cli = Cli::try_parse_from([
            "threadbound",
            "query",
            "SELECT ?",
            "--bind",
            "1",
            "--bind",
            ":name=ada",
            "--json",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Query {
                sql,
                resource,
                json,
                binds,
            }) => {
                assert_eq!(sql, "SELECT ?");
                assert_eq!(resource, "mem");
                assert!(json);
                assert_eq!(binds, vec!["1", ":name=ada"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["threadbound", "resources", "--config", "x.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(cli.command, Some(Commands::Resources { json: false })));
    }

    #[test]
    fn demo_defaults() {
        let cli = Cli::try_parse_from(["threadbound", "demo"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Demo { rows: 100, ref resource }) if resource == "mem"
        ));
    }
}
