use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fbp_cli::commands::{consolidate, filter, import, intervals, report, stats, traces};
use fbp_cli::{Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<fbp_db::Database> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    fbp_db::Database::open(&config.database_path).context("failed to open database")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // try_init avoids a panic if tracing is already initialized.
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();

    match &cli.command {
        Some(Commands::Import { files }) => {
            let mut db = open_database(cli.config.as_deref())?;
            let inserted = import::run(&mut db, files)?;
            println!("imported {inserted} events");
        }
        Some(Commands::Filter { min_version }) => {
            let db = open_database(cli.config.as_deref())?;
            filter::run(&db, *min_version)?;
        }
        Some(Commands::Intervals { min_version }) => {
            let db = open_database(cli.config.as_deref())?;
            intervals::run(&db, *min_version)?;
        }
        Some(Commands::Report { min_version }) => {
            let db = open_database(cli.config.as_deref())?;
            report::run(&db, *min_version)?;
        }
        Some(Commands::Consolidate) => {
            let mut db = open_database(cli.config.as_deref())?;
            consolidate::run(&mut db)?;
        }
        Some(Commands::Traces { min_version }) => {
            let db = open_database(cli.config.as_deref())?;
            traces::run(&db, *min_version)?;
        }
        Some(Commands::Stats) => {
            let db = open_database(cli.config.as_deref())?;
            stats::run(&db)?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
