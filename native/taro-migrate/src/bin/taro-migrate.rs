use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use taro_migrate::{migrate_project, MigrateOptions};

/// Migrate a Taro 2 project to Taro 3 in place
#[derive(Parser)]
#[command(name = "taro-migrate")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Project root (the directory holding `config/` and `package.json`)
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// Worker pool size (default: available parallelism)
    #[arg(long)]
    workers: Option<usize>,
    /// Compute and report every change without writing
    #[arg(long)]
    dry_run: bool,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taro_migrate=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let options = MigrateOptions {
        workers: cli.workers,
        dry_run: cli.dry_run,
        ..MigrateOptions::new(&cli.root)
    };

    let report = match migrate_project(&options) {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(root = %cli.root.display(), error = %err, "migration aborted");
            return Err(err).context("nothing was changed");
        }
    };

    if cli.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.summary());
    }
    Ok(())
}
