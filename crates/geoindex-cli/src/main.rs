use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use geoindex_cli::commands::{export, group, query};
use geoindex_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let config = Config::load_from(cli.config.as_deref())
        .context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let stdout = io::stdout();
    let mut stdout = stdout.lock();

    match &cli.command {
        Some(Commands::ExportGpx { path, output }) => {
            if let Some(output) = output {
                let file = File::create(output)
                    .with_context(|| format!("failed to create {}", output.display()))?;
                let mut writer = BufWriter::new(file);
                export::run(&mut writer, path)?;
                writer.flush()?;
            } else {
                export::run(&mut stdout, path)?;
            }
        }
        Some(Commands::Query {
            path,
            latitude,
            longitude,
            level,
        }) => {
            query::run(&mut stdout, &config, path, *latitude, *longitude, *level)?;
        }
        Some(Commands::Group(args)) => {
            group::run(&mut stdout, &config, args)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            writeln!(stdout)?;
        }
    }

    Ok(())
}
