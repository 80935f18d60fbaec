use anyhow::{Context, Result};
use clap::Parser;
use soldep_core::{DiskAdapter, Lockfile, Project, Session, SoldepConfig, remap};
use std::env;
use std::fs;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);

    if let Some(cwd) = &args.cwd {
        env::set_current_dir(cwd)
            .with_context(|| format!("cannot change into {}", cwd.display()))?;
    }

    let config = SoldepConfig::from_env();
    let cwd = env::current_dir()?;

    let mut remappings = Vec::new();
    if let Some(path) = &args.remappings_file {
        let data = fs::read_to_string(path)
            .with_context(|| format!("cannot read remappings file {}", path.display()))?;
        remappings.extend(remap::parse_remappings(&data));
    } else if let Ok(data) = fs::read_to_string(cwd.join("remappings.txt")) {
        remappings.extend(remap::parse_remappings(&data));
    }
    for rule in &args.remap {
        match remap::parse_remapping(rule) {
            Some(parsed) => remappings.push(parsed),
            None => tracing::warn!("ignoring malformed remapping {:?}", rule),
        }
    }

    let mut session = Session::new(config, DiskAdapter::new())
        .with_lockfile(Lockfile::load(&cwd))
        .with_remappings(remappings);
    if let Ok(project) = Project::discover(&cwd) {
        session = session.with_project(project);
    }

    let output = session
        .flatten(&args.entry, args.pragma.as_deref())
        .await
        .with_context(|| format!("failed to flatten {}", args.entry))?;

    match &args.out {
        Some(path) => {
            fs::write(path, &output.flattened)
                .with_context(|| format!("cannot write {}", path.display()))?;
            tracing::info!(
                "flattened {} files into {}",
                output.order.len(),
                path.display()
            );
        }
        None => print!("{}", output.flattened),
    }

    Ok(())
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
