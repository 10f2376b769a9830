use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use desktop_headless::{build_runtime, parse_script, read_json, run_script};
use desktop_runtime::DesktopConfig;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// Boot a headless card desktop, replay a script, and print the resulting state as JSON.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// TOML runtime configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Card stack definition (JSON). Repeatable.
    #[arg(long = "stack")]
    stacks: Vec<PathBuf>,
    /// Contribution manifest (JSON). Repeatable.
    #[arg(long = "contributions")]
    manifests: Vec<PathBuf>,
    /// Initial domain state (JSON).
    #[arg(long)]
    domain: Option<PathBuf>,
    /// Session script: a JSON array of steps, or JSON lines.
    #[arg(long)]
    script: Option<PathBuf>,
    /// Pretty-print the report.
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => DesktopConfig::load(path)?,
        None => DesktopConfig::default(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_filter()))
        .with_writer(std::io::stderr)
        .init();

    let manifests = args
        .manifests
        .iter()
        .map(|path| read_json(path))
        .collect::<Result<Vec<_>>>()?;
    let stacks = args
        .stacks
        .iter()
        .map(|path| read_json(path))
        .collect::<Result<Vec<_>>>()?;
    let domain_state = match &args.domain {
        Some(path) => read_json(path)?,
        None => Value::Null,
    };

    let mut runtime = build_runtime(config, manifests, stacks, domain_state)?;
    runtime.boot();

    let steps = match &args.script {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read script {}", path.display()))?;
            parse_script(&raw)?
        }
        None => Vec::new(),
    };
    tracing::info!(steps = steps.len(), "replaying script");
    let report = run_script(&mut runtime, steps);

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{rendered}");
    Ok(())
}
