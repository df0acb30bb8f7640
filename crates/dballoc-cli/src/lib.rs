//! dballoc command-line interface
//!
//! Provisions a test database from the same configuration a test suite
//! would use, so allocators can be exercised and debugged by hand.

pub mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dballoc_core::Properties;

use commands::{check, up, wait_tcp};

/// Command-line interface for dballoc test databases
#[derive(Parser, Debug)]
#[command(name = "dballoc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, env = "DBALLOC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override a property, e.g. --set test.db.type=embedded
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_override)]
    pub overrides: Vec<(String, String)>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision a database, print it and release it again
    Check(check::CheckArgs),
    /// Provision a database and keep it until interrupted
    Up(up::UpArgs),
    /// Wait until a TCP port accepts connections
    WaitTcp(wait_tcp::WaitTcpArgs),
    /// Show the effective configuration
    Config,
}

/// Parse one `key=value` override
pub fn parse_override(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in {:?}", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

impl Cli {
    /// Effective properties: file, then environment, then `--set` overrides
    pub fn properties(&self) -> Result<Properties> {
        let mut props = Properties::load(self.config.as_deref()).with_context(|| {
            match &self.config {
                Some(path) => format!("loading configuration from {}", path.display()),
                None => "loading configuration from the environment".to_string(),
            }
        })?;
        props.merge(Properties::from_pairs(self.overrides.iter().cloned()));
        Ok(props)
    }
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins; otherwise dballoc logs at `info`, or `debug` with
/// `--verbose`.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = if verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "dballoc_core=debug,dballoc_cli=debug".into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "dballoc_core=info,dballoc_cli=info".into())
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
