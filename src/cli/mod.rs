//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了CLI命令行接口。

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "stockcache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        name = "simulate",
        about = "Drive random reserve/replenish traffic against a simulated warehouse"
    )]
    Simulate(SimulateArgs),

    #[command(name = "check-config", about = "Validate a configuration file")]
    CheckConfig(CheckConfigArgs),
}

#[derive(Parser, Debug)]
pub struct SimulateArgs {
    #[arg(short, long, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(short, long, default_value_t = 5, help = "Number of distinct products")]
    pub products: u64,

    #[arg(short, long, default_value_t = 200, help = "Number of operations to issue")]
    pub requests: usize,

    #[arg(long, default_value_t = 16, help = "Number of concurrent callers")]
    pub concurrency: usize,

    #[arg(long, default_value = "info", help = "Default log filter when RUST_LOG is unset")]
    pub log: String,
}

#[derive(Parser, Debug)]
pub struct CheckConfigArgs {
    #[arg(help = "Path to a TOML configuration file")]
    pub path: PathBuf,

    #[arg(short, long, help = "Print the effective configuration as JSON")]
    pub json: bool,
}

mod check_config;
mod simulate;

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Simulate(args) => simulate::execute(args).await,
        Commands::CheckConfig(args) => check_config::execute(args),
    }
}
