//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了配置校验命令的实现。

use crate::cli::CheckConfigArgs;
use crate::config::Config;
use anyhow::{Context, Result};

pub fn execute(args: &CheckConfigArgs) -> Result<()> {
    let config = Config::from_file(&args.path)
        .with_context(|| format!("Invalid configuration '{}'", args.path.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("✅ {} is valid", args.path.display());
    println!("  service:   {}", config.service_name);
    println!("  policy:    {:?}", config.scheduler.policy);
    println!("  quiet:     {} ms", config.scheduler.quiet_period_ms);
    println!("  interval:  {} ms", config.scheduler.flush_interval_ms);
    println!("  retries:   {}", config.scheduler.max_retries);
    Ok(())
}
