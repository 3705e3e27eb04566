//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了模拟流量命令的实现。

use crate::backend::warehouse::SimulatedWarehouse;
use crate::cli::SimulateArgs;
use crate::config::Config;
use crate::error::InventoryError;
use crate::metrics::get_metrics_string;
use crate::service::InventoryService;
use crate::telemetry::{init_tracing, shutdown_tracing};
use crate::types::ProductId;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use rand::Rng;
use std::sync::Arc;
use tracing::info;

pub async fn execute(args: &SimulateArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration '{}'", path.display()))?,
        None => Config::default(),
    };
    anyhow::ensure!(args.products > 0, "--products must be at least 1");

    init_tracing(&config.service_name, &args.log);

    let warehouse = Arc::new(SimulatedWarehouse::new(&config.warehouse));
    let service = Arc::new(InventoryService::from_config(&config, warehouse.clone())?);

    info!(
        "simulating {} operations over {} products ({} concurrent callers)",
        args.requests, args.products, args.concurrency
    );

    let products = args.products;
    let outcomes: Vec<(bool, bool)> = stream::iter(0..args.requests)
        .map(|_| {
            let service = service.clone();
            let (product_id, amount, is_reserve) = {
                let mut rng = rand::thread_rng();
                (
                    ProductId(rng.gen_range(1..=products)),
                    rng.gen_range(1..=10_i64),
                    rng.gen_bool(0.7),
                )
            };
            async move {
                let result = if is_reserve {
                    service.reserve(product_id, amount).await
                } else {
                    service.replenish(product_id, amount).await
                };
                match result {
                    Ok(_) => (true, false),
                    Err(InventoryError::InsufficientStock { .. }) => (false, true),
                    Err(e) => {
                        tracing::warn!("operation failed: {}", e);
                        (false, false)
                    }
                }
            }
        })
        .buffer_unordered(args.concurrency.max(1))
        .collect()
        .await;

    let accepted = outcomes.iter().filter(|(ok, _)| *ok).count();
    let rejected = outcomes.iter().filter(|(_, insufficient)| *insufficient).count();

    let report = service.shutdown().await;

    println!("=== Simulation Summary ===\n");
    println!("Operations: {}", outcomes.len());
    println!("  Accepted:           {}", accepted);
    println!("  Insufficient stock: {}", rejected);
    println!("  Other errors:       {}", outcomes.len() - accepted - rejected);
    println!("Warehouse writes:     {}", warehouse.set_calls().len());
    println!(
        "Final flush:          {} flushed, {} failed",
        report.flushed,
        report.failed.len()
    );

    println!("\nProducts:");
    for id in 1..=products {
        let snapshot = service.snapshot(ProductId(id)).await?;
        println!(
            "  #{:<4} cached={:<6} warehouse={:<6} rejected={}",
            id,
            snapshot.quantity,
            warehouse
                .stored(snapshot.product_id)
                .map(|q| q.to_string())
                .unwrap_or_else(|| "-".to_string()),
            snapshot.failed_reservations
        );
    }

    println!("\n{}", get_metrics_string());
    shutdown_tracing();
    Ok(())
}
