//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 服务构建与关闭的生命周期测试

#[path = "../common/mod.rs"]
mod common;

use common::{
    debounce_config, interval_config, setup_logging, setup_service, setup_service_with, wait_past,
};
use std::sync::Arc;
use std::time::Duration;
use stockcache::{Config, InventoryError, InventoryService, ProductId, SimulatedWarehouse};

/// 关闭时尽力刷新所有未到期的待写数量
#[tokio::test(start_paused = true)]
async fn test_shutdown_flushes_pending_updates() {
    let (service, warehouse) = setup_service("lifecycle_flush", debounce_config(60_000));
    warehouse.seed(ProductId(1), 10);
    warehouse.seed(ProductId(2), 10);

    service.reserve(ProductId(1), 3).await.unwrap();
    service.replenish(ProductId(2), 3).await.unwrap();
    assert_eq!(service.scheduler().pending_timers(), 2);

    let report = service.shutdown().await;
    assert_eq!(report.flushed, 2);
    assert!(report.failed.is_empty());
    assert_eq!(warehouse.stored(ProductId(1)), Some(7));
    assert_eq!(warehouse.stored(ProductId(2)), Some(13));
    assert_eq!(service.scheduler().pending_timers(), 0);
    assert!(service.coalescer().is_empty());
}

/// 关闭后拒绝修改，读取仍可用；重复关闭无副作用
#[tokio::test(start_paused = true)]
async fn test_mutations_rejected_after_shutdown() {
    let (service, warehouse) = setup_service("lifecycle_closed", interval_config(1000));
    warehouse.seed(ProductId(1), 5);

    service.replenish(ProductId(1), 1).await.unwrap();
    let first = service.shutdown().await;
    assert_eq!(first.flushed, 1);

    assert!(matches!(
        service.reserve(ProductId(1), 1).await,
        Err(InventoryError::Shutdown)
    ));
    assert!(matches!(
        service.replenish(ProductId(1), 1).await,
        Err(InventoryError::Shutdown)
    ));
    assert_eq!(service.get_stock(ProductId(1)).await.unwrap(), 6);

    let second = service.shutdown().await;
    assert_eq!(second.flushed, 0);
    assert!(second.failed.is_empty());
    assert_eq!(warehouse.set_calls().len(), 1);
}

/// 最终刷新失败的商品出现在报告中，值仍保留在待写队列
#[tokio::test(start_paused = true)]
async fn test_failed_final_flush_is_reported() {
    let (service, warehouse) = setup_service("lifecycle_failed", debounce_config(60_000));
    warehouse.seed(ProductId(9), 2);

    service.reserve(ProductId(9), 2).await.unwrap();
    warehouse.fail_next_sets(1);

    let report = service.shutdown().await;
    assert_eq!(report.flushed, 0);
    assert_eq!(report.failed, vec![ProductId(9)]);
    assert_eq!(service.coalescer().peek(ProductId(9)), Some(0));
    assert!(warehouse.set_calls().is_empty());
}

/// 回源途中发生关闭：修改要么被拒绝，要么被最终刷新写入仓储，不会悬空
#[tokio::test(start_paused = true)]
async fn test_shutdown_during_fetch_never_strands_mutation() {
    let warehouse =
        Arc::new(SimulatedWarehouse::instant().with_latency(Duration::from_millis(100)));
    warehouse.seed(ProductId(1), 10);
    let service = setup_service_with(
        "lifecycle_fetch_race",
        debounce_config(60_000),
        warehouse.clone(),
    );

    let reserving = {
        let service = service.clone();
        tokio::spawn(async move { service.reserve(ProductId(1), 3).await })
    };
    wait_past(10).await;

    let report = service.shutdown().await;
    let result = reserving.await.unwrap();
    wait_past(10_000).await;

    assert!(matches!(result, Err(InventoryError::Shutdown)));
    assert_eq!(report.flushed, 0);
    assert!(report.failed.is_empty());
    assert_eq!(service.coalescer().peek(ProductId(1)), None);
    assert_eq!(service.get_stock(ProductId(1)).await.unwrap(), 10);
    assert!(warehouse.set_calls().is_empty());
}

/// 已开始提交的修改先于关闭完成，并由最终刷新写入仓储
#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_admitted_commit() {
    let (service, warehouse) = setup_service("lifecycle_commit_race", debounce_config(60_000));
    warehouse.seed(ProductId(2), 10);
    service.get_stock(ProductId(2)).await.unwrap();

    let reserving = {
        let service = service.clone();
        tokio::spawn(async move { service.reserve(ProductId(2), 4).await })
    };
    tokio::task::yield_now().await;

    let report = service.shutdown().await;
    let result = reserving.await.unwrap();

    match result {
        Ok(quantity) => {
            assert_eq!(quantity, 6);
            assert_eq!(report.flushed, 1);
            assert_eq!(warehouse.stored(ProductId(2)), Some(6));
        }
        Err(e) => {
            assert!(matches!(e, InventoryError::Shutdown));
            assert_eq!(report.flushed, 0);
            assert_eq!(warehouse.stored(ProductId(2)), Some(10));
        }
    }
    assert!(service.coalescer().is_empty());
}

/// 丢弃进行中的预留：缓存与待写登记要么同时更新，要么都不变
#[tokio::test(start_paused = true)]
async fn test_dropped_reserve_keeps_cache_and_pending_in_step() {
    let (service, warehouse) = setup_service("lifecycle_dropped", debounce_config(100));
    warehouse.seed(ProductId(3), 10);
    service.get_stock(ProductId(3)).await.unwrap();

    let mut reserving = Box::pin(service.reserve(ProductId(3), 4));
    let _ = futures::poll!(&mut reserving);
    drop(reserving);
    wait_past(1).await;

    let cached = service.cache().peek(ProductId(3)).await;
    let pending = service.coalescer().peek(ProductId(3));
    match pending {
        Some(quantity) => {
            assert_eq!(quantity, 6);
            assert_eq!(cached, Some(6));
            wait_past(200).await;
            assert_eq!(warehouse.stored(ProductId(3)), Some(6));
        }
        None => assert_eq!(cached, Some(10)),
    }

    // 商品锁随提交一起释放
    let before = cached.unwrap();
    assert_eq!(service.reserve(ProductId(3), 1).await.unwrap(), before - 1);
}

/// 根据配置构建服务，非法配置被拒绝
#[tokio::test]
async fn test_service_from_config() {
    setup_logging();
    let warehouse = Arc::new(SimulatedWarehouse::instant());

    let config: Config = r#"
        service_name = "lifecycle_from_config"

        [scheduler]
        policy = "interval"
        flush_interval_ms = 250
    "#
    .parse()
    .unwrap();
    let service = InventoryService::from_config(&config, warehouse.clone()).unwrap();
    assert_eq!(service.service_name(), "lifecycle_from_config");

    let mut invalid = Config::default();
    invalid.scheduler.command_timeout_ms = 0;
    assert!(matches!(
        InventoryService::from_config(&invalid, warehouse),
        Err(InventoryError::Config(_))
    ));
}
