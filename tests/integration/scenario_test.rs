//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 库存服务端到端场景测试

#[path = "../common/mod.rs"]
mod common;

use common::{debounce_config, setup_service, setup_service_with, wait_past};
use std::sync::Arc;
use std::time::Duration;
use stockcache::{InventoryError, ProductId, SimulatedWarehouse};

/// 缓存为空时读取会回源一次并缓存结果
#[tokio::test]
async fn test_cold_read_populates_cache_once() {
    let (service, warehouse) = setup_service("scenario_a", debounce_config(2500));
    warehouse.seed(ProductId(1), 10);

    assert_eq!(service.get_stock(ProductId(1)).await.unwrap(), 10);
    assert_eq!(warehouse.get_calls(), 1);

    assert_eq!(service.get_stock(ProductId(1)).await.unwrap(), 10);
    assert_eq!(warehouse.get_calls(), 1, "second read must be served from cache");
}

/// 库存充足时预留成功，读取立即看到新值
#[tokio::test]
async fn test_reserve_with_enough_stock() {
    let (service, warehouse) = setup_service("scenario_b", debounce_config(2500));
    warehouse.seed(ProductId(1), 10);

    assert_eq!(service.reserve(ProductId(1), 7).await.unwrap(), 3);
    assert_eq!(service.get_stock(ProductId(1)).await.unwrap(), 3);
    assert_eq!(service.coalescer().peek(ProductId(1)), Some(3));
}

/// 库存不足时预留被拒绝，缓存和待写队列都不变
#[tokio::test]
async fn test_reserve_with_insufficient_stock() {
    let (service, warehouse) = setup_service("scenario_c", debounce_config(2500));
    service.cache().set(ProductId(1), 3).await;

    let err = service.reserve(ProductId(1), 5).await.unwrap_err();
    match err {
        InventoryError::InsufficientStock {
            product_id,
            requested,
            available,
        } => {
            assert_eq!(product_id, ProductId(1));
            assert_eq!(requested, 5);
            assert_eq!(available, 3);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(service.get_stock(ProductId(1)).await.unwrap(), 3);
    assert!(service.coalescer().is_empty());
    assert_eq!(service.scheduler().pending_timers(), 0);
    assert_eq!(warehouse.get_calls(), 0);

    let snapshot = service.snapshot(ProductId(1)).await.unwrap();
    assert_eq!(snapshot.failed_reservations, 1);
    assert_eq!(snapshot.pending_flush, None);
}

/// 防抖窗口内的两次补货只产生一次仓储写入，携带最终值
#[tokio::test(start_paused = true)]
async fn test_back_to_back_replenish_flushes_once() {
    let (service, warehouse) = setup_service("scenario_d", debounce_config(2500));
    warehouse.seed(ProductId(1), 3);

    service.replenish(ProductId(1), 4).await.unwrap();
    service.replenish(ProductId(1), 6).await.unwrap();

    assert_eq!(service.get_stock(ProductId(1)).await.unwrap(), 13);
    assert!(warehouse.set_calls().is_empty(), "flush must wait for the quiet period");
    assert_eq!(service.scheduler().pending_timers(), 1);

    wait_past(3000).await;

    assert_eq!(warehouse.set_calls(), vec![(ProductId(1), 13)]);
    assert_eq!(warehouse.stored(ProductId(1)), Some(13));
    assert!(service.coalescer().is_empty());
    assert_eq!(service.scheduler().pending_timers(), 0);
}

/// 两个并发预留争抢同一库存，只有一个成功
#[tokio::test]
async fn test_concurrent_reserves_only_one_wins() {
    let warehouse = Arc::new(
        SimulatedWarehouse::instant().with_latency(Duration::from_millis(50)),
    );
    warehouse.seed(ProductId(1), 10);
    let service = setup_service_with("scenario_e", debounce_config(2500), warehouse.clone());

    let (a, b) = tokio::join!(
        service.reserve(ProductId(1), 6),
        service.reserve(ProductId(1), 6)
    );

    let results = [a, b];
    let ok = results.iter().filter(|r| r.is_ok()).count();
    let insufficient = results
        .iter()
        .filter(|r| matches!(r, Err(InventoryError::InsufficientStock { .. })))
        .count();
    assert_eq!(ok, 1);
    assert_eq!(insufficient, 1);

    assert_eq!(service.get_stock(ProductId(1)).await.unwrap(), 4);
    assert_eq!(warehouse.get_calls(), 1, "concurrent misses share one fetch");
}

/// 只读可用性检查不修改任何状态
#[tokio::test]
async fn test_check_availability_is_read_only() {
    let (service, warehouse) = setup_service("availability", debounce_config(2500));
    warehouse.seed(ProductId(7), 5);

    assert!(service.check_availability(ProductId(7), 5).await.unwrap());
    assert!(!service.check_availability(ProductId(7), 6).await.unwrap());
    assert!(service.check_availability(ProductId(7), 0).await.is_err());

    assert_eq!(service.get_stock(ProductId(7)).await.unwrap(), 5);
    assert!(service.coalescer().is_empty());
    assert_eq!(service.snapshot(ProductId(7)).await.unwrap().failed_reservations, 0);
}
