//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 固定间隔刷新策略的集成测试

#[path = "../common/mod.rs"]
mod common;

use common::{interval_config, setup_service, wait_past};
use stockcache::{FlushPolicy, ProductId};

/// 间隔策略不创建按商品的定时器，清扫时刷新所有待写商品的最新值
#[tokio::test(start_paused = true)]
async fn test_sweep_flushes_latest_value_of_every_product() {
    let (service, warehouse) = setup_service("interval_sweep", interval_config(1000));
    assert_eq!(service.scheduler().policy(), FlushPolicy::Interval);
    warehouse.seed(ProductId(1), 10);
    warehouse.seed(ProductId(2), 10);

    service.reserve(ProductId(1), 1).await.unwrap();
    service.reserve(ProductId(1), 1).await.unwrap();
    service.replenish(ProductId(2), 5).await.unwrap();
    assert_eq!(service.scheduler().pending_timers(), 0);

    wait_past(500).await;
    assert!(warehouse.set_calls().is_empty());

    wait_past(600).await;
    assert_eq!(warehouse.set_calls_for(ProductId(1)), vec![8]);
    assert_eq!(warehouse.set_calls_for(ProductId(2)), vec![15]);
    assert!(service.coalescer().is_empty());
}

/// 清扫失败的商品在下一次清扫时重试，不影响其他商品
#[tokio::test(start_paused = true)]
async fn test_failed_product_is_retried_on_next_sweep() {
    let (service, warehouse) = setup_service("interval_failure", interval_config(1000));
    warehouse.seed(ProductId(3), 4);

    service.reserve(ProductId(3), 4).await.unwrap();
    warehouse.fail_next_sets(1);

    wait_past(1100).await;
    assert!(warehouse.set_calls().is_empty());
    assert_eq!(service.coalescer().peek(ProductId(3)), Some(0));

    wait_past(1000).await;
    assert_eq!(warehouse.set_calls_for(ProductId(3)), vec![0]);
    assert!(service.coalescer().is_empty());
}

/// 空闲的清扫不会调用仓储系统
#[tokio::test(start_paused = true)]
async fn test_idle_sweeps_do_nothing() {
    let (_service, warehouse) = setup_service("interval_idle", interval_config(200));
    wait_past(1000).await;
    assert!(warehouse.set_calls().is_empty());
    assert_eq!(warehouse.get_calls(), 0);
}
