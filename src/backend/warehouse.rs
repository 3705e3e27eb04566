//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 模拟仓储系统：带延迟和故障注入的内存实现，供 CLI 模拟和测试使用。

use super::StockStore;
use crate::config::WarehouseConfig;
use crate::error::{InventoryError, Result};
use crate::types::{ProductId, Quantity};
use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// 模拟仓储系统
///
/// 每次调用都会等待配置的延迟；写入可按概率或按次数注入失败。
/// 所有写入调用按到达顺序记录，便于校验刷新行为。
#[derive(Debug)]
pub struct SimulatedWarehouse {
    stock: DashMap<ProductId, Quantity>,
    latency: Duration,
    failure_rate: f64,
    default_stock: Quantity,
    /// 接下来需要强制失败的写入次数
    forced_failures: AtomicUsize,
    get_calls: AtomicU64,
    set_history: Mutex<Vec<(ProductId, Quantity)>>,
}

impl SimulatedWarehouse {
    pub fn new(config: &WarehouseConfig) -> Self {
        Self {
            stock: DashMap::new(),
            latency: Duration::from_millis(config.latency_ms),
            failure_rate: config.failure_rate,
            default_stock: config.default_stock,
            forced_failures: AtomicUsize::new(0),
            get_calls: AtomicU64::new(0),
            set_history: Mutex::new(Vec::new()),
        }
    }

    /// 无延迟、无随机故障的实例
    pub fn instant() -> Self {
        Self::new(&WarehouseConfig {
            latency_ms: 0,
            failure_rate: 0.0,
            default_stock: 0,
        })
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// 直接设置仓储中的库存，不计入写入历史
    pub fn seed(&self, product_id: ProductId, quantity: Quantity) {
        self.stock.insert(product_id, quantity);
    }

    /// 让接下来的 `count` 次写入失败
    pub fn fail_next_sets(&self, count: usize) {
        self.forced_failures.store(count, Ordering::SeqCst);
    }

    /// 仓储中记录的库存
    pub fn stored(&self, product_id: ProductId) -> Option<Quantity> {
        self.stock.get(&product_id).map(|q| *q)
    }

    pub fn get_calls(&self) -> u64 {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// 成功写入的调用历史（按完成顺序）
    pub fn set_calls(&self) -> Vec<(ProductId, Quantity)> {
        self.set_history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 某商品成功写入的调用历史
    pub fn set_calls_for(&self, product_id: ProductId) -> Vec<Quantity> {
        self.set_calls()
            .into_iter()
            .filter(|(id, _)| *id == product_id)
            .map(|(_, q)| q)
            .collect()
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn should_fail(&self) -> bool {
        let forced = self
            .forced_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        forced || (self.failure_rate > 0.0 && rand::thread_rng().gen_bool(self.failure_rate))
    }
}

#[async_trait]
impl StockStore for SimulatedWarehouse {
    #[instrument(skip(self), level = "debug")]
    async fn get_stock(&self, product_id: ProductId) -> Result<Quantity> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        let quantity = *self
            .stock
            .entry(product_id)
            .or_insert(self.default_stock);
        debug!("warehouse get_stock: product={}, quantity={}", product_id, quantity);
        Ok(quantity)
    }

    #[instrument(skip(self), level = "debug")]
    async fn set_stock(&self, product_id: ProductId, quantity: Quantity) -> Result<()> {
        self.simulate_latency().await;
        if self.should_fail() {
            warn!("warehouse set_stock 模拟失败: product={}", product_id);
            return Err(InventoryError::SourceUnavailable(format!(
                "warehouse rejected update for product {}",
                product_id
            )));
        }
        self.stock.insert(product_id, quantity);
        self.set_history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((product_id, quantity));
        debug!("warehouse set_stock: product={}, quantity={}", product_id, quantity);
        Ok(())
    }
}
