//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了库存服务，组合缓存、合并器和调度器实现预留与补货。

use crate::backend::StockStore;
use crate::cache::InventoryCache;
use crate::config::{CacheConfig, Config, SchedulerConfig};
use crate::error::{InventoryError, Result};
use crate::metrics::GLOBAL_METRICS;
use crate::sync::coalescer::UpdateCoalescer;
use crate::sync::key_lock::KeyLocks;
use crate::sync::scheduler::{FlushScheduler, ShutdownReport};
use crate::types::{ProductId, Quantity, StockSnapshot};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{OwnedMutexGuard, OwnedRwLockReadGuard};
use tracing::{debug, info, instrument};

/// 库存服务
///
/// 同一商品的"读取 - 校验 - 写缓存 - 记录待写"序列在商品锁内串行执行；
/// 缓存未命中的回源在进入临界区之前完成，慢速网络调用不会占用锁。
pub struct InventoryService {
    service_name: String,
    cache: Arc<InventoryCache>,
    coalescer: Arc<UpdateCoalescer>,
    scheduler: FlushScheduler,
    locks: KeyLocks,
    failed_reservations: DashMap<ProductId, u64>,
}

impl InventoryService {
    /// 创建库存服务并启动刷新调度器
    ///
    /// 必须在 tokio 运行时中调用
    ///
    /// # 参数
    ///
    /// * `service_name` - 服务名称
    /// * `store` - 仓储系统
    /// * `cache_config` - 缓存配置
    /// * `scheduler_config` - 刷新调度配置
    #[instrument(skip(store, cache_config, scheduler_config), level = "info")]
    pub fn new(
        service_name: String,
        store: Arc<dyn StockStore>,
        cache_config: &CacheConfig,
        scheduler_config: SchedulerConfig,
    ) -> Self {
        let cache = Arc::new(InventoryCache::new(
            service_name.clone(),
            store.clone(),
            cache_config.fetch_timeout(),
        ));
        let coalescer = Arc::new(UpdateCoalescer::new(service_name.clone()));
        let scheduler = FlushScheduler::new(
            service_name.clone(),
            scheduler_config,
            store,
            coalescer.clone(),
        );
        scheduler.start();

        info!("inventory service {} initialized", service_name);
        Self {
            service_name,
            cache,
            coalescer,
            scheduler,
            locks: KeyLocks::new(),
            failed_reservations: DashMap::new(),
        }
    }

    /// 根据配置创建库存服务
    pub fn from_config(config: &Config, store: Arc<dyn StockStore>) -> Result<Self> {
        config.validate().map_err(InventoryError::Config)?;
        Ok(Self::new(
            config.service_name.clone(),
            store,
            &config.cache,
            config.scheduler.clone(),
        ))
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn cache(&self) -> &InventoryCache {
        &self.cache
    }

    pub fn coalescer(&self) -> &UpdateCoalescer {
        &self.coalescer
    }

    pub fn scheduler(&self) -> &FlushScheduler {
        &self.scheduler
    }

    /// 查询商品当前库存
    pub async fn get_stock(&self, product_id: ProductId) -> Result<Quantity> {
        self.cache.get(product_id).await
    }

    /// 预留（扣减）库存
    ///
    /// 库存不足时返回 `InsufficientStock`，不做任何修改。
    /// 成功时返回扣减后的数量。
    ///
    /// 取消安全：在提交开始前丢弃 future 不会留下任何修改；
    /// 提交开始后缓存写入与待写登记一定一起完成。
    #[instrument(skip(self), level = "debug", fields(service = %self.service_name))]
    pub async fn reserve(&self, product_id: ProductId, amount: i64) -> Result<Quantity> {
        let amount = validate_amount(amount)?;
        self.ensure_running()?;
        self.cache.get(product_id).await?;

        let guard = self.locks.lock(product_id).await;
        let permit = self.scheduler.admit().await?;
        let current = self.cache.get(product_id).await?;
        if current < amount {
            *self.failed_reservations.entry(product_id).or_insert(0) += 1;
            GLOBAL_METRICS.record_request(&self.service_name, "service", "reserve", "rejected");
            debug!(
                "reserve rejected: product={}, requested={}, available={}",
                product_id, amount, current
            );
            return Err(InventoryError::InsufficientStock {
                product_id,
                requested: amount,
                available: current,
            });
        }

        let updated = current - amount;
        self.commit(product_id, updated, guard, permit).await?;
        GLOBAL_METRICS.record_request(&self.service_name, "service", "reserve", "ok");
        debug!(
            "reserved product={}: {} -> {}",
            product_id, current, updated
        );
        Ok(updated)
    }

    /// 补货（增加）库存，返回增加后的数量
    ///
    /// 取消语义与 [`reserve`](Self::reserve) 相同。
    #[instrument(skip(self), level = "debug", fields(service = %self.service_name))]
    pub async fn replenish(&self, product_id: ProductId, amount: i64) -> Result<Quantity> {
        let amount = validate_amount(amount)?;
        self.ensure_running()?;
        self.cache.get(product_id).await?;

        let guard = self.locks.lock(product_id).await;
        let permit = self.scheduler.admit().await?;
        let current = self.cache.get(product_id).await?;
        let updated = current.checked_add(amount).ok_or_else(|| {
            InventoryError::InvalidArgument(format!(
                "replenishing product {} by {} overflows the stock counter",
                product_id, amount
            ))
        })?;

        self.commit(product_id, updated, guard, permit).await?;
        GLOBAL_METRICS.record_request(&self.service_name, "service", "replenish", "ok");
        debug!(
            "replenished product={}: {} -> {}",
            product_id, current, updated
        );
        Ok(updated)
    }

    /// 只读地检查库存是否足够预留，不做任何修改
    pub async fn check_availability(&self, product_id: ProductId, amount: i64) -> Result<bool> {
        let amount = validate_amount(amount)?;
        Ok(self.cache.get(product_id).await? >= amount)
    }

    /// 商品库存快照
    pub async fn snapshot(&self, product_id: ProductId) -> Result<StockSnapshot> {
        let quantity = self.cache.get(product_id).await?;
        Ok(StockSnapshot {
            product_id,
            quantity,
            pending_flush: self.coalescer.peek(product_id),
            failed_reservations: self
                .failed_reservations
                .get(&product_id)
                .map(|n| *n)
                .unwrap_or(0),
        })
    }

    /// 关闭服务：停止调度器并尽力刷新所有待写数量
    ///
    /// 之后的预留与补货返回 `Shutdown`，读取仍然可用
    pub async fn shutdown(&self) -> ShutdownReport {
        info!("正在关闭库存服务 {}", self.service_name);
        self.scheduler.shutdown().await
    }

    /// 写缓存并登记待写数量
    ///
    /// 在独立任务中执行，商品锁与提交许可随任务一起释放，
    /// 调用方被取消时提交仍会完整执行。
    async fn commit(
        &self,
        product_id: ProductId,
        quantity: Quantity,
        guard: OwnedMutexGuard<()>,
        permit: OwnedRwLockReadGuard<()>,
    ) -> Result<()> {
        let cache = self.cache.clone();
        let coalescer = self.coalescer.clone();
        let scheduler = self.scheduler.clone();
        let task = tokio::spawn(async move {
            cache.set(product_id, quantity).await;
            coalescer.record(product_id, quantity);
            scheduler.schedule(product_id);
            drop(permit);
            drop(guard);
        });

        match task.await {
            Ok(()) => Ok(()),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            // 只有运行时关闭时任务才会被取消
            Err(_) => Err(InventoryError::Shutdown),
        }
    }

    fn ensure_running(&self) -> Result<()> {
        if self.scheduler.is_shut_down() {
            return Err(InventoryError::Shutdown);
        }
        Ok(())
    }
}

fn validate_amount(amount: i64) -> Result<Quantity> {
    if amount <= 0 {
        return Err(InventoryError::InvalidArgument(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    Ok(amount as Quantity)
}
