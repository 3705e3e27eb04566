//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了刷新调度器，负责把合并后的待写数量推送到仓储系统。

use super::coalescer::UpdateCoalescer;
use super::common::{calculate_retry_delay, FlushPolicy};
use super::key_lock::KeyLocks;
use crate::backend::StockStore;
use crate::config::SchedulerConfig;
use crate::error::{InventoryError, Result};
use crate::metrics::GLOBAL_METRICS;
use crate::types::{ProductId, Quantity};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, RwLock};
use tokio::time::{timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

/// 关闭时最终刷新的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// 成功写入的商品数
    pub flushed: usize,
    /// 最终仍未写入的商品
    pub failed: Vec<ProductId>,
}

/// 刷新调度器
///
/// debounce 策略下，每个商品在注册表中最多有一个定时器；
/// 新记录会把触发时刻推迟一个静默期，触发后定时器被销毁。
/// interval 策略下，由一个后台任务按固定间隔清扫所有待写商品。
#[derive(Clone)]
pub struct FlushScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    service_name: String,
    config: SchedulerConfig,
    store: Arc<dyn StockStore>,
    coalescer: Arc<UpdateCoalescer>,
    /// 定时器注册表：商品 -> 触发时刻
    timers: DashMap<ProductId, Instant>,
    /// 同一商品的刷新串行执行，旧值不会晚于新值到达仓储系统
    flush_locks: KeyLocks,
    /// 提交闸门：提交持有读锁，关闭持有写锁后才收集最终待写商品
    commit_gate: Arc<RwLock<()>>,
    cancel: CancellationToken,
    tasks: TaskTracker,
    started: AtomicBool,
    shut_down: AtomicBool,
}

impl FlushScheduler {
    /// 创建新的刷新调度器
    ///
    /// # 参数
    ///
    /// * `service_name` - 服务名称
    /// * `config` - 调度配置
    /// * `store` - 仓储系统
    /// * `coalescer` - 更新合并器，调度器是唯一会从中移除条目的一方
    pub fn new(
        service_name: String,
        config: SchedulerConfig,
        store: Arc<dyn StockStore>,
        coalescer: Arc<UpdateCoalescer>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                service_name,
                config,
                store,
                coalescer,
                timers: DashMap::new(),
                flush_locks: KeyLocks::new(),
                commit_gate: Arc::new(RwLock::new(())),
                cancel: CancellationToken::new(),
                tasks: TaskTracker::new(),
                started: AtomicBool::new(false),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// 启动调度器
    ///
    /// interval 策略会在这里启动清扫任务，必须在 tokio 运行时中调用。
    /// 重复调用无副作用。
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(
            "启动刷新调度器: service={}, policy={:?}",
            self.inner.service_name, self.inner.config.policy
        );
        if self.inner.config.policy == FlushPolicy::Interval {
            let inner = self.inner.clone();
            self.inner.tasks.spawn(SchedulerInner::run_sweeper(inner));
        }
    }

    pub fn policy(&self) -> FlushPolicy {
        self.inner.config.policy
    }

    /// 通知调度器某商品有新的待写数量
    pub fn schedule(&self, product_id: ProductId) {
        if self.inner.config.policy == FlushPolicy::Debounce {
            SchedulerInner::arm(&self.inner, product_id);
        }
    }

    /// 当前已激活的防抖定时器数量
    pub fn pending_timers(&self) -> usize {
        self.inner.timers.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    /// 申请一次提交许可
    ///
    /// 在读锁下检查关闭状态，已关闭时返回 `Shutdown`。
    /// 持有许可期间 `shutdown()` 不会开始收集最终待写商品，
    /// 因此许可内登记的数量一定会被定时器或最终刷新处理。
    pub async fn admit(&self) -> Result<OwnedRwLockReadGuard<()>> {
        let permit = self.inner.commit_gate.clone().read_owned().await;
        if self.is_shut_down() {
            return Err(InventoryError::Shutdown);
        }
        Ok(permit)
    }

    /// 关闭调度器
    ///
    /// 先等待已获得许可的提交完成，再取消所有定时器、等待进行中的刷新结束，
    /// 然后对所有剩余待写数量做一次尽力而为的最终刷新（每个商品只尝试一次）。
    #[instrument(skip(self), level = "info", fields(service = %self.inner.service_name))]
    pub async fn shutdown(&self) -> ShutdownReport {
        {
            let _gate = self.inner.commit_gate.write().await;
            if self.inner.shut_down.swap(true, Ordering::SeqCst) {
                return ShutdownReport::default();
            }
        }
        info!("正在关闭刷新调度器...");

        self.inner.cancel.cancel();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        self.inner.timers.clear();

        let keys = self.inner.coalescer.pending_keys();
        info!("最终刷新 {} 个待写商品", keys.len());

        let results = join_all(
            keys.into_iter()
                .map(|product_id| self.inner.final_flush(product_id)),
        )
        .await;

        let mut report = ShutdownReport::default();
        for (product_id, ok) in results {
            if ok {
                report.flushed += 1;
            } else {
                report.failed.push(product_id);
            }
        }

        if report.failed.is_empty() {
            info!("刷新调度器已关闭, flushed={}", report.flushed);
        } else {
            warn!(
                "刷新调度器已关闭, {} 个商品最终刷新失败: {:?}",
                report.failed.len(),
                report.failed
            );
        }
        report
    }
}

impl SchedulerInner {
    /// 创建或推迟商品的防抖定时器
    fn arm(this: &Arc<Self>, product_id: ProductId) {
        if this.shut_down.load(Ordering::SeqCst) {
            return;
        }
        let deadline = Instant::now() + this.config.quiet_period();
        let created = match this.timers.entry(product_id) {
            Entry::Occupied(mut timer) => {
                *timer.get_mut() = deadline;
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(deadline);
                true
            }
        };

        if created {
            debug!("armed flush timer: product={}", product_id);
            let inner = this.clone();
            this.tasks
                .spawn(async move { Self::run_timer(inner, product_id).await });
        } else {
            debug!("debounce reset: product={}", product_id);
        }
    }

    /// 单个商品的定时器任务
    ///
    /// 等到注册表中的触发时刻；若期间被推迟则继续等待，
    /// 到期后从注册表移除定时器再执行刷新。
    async fn run_timer(this: Arc<Self>, product_id: ProductId) {
        loop {
            let deadline = match this.timers.get(&product_id) {
                Some(deadline) => *deadline,
                None => return,
            };

            tokio::select! {
                _ = this.cancel.cancelled() => {
                    debug!("flush timer cancelled: product={}", product_id);
                    return;
                }
                _ = tokio::time::sleep_until(deadline) => {}
            }

            // 移除之后、take_if_present 之前登记的数量会被本次刷新提前带走，
            // 它新建的定时器到期时找不到待写数量，直接结束
            let now = Instant::now();
            if this
                .timers
                .remove_if(&product_id, |_, deadline| *deadline <= now)
                .is_some()
            {
                break;
            }
        }

        Self::flush_key(&this, product_id).await;
    }

    /// 固定间隔清扫任务
    async fn run_sweeper(this: Arc<Self>) {
        let mut interval = tokio::time::interval_at(
            Instant::now() + this.config.flush_interval(),
            this.config.flush_interval(),
        );
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = this.cancel.cancelled() => {
                    debug!("sweeper cancelled: service={}", this.service_name);
                    return;
                }
                _ = interval.tick() => {
                    Self::sweep(&this).await;
                }
            }
        }
    }

    async fn sweep(this: &Arc<Self>) {
        let keys = this.coalescer.pending_keys();
        if keys.is_empty() {
            debug!("no pending updates to flush");
            return;
        }
        debug!("sweeping {} pending updates", keys.len());
        join_all(
            keys.into_iter()
                .map(|product_id| Self::flush_key(this, product_id)),
        )
        .await;
    }

    /// 刷新单个商品
    ///
    /// 失败时把数量放回合并器（仅当期间没有更新的记录）并重新排期，
    /// 错误只记录日志，不会影响其他商品。
    async fn flush_key(this: &Arc<Self>, product_id: ProductId) {
        let _guard = this.flush_locks.lock(product_id).await;

        let Some(quantity) = this.coalescer.take_if_present(product_id) else {
            debug!("nothing pending for product={}, timer discarded", product_id);
            return;
        };

        match this.write_with_retry(product_id, quantity).await {
            Ok(()) => {
                info!("flushed product={} quantity={}", product_id, quantity);
                GLOBAL_METRICS.record_request(&this.service_name, "flush", "set_stock", "ok");
            }
            Err(e) => {
                error!("{}", e);
                GLOBAL_METRICS.record_request(&this.service_name, "flush", "set_stock", "failed");
                if this.coalescer.restore(product_id, quantity) {
                    warn!(
                        "re-recorded product={} quantity={} for the next flush cycle",
                        product_id, quantity
                    );
                    if this.config.policy == FlushPolicy::Debounce {
                        Self::arm(this, product_id);
                    }
                } else {
                    debug!(
                        "newer value pending for product={}, dropping failed quantity={}",
                        product_id, quantity
                    );
                }
            }
        }
    }

    /// 带超时和指数退避的写入
    async fn write_with_retry(&self, product_id: ProductId, quantity: Quantity) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.write_once(product_id, quantity).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.config.max_retries => {
                    let delay = calculate_retry_delay(attempt, self.config.retry_base_delay_ms);
                    warn!(
                        "set_stock failed for product={} (attempt {}), retrying in {:?}: {}",
                        product_id,
                        attempt + 1,
                        delay,
                        e
                    );
                    GLOBAL_METRICS.record_request(
                        &self.service_name,
                        "flush",
                        "set_stock",
                        "retried",
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(InventoryError::FlushFailed {
                        product_id,
                        reason: e.to_string(),
                    })
                }
            }
        }
    }

    async fn write_once(&self, product_id: ProductId, quantity: Quantity) -> Result<()> {
        let command_timeout = self.config.command_timeout();
        match timeout(command_timeout, self.store.set_stock(product_id, quantity)).await {
            Ok(result) => result,
            Err(_) => Err(InventoryError::Timeout(format!(
                "set_stock exceeded {:?}",
                command_timeout
            ))),
        }
    }

    /// 关闭时的最终刷新，只尝试一次
    async fn final_flush(&self, product_id: ProductId) -> (ProductId, bool) {
        let _guard = self.flush_locks.lock(product_id).await;
        let Some(quantity) = self.coalescer.take_if_present(product_id) else {
            return (product_id, true);
        };

        match self.write_once(product_id, quantity).await {
            Ok(()) => {
                info!("final flush product={} quantity={}", product_id, quantity);
                GLOBAL_METRICS.record_request(&self.service_name, "flush", "set_stock", "ok");
                (product_id, true)
            }
            Err(e) => {
                error!(
                    "final flush failed for product={} quantity={}: {}",
                    product_id, quantity, e
                );
                GLOBAL_METRICS.record_request(&self.service_name, "flush", "set_stock", "failed");
                self.coalescer.restore(product_id, quantity);
                (product_id, false)
            }
        }
    }
}
