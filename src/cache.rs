//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了库存缓存：读穿透、写回的商品数量映射。

use crate::backend::StockStore;
use crate::error::{InventoryError, Result};
use crate::metrics::GLOBAL_METRICS;
use crate::types::{ProductId, Quantity};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// 库存缓存
///
/// 进程内所有读操作的真相来源。未命中时从仓储系统回源，
/// 同一商品的并发未命中只会触发一次回源（single-flight）。
/// 条目不会过期或被淘汰，生命周期与进程相同。
pub struct InventoryCache {
    service_name: String,
    entries: Cache<ProductId, Quantity>,
    store: Arc<dyn StockStore>,
    fetch_timeout: Duration,
}

impl InventoryCache {
    /// 创建新的库存缓存
    ///
    /// # 参数
    ///
    /// * `service_name` - 服务名称
    /// * `store` - 仓储系统
    /// * `fetch_timeout` - 回源超时时间
    pub fn new(service_name: String, store: Arc<dyn StockStore>, fetch_timeout: Duration) -> Self {
        Self {
            entries: Cache::builder().name(&service_name).build(),
            service_name,
            store,
            fetch_timeout,
        }
    }

    /// 获取商品数量
    ///
    /// 命中时直接返回；未命中时回源读取并写入缓存。
    /// 回源失败返回 `SourceUnavailable`，且不会留下任何条目。
    #[instrument(skip(self), level = "debug", fields(service = %self.service_name))]
    pub async fn get(&self, product_id: ProductId) -> Result<Quantity> {
        if let Some(quantity) = self.entries.get(&product_id).await {
            debug!("cache hit: product={}, quantity={}", product_id, quantity);
            GLOBAL_METRICS.record_request(&self.service_name, "cache", "get", "hit");
            return Ok(quantity);
        }

        debug!("cache miss: product={}, fetching from stock store", product_id);
        GLOBAL_METRICS.record_request(&self.service_name, "cache", "get", "miss");

        let store = self.store.clone();
        let fetch_timeout = self.fetch_timeout;
        let quantity = self
            .entries
            .try_get_with(product_id, async move {
                match tokio::time::timeout(fetch_timeout, store.get_stock(product_id)).await {
                    Ok(result) => result,
                    Err(_) => Err(InventoryError::Timeout(format!(
                        "get_stock for product {} exceeded {:?}",
                        product_id, fetch_timeout
                    ))),
                }
            })
            .await
            .map_err(|e: Arc<InventoryError>| {
                warn!("回源失败: product={}, error={}", product_id, e);
                InventoryError::SourceUnavailable(e.to_string())
            })?;

        debug!("cache populated: product={}, quantity={}", product_id, quantity);
        Ok(quantity)
    }

    /// 覆盖写入商品数量，对后续所有读取立即可见
    pub async fn set(&self, product_id: ProductId, quantity: Quantity) {
        self.entries.insert(product_id, quantity).await;
        debug!("cache set: product={}, quantity={}", product_id, quantity);
    }

    /// 仅查看缓存，不回源
    pub async fn peek(&self, product_id: ProductId) -> Option<Quantity> {
        self.entries.get(&product_id).await
    }

    pub fn contains(&self, product_id: ProductId) -> bool {
        self.entries.contains_key(&product_id)
    }
}
