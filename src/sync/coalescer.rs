//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了更新合并器：每个商品只保留最近一次待刷新的数量。

use crate::metrics::GLOBAL_METRICS;
use crate::types::{ProductId, Quantity};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// 更新合并器
///
/// 保存"仍需写入仓储系统的最新数量"。同一商品在刷新前的多次记录
/// 会被合并为一次，中间值永远不会被刷新。
pub struct UpdateCoalescer {
    service_name: String,
    pending: DashMap<ProductId, Quantity>,
}

impl UpdateCoalescer {
    pub fn new(service_name: String) -> Self {
        Self {
            service_name,
            pending: DashMap::new(),
        }
    }

    /// 记录（或覆盖）商品的待刷新数量
    pub fn record(&self, product_id: ProductId, quantity: Quantity) {
        if let Some(previous) = self.pending.insert(product_id, quantity) {
            debug!(
                "coalesced update: product={}, {} -> {}",
                product_id, previous, quantity
            );
        }
        self.report_size();
    }

    /// 原子地取出并移除商品的待刷新数量
    ///
    /// 取出之后到达的记录会开启新的待刷新周期，不会与进行中的刷新竞争
    pub fn take_if_present(&self, product_id: ProductId) -> Option<Quantity> {
        let taken = self.pending.remove(&product_id).map(|(_, quantity)| quantity);
        if taken.is_some() {
            self.report_size();
        }
        taken
    }

    /// 刷新失败后放回数量
    ///
    /// 只有在期间没有更新的记录时才放回，避免旧值覆盖新值。
    /// 返回值表示是否真的放回了。
    pub fn restore(&self, product_id: ProductId, quantity: Quantity) -> bool {
        let restored = match self.pending.entry(product_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(quantity);
                true
            }
        };
        self.report_size();
        restored
    }

    /// 查看待刷新数量，不移除
    pub fn peek(&self, product_id: ProductId) -> Option<Quantity> {
        self.pending.get(&product_id).map(|q| *q)
    }

    /// 当前所有待刷新的商品
    pub fn pending_keys(&self) -> Vec<ProductId> {
        self.pending.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn report_size(&self) {
        GLOBAL_METRICS.set_pending_updates(&self.service_name, self.pending.len());
    }
}
