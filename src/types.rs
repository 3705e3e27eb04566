//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了库存领域的基础类型。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 库存数量（手头单位数），永不为负
pub type Quantity = u64;

/// 商品标识
///
/// 不透明的正整数，唯一标识一条库存记录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub u64);

impl ProductId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for ProductId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 商品库存快照
///
/// 包含缓存中的当前数量、尚未刷新到仓储系统的待写值，以及被拒绝的预留次数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockSnapshot {
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub pending_flush: Option<Quantity>,
    pub failed_reservations: u64,
}
