//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了仓储系统（库存真相来源）的访问接口。

pub mod warehouse;

use crate::error::Result;
use crate::types::{ProductId, Quantity};
use async_trait::async_trait;

/// 仓储系统接口
///
/// 两个调用都可能很慢，重叠调用之间不保证顺序。
/// 任何错误都视为"未生效"。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StockStore: Send + Sync {
    /// 读取商品库存
    async fn get_stock(&self, product_id: ProductId) -> Result<Quantity>;

    /// 写入商品库存
    async fn set_stock(&self, product_id: ProductId, quantity: Quantity) -> Result<()>;
}
