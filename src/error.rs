//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了库存缓存系统的错误类型。

use crate::types::{ProductId, Quantity};
use thiserror::Error;

/// 库存缓存错误类型枚举
///
/// 同步错误（参数非法、库存不足、数据源不可用）返回给调用方，
/// `FlushFailed` 只在后台刷新路径中产生并记录日志
#[derive(Error, Debug)]
pub enum InventoryError {
    /// 数量参数非法（零或负数，或计算溢出）
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 库存不足，预留被拒绝
    #[error("Not enough stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: Quantity,
        available: Quantity,
    },

    /// 回源读取仓储系统失败
    #[error("Stock source unavailable: {0}")]
    SourceUnavailable(String),

    /// 后台刷新写入仓储系统失败
    #[error("Flush of product {product_id} failed: {reason}")]
    FlushFailed {
        product_id: ProductId,
        reason: String,
    },

    /// 超时错误
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// 服务已关闭
    #[error("Inventory service is shut down")]
    Shutdown,

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 库存操作结果类型别名
pub type Result<T> = std::result::Result<T, InventoryError>;
