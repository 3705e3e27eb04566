//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了刷新调度的公共类型和工具函数

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 刷新策略
///
/// 两种策略互斥，同一个调度器只使用其中一种
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushPolicy {
    /// 按商品防抖：每次记录都把该商品的定时器推迟一个静默期
    #[default]
    Debounce,
    /// 固定间隔：周期性清扫所有待写商品
    Interval,
}

/// 计算重试延迟的工具函数 (指数退避)
pub fn calculate_retry_delay(attempt: u32, base_delay_ms: u64) -> Duration {
    let factor = 2_u64.saturating_pow(attempt);
    Duration::from_millis(base_delay_ms.saturating_mul(factor))
}
