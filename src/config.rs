//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了库存缓存系统的配置结构和解析逻辑。

use crate::error::{InventoryError, Result};
use crate::sync::common::FlushPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// 顶层配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 服务名称，用于日志和指标标签
    pub service_name: String,
    /// 库存缓存配置
    pub cache: CacheConfig,
    /// 刷新调度配置
    pub scheduler: SchedulerConfig,
    /// 模拟仓储系统配置（CLI 模拟模式使用）
    pub warehouse: WarehouseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "inventory".to_string(),
            cache: CacheConfig::default(),
            scheduler: SchedulerConfig::default(),
            warehouse: WarehouseConfig::default(),
        }
    }
}

/// 库存缓存配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// 缓存未命中时回源读取的超时时间（毫秒）
    pub fetch_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 5000,
        }
    }
}

impl CacheConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// 刷新调度配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 刷新策略
    pub policy: FlushPolicy,
    /// 防抖静默期（毫秒），仅 debounce 策略使用
    pub quiet_period_ms: u64,
    /// 固定刷新间隔（毫秒），仅 interval 策略使用
    pub flush_interval_ms: u64,
    /// 单次写入仓储系统的超时时间（毫秒）
    pub command_timeout_ms: u64,
    /// 单个刷新周期内的最大重试次数
    pub max_retries: u32,
    /// 重试基础延迟（毫秒），按指数退避增长
    pub retry_base_delay_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            policy: FlushPolicy::Debounce,
            quiet_period_ms: 2500,
            flush_interval_ms: 5000,
            command_timeout_ms: 3000,
            max_retries: 2,
            retry_base_delay_ms: 100,
        }
    }
}

impl SchedulerConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// 模拟仓储系统配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct WarehouseConfig {
    /// 每次调用的模拟延迟（毫秒）
    pub latency_ms: u64,
    /// 写入失败概率，取值 [0, 1)
    pub failure_rate: f64,
    /// 未知商品的初始库存
    pub default_stock: u64,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            latency_ms: 500,
            failure_rate: 0.0,
            default_stock: 100,
        }
    }
}

impl Config {
    /// 从 TOML 文件加载配置并验证
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        content.parse()
    }

    /// 验证配置
    ///
    /// 检查各字段是否在合理范围内
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.service_name.is_empty() {
            return Err("service_name cannot be empty".to_string());
        }

        if self.service_name.len() > 64 {
            return Err(format!(
                "service_name '{}' exceeds maximum length of 64 characters",
                self.service_name
            ));
        }

        if !(1..=60000).contains(&self.cache.fetch_timeout_ms) {
            return Err("cache.fetch_timeout_ms must be between 1 and 60000 ms".to_string());
        }

        let scheduler = &self.scheduler;
        match scheduler.policy {
            FlushPolicy::Debounce => {
                if !(1..=60000).contains(&scheduler.quiet_period_ms) {
                    return Err(
                        "scheduler.quiet_period_ms must be between 1 and 60000 ms".to_string()
                    );
                }
            }
            FlushPolicy::Interval => {
                if !(1..=600000).contains(&scheduler.flush_interval_ms) {
                    return Err(
                        "scheduler.flush_interval_ms must be between 1 and 600000 ms".to_string(),
                    );
                }
            }
        }

        if !(1..=60000).contains(&scheduler.command_timeout_ms) {
            return Err("scheduler.command_timeout_ms must be between 1 and 60000 ms".to_string());
        }

        if scheduler.max_retries > 10 {
            return Err("scheduler.max_retries cannot exceed 10".to_string());
        }

        if scheduler.retry_base_delay_ms > 10000 {
            return Err("scheduler.retry_base_delay_ms cannot exceed 10000 ms".to_string());
        }

        if !(0.0..1.0).contains(&self.warehouse.failure_rate) {
            return Err("warehouse.failure_rate must be in [0, 1)".to_string());
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(s).map_err(|e| InventoryError::Config(e.to_string()))?;
        config.validate().map_err(InventoryError::Config)?;
        Ok(config)
    }
}
