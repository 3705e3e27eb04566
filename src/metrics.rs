//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了库存缓存的指标收集功能。

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{span, Level};

/// 指标收集器
///
/// 用于收集和存储库存缓存的运行时指标
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    /// 请求总数统计
    /// key: "service:component:op:result"
    pub requests_total: Arc<Mutex<HashMap<String, u64>>>,
    /// 待刷新缓冲区大小
    pub pending_updates: Arc<Mutex<HashMap<String, usize>>>,
}

lazy_static! {
    /// 全局指标实例
    pub static ref GLOBAL_METRICS: Metrics = Metrics::default();
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Metrics {
    /// 记录请求指标
    ///
    /// # 参数
    ///
    /// * `service` - 服务名称
    /// * `component` - 组件（cache/service/flush）
    /// * `op` - 操作类型（get/reserve/replenish/set_stock）
    /// * `result` - 操作结果（hit/miss/ok/rejected/failed/retried）
    pub fn record_request(&self, service: &str, component: &str, op: &str, result: &str) {
        let span = span!(Level::TRACE, "inventory_metric", service, component, op, result);
        let _enter = span.enter();
        let key = format!("{}:{}:{}:{}", service, component, op, result);
        *lock(&self.requests_total).entry(key).or_insert(0) += 1;
    }

    /// 读取某个请求计数
    pub fn request_count(&self, service: &str, component: &str, op: &str, result: &str) -> u64 {
        let key = format!("{}:{}:{}:{}", service, component, op, result);
        lock(&self.requests_total).get(&key).copied().unwrap_or(0)
    }

    /// 设置待刷新缓冲区大小
    pub fn set_pending_updates(&self, service: &str, size: usize) {
        lock(&self.pending_updates).insert(service.to_string(), size);
    }
}

/// 获取指标字符串
///
/// 将所有指标格式化为 Prometheus 文本格式
pub fn get_metrics_string() -> String {
    let metrics = &GLOBAL_METRICS;
    let reqs = lock(&metrics.requests_total);
    let pending = lock(&metrics.pending_updates);

    let mut output = String::new();
    let mut keys: Vec<_> = reqs.keys().collect();
    keys.sort();
    for k in keys {
        let parts: Vec<&str> = k.split(':').collect();
        if parts.len() == 4 {
            output.push_str(&format!(
                "inventory_requests_total{{service=\"{}\", component=\"{}\", operation=\"{}\", result=\"{}\"}} {}\n",
                parts[0], parts[1], parts[2], parts[3], reqs[k]
            ));
        }
    }
    for (k, v) in pending.iter() {
        output.push_str(&format!(
            "inventory_pending_updates{{service=\"{}\"}} {}\n",
            k, v
        ));
    }
    output
}
