//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了日志与链路追踪的初始化。

use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

/// 初始化 tracing
///
/// 应在应用程序启动时调用一次。日志级别由 `RUST_LOG` 控制，
/// 未设置时使用 `default_filter`。
///
/// # 参数
///
/// * `service_name` - 服务名称，作为 tracer 名称
/// * `default_filter` - 默认过滤规则，例如 "info"
pub fn init_tracing(service_name: &str, default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // 未配置 exporter 时 provider 不导出任何 span
    let provider = SdkTracerProvider::builder().build();
    global::set_tracer_provider(provider.clone());
    let tracer = provider.tracer(service_name.to_string());

    let subscriber = Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_opentelemetry::layer().with_tracer(tracer));

    // 可能已被应用层初始化
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 关闭全局 tracer provider
pub fn shutdown_tracing() {
    global::shutdown_tracer_provider();
}
