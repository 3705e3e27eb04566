//! stockcache - 写回式库存缓存
//!
//! 在缓慢且限流的仓储系统前提供进程内库存缓存：
//! 读写立即在缓存中生效，对仓储系统的写入按商品防抖合并后延迟刷新。

pub use tokio;

pub mod backend;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod service;
pub mod sync;
pub mod telemetry;
pub mod types;

// Re-export commonly used items
pub use backend::{warehouse::SimulatedWarehouse, StockStore};
pub use config::Config;
pub use error::{InventoryError, Result};
pub use service::InventoryService;
pub use sync::common::FlushPolicy;
pub use sync::scheduler::ShutdownReport;
pub use types::{ProductId, Quantity, StockSnapshot};

/// stockcache 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
