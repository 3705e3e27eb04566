//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了写回同步机制，包括更新合并、商品级锁和刷新调度。

pub mod coalescer;
pub mod common;
pub mod key_lock;
pub mod scheduler;
