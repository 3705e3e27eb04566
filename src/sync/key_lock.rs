//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 按商品加锁的异步互斥锁注册表。

use crate::types::ProductId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 商品级锁注册表
///
/// 同一商品的临界区互斥，不同商品之间互不阻塞。
/// 锁对象在首次使用时创建，之后常驻。
#[derive(Default)]
pub struct KeyLocks {
    locks: DashMap<ProductId, Arc<Mutex<()>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取商品锁，守卫释放时解锁
    pub async fn lock(&self, product_id: ProductId) -> OwnedMutexGuard<()> {
        let mutex = self.locks.entry(product_id).or_default().clone();
        mutex.lock_owned().await
    }
}
