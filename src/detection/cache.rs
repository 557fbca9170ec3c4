//! 检测结果缓存 (Detection Cache)
//!
//! 容量 + TTL 双重淘汰:
//! - 超出容量时淘汰插入时间最早的条目 (按插入顺序, 不是 LRU)
//! - `get` 时惰性检查过期, 过期条目视为未命中并删除
//!
//! 单写者: 并发使用需要调用方自行加锁。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::types::Detection;

pub const DEFAULT_CAPACITY: usize = 20;
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// 缓存条目
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: Vec<Detection>,
    pub inserted_at: Instant,
    /// 插入序号, 插入时间相同时按序号淘汰
    pub seq: u64,
}

#[derive(Debug)]
pub struct DetectionCache {
    capacity: usize,
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
    next_seq: u64,
}

impl Default for DetectionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl DetectionCache {
    /// 容量至少为 1
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            ttl,
            entries: HashMap::with_capacity(capacity + 1),
            next_seq: 0,
        }
    }

    pub fn get(&mut self, key: &str) -> Option<Vec<Detection>> {
        self.get_at(key, Instant::now())
    }

    pub fn put(&mut self, key: impl Into<String>, value: Vec<Detection>) {
        self.put_at(key, value, Instant::now())
    }

    pub fn get_at(&mut self, key: &str, now: Instant) -> Option<Vec<Detection>> {
        let expired = match self.entries.get(key) {
            None => return None,
            Some(entry) => now.saturating_duration_since(entry.inserted_at) > self.ttl,
        };

        if expired {
            log::debug!("🗑️ 缓存过期: {}", key);
            self.entries.remove(key);
            return None;
        }

        self.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn put_at(&mut self, key: impl Into<String>, value: Vec<Detection>, now: Instant) {
        let key = key.into();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                value,
                inserted_at: now,
                seq,
            },
        );

        if self.entries.len() > self.capacity {
            self.evict_oldest();
        }
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .values()
            .min_by_key(|entry| (entry.inserted_at, entry.seq))
            .map(|entry| entry.key.clone());

        if let Some(key) = oldest {
            log::debug!("🗑️ 缓存已满, 淘汰最早条目: {}", key);
            self.entries.remove(&key);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
