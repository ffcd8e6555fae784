//! 内存键值缓存
//! In-memory key-value cache
//!
//! 过期时间以 `tokio::time::Instant` 计算，测试可以暂停并推进时钟。
//! Expiry is measured with `tokio::time::Instant`, so tests can pause and
//! advance the clock.

use crate::error::Result;
use crate::kv::KvStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Clone)]
struct Entry {
  value: Vec<u8>,
  expires_at: Option<Instant>,
}

impl Entry {
  fn is_live(&self, now: Instant) -> bool {
    !matches!(self.expires_at, Some(at) if at <= now)
  }
}

/// 内存缓存实现
/// Memory cache implementation
#[derive(Clone, Default)]
pub struct MemoryKv {
  entries: Arc<RwLock<BTreeMap<String, Entry>>>,
}

impl MemoryKv {
  pub fn new() -> Self {
    Self::default()
  }

  /// 当前未过期的键数量
  /// Number of live keys
  pub async fn len(&self) -> usize {
    let now = Instant::now();
    let entries = self.entries.read().await;
    entries.values().filter(|e| e.is_live(now)).count()
  }

  pub async fn is_empty(&self) -> bool {
    self.len().await == 0
  }
}

#[async_trait]
impl KvStore for MemoryKv {
  async fn ping(&self) -> Result<()> {
    Ok(())
  }

  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let now = Instant::now();
    let entries = self.entries.read().await;
    Ok(
      entries
        .get(key)
        .filter(|e| e.is_live(now))
        .map(|e| e.value.clone()),
    )
  }

  async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
    let expires_at = ttl.map(|ttl| Instant::now() + ttl);
    let mut entries = self.entries.write().await;
    entries.insert(
      key.to_string(),
      Entry {
        value: value.to_vec(),
        expires_at,
      },
    );
    Ok(())
  }

  async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
    let now = Instant::now();
    let entries = self.entries.read().await;
    Ok(
      keys
        .iter()
        .map(|k| {
          entries
            .get(k)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone())
        })
        .collect(),
    )
  }

  async fn scan_prefix(&self, prefix: &str, _page_size: usize) -> Result<Vec<String>> {
    let now = Instant::now();
    let entries = self.entries.read().await;
    Ok(
      entries
        .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
        .take_while(|(k, _)| k.starts_with(prefix))
        .filter(|(_, e)| e.is_live(now))
        .map(|(k, _)| k.clone())
        .collect(),
    )
  }

  async fn delete(&self, key: &str) -> Result<bool> {
    let now = Instant::now();
    let mut entries = self.entries.write().await;
    Ok(entries.remove(key).is_some_and(|e| e.is_live(now)))
  }

  async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
    let now = Instant::now();
    let mut entries = self.entries.write().await;
    match entries.get_mut(key) {
      Some(entry) if entry.is_live(now) => {
        entry.expires_at = Some(now + ttl);
        Ok(true)
      }
      _ => Ok(false),
    }
  }
}
