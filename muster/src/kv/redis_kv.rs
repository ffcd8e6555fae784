//! Redis 键值缓存实现
//! Redis key-value cache implementation

use crate::error::{Error, Result};
use crate::kv::KvStore;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, IntoConnectionInfo};
use std::collections::BTreeSet;
use std::time::Duration;

/// Redis 缓存
/// Redis cache
///
/// 持有一个多路复用连接，每次调用克隆句柄，无需进程内加锁。
/// Holds one multiplexed connection and clones the handle per call, so no
/// in-process locking is needed.
#[derive(Clone)]
pub struct RedisKv {
  conn: MultiplexedConnection,
}

impl RedisKv {
  /// 从连接信息创建缓存实例
  /// Create a cache instance from connection info
  pub async fn new<T: IntoConnectionInfo>(connection_info: T) -> Result<Self> {
    let client = Client::open(connection_info)?;
    Self::from_client(&client).await
  }

  /// 从现有客户端创建缓存实例
  /// Create a cache instance from an existing client
  pub async fn from_client(client: &Client) -> Result<Self> {
    let conn = client.get_multiplexed_async_connection().await?;
    Ok(Self { conn })
  }
}

/// 转义 Redis glob 元字符，使前缀按字面匹配
/// Escape Redis glob metacharacters so the prefix matches literally
pub(crate) fn escape_glob(prefix: &str) -> String {
  let mut escaped = String::with_capacity(prefix.len() + 1);
  for c in prefix.chars() {
    if matches!(c, '*' | '?' | '[' | ']' | '\\' | '^' | '-') {
      escaped.push('\\');
    }
    escaped.push(c);
  }
  escaped.push('*');
  escaped
}

fn ttl_millis(ttl: Duration) -> u64 {
  u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl KvStore for RedisKv {
  async fn ping(&self) -> Result<()> {
    let mut conn = self.conn.clone();
    let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
    if pong != "PONG" {
      return Err(Error::other(format!("unexpected PING reply: {pong}")));
    }
    Ok(())
  }

  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let mut conn = self.conn.clone();
    let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
    Ok(value)
  }

  async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
    let mut conn = self.conn.clone();
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value);
    if let Some(ttl) = ttl {
      cmd.arg("PX").arg(ttl_millis(ttl));
    }
    cmd.query_async::<()>(&mut conn).await?;
    Ok(())
  }

  async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
    if keys.is_empty() {
      return Ok(Vec::new());
    }
    let mut conn = self.conn.clone();
    let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
    Ok(values)
  }

  async fn scan_prefix(&self, prefix: &str, page_size: usize) -> Result<Vec<String>> {
    let mut conn = self.conn.clone();
    let pattern = escape_glob(prefix);
    // SCAN 可能重复返回同一个键
    // SCAN may return the same key more than once
    let mut keys = BTreeSet::new();
    let mut cursor: u64 = 0;
    loop {
      let (next, page): (u64, Vec<String>) = redis::cmd("SCAN")
        .arg(cursor)
        .arg("MATCH")
        .arg(&pattern)
        .arg("COUNT")
        .arg(page_size.max(1))
        .query_async(&mut conn)
        .await?;
      keys.extend(page);
      if next == 0 {
        break;
      }
      cursor = next;
    }
    Ok(keys.into_iter().collect())
  }

  async fn delete(&self, key: &str) -> Result<bool> {
    let mut conn = self.conn.clone();
    let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
    Ok(removed > 0)
  }

  async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
    let mut conn = self.conn.clone();
    let updated: i64 = redis::cmd("PEXPIRE")
      .arg(key)
      .arg(ttl_millis(ttl))
      .query_async(&mut conn)
      .await?;
    Ok(updated == 1)
  }
}
