//! 键值缓存模块
//! Key-value cache module
//!
//! 位置缓存与事件状态缓存都建立在这个最小接口上：按键读写字节串、批量读取、
//! 按前缀扫描以及设置过期时间。
//! Both the location cache and the event state cache sit on this narrow
//! interface: byte-string get/set by key, batch reads, prefix scans and expiry.
//!
//! - [`RedisKv`] 使用 Redis 作为共享缓存 / uses Redis as the shared cache
//! - [`MemoryKv`] 进程内实现，用于测试与单机运行 / in-process implementation for tests and single-node runs

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

mod memory;
mod redis_kv;

pub use memory::MemoryKv;
pub use redis_kv::RedisKv;

/// 键值缓存接口
/// Key-value cache interface
///
/// 每个操作只涉及单个键（`mget` 只读），因此实现无需跨键事务。
/// Every operation touches a single key (`mget` is read-only), so
/// implementations need no cross-key transactions.
#[async_trait]
pub trait KvStore: Send + Sync {
  /// 测试连接
  /// Ping the cache
  async fn ping(&self) -> Result<()>;

  /// 读取单个键
  /// Read one key
  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

  /// 写入单个键，`ttl` 为 None 时永不过期
  /// Write one key; a `None` ttl never expires
  async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

  /// 批量读取，结果与输入键一一对应
  /// Batch read; results line up with the requested keys
  async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

  /// 列出所有以 `prefix` 开头的键
  /// List every key starting with `prefix`
  async fn scan_prefix(&self, prefix: &str, page_size: usize) -> Result<Vec<String>>;

  /// 删除单个键，返回键是否存在
  /// Delete one key, returning whether it existed
  async fn delete(&self, key: &str) -> Result<bool>;

  /// 重设键的过期时间，返回键是否存在
  /// Reset the expiry of a key, returning whether it existed
  async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;
}
