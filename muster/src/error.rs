//! 错误处理模块
//! Error handling module
//!
//! 定义了 muster 库中使用的各种错误类型
//! Defines the error types used across the muster library

use thiserror::Error;

/// muster 库的结果类型
/// Result type for the muster library
pub type Result<T> = std::result::Result<T, Error>;

/// muster 错误类型
/// muster error type
#[derive(Error, Debug)]
pub enum Error {
  /// Redis 错误
  /// Redis error
  #[error("Redis error: {0}")]
  Redis(#[from] redis::RedisError),

  /// 序列化错误
  /// Serialization error
  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// 实体未找到
  /// Entity not found
  #[error("{kind} not found: {id}")]
  NotFound { kind: &'static str, id: String },

  /// 无效输入
  /// Invalid input
  #[error("Invalid input: {message}")]
  InvalidInput { message: String },

  /// 通知网关错误
  /// Notification gateway error
  #[error("Gateway error: {message}")]
  Gateway { message: String },

  /// 存储错误
  /// Store error
  #[error("Store error: {message}")]
  Store { message: String },

  /// 超时错误
  /// Timeout error
  #[error("Operation timeout")]
  Timeout,

  /// 取消错误
  /// Cancellation error
  #[error("Operation cancelled")]
  Cancelled,

  /// 配置错误
  /// Configuration error
  #[error("Configuration error: {message}")]
  Config { message: String },

  /// 其他错误
  /// Other error
  #[error("Other error: {message}")]
  Other { message: String },
}

impl Error {
  /// 创建未找到错误
  /// Create a not found error
  pub fn not_found<S: Into<String>>(kind: &'static str, id: S) -> Self {
    Self::NotFound {
      kind,
      id: id.into(),
    }
  }

  /// 创建无效输入错误
  /// Create an invalid input error
  pub fn invalid_input<S: Into<String>>(message: S) -> Self {
    Self::InvalidInput {
      message: message.into(),
    }
  }

  /// 创建网关错误
  /// Create a gateway error
  pub fn gateway<S: Into<String>>(message: S) -> Self {
    Self::Gateway {
      message: message.into(),
    }
  }

  /// 创建存储错误
  /// Create a store error
  pub fn store<S: Into<String>>(message: S) -> Self {
    Self::Store {
      message: message.into(),
    }
  }

  /// 创建配置错误
  /// Create a configuration error
  pub fn config<S: Into<String>>(message: S) -> Self {
    Self::Config {
      message: message.into(),
    }
  }

  /// 创建其他错误
  /// Create another type of error
  pub fn other<S: Into<String>>(message: S) -> Self {
    Self::Other {
      message: message.into(),
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, Error::NotFound { .. })
  }

  pub fn is_invalid_input(&self) -> bool {
    matches!(self, Error::InvalidInput { .. })
  }

  /// 检查是否为瞬时错误（可通过重试恢复）
  /// Check if the error is transient (recoverable by retrying)
  pub fn is_transient(&self) -> bool {
    match self {
      Error::Redis(_)
      | Error::Gateway { .. }
      | Error::Store { .. }
      | Error::Timeout
      | Error::Cancelled => true,
      Error::Serialization(_)
      | Error::NotFound { .. }
      | Error::InvalidInput { .. }
      | Error::Config { .. }
      | Error::Other { .. } => false,
    }
  }

  /// 检查是否为致命错误
  /// Check if the error is terminal
  pub fn is_terminal(&self) -> bool {
    !self.is_transient()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_error_creation() {
    let err = Error::not_found("task", "t-1");
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "task not found: t-1");

    let err = Error::invalid_input("action is required");
    assert!(err.is_invalid_input());

    let err = Error::config("bad interval");
    assert!(matches!(err, Error::Config { .. }));
  }

  #[test]
  fn test_error_transient() {
    assert!(Error::Timeout.is_transient());
    assert!(Error::Cancelled.is_transient());
    assert!(Error::gateway("503").is_transient());
    assert!(!Error::not_found("event", "e-1").is_transient());
    assert!(Error::invalid_input("x").is_terminal());
  }
}
