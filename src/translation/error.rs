//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型，区分可重试的服务商错误、批次数量不匹配、
//! 输入校验错误以及导致整次运行中止的致命错误

use std::fmt;

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// 网络错误（连接失败、TLS握手失败等）
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 单次请求超时
    #[error("请求超时: {0}")]
    TimeoutError(String),

    /// 服务商暂时不可用（限流、5xx、空响应）
    #[error("翻译服务错误: {0}")]
    ServiceError(String),

    /// 服务商返回了无法解析或被拒绝的响应
    #[error("翻译服务响应无效: {0}")]
    ResponseError(String),

    /// 译文分段数量与原文不一致
    #[error("翻译结果数量不匹配（原文：{expected}，译文：{actual}）")]
    CountMismatch { expected: usize, actual: usize },

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 目录文件解析错误
    #[error("目录文件错误: {0}")]
    CatalogError(String),

    /// 文件读写错误
    #[error("IO错误: {0}")]
    IoError(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::NetworkError(_) => true,
            TranslationError::TimeoutError(_) => true,
            TranslationError::ServiceError(_) => true,
            TranslationError::ResponseError(_) => false,
            TranslationError::CountMismatch { .. } => false,
            TranslationError::InvalidInput(_) => false,
            TranslationError::ConfigError(_) => false,
            TranslationError::CatalogError(_) => false,
            TranslationError::IoError(_) => false,
        }
    }

    /// 是否来自翻译服务商（批次级错误，不中止整次运行）
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            TranslationError::NetworkError(_)
                | TranslationError::TimeoutError(_)
                | TranslationError::ServiceError(_)
                | TranslationError::ResponseError(_)
        )
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::NetworkError(_) => ErrorSeverity::Warning,
            TranslationError::TimeoutError(_) => ErrorSeverity::Warning,
            TranslationError::ServiceError(_) => ErrorSeverity::Warning,
            TranslationError::ResponseError(_) => ErrorSeverity::Error,
            TranslationError::CountMismatch { .. } => ErrorSeverity::Info,
            TranslationError::InvalidInput(_) => ErrorSeverity::Error,
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::CatalogError(_) => ErrorSeverity::Critical,
            TranslationError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(self, context: T) -> Self {
        let wrap = |msg: String| format!("{} (上下文: {})", msg, context);

        match self {
            TranslationError::NetworkError(msg) => TranslationError::NetworkError(wrap(msg)),
            TranslationError::TimeoutError(msg) => TranslationError::TimeoutError(wrap(msg)),
            TranslationError::ServiceError(msg) => TranslationError::ServiceError(wrap(msg)),
            TranslationError::ResponseError(msg) => TranslationError::ResponseError(wrap(msg)),
            TranslationError::InvalidInput(msg) => TranslationError::InvalidInput(wrap(msg)),
            TranslationError::ConfigError(msg) => TranslationError::ConfigError(wrap(msg)),
            TranslationError::CatalogError(msg) => TranslationError::CatalogError(wrap(msg)),
            TranslationError::IoError(msg) => TranslationError::IoError(wrap(msg)),
            mismatch @ TranslationError::CountMismatch { .. } => mismatch,
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::IoError(error.to_string())
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::TimeoutError(error.to_string())
        } else if error.is_decode() {
            TranslationError::ResponseError(error.to_string())
        } else if let Some(status) = error.status() {
            if status.is_server_error() || status.as_u16() == 429 {
                TranslationError::ServiceError(format!("HTTP {}: {}", status, error))
            } else {
                TranslationError::ResponseError(format!("HTTP {}: {}", status, error))
            }
        } else {
            TranslationError::NetworkError(error.to_string())
        }
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::ResponseError(format!("JSON解析错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ConfigError(format!("TOML解析错误: {}", error))
    }
}

impl From<config::ConfigError> for TranslationError {
    fn from(error: config::ConfigError) -> Self {
        TranslationError::ConfigError(error.to_string())
    }
}

impl From<url::ParseError> for TranslationError {
    fn from(error: url::ParseError) -> Self {
        TranslationError::ConfigError(format!("URL无效: {}", error))
    }
}

impl From<tokio::task::JoinError> for TranslationError {
    fn from(error: tokio::task::JoinError) -> Self {
        TranslationError::IoError(format!("翻译任务异常退出: {}", error))
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误
    pub fn log_error(error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }
    }

    /// 创建输入验证错误
    pub fn validation_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::InvalidInput(msg.to_string())
    }

    /// 创建目录文件错误
    pub fn catalog_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::CatalogError(msg.to_string())
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::ConfigError(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_provider_errors_are_retryable() {
        assert!(TranslationError::NetworkError("reset".into()).is_retryable());
        assert!(TranslationError::TimeoutError("30s".into()).is_retryable());
        assert!(TranslationError::ServiceError("HTTP 503".into()).is_retryable());
        assert!(!TranslationError::ResponseError("bad json".into()).is_retryable());
    }

    #[test]
    fn mismatch_is_not_a_provider_error() {
        let mismatch = TranslationError::CountMismatch { expected: 3, actual: 2 };
        assert!(!mismatch.is_provider_error());
        assert!(!mismatch.is_retryable());
        assert_eq!(mismatch.to_string(), "翻译结果数量不匹配（原文：3，译文：2）");
    }

    #[test]
    fn context_is_appended_to_message() {
        let err = TranslationError::IoError("disk full".into()).with_context("messages.po");
        assert_eq!(err, TranslationError::IoError("disk full (上下文: messages.po)".into()));
    }

    #[test]
    fn fatal_errors_are_critical() {
        assert_eq!(
            TranslationError::CatalogError("truncated".into()).severity(),
            ErrorSeverity::Critical
        );
        assert!(ErrorSeverity::Critical > ErrorSeverity::Warning);
    }
}
