//! 翻译模块
//!
//! 采用清晰的分层：
//! - **client**: 翻译服务商客户端与客户端工厂
//! - **pipeline**: 批次规划、分隔符编解码、批次翻译与进度估算
//! - **service**: 文件级翻译服务与后台任务
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use catalog_translator::translation::{FileRequest, PipelineEvent, TranslationConfig, TranslationService};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TranslationConfig::default_with_lang("zh-cn", None);
//! let service = TranslationService::from_config(config)?;
//!
//! let request = FileRequest::new("locale/messages.po");
//! service.translate_file(&request, &mut |event: PipelineEvent| {
//!     println!("{}", serde_json::to_string(&event).unwrap_or_default());
//! })?;
//! # Ok(())
//! # }
//! ```

/// 翻译服务商客户端
pub mod client;

/// 配置管理模块 - 默认常量、配置结构与分层加载
pub mod config;

/// 错误处理模块 - 统一的错误类型和处理机制
pub mod error;

/// 批量翻译流水线
pub mod pipeline;

/// 文件级翻译服务
pub mod service;

pub use client::{ClientFactory, ClientSettings, HttpClientFactory, HttpTranslationClient, TranslationClient};
pub use config::{BatchMode, ConfigManager, ProviderKind, TranslationConfig};
pub use error::{ErrorSeverity, TranslationError, TranslationResult};
pub use pipeline::{
    BatchPlanner, BatchPolicy, BatchTranslator, DelimiterCodec, Eta, EventSink, FailureLedger, Pipeline,
    PipelineConfig, PipelineEvent, ProgressEstimator, RetryPolicy, RunSummary,
};
pub use service::{spawn_translation, FileRequest, TranslationService};
