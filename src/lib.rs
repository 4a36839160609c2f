//! # Catalog Translator Library
//!
//! 批量机器翻译 gettext 目录文件（PO/MO）：把条目分批合并为单次请求，
//! 容忍服务商的暂时性故障，并实时报告进度与预计剩余时间。
//!
//! ## 模块组织
//!
//! - `catalog` - PO/MO 文件的读取与写回
//! - `translation` - 翻译客户端、批量流水线、文件级服务与配置
//! - `env` - 类型安全的环境变量

pub mod catalog;
pub mod env;
pub mod translation;

// Re-export commonly used items for convenience
pub use catalog::{output_path_for, Catalog, CatalogEntry, CatalogFormat, EntryStatus};
pub use translation::{
    spawn_translation, FileRequest, PipelineEvent, TranslationConfig, TranslationError, TranslationResult,
    TranslationService,
};
