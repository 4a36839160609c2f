//! 翻译配置模块
//!
//! 统一的配置结构、默认常量以及分层加载的配置管理器

pub mod manager;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::translation::error::{TranslationError, TranslationResult};

pub use manager::ConfigManager;

/// 翻译配置常量
pub mod constants {
    use std::time::Duration;

    /// 批量请求中的分隔符，选择自然文本中几乎不会出现的组合
    pub const SEPARATOR: &str = "\n=+=+=+=+=\n";

    pub const DEFAULT_TARGET_LANG: &str = "zh-cn";
    pub const DEFAULT_SOURCE_LANG: &str = "auto";
    pub const DEFAULT_API_URL: &str = "http://localhost:1188/translate";
    pub const GOOGLE_API_URL: &str = "https://translate.googleapis.com/translate_a/single";

    pub const DEFAULT_BATCH_SIZE: usize = 50;
    pub const DEFAULT_CHAR_BUDGET: usize = 2000;
    pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const BATCH_DELAY_MS: u64 = 100;
    pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);
    pub const PREVIEW_CONTEXT: usize = 5;

    pub const CONFIG_PATHS: &[&str] = &[
        "catalog-translator.toml",
        ".catalog-translator.toml",
        "~/.config/catalog-translator/config.toml",
        "/etc/catalog-translator/config.toml",
    ];
}

/// 翻译服务商
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// DeepLX 兼容接口（默认，本地部署）
    #[default]
    #[cfg_attr(feature = "cli", value(name = "deeplx"))]
    DeepLx,
    /// Google 网页翻译接口
    Google,
}

impl FromStr for ProviderKind {
    type Err = TranslationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "deeplx" => Ok(ProviderKind::DeepLx),
            "google" => Ok(ProviderKind::Google),
            other => Err(TranslationError::ConfigError(format!("未知的翻译服务商: {}", other))),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::DeepLx => write!(f, "deeplx"),
            ProviderKind::Google => write!(f, "google"),
        }
    }
}

/// 批次划分方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// 固定条目数
    #[default]
    Fixed,
    /// 累计字符预算
    Chars,
}

impl FromStr for BatchMode {
    type Err = TranslationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "fixed" => Ok(BatchMode::Fixed),
            "chars" => Ok(BatchMode::Chars),
            other => Err(TranslationError::ConfigError(format!("未知的批次模式: {}", other))),
        }
    }
}

/// 翻译配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    // 语言
    pub target_lang: String,
    pub source_lang: String,

    // 服务商
    pub provider: ProviderKind,
    pub api_url: String,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,

    // 批次
    pub batch_mode: BatchMode,
    pub batch_size: usize,
    pub char_budget: usize,
    pub batch_delay_ms: u64,

    // 重试
    pub max_attempts: usize,
    pub retry_delay_ms: u64,

    // 进度
    pub progress_interval_ms: u64,
    pub preview_context: usize,

    // 输出
    pub output_suffix: Option<String>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            target_lang: constants::DEFAULT_TARGET_LANG.to_string(),
            source_lang: constants::DEFAULT_SOURCE_LANG.to_string(),

            provider: ProviderKind::default(),
            api_url: constants::DEFAULT_API_URL.to_string(),
            api_key: None,
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT.as_secs(),

            batch_mode: BatchMode::default(),
            batch_size: constants::DEFAULT_BATCH_SIZE,
            char_budget: constants::DEFAULT_CHAR_BUDGET,
            batch_delay_ms: constants::BATCH_DELAY_MS,

            max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: constants::DEFAULT_RETRY_DELAY.as_millis() as u64,

            progress_interval_ms: constants::PROGRESS_INTERVAL.as_millis() as u64,
            preview_context: constants::PREVIEW_CONTEXT,

            output_suffix: None,
        }
    }
}

impl TranslationConfig {
    /// 创建带指定语言的默认配置
    pub fn default_with_lang(target_lang: &str, api_url: Option<&str>) -> Self {
        let mut config = Self::default();
        config.target_lang = target_lang.to_string();
        if let Some(url) = api_url {
            config.api_url = url.to_string();
        }
        config
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.target_lang.trim().is_empty() {
            return Err(TranslationError::ConfigError("目标语言不能为空".to_string()));
        }

        if self.batch_size == 0 {
            return Err(TranslationError::ConfigError("批次大小不能为0".to_string()));
        }

        if self.char_budget == 0 {
            return Err(TranslationError::ConfigError("字符预算不能为0".to_string()));
        }

        if self.max_attempts == 0 {
            return Err(TranslationError::ConfigError("最大尝试次数不能为0".to_string()));
        }

        if self.request_timeout_secs == 0 {
            return Err(TranslationError::ConfigError("请求超时必须大于0".to_string()));
        }

        let url = Url::parse(&self.effective_api_url())?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(TranslationError::ConfigError(format!(
                "API URL 必须使用 http 或 https: {}",
                url
            )));
        }

        Ok(())
    }

    /// 实际使用的接口地址；选择 Google 且仍为默认地址时切换到 Google 端点
    pub fn effective_api_url(&self) -> String {
        if self.provider == ProviderKind::Google && self.api_url == constants::DEFAULT_API_URL {
            constants::GOOGLE_API_URL.to_string()
        } else {
            self.api_url.clone()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// 输出文件名后缀，默认取目标语言的主标签，例如 `zh-cn` -> `_zh`
    pub fn output_suffix(&self) -> String {
        if let Some(suffix) = &self.output_suffix {
            return suffix.clone();
        }

        let primary = self
            .target_lang
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_lowercase();
        format!("_{}", primary)
    }

    /// 应用环境变量覆盖（只覆盖显式设置的变量）
    pub fn apply_env_overrides(&mut self) -> TranslationResult<()> {
        use crate::env::{translation, EnvVar};

        let env_err = |e: crate::env::EnvError| TranslationError::ConfigError(e.to_string());

        if let Some(lang) = translation::TargetLang::lookup().map_err(env_err)? {
            self.target_lang = lang;
        }

        if let Some(lang) = translation::SourceLang::lookup().map_err(env_err)? {
            self.source_lang = lang;
        }

        if let Some(provider) = translation::Provider::lookup().map_err(env_err)? {
            self.provider = provider.parse()?;
        }

        if let Some(api_url) = translation::ApiUrl::lookup().map_err(env_err)? {
            tracing::info!("环境变量覆盖 API URL: {}", api_url);
            self.api_url = api_url;
        }

        if let Some(api_key) = translation::ApiKey::lookup().map_err(env_err)? {
            self.api_key = Some(api_key);
        }

        if let Some(timeout) = translation::RequestTimeout::lookup().map_err(env_err)? {
            self.request_timeout_secs = timeout.as_secs();
        }

        if let Some(mode) = translation::BatchMode::lookup().map_err(env_err)? {
            self.batch_mode = mode.parse()?;
        }

        if let Some(size) = translation::BatchSize::lookup().map_err(env_err)? {
            self.batch_size = size;
        }

        if let Some(budget) = translation::CharBudget::lookup().map_err(env_err)? {
            self.char_budget = budget;
        }

        if let Some(attempts) = translation::MaxAttempts::lookup().map_err(env_err)? {
            self.max_attempts = attempts;
        }

        if let Some(delay) = translation::RetryDelay::lookup().map_err(env_err)? {
            self.retry_delay_ms = delay.as_millis() as u64;
        }

        Ok(())
    }
}
