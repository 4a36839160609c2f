//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问，所有变量都以
//! `CATALOG_TRANSLATOR_` 为前缀（`NO_COLOR` 除外）

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    /// 读取变量，未设置时回退到默认值
    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => Self::DEFAULT.ok_or_else(|| EnvError {
                variable: Self::NAME.to_string(),
                message: "Required environment variable not set".to_string(),
            }),
        }
    }

    /// 仅在变量被显式设置时返回值，用于覆盖已加载的配置
    fn lookup() -> EnvResult<Option<T>> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value).map(Some),
            Err(_) => Ok(None),
        }
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "CATALOG_TRANSLATOR_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                level @ ("trace" | "debug" | "info" | "warn" | "error") => Ok(level.to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }

    /// 禁用颜色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Disable colored output when set to any value";

        fn parse(value: &str) -> EnvResult<bool> {
            // NO_COLOR 遵循标准：任何非空值都表示禁用颜色
            Ok(!value.is_empty())
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;

    /// 目标语言
    pub struct TargetLang;
    impl EnvVar<String> for TargetLang {
        const NAME: &'static str = "CATALOG_TRANSLATOR_TARGET_LANG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Target language code (e.g. zh-cn, ja, de)";

        fn parse(value: &str) -> EnvResult<String> {
            parse_lang(value, Self::NAME, false)
        }
    }

    /// 源语言
    pub struct SourceLang;
    impl EnvVar<String> for SourceLang {
        const NAME: &'static str = "CATALOG_TRANSLATOR_SOURCE_LANG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Source language code ('auto' for detection)";

        fn parse(value: &str) -> EnvResult<String> {
            parse_lang(value, Self::NAME, true)
        }
    }

    /// 翻译服务商
    pub struct Provider;
    impl EnvVar<String> for Provider {
        const NAME: &'static str = "CATALOG_TRANSLATOR_PROVIDER";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Translation provider: deeplx, google";

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                provider @ ("deeplx" | "google") => Ok(provider.to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Unknown provider '{}'. Use: deeplx, google", value),
                }),
            }
        }
    }

    /// API URL
    pub struct ApiUrl;
    impl EnvVar<String> for ApiUrl {
        const NAME: &'static str = "CATALOG_TRANSLATOR_API_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Translation API endpoint URL";

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim();
            if url.starts_with("http://") || url.starts_with("https://") {
                Ok(url.to_string())
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API URL must start with http:// or https://".to_string(),
                })
            }
        }
    }

    /// API密钥
    pub struct ApiKey;
    impl EnvVar<String> for ApiKey {
        const NAME: &'static str = "CATALOG_TRANSLATOR_API_KEY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Bearer token sent to the translation API";

        fn parse(value: &str) -> EnvResult<String> {
            let key = value.trim();
            if key.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API key cannot be empty".to_string(),
                });
            }
            Ok(key.to_string())
        }
    }

    /// 单次请求超时
    pub struct RequestTimeout;
    impl EnvVar<Duration> for RequestTimeout {
        const NAME: &'static str = "CATALOG_TRANSLATOR_REQUEST_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(30));
        const DESCRIPTION: &'static str = "Per-request timeout in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_positive_usize(value, Self::NAME, 1, 600).map(|s| Duration::from_secs(s as u64))
        }
    }

    /// 批次划分方式
    pub struct BatchMode;
    impl EnvVar<String> for BatchMode {
        const NAME: &'static str = "CATALOG_TRANSLATOR_BATCH_MODE";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Batch sizing policy: fixed, chars";

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                mode @ ("fixed" | "chars") => Ok(mode.to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Unknown batch mode '{}'. Use: fixed, chars", value),
                }),
            }
        }
    }

    /// 每批条目数
    pub struct BatchSize;
    impl EnvVar<usize> for BatchSize {
        const NAME: &'static str = "CATALOG_TRANSLATOR_BATCH_SIZE";
        const DEFAULT: Option<usize> = Some(50);
        const DESCRIPTION: &'static str = "Entries per batch (fixed mode)";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 1000)
        }
    }

    /// 每批字符预算
    pub struct CharBudget;
    impl EnvVar<usize> for CharBudget {
        const NAME: &'static str = "CATALOG_TRANSLATOR_CHAR_BUDGET";
        const DEFAULT: Option<usize> = Some(2000);
        const DESCRIPTION: &'static str = "Source characters per batch (chars mode)";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 50, 50000)
        }
    }

    /// 最大尝试次数
    pub struct MaxAttempts;
    impl EnvVar<usize> for MaxAttempts {
        const NAME: &'static str = "CATALOG_TRANSLATOR_MAX_ATTEMPTS";
        const DEFAULT: Option<usize> = Some(3);
        const DESCRIPTION: &'static str = "Provider attempts per request before giving up";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 10)
        }
    }

    /// 重试延迟
    pub struct RetryDelay;
    impl EnvVar<Duration> for RetryDelay {
        const NAME: &'static str = "CATALOG_TRANSLATOR_RETRY_DELAY_MS";
        const DEFAULT: Option<Duration> = Some(Duration::from_millis(2000));
        const DESCRIPTION: &'static str = "Delay between provider attempts in milliseconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let millis: u64 = value.trim().parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a valid number of milliseconds".to_string(),
            })?;
            if millis > 60_000 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Delay too long (max 60000 ms)".to_string(),
                });
            }
            Ok(Duration::from_millis(millis))
        }
    }
}

/// 辅助函数
fn parse_lang(value: &str, var_name: &str, allow_auto: bool) -> EnvResult<String> {
    let lang = value.trim().to_lowercase();
    if allow_auto && lang == "auto" {
        return Ok(lang);
    }

    let well_formed = (2..=12).contains(&lang.len())
        && lang
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && lang.chars().take(2).all(|c| c.is_ascii_alphabetic());

    if well_formed {
        Ok(lang)
    } else {
        Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Invalid language code '{}'", value),
        })
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    fn line<T: fmt::Debug, V: EnvVar<T>>() -> String {
        format!("- `{}`: {} (default: {:?})\n", V::NAME, V::DESCRIPTION, V::DEFAULT)
    }

    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");

    docs.push_str("## Core\n\n");
    docs.push_str(&line::<String, core::LogLevel>());
    docs.push_str(&line::<bool, core::NoColor>());

    docs.push_str("\n## Translation\n\n");
    docs.push_str(&line::<String, translation::TargetLang>());
    docs.push_str(&line::<String, translation::SourceLang>());
    docs.push_str(&line::<String, translation::Provider>());
    docs.push_str(&line::<String, translation::ApiUrl>());
    docs.push_str(&line::<String, translation::ApiKey>());
    docs.push_str(&line::<Duration, translation::RequestTimeout>());
    docs.push_str(&line::<String, translation::BatchMode>());
    docs.push_str(&line::<usize, translation::BatchSize>());
    docs.push_str(&line::<usize, translation::CharBudget>());
    docs.push_str(&line::<usize, translation::MaxAttempts>());
    docs.push_str(&line::<Duration, translation::RetryDelay>());

    docs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(core::LogLevel::parse("DEBUG").unwrap(), "debug");
        assert_eq!(core::LogLevel::parse(" warn ").unwrap(), "warn");
        assert!(core::LogLevel::parse("verbose").is_err());
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(translation::TargetLang::parse("zh-CN").unwrap(), "zh-cn");
        assert_eq!(translation::TargetLang::parse("ja").unwrap(), "ja");
        assert!(translation::TargetLang::parse("auto").is_err());
        assert!(translation::TargetLang::parse("x").is_err());
        assert!(translation::TargetLang::parse("12").is_err());
        assert_eq!(translation::SourceLang::parse("AUTO").unwrap(), "auto");
    }

    #[test]
    fn test_url_validation() {
        assert!(translation::ApiUrl::parse("http://localhost:1188/translate").is_ok());
        assert!(translation::ApiUrl::parse("https://api.example.com").is_ok());
        assert!(translation::ApiUrl::parse("ftp://example.com").is_err());
        assert!(translation::ApiUrl::parse("not-a-url").is_err());
    }

    #[test]
    fn test_numeric_validation() {
        assert_eq!(translation::BatchSize::parse("50").unwrap(), 50);
        assert!(translation::BatchSize::parse("0").is_err());
        assert!(translation::BatchSize::parse("5000").is_err());
        assert_eq!(
            translation::RetryDelay::parse("0").unwrap(),
            Duration::ZERO
        );
        assert!(translation::RetryDelay::parse("soon").is_err());
    }

    #[test]
    fn test_lookup_only_reports_explicit_values() {
        env::remove_var(translation::MaxAttempts::NAME);
        assert_eq!(translation::MaxAttempts::lookup().unwrap(), None);
        assert_eq!(translation::MaxAttempts::get().unwrap(), 3);

        env::set_var(translation::MaxAttempts::NAME, "5");
        assert_eq!(translation::MaxAttempts::lookup().unwrap(), Some(5));
        env::remove_var(translation::MaxAttempts::NAME);
    }

    #[test]
    fn test_docs_list_every_variable() {
        let docs = generate_env_docs();
        assert!(docs.contains("CATALOG_TRANSLATOR_TARGET_LANG"));
        assert!(docs.contains("CATALOG_TRANSLATOR_RETRY_DELAY_MS"));
        assert!(docs.contains("NO_COLOR"));
    }
}
