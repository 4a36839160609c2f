//! 配置管理器
//!
//! 按优先级从低到高合并：内置默认值、配置文件、`.env`、环境变量。
//! 命令行参数由调用方在此之后覆盖

use std::path::{Path, PathBuf};

use config::{Config, File};

use super::{constants, TranslationConfig};
use crate::translation::error::{TranslationError, TranslationResult};

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: TranslationConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// 加载配置；`explicit_path` 给出时必须存在，否则按 `CONFIG_PATHS` 顺序查找
    pub fn load(explicit_path: Option<&Path>) -> TranslationResult<Self> {
        Self::load_dotenv();

        let config_path = match explicit_path {
            Some(path) if path.is_file() => Some(path.to_path_buf()),
            Some(path) => {
                return Err(TranslationError::ConfigError(format!(
                    "配置文件不存在: {}",
                    path.display()
                )))
            }
            None => Self::find_config_file(),
        };

        let mut builder = Config::builder().add_source(Config::try_from(&TranslationConfig::default())?);

        if let Some(path) = &config_path {
            tracing::info!("加载配置文件: {}", path.display());
            builder = builder.add_source(File::with_name(&path.to_string_lossy()).required(true));
        }

        let mut config: TranslationConfig = builder
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("构建配置失败: {}", e)))?
            .try_deserialize()
            .map_err(|e| TranslationError::ConfigError(format!("反序列化配置失败: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;

        tracing::debug!(
            "加载的配置 - 服务商: {}, API URL: {}, 目标语言: {}",
            config.provider,
            config.effective_api_url(),
            config.target_lang
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    /// 从 TOML 文本构建配置，缺省字段使用默认值
    pub fn from_toml_str(content: &str) -> TranslationResult<Self> {
        let config: TranslationConfig = toml::from_str(content)?;
        config.validate()?;

        Ok(Self {
            config,
            config_path: None,
        })
    }

    /// 获取当前配置
    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    /// 获取可修改的配置（用于命令行覆盖）
    pub fn config_mut(&mut self) -> &mut TranslationConfig {
        &mut self.config
    }

    pub fn into_config(self) -> TranslationConfig {
        self.config
    }

    /// 实际加载的配置文件路径
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        match dotenv::dotenv() {
            Ok(path) => tracing::debug!("已加载 .env 文件: {}", path.display()),
            Err(_) => tracing::trace!("未找到 .env 文件，跳过"),
        }
    }

    /// 查找第一个存在的配置文件
    fn find_config_file() -> Option<PathBuf> {
        constants::CONFIG_PATHS
            .iter()
            .map(|path| PathBuf::from(shellexpand::tilde(path).as_ref()))
            .find(|path| path.is_file())
    }
}
