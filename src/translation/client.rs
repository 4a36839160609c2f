//! 翻译服务商客户端
//!
//! [`TranslationClient`] 是流水线唯一依赖的阻塞调用；[`ClientFactory`]
//! 在每次尝试前创建新的客户端，出错后旧客户端直接丢弃

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::config::{ProviderKind, TranslationConfig};
use super::error::{TranslationError, TranslationResult};

/// 翻译客户端：把一段文本翻译为目标语言
pub trait TranslationClient {
    fn translate(&mut self, text: &str, target_lang: &str) -> TranslationResult<String>;
}

/// 客户端工厂：每次调用返回一个全新的客户端
pub trait ClientFactory {
    type Client: TranslationClient;

    fn connect(&self) -> TranslationResult<Self::Client>;
}

impl<F, C> ClientFactory for F
where
    F: Fn() -> TranslationResult<C>,
    C: TranslationClient,
{
    type Client = C;

    fn connect(&self) -> TranslationResult<C> {
        self()
    }
}

/// HTTP 客户端所需的设置
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub provider: ProviderKind,
    pub api_url: String,
    pub api_key: Option<String>,
    pub source_lang: String,
    pub timeout: Duration,
}

impl From<&TranslationConfig> for ClientSettings {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            provider: config.provider,
            api_url: config.effective_api_url(),
            api_key: config.api_key.clone(),
            source_lang: config.source_lang.clone(),
            timeout: config.request_timeout(),
        }
    }
}

/// 基于 reqwest 阻塞客户端的翻译客户端
pub struct HttpTranslationClient {
    http: Client,
    settings: ClientSettings,
}

#[derive(Debug, Serialize)]
struct DeepLxRequest<'a> {
    text: &'a str,
    source_lang: String,
    target_lang: String,
}

#[derive(Debug, Deserialize)]
struct DeepLxResponse {
    code: u16,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpTranslationClient {
    pub fn new(settings: ClientSettings) -> TranslationResult<Self> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TranslationError::NetworkError(format!("创建HTTP客户端失败: {}", e)))?;

        Ok(Self { http, settings })
    }

    fn translate_deeplx(&self, text: &str, target_lang: &str) -> TranslationResult<String> {
        let body = DeepLxRequest {
            text,
            source_lang: deeplx_lang(&self.settings.source_lang),
            target_lang: deeplx_lang(target_lang),
        };

        let mut request = self.http.post(&self.settings.api_url).json(&body);
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key);
        }

        let response = check_status(request.send()?)?;
        let parsed: DeepLxResponse = serde_json::from_str(&response.text()?)?;

        if parsed.code != 200 {
            let message = parsed.message.unwrap_or_else(|| "未知错误".to_string());
            return Err(status_error(parsed.code, message));
        }

        non_empty(parsed.data.unwrap_or_default())
    }

    fn translate_google(&self, text: &str, target_lang: &str) -> TranslationResult<String> {
        let url = format!(
            "{}?client=gtx&sl={}&tl={}&dt=t&q={}",
            self.settings.api_url,
            google_lang(&self.settings.source_lang),
            google_lang(target_lang),
            utf8_percent_encode(text, NON_ALPHANUMERIC)
        );

        let response = check_status(self.http.get(&url).send()?)?;
        let parsed: serde_json::Value = serde_json::from_str(&response.text()?)?;
        non_empty(parse_google_response(&parsed)?)
    }
}

impl TranslationClient for HttpTranslationClient {
    fn translate(&mut self, text: &str, target_lang: &str) -> TranslationResult<String> {
        tracing::trace!("请求 {} 翻译 {} 个字符", self.settings.provider, text.chars().count());

        match self.settings.provider {
            ProviderKind::DeepLx => self.translate_deeplx(text, target_lang),
            ProviderKind::Google => self.translate_google(text, target_lang),
        }
    }
}

/// 按配置创建 HTTP 客户端的工厂
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    settings: ClientSettings,
}

impl HttpClientFactory {
    pub fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }

    pub fn from_config(config: &TranslationConfig) -> Self {
        Self::new(ClientSettings::from(config))
    }
}

impl ClientFactory for HttpClientFactory {
    type Client = HttpTranslationClient;

    fn connect(&self) -> TranslationResult<HttpTranslationClient> {
        HttpTranslationClient::new(self.settings.clone())
    }
}

fn status_error(code: u16, message: String) -> TranslationError {
    if code == 429 || code >= 500 {
        TranslationError::ServiceError(format!("HTTP {}: {}", code, message))
    } else {
        TranslationError::ResponseError(format!("HTTP {}: {}", code, message))
    }
}

fn check_status(response: Response) -> TranslationResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let reason = status.canonical_reason().unwrap_or("").to_string();
    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!("翻译服务限流");
    }
    Err(status_error(status.as_u16(), reason))
}

/// 服务商偶尔返回空结果，视为暂时性错误
fn non_empty(text: String) -> TranslationResult<String> {
    if text.trim().is_empty() {
        Err(TranslationError::ServiceError("翻译服务返回空结果".to_string()))
    } else {
        Ok(text)
    }
}

/// 拼接 Google 响应中 `[0][i][0]` 的各个片段
fn parse_google_response(value: &serde_json::Value) -> TranslationResult<String> {
    let sentences = value
        .get(0)
        .and_then(|v| v.as_array())
        .ok_or_else(|| TranslationError::ResponseError("Google 响应格式无效".to_string()))?;

    Ok(sentences
        .iter()
        .filter_map(|item| item.get(0).and_then(|v| v.as_str()))
        .collect())
}

/// DeepLX 使用大写主语言标签
pub fn deeplx_lang(lang: &str) -> String {
    let lower = lang.trim().to_lowercase();
    match lower.as_str() {
        "auto" | "" => "auto".to_string(),
        "zh" | "zh-cn" | "zh_cn" | "zh-hans" => "ZH".to_string(),
        "en-us" | "en_us" => "EN-US".to_string(),
        "en-gb" | "en_gb" => "EN-GB".to_string(),
        "pt-br" | "pt_br" => "PT-BR".to_string(),
        _ => lower
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_uppercase(),
    }
}

/// Google 使用 `zh-CN` 这类带地区的大小写形式
pub fn google_lang(lang: &str) -> String {
    let lower = lang.trim().to_lowercase().replace('_', "-");
    match lower.as_str() {
        "" => "auto".to_string(),
        "zh" | "zh-cn" | "zh-hans" => "zh-CN".to_string(),
        "zh-tw" | "zh-hant" => "zh-TW".to_string(),
        _ => match lower.split_once('-') {
            Some((primary, region)) => format!("{}-{}", primary, region.to_uppercase()),
            None => lower,
        },
    }
}
