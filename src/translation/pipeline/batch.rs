//! 批次翻译
//!
//! 单个批次的完整处理：编码、请求、解码、校验、重试以及数量不匹配时的二分。
//! 待处理区间保存在显式的工作栈中，前半段先于后半段处理

use std::ops::Range;
use std::thread;
use std::time::Duration;

use crate::catalog::CatalogEntry;
use crate::translation::client::{ClientFactory, TranslationClient};
use crate::translation::config::{constants, TranslationConfig};
use crate::translation::error::{helpers, TranslationError, TranslationResult};

use super::codec::DelimiterCodec;

/// 服务商错误的重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 总尝试次数（含第一次）
    pub max_attempts: usize,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
            retry_delay: constants::DEFAULT_RETRY_DELAY,
        }
    }
}

impl From<&TranslationConfig> for RetryPolicy {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay(),
        }
    }
}

/// 单个批次的处理结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub translated: usize,
    /// 空白条目，不发送请求
    pub skipped: usize,
    /// 失败条目的全局下标
    pub failed: Vec<usize>,
    /// 收到响应的请求数（不含重试失败的请求）
    pub requests: usize,
    pub bisections: usize,
}

impl BatchOutcome {
    pub fn settled(&self) -> usize {
        self.translated + self.skipped + self.failed.len()
    }
}

/// 批次翻译器，独占翻译客户端
pub struct BatchTranslator<F: ClientFactory> {
    factory: F,
    client: Option<F::Client>,
    codec: DelimiterCodec,
    retry: RetryPolicy,
    target_lang: String,
}

impl<F: ClientFactory> BatchTranslator<F> {
    pub fn new(factory: F, target_lang: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            factory,
            client: None,
            codec: DelimiterCodec::default(),
            retry,
            target_lang: target_lang.into(),
        }
    }

    /// 翻译一个批次；`offset` 是 `entries[0]` 在整个序列中的下标
    pub fn translate_batch(&mut self, entries: &mut [CatalogEntry], offset: usize) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            skipped: entries.iter().filter(|e| !e.is_translatable()).count(),
            ..Default::default()
        };

        let mut pending: Vec<Range<usize>> = vec![0..entries.len()];

        while let Some(span) = pending.pop() {
            let slice = &mut entries[span.clone()];
            let request = self.codec.encode(slice);

            if request.is_empty() {
                continue;
            }

            // 只剩一个条目时直接发送原文，不加标记和分隔符
            if let [position] = request.positions.as_slice() {
                let position = *position;
                let entry = &mut slice[position];
                match self.send(entry.source_text().to_string()) {
                    Ok(text) => {
                        outcome.requests += 1;
                        entry.apply_translation(text.trim());
                        outcome.translated += 1;
                    }
                    Err(e) => {
                        tracing::error!("条目 {} 翻译失败: {}", offset + span.start + position, e);
                        entry.mark_failed();
                        outcome.failed.push(offset + span.start + position);
                    }
                }
                continue;
            }

            let response = match self.send(request.text.clone()) {
                Ok(response) => {
                    outcome.requests += 1;
                    response
                }
                Err(e) => {
                    tracing::error!(
                        "批次区间 {}..{} 达到最大重试次数，跳过: {}",
                        offset + span.start,
                        offset + span.end,
                        e
                    );
                    for &position in &request.positions {
                        slice[position].mark_failed();
                        outcome.failed.push(offset + span.start + position);
                    }
                    continue;
                }
            };

            match self.codec.decode(&request, &response) {
                Ok(segments) => {
                    for (text, &position) in segments.into_iter().zip(&request.positions) {
                        slice[position].apply_translation(text);
                    }
                    outcome.translated += request.positions.len();
                }
                Err(TranslationError::CountMismatch { expected, actual }) => {
                    tracing::warn!(
                        "翻译结果数量不匹配（原文：{}，译文：{}），拆分区间 {}..{}",
                        expected,
                        actual,
                        offset + span.start,
                        offset + span.end
                    );
                    outcome.bisections += 1;

                    let mid = span.start + span.len() / 2;
                    pending.push(mid..span.end);
                    pending.push(span.start..mid);
                }
                Err(e) => {
                    helpers::log_error(&e);
                    for &position in &request.positions {
                        slice[position].mark_failed();
                        outcome.failed.push(offset + span.start + position);
                    }
                }
            }
        }

        outcome.failed.sort_unstable();
        outcome
    }

    /// 发送请求；服务商错误时丢弃客户端，等待后用新客户端重试
    fn send(&mut self, text: String) -> TranslationResult<String> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.call(&text) {
                Ok(response) => return Ok(response),
                Err(e) => {
                    self.client = None;

                    if !e.is_retryable() || attempt >= self.retry.max_attempts {
                        return Err(e);
                    }

                    tracing::warn!(
                        "批次翻译出错 (重试 {}/{}): {}",
                        attempt,
                        self.retry.max_attempts,
                        e
                    );
                    if !self.retry.retry_delay.is_zero() {
                        thread::sleep(self.retry.retry_delay);
                    }
                }
            }
        }
    }

    fn call(&mut self, text: &str) -> TranslationResult<String> {
        let client = match self.client.take() {
            Some(client) => client,
            None => self.factory.connect()?,
        };

        self.client.insert(client).translate(text, &self.target_lang)
    }
}
