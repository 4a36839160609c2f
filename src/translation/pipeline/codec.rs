//! 分隔符编解码
//!
//! 一个批次的源文本以 `[i]` 标记各自在批次中的位置，用分隔符拼接为一次请求；
//! 响应按同一分隔符切分。分隔符没有转义机制，源文本中若恰好出现分隔符，
//! 切分结果会静默错位，这是已知的限制

use crate::catalog::CatalogEntry;
use crate::translation::config::constants::SEPARATOR;
use crate::translation::error::{TranslationError, TranslationResult};

/// 编码后的请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRequest {
    pub text: String,
    /// 参与请求的条目在批次中的位置，按顺序对应响应中的各段
    pub positions: Vec<usize>,
}

impl EncodedRequest {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn expected_segments(&self) -> usize {
        self.positions.len()
    }
}

/// 分隔符编解码器
#[derive(Debug, Clone)]
pub struct DelimiterCodec {
    separator: String,
}

impl Default for DelimiterCodec {
    fn default() -> Self {
        Self::new(SEPARATOR)
    }
}

impl DelimiterCodec {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    fn tag(position: usize) -> String {
        format!("[{}]", position)
    }

    /// 编码一个批次，跳过空白源文本
    pub fn encode(&self, batch: &[CatalogEntry]) -> EncodedRequest {
        let mut parts = Vec::with_capacity(batch.len());
        let mut positions = Vec::with_capacity(batch.len());

        for (position, entry) in batch.iter().enumerate() {
            if !entry.is_translatable() {
                continue;
            }
            parts.push(format!("{}{}", Self::tag(position), entry.source_text()));
            positions.push(position);
        }

        EncodedRequest {
            text: parts.join(&self.separator),
            positions,
        }
    }

    /// 解码响应；段数与请求不一致时返回 `CountMismatch`
    pub fn decode(&self, request: &EncodedRequest, response: &str) -> TranslationResult<Vec<String>> {
        let segments: Vec<&str> = response.split(self.separator.as_str()).collect();

        if segments.len() != request.expected_segments() {
            return Err(TranslationError::CountMismatch {
                expected: request.expected_segments(),
                actual: segments.len(),
            });
        }

        Ok(segments
            .into_iter()
            .zip(&request.positions)
            .map(|(segment, &position)| {
                let trimmed = segment.trim();
                trimmed
                    .strip_prefix(Self::tag(position).as_str())
                    .unwrap_or(trimmed)
                    .trim()
                    .to_string()
            })
            .collect())
    }
}
