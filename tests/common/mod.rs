// 集成测试公共模块
//
// 提供测试用的翻译客户端、数据生成器和断言辅助

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use catalog_translator::catalog::CatalogEntry;
use catalog_translator::translation::config::constants::SEPARATOR;
use catalog_translator::translation::{
    BatchPolicy, ClientFactory, PipelineConfig, PipelineEvent, RetryPolicy, TranslationClient, TranslationConfig,
    TranslationError, TranslationResult,
};

/// 客户端的行为
#[derive(Debug, Clone)]
pub enum Behavior {
    /// 原样转为大写
    Uppercase,
    /// 请求包含指定文本时返回不可重试的错误
    RejectContaining(String),
    /// 多段请求少返回一段，单条请求正常
    DropLastSegment,
    /// 前 N 次调用返回网络错误
    FlakyFor(usize),
    /// 总是返回可重试的服务错误
    AlwaysUnavailable,
}

/// 可在线程间共享的调用记录
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    requests: Arc<Mutex<Vec<String>>>,
    connects: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl CallLog {
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub struct FakeClient {
    behavior: Behavior,
    log: CallLog,
}

impl TranslationClient for FakeClient {
    fn translate(&mut self, text: &str, _target_lang: &str) -> TranslationResult<String> {
        let call = self.log.calls.fetch_add(1, Ordering::SeqCst);
        self.log.requests.lock().unwrap().push(text.to_string());

        match &self.behavior {
            Behavior::Uppercase => Ok(text.to_uppercase()),
            Behavior::RejectContaining(marker) => {
                if text.contains(marker.as_str()) {
                    Err(TranslationError::ResponseError("请求被拒绝".to_string()))
                } else {
                    Ok(text.to_uppercase())
                }
            }
            Behavior::DropLastSegment => {
                let segments: Vec<&str> = text.split(SEPARATOR).collect();
                if segments.len() > 1 {
                    Ok(segments[..segments.len() - 1].join(SEPARATOR).to_uppercase())
                } else {
                    Ok(text.to_uppercase())
                }
            }
            Behavior::FlakyFor(failures) => {
                if call < *failures {
                    Err(TranslationError::NetworkError("连接被重置".to_string()))
                } else {
                    Ok(text.to_uppercase())
                }
            }
            Behavior::AlwaysUnavailable => Err(TranslationError::ServiceError("HTTP 503".to_string())),
        }
    }
}

/// 测试用客户端工厂
#[derive(Debug, Clone)]
pub struct FakeFactory {
    behavior: Behavior,
    log: CallLog,
}

impl FakeFactory {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            log: CallLog::default(),
        }
    }

    pub fn uppercase() -> Self {
        Self::new(Behavior::Uppercase)
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl ClientFactory for FakeFactory {
    type Client = FakeClient;

    fn connect(&self) -> TranslationResult<FakeClient> {
        self.log.connects.fetch_add(1, Ordering::SeqCst);
        Ok(FakeClient {
            behavior: self.behavior.clone(),
            log: self.log.clone(),
        })
    }
}

/// 测试数据生成器
pub struct TestDataGenerator;

impl TestDataGenerator {
    pub fn numbered_entries(count: usize) -> Vec<CatalogEntry> {
        (0..count).map(|i| CatalogEntry::new(format!("entry {}", i))).collect()
    }

    pub fn entries(texts: &[&str]) -> Vec<CatalogEntry> {
        texts.iter().map(|text| CatalogEntry::new(*text)).collect()
    }

    /// 生成 PO 文件内容，包含头部条目
    pub fn po_document(texts: &[&str]) -> String {
        let mut content = String::from(
            "# Test catalog\n\
             msgid \"\"\n\
             msgstr \"\"\n\
             \"Project-Id-Version: demo 1.0\\n\"\n\
             \"Content-Type: text/plain; charset=UTF-8\\n\"\n\n",
        );
        for (i, text) in texts.iter().enumerate() {
            content.push_str(&format!("#: src/app.rs:{}\n", i + 1));
            content.push_str(&format!("msgid \"{}\"\nmsgstr \"\"\n\n", text));
        }
        content
    }

    pub fn write_po(dir: &Path, name: &str, texts: &[&str]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, Self::po_document(texts)).unwrap();
        path
    }
}

/// 无等待的配置构建器
pub struct TestConfigBuilder {
    config: TranslationConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = TranslationConfig::default_with_lang("zh-cn", None);
        config.batch_delay_ms = 0;
        config.retry_delay_ms = 0;
        config.progress_interval_ms = 0;
        Self { config }
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn batch_delay_ms(mut self, delay: u64) -> Self {
        self.config.batch_delay_ms = delay;
        self
    }

    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn build(self) -> TranslationConfig {
        self.config
    }

    pub fn pipeline(self) -> PipelineConfig {
        PipelineConfig::from(&self.config)
    }
}

pub fn fixed_pipeline(batch_size: usize) -> PipelineConfig {
    let mut config = TestConfigBuilder::new().batch_size(batch_size).pipeline();
    config.policy = BatchPolicy::FixedCount(batch_size);
    config.retry = RetryPolicy {
        max_attempts: 3,
        retry_delay: std::time::Duration::ZERO,
    };
    config
}

/// 收集事件的接收端
pub fn collecting_sink(events: &mut Vec<PipelineEvent>) -> impl FnMut(PipelineEvent) + '_ {
    move |event: PipelineEvent| events.push(event)
}

/// 断言辅助工具
pub struct AssertionHelper;

impl AssertionHelper {
    /// 事件流以唯一一个终止事件结束
    pub fn assert_single_terminal(events: &[PipelineEvent]) {
        let terminals = events.iter().filter(|e| e.is_terminal()).count();
        assert_eq!(terminals, 1, "事件流应只有一个终止事件: {:?}", events);
        assert!(events.last().map(PipelineEvent::is_terminal).unwrap_or(false));
    }

    pub fn assert_progress_monotonic(events: &[PipelineEvent]) {
        let mut last = 0;
        for event in events {
            if let PipelineEvent::Progress(update) = event {
                assert!(update.processed >= last, "已处理数不应回退");
                assert!(update.processed <= update.total);
                assert!((0.0..=100.0).contains(&update.progress));
                last = update.processed;
            }
        }
    }
}
