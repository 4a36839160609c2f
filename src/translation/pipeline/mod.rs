//! 批量翻译流水线
//!
//! 按顺序驱动 [`BatchPlanner`] -> [`BatchTranslator`]，批次之间喂给
//! [`ProgressEstimator`]，并向前端发出进度、完成或错误事件

pub mod batch;
pub mod codec;
pub mod planner;
pub mod progress;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::catalog::CatalogEntry;
use crate::translation::client::ClientFactory;
use crate::translation::config::TranslationConfig;
use crate::translation::error::{helpers, TranslationError, TranslationResult};

pub use batch::{BatchOutcome, BatchTranslator, RetryPolicy};
pub use codec::{DelimiterCodec, EncodedRequest};
pub use planner::{Batch, BatchPlanner, BatchPolicy};
pub use progress::{Eta, ProgressEstimator, ProgressThrottle};

/// 流水线设置
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub target_lang: String,
    pub policy: BatchPolicy,
    pub retry: RetryPolicy,
    /// 批次之间的间隔
    pub batch_delay: Duration,
    /// 进度事件最小间隔
    pub progress_interval: Duration,
    /// 预览中包含的前文条目数
    pub preview_context: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&TranslationConfig::default())
    }
}

impl From<&TranslationConfig> for PipelineConfig {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            target_lang: config.target_lang.clone(),
            policy: BatchPolicy::from(config),
            retry: RetryPolicy::from(config),
            batch_delay: config.batch_delay(),
            progress_interval: config.progress_interval(),
            preview_context: config.preview_context,
        }
    }
}

/// 进度预览中的一条
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewEntry {
    pub msgid: String,
    pub msgstr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    /// 百分比 0..=100
    pub progress: f64,
    pub time_remaining: Eta,
    pub processed: usize,
    pub total: usize,
    pub failed: usize,
    pub preview: Vec<PreviewEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionReport {
    pub status: CompletionStatus,
    pub output_file: String,
    pub output_filename: String,
    pub total_processed: usize,
    pub total_entries: usize,
    pub translated_entries: usize,
    pub failed_entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub finished_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub error: String,
}

/// 流水线事件；以完成或错误事件结束，且只出现一次
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PipelineEvent {
    Progress(ProgressUpdate),
    Completion(CompletionReport),
    Error(ErrorReport),
}

impl PipelineEvent {
    pub fn error(message: impl Into<String>) -> Self {
        PipelineEvent::Error(ErrorReport {
            error: message.into(),
        })
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PipelineEvent::Progress(_))
    }
}

/// 事件接收端
pub trait EventSink {
    fn emit(&mut self, event: PipelineEvent);
}

impl<F: FnMut(PipelineEvent)> EventSink for F {
    fn emit(&mut self, event: PipelineEvent) {
        self(event)
    }
}

/// 翻译失败的条目下标，只增不减
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureLedger {
    indices: BTreeSet<usize>,
}

impl FailureLedger {
    pub fn record(&mut self, index: usize) {
        self.indices.insert(index);
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// 升序遍历
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }
}

impl Extend<usize> for FailureLedger {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        self.indices.extend(iter);
    }
}

/// 一次运行的统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub total: usize,
    /// 已结算的条目（翻译成功、空白跳过、失败）
    pub processed: usize,
    pub translated: usize,
    pub skipped: usize,
    pub ledger: FailureLedger,
    pub batches: usize,
    pub requests: usize,
    pub bisections: usize,
    pub elapsed: Duration,
    /// 调用方在批次边界放弃了运行
    pub cancelled: bool,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.ledger.len()
    }

    pub fn success_rate(&self) -> f64 {
        let attempted = self.translated + self.failed();
        if attempted == 0 {
            return 1.0;
        }
        self.translated as f64 / attempted as f64
    }

    pub fn completion_report(&self, output: &Path) -> CompletionReport {
        let failed = self.failed();

        CompletionReport {
            status: CompletionStatus::Complete,
            output_file: output.display().to_string(),
            output_filename: output
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            total_processed: self.processed,
            total_entries: self.total,
            translated_entries: self.translated,
            failed_entries: failed,
            warning: (failed > 0).then(|| format!("有 {} 个条目翻译失败", failed)),
            finished_at: chrono::Local::now().to_rfc3339(),
        }
    }

    pub fn completion_event(&self, output: &Path) -> PipelineEvent {
        PipelineEvent::Completion(self.completion_report(output))
    }
}

/// 批量翻译流水线
pub struct Pipeline<F: ClientFactory> {
    config: PipelineConfig,
    planner: BatchPlanner,
    translator: BatchTranslator<F>,
    cancel: Arc<AtomicBool>,
}

impl<F: ClientFactory> Pipeline<F> {
    pub fn new(factory: F, config: PipelineConfig) -> Self {
        let planner = BatchPlanner::new(config.policy);
        let translator = BatchTranslator::new(factory, config.target_lang.clone(), config.retry);

        Self {
            config,
            planner,
            translator,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 使用外部的取消标志
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// 置位后在下一个批次边界停止
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn preview(&self, entries: &[CatalogEntry], batch: &Batch) -> Vec<PreviewEntry> {
        let start = batch.range.start.saturating_sub(self.config.preview_context);
        entries[start..batch.range.end]
            .iter()
            .map(|entry| PreviewEntry {
                msgid: entry.source_text().to_string(),
                msgstr: entry.translated_text().to_string(),
            })
            .collect()
    }

    /// 翻译全部条目，只发出进度事件
    pub fn run(
        &mut self,
        entries: &mut [CatalogEntry],
        sink: &mut impl EventSink,
    ) -> TranslationResult<RunSummary> {
        if !entries.iter().any(CatalogEntry::is_translatable) {
            return Err(helpers::validation_error("文件中没有需要翻译的内容"));
        }

        let batches = self.planner.plan(entries);
        let started = Instant::now();
        let mut estimator = ProgressEstimator::new();
        let mut throttle = ProgressThrottle::new(self.config.progress_interval, started);

        let mut summary = RunSummary {
            total: entries.len(),
            ..Default::default()
        };

        tracing::info!(
            "开始翻译: {} 个条目，{} 个批次，目标语言 {}",
            summary.total,
            batches.len(),
            self.config.target_lang
        );

        for batch in &batches {
            if self.cancel.load(Ordering::SeqCst) {
                tracing::warn!("翻译在第 {} 个批次前被取消", batch.index + 1);
                summary.cancelled = true;
                break;
            }

            if batch.index > 0 && !self.config.batch_delay.is_zero() {
                thread::sleep(self.config.batch_delay);
            }

            tracing::debug!(
                "处理批次 {}/{}: 条目 {}..{}",
                batch.index + 1,
                batches.len(),
                batch.range.start,
                batch.range.end
            );

            let outcome = self
                .translator
                .translate_batch(&mut entries[batch.range.clone()], batch.range.start);

            summary.batches += 1;
            summary.processed += outcome.settled();
            summary.translated += outcome.translated;
            summary.skipped += outcome.skipped;
            summary.requests += outcome.requests;
            summary.bisections += outcome.bisections;
            summary.ledger.extend(outcome.failed);

            let now = Instant::now();
            if throttle.ready(now) {
                let eta = estimator.update(summary.processed, summary.total, now - started);
                sink.emit(PipelineEvent::Progress(ProgressUpdate {
                    progress: estimator.percent(),
                    time_remaining: eta,
                    processed: summary.processed,
                    total: summary.total,
                    failed: summary.failed(),
                    preview: self.preview(entries, batch),
                }));
            }
        }

        summary.elapsed = started.elapsed();
        tracing::info!(
            "翻译完成: 耗时 {:?}, 成功 {}, 失败 {}, 请求 {} 次, 成功率 {:.1}%",
            summary.elapsed,
            summary.translated,
            summary.failed(),
            summary.requests,
            summary.success_rate() * 100.0
        );

        Ok(summary)
    }

    /// 运行并以一个完成或错误事件结束；`output` 写入完成事件
    pub fn execute(
        &mut self,
        entries: &mut [CatalogEntry],
        output: &Path,
        sink: &mut impl EventSink,
    ) -> TranslationResult<RunSummary> {
        match self.run(entries, sink) {
            Ok(summary) => {
                sink.emit(summary.completion_event(output));
                Ok(summary)
            }
            Err(e) => {
                helpers::log_error(&e);
                sink.emit(PipelineEvent::error(error_message(&e)));
                Err(e)
            }
        }
    }
}

/// 错误事件中展示给用户的文本
pub fn error_message(error: &TranslationError) -> String {
    match error {
        TranslationError::InvalidInput(msg) => msg.clone(),
        other => format!("翻译过程中发生错误: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::client::TranslationClient;

    struct Upper;

    impl TranslationClient for Upper {
        fn translate(&mut self, text: &str, _target_lang: &str) -> TranslationResult<String> {
            Ok(text.to_uppercase())
        }
    }

    fn fast_config(batch_size: usize) -> PipelineConfig {
        PipelineConfig {
            policy: BatchPolicy::FixedCount(batch_size),
            retry: RetryPolicy {
                max_attempts: 3,
                retry_delay: Duration::ZERO,
            },
            batch_delay: Duration::ZERO,
            progress_interval: Duration::ZERO,
            ..Default::default()
        }
    }

    fn entries(count: usize) -> Vec<CatalogEntry> {
        (0..count).map(|i| CatalogEntry::new(format!("message {}", i))).collect()
    }

    #[test]
    fn test_progress_after_every_batch_without_throttle() {
        let mut pipeline = Pipeline::new(|| Ok::<_, TranslationError>(Upper), fast_config(4));
        let mut entries = entries(10);
        let mut events = Vec::new();

        let summary = pipeline.run(&mut entries, &mut |e: PipelineEvent| events.push(e)).unwrap();

        assert_eq!(summary.batches, 3);
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| !e.is_terminal()));

        let PipelineEvent::Progress(last) = &events[2] else {
            panic!("expected progress event");
        };
        assert_eq!(last.processed, 10);
        assert_eq!(last.total, 10);
        assert_eq!(last.progress, 100.0);
        // 最后一批 8..10 加上前 5 条
        assert_eq!(last.preview.len(), 7);
        assert_eq!(last.preview[0].msgid, "message 3");
        assert_eq!(last.preview[6].msgstr, "MESSAGE 9");
    }

    #[test]
    fn test_execute_ends_with_one_terminal_event() {
        let mut pipeline = Pipeline::new(|| Ok::<_, TranslationError>(Upper), fast_config(50));
        let mut events = Vec::new();

        pipeline
            .execute(&mut entries(3), Path::new("out/messages_zh.po"), &mut |e: PipelineEvent| events.push(e))
            .unwrap();

        let terminal: Vec<&PipelineEvent> = events.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(terminal.len(), 1);
        let PipelineEvent::Completion(report) = terminal[0] else {
            panic!("expected completion");
        };
        assert_eq!(report.output_filename, "messages_zh.po");
        assert_eq!(report.total_processed, 3);
        assert!(report.warning.is_none());
    }

    #[test]
    fn test_nothing_to_translate_is_a_single_error() {
        let mut pipeline = Pipeline::new(|| Ok::<_, TranslationError>(Upper), fast_config(50));
        let mut blank = vec![CatalogEntry::new(""), CatalogEntry::new("  ")];
        let mut events = Vec::new();

        let result = pipeline.execute(&mut blank, Path::new("x.po"), &mut |e: PipelineEvent| events.push(e));

        assert!(matches!(result, Err(TranslationError::InvalidInput(_))));
        assert_eq!(events, vec![PipelineEvent::error("文件中没有需要翻译的内容")]);
    }

    #[test]
    fn test_cancel_stops_at_batch_boundary() {
        let mut pipeline = Pipeline::new(|| Ok::<_, TranslationError>(Upper), fast_config(2));
        let cancel = pipeline.cancel_handle();
        let mut entries = entries(6);

        let summary = pipeline
            .run(&mut entries, &mut |_event: PipelineEvent| cancel.store(true, Ordering::SeqCst))
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.batches, 1);
        assert_eq!(entries[1].translated_text(), "MESSAGE 1");
        assert_eq!(entries[2].translated_text(), "");
    }

    #[test]
    fn test_event_wire_shape() {
        let summary = RunSummary {
            total: 5,
            processed: 5,
            translated: 3,
            ledger: {
                let mut ledger = FailureLedger::default();
                ledger.extend([1, 4]);
                ledger
            },
            ..Default::default()
        };
        let json = serde_json::to_value(summary.completion_event(Path::new("/tmp/a_zh.mo"))).unwrap();

        assert_eq!(json["status"], "complete");
        assert_eq!(json["output_file"], "/tmp/a_zh.mo");
        assert_eq!(json["failed_entries"], 2);
        assert_eq!(json["warning"], "有 2 个条目翻译失败");

        let error = serde_json::to_value(PipelineEvent::error("boom")).unwrap();
        assert_eq!(error, serde_json::json!({ "error": "boom" }));
    }
}
