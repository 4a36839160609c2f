//! 文件级翻译服务
//!
//! 读取目录文件、运行流水线、写回结果，并保证事件流以唯一的完成或错误事件结束

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::catalog::{output_path_for, Catalog, CatalogFormat};
use crate::translation::client::{ClientFactory, HttpClientFactory};
use crate::translation::config::TranslationConfig;
use crate::translation::error::{helpers, TranslationResult};
use crate::translation::pipeline::{
    error_message, EventSink, Pipeline, PipelineConfig, PipelineEvent, RunSummary,
};

/// 一次文件翻译请求
#[derive(Debug, Clone, PartialEq)]
pub struct FileRequest {
    pub input: PathBuf,
    /// 未指定时写到输入文件旁边，例如 `messages_zh.po`
    pub output: Option<PathBuf>,
    /// 未指定输出路径时强制输出为 MO；指定时输出路径必须是 .mo
    pub compile_mo: bool,
}

impl FileRequest {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            compile_mo: false,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn compile_mo(mut self, compile: bool) -> Self {
        self.compile_mo = compile;
        self
    }
}

/// 文件翻译服务
#[derive(Debug, Clone)]
pub struct TranslationService<F> {
    config: TranslationConfig,
    factory: F,
}

impl TranslationService<HttpClientFactory> {
    /// 使用 HTTP 服务商创建服务
    pub fn from_config(config: TranslationConfig) -> TranslationResult<Self> {
        config.validate()?;
        let factory = HttpClientFactory::from_config(&config);
        Ok(Self::new(config, factory))
    }
}

impl<F: ClientFactory + Clone> TranslationService<F> {
    pub fn new(config: TranslationConfig, factory: F) -> Self {
        Self { config, factory }
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    /// 输出格式：指定了输出路径时由其扩展名决定，否则要求 MO 时为 MO，再否则与输入相同
    fn output_format(&self, request: &FileRequest, input_format: CatalogFormat) -> TranslationResult<CatalogFormat> {
        let Some(output) = &request.output else {
            return Ok(if request.compile_mo { CatalogFormat::Mo } else { input_format });
        };

        let format = CatalogFormat::from_path(output)?;
        if request.compile_mo && format != CatalogFormat::Mo {
            return Err(helpers::validation_error(format!(
                "要求输出 MO，但输出路径不是 .mo 文件: {}",
                output.display()
            )));
        }
        Ok(format)
    }

    fn output_path(&self, request: &FileRequest, format: CatalogFormat) -> PathBuf {
        request
            .output
            .clone()
            .unwrap_or_else(|| output_path_for(&request.input, &self.config.output_suffix(), format))
    }

    /// 翻译一个文件，事件流以一个完成或错误事件结束
    pub fn translate_file(
        &self,
        request: &FileRequest,
        sink: &mut impl EventSink,
    ) -> TranslationResult<RunSummary> {
        self.translate_file_with_cancel(request, sink, Arc::new(AtomicBool::new(false)))
    }

    pub fn translate_file_with_cancel(
        &self,
        request: &FileRequest,
        sink: &mut impl EventSink,
        cancel: Arc<AtomicBool>,
    ) -> TranslationResult<RunSummary> {
        match self.process(request, sink, cancel) {
            Ok((summary, output)) => {
                if summary.cancelled {
                    sink.emit(PipelineEvent::error("翻译已取消"));
                } else {
                    sink.emit(summary.completion_event(&output));
                }
                Ok(summary)
            }
            Err(e) => {
                helpers::log_error(&e);
                sink.emit(PipelineEvent::error(error_message(&e)));
                Err(e)
            }
        }
    }

    fn process(
        &self,
        request: &FileRequest,
        sink: &mut impl EventSink,
        cancel: Arc<AtomicBool>,
    ) -> TranslationResult<(RunSummary, PathBuf)> {
        validate_input(&request.input)?;
        let format = self.output_format(request, CatalogFormat::from_path(&request.input)?)?;

        let mut catalog = Catalog::load(&request.input)?;
        if catalog.translatable_count() == 0 {
            return Err(helpers::validation_error("文件中没有需要翻译的内容"));
        }

        let output = self.output_path(request, format);

        tracing::info!(
            "翻译 {} -> {} ({} 个可翻译条目)",
            request.input.display(),
            output.display(),
            catalog.translatable_count()
        );

        let mut pipeline = Pipeline::new(self.factory.clone(), PipelineConfig::from(&self.config))
            .with_cancel_flag(cancel);
        let summary = pipeline.run(&mut catalog.entries, sink)?;

        if summary.cancelled {
            tracing::warn!("运行已取消，不写出 {}", output.display());
            return Ok((summary, output));
        }

        catalog.set_language(&self.config.target_lang);
        catalog.save_as(&output, format)?;

        Ok((summary, output))
    }
}

fn validate_input(input: &Path) -> TranslationResult<()> {
    CatalogFormat::from_path(input)?;

    if !input.exists() {
        return Err(helpers::validation_error(format!("文件不存在: {}", input.display())));
    }
    if !input.is_file() {
        return Err(helpers::validation_error(format!("不是普通文件: {}", input.display())));
    }
    Ok(())
}

/// 在阻塞线程中运行翻译，返回任务句柄和事件接收端
///
/// 接收端被丢弃后，流水线在下一个批次边界停止
pub fn spawn_translation<F>(
    service: TranslationService<F>,
    request: FileRequest,
) -> (
    JoinHandle<TranslationResult<RunSummary>>,
    mpsc::UnboundedReceiver<PipelineEvent>,
)
where
    F: ClientFactory + Clone + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = Arc::new(AtomicBool::new(false));

    let handle = tokio::task::spawn_blocking(move || {
        let flag = Arc::clone(&cancel);
        let mut sink = move |event: PipelineEvent| {
            if tx.send(event).is_err() && !flag.swap(true, Ordering::SeqCst) {
                tracing::debug!("事件接收端已关闭，停止翻译");
            }
        };
        service.translate_file_with_cancel(&request, &mut sink, cancel)
    });

    (handle, rx)
}
