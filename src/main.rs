//! 命令行入口：翻译单个 PO/MO 目录文件

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::Level;

use catalog_translator::env::{self, EnvVar};
use catalog_translator::translation::{
    spawn_translation, BatchMode, ConfigManager, FileRequest, PipelineEvent, ProviderKind, TranslationConfig,
    TranslationResult, TranslationService,
};

const ANSI_RED: &str = "\x1b[31m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_RESET: &str = "\x1b[0m";

#[derive(Parser, Debug)]
#[command(name = "catalog-translator", version, about = "批量机器翻译 gettext PO/MO 目录文件")]
struct Cli {
    /// 输入文件（.po / .pot / .mo）
    #[arg(value_name = "INPUT", required_unless_present = "env_docs")]
    input: Option<PathBuf>,

    /// 输出文件，默认写到输入文件旁边
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// 目标语言
    #[arg(short, long = "target", value_name = "LANG")]
    target_lang: Option<String>,

    /// 源语言
    #[arg(long = "source", value_name = "LANG")]
    source_lang: Option<String>,

    /// 翻译服务商
    #[arg(long, value_enum)]
    provider: Option<ProviderKind>,

    /// 服务商接口地址
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// 每批固定条目数
    #[arg(long, value_name = "N", conflicts_with = "char_budget")]
    batch_size: Option<usize>,

    /// 每批累计字符预算
    #[arg(long, value_name = "CHARS")]
    char_budget: Option<usize>,

    /// 输出编译后的 MO 文件（指定 -o 时其扩展名必须是 .mo）
    #[arg(long)]
    mo: bool,

    /// 以 JSON 行输出事件到标准输出
    #[arg(long)]
    json: bool,

    /// 配置文件路径
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// 提高日志详细程度（可重复）
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// 打印支持的环境变量并退出
    #[arg(long)]
    env_docs: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut TranslationConfig) {
        if let Some(lang) = &self.target_lang {
            config.target_lang = lang.clone();
        }
        if let Some(lang) = &self.source_lang {
            config.source_lang = lang.clone();
        }
        if let Some(provider) = self.provider {
            config.provider = provider;
        }
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(size) = self.batch_size {
            config.batch_mode = BatchMode::Fixed;
            config.batch_size = size;
        }
        if let Some(budget) = self.char_budget {
            config.batch_mode = BatchMode::Chars;
            config.char_budget = budget;
        }
    }
}

struct Palette {
    enabled: bool,
}

impl Palette {
    fn detect() -> Self {
        let no_color = env::core::NoColor::get().unwrap_or(false);
        Self {
            enabled: !no_color && atty::is(atty::Stream::Stderr),
        }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.enabled {
            format!("{}{}{}", color, text, ANSI_RESET)
        } else {
            text.to_string()
        }
    }
}

fn init_logging(verbose: u8, ansi: bool) {
    let level = match verbose {
        0 => env::core::LogLevel::lookup()
            .ok()
            .flatten()
            .and_then(|level| level.parse::<Level>().ok())
            .unwrap_or(Level::WARN),
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_ansi(ansi)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> TranslationResult<TranslationConfig> {
    let manager = ConfigManager::load(cli.config.as_deref())?;
    if let Some(path) = manager.config_path() {
        tracing::info!("使用配置文件: {}", path.display());
    }

    let mut config = manager.into_config();
    cli.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

fn print_progress(event: &PipelineEvent) {
    if let PipelineEvent::Progress(update) = event {
        let mut stderr = io::stderr();
        let _ = write!(
            stderr,
            "\r[{:>5.1}%] {}/{} 失败 {} 剩余时间 {}   ",
            update.progress, update.processed, update.total, update.failed, update.time_remaining
        );
        let _ = stderr.flush();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let palette = Palette::detect();

    if cli.env_docs {
        print!("{}", env::generate_env_docs());
        return;
    }

    init_logging(cli.verbose, palette.enabled);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", palette.paint(ANSI_RED, "错误:"), e);
            process::exit(1);
        }
    };

    let service = match TranslationService::from_config(config) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("{} {}", palette.paint(ANSI_RED, "错误:"), e);
            process::exit(1);
        }
    };

    let Some(input) = cli.input.clone() else {
        process::exit(2);
    };
    let mut request = FileRequest::new(input).compile_mo(cli.mo);
    if let Some(output) = &cli.output {
        request = request.with_output(output);
    }

    let (handle, mut events) = spawn_translation(service, request);
    let mut exit_code = 1;

    while let Some(event) = events.recv().await {
        if cli.json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::error!("事件序列化失败: {}", e),
            }
        }

        match &event {
            PipelineEvent::Progress(_) => {
                if !cli.json {
                    print_progress(&event);
                }
            }
            PipelineEvent::Completion(report) => {
                exit_code = 0;
                if !cli.json {
                    eprintln!();
                    eprintln!(
                        "{} {} ({}/{} 条目已翻译)",
                        palette.paint(ANSI_GREEN, "完成:"),
                        report.output_file,
                        report.translated_entries,
                        report.total_entries
                    );
                }
                if let Some(warning) = &report.warning {
                    eprintln!("{} {}", palette.paint(ANSI_YELLOW, "警告:"), warning);
                }
            }
            PipelineEvent::Error(report) => {
                exit_code = 1;
                if !cli.json {
                    eprintln!();
                }
                eprintln!("{} {}", palette.paint(ANSI_RED, "错误:"), report.error);
            }
        }
    }

    match handle.await {
        Ok(Ok(summary)) => {
            tracing::info!(
                "{} 个批次, {} 次请求, {} 次拆分, 用时 {:.1}s",
                summary.batches,
                summary.requests,
                summary.bisections,
                summary.elapsed.as_secs_f64()
            );
        }
        Ok(Err(e)) => tracing::debug!("翻译失败: {}", e),
        Err(e) => {
            eprintln!("{} 翻译任务异常退出: {}", palette.paint(ANSI_RED, "错误:"), e);
            exit_code = 1;
        }
    }

    process::exit(exit_code);
}
