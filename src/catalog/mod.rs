//! gettext 目录文件
//!
//! 读取和写回 PO（文本）与 MO（编译后的二进制）两种格式。
//! 格式由文件扩展名决定，写入时可以显式指定为 MO

pub mod entry;
pub mod mo;
pub mod po;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::translation::error::{helpers, TranslationError, TranslationResult};

pub use entry::{CatalogEntry, EntryStatus};

/// 目录文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFormat {
    Po,
    Mo,
}

impl CatalogFormat {
    /// 根据扩展名判断格式（`.po`、`.pot`、`.mo`）
    pub fn from_path(path: &Path) -> TranslationResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("po") | Some("pot") => Ok(CatalogFormat::Po),
            Some("mo") => Ok(CatalogFormat::Mo),
            _ => Err(helpers::validation_error(format!(
                "不支持的文件类型: {}",
                path.display()
            ))),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            CatalogFormat::Po => "po",
            CatalogFormat::Mo => "mo",
        }
    }
}

/// 头部条目（msgid 为空的那一条），字段保持原始顺序
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CatalogHeader {
    pub comments: Vec<String>,
    pub flags: Vec<String>,
    pub fields: Vec<(String, String)>,
}

impl CatalogHeader {
    /// 解析 `Key: Value\n` 形式的头部译文
    pub fn parse(msgstr: &str) -> Self {
        let fields = msgstr
            .lines()
            .filter_map(|line| {
                let (key, value) = line.split_once(':')?;
                let key = key.trim();
                (!key.is_empty()).then(|| (key.to_string(), value.trim().to_string()))
            })
            .collect();

        Self {
            fields,
            ..Default::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }

    /// 设置字段，已存在时原位替换
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| name.eq_ignore_ascii_case(key)) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty() && self.flags.is_empty() && self.fields.is_empty()
    }

    pub fn to_msgstr(&self) -> String {
        self.fields
            .iter()
            .map(|(key, value)| format!("{}: {}\n", key, value))
            .collect()
    }

    /// Content-Type 中声明的字符集
    pub fn charset(&self) -> Option<String> {
        self.get("Content-Type").and_then(charset_from)
    }

    /// 写出前刷新的字段：输出总是 UTF-8
    fn touch(&mut self) {
        if self.fields.is_empty() {
            return;
        }

        let now = chrono::Local::now().format("%Y-%m-%d %H:%M%z").to_string();
        self.set("PO-Revision-Date", now);
        self.set("Content-Type", "text/plain; charset=UTF-8");
        self.set(
            "X-Generator",
            format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        );
    }
}

/// 从文本中提取 `charset=` 声明
pub(crate) fn charset_from(text: &str) -> Option<String> {
    static CHARSET: OnceLock<Option<Regex>> = OnceLock::new();

    CHARSET
        .get_or_init(|| Regex::new(r"charset=([A-Za-z0-9_\-.:]+)").ok())
        .as_ref()?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// 按声明的字符集解码，未声明时要求合法 UTF-8
pub(crate) fn decode_text(bytes: &[u8], charset: Option<&str>) -> TranslationResult<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let encoding = charset
        .filter(|label| !label.eq_ignore_ascii_case("charset"))
        .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()))
        .unwrap_or(encoding_rs::UTF_8);

    if encoding == encoding_rs::UTF_8 {
        return String::from_utf8(bytes.to_vec())
            .map_err(|e| helpers::catalog_error(format!("文件不是合法的 UTF-8: {}", e)));
    }

    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::warn!("按 {} 解码时存在无法识别的字节", encoding.name());
    }
    Ok(text.into_owned())
}

/// 一个已加载的目录文件
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub header: CatalogHeader,
    pub entries: Vec<CatalogEntry>,
    /// `#~` 废弃条目，只在 PO 中保留
    pub obsolete: Vec<CatalogEntry>,
    pub format: CatalogFormat,
}

impl Catalog {
    pub fn new(format: CatalogFormat) -> Self {
        Self {
            header: CatalogHeader::default(),
            entries: Vec::new(),
            obsolete: Vec::new(),
            format,
        }
    }

    /// 读取目录文件，格式由扩展名决定
    pub fn load(path: &Path) -> TranslationResult<Self> {
        let format = CatalogFormat::from_path(path)?;

        if !path.is_file() {
            return Err(helpers::validation_error(format!("文件不存在: {}", path.display())));
        }

        let bytes = fs::read(path).map_err(|e| TranslationError::from(e).with_context(path.display()))?;
        if bytes.is_empty() {
            return Err(helpers::validation_error(format!("文件为空: {}", path.display())));
        }

        let catalog = match format {
            CatalogFormat::Po => po::parse(&bytes),
            CatalogFormat::Mo => mo::parse(&bytes),
        }
        .map_err(|e| e.with_context(path.display()))?;

        tracing::debug!(
            "已加载 {}: {} 个条目，{} 个可翻译",
            path.display(),
            catalog.entries.len(),
            catalog.translatable_count()
        );

        Ok(catalog)
    }

    /// 以加载时的格式保存
    pub fn save(&mut self, path: &Path) -> TranslationResult<()> {
        self.save_as(path, self.format)
    }

    /// 以指定格式保存，先写入同目录的临时文件再原子替换
    pub fn save_as(&mut self, path: &Path, format: CatalogFormat) -> TranslationResult<()> {
        self.header.touch();

        let bytes = match format {
            CatalogFormat::Po => po::write(self).into_bytes(),
            CatalogFormat::Mo => mo::write(self),
        };

        write_atomic(path, &bytes).map_err(|e| e.with_context(path.display()))?;
        tracing::info!("已保存 {} ({} 字节)", path.display(), bytes.len());
        Ok(())
    }

    pub fn translatable_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_translatable()).count()
    }

    /// 设置头部的 Language 字段
    pub fn set_language(&mut self, lang: &str) {
        if !self.header.fields.is_empty() {
            self.header.set("Language", lang);
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> TranslationResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.persist(path).map_err(|e| TranslationError::from(e.error))?;
    Ok(())
}

/// 输出文件路径：`messages.po` + `_zh` -> `messages_zh.po`，扩展名跟随输出格式
pub fn output_path_for(input: &Path, suffix: &str, format: CatalogFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "catalog".to_string());

    let file_name = format!("{}{}.{}", stem, suffix, format.extension());
    input.with_file_name(file_name)
}
