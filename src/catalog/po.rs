//! PO 文本格式的解析与输出

use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;

use super::{charset_from, decode_text, Catalog, CatalogEntry, CatalogFormat, CatalogHeader};
use crate::translation::error::{helpers, TranslationResult};

fn keyword_regex() -> TranslationResult<&'static Regex> {
    static KEYWORD: OnceLock<Option<Regex>> = OnceLock::new();

    KEYWORD
        .get_or_init(|| {
            Regex::new(r#"^(msgctxt|msgid_plural|msgid|msgstr)(?:\[(\d+)\])?\s+"(.*)"\s*$"#).ok()
        })
        .as_ref()
        .ok_or_else(|| helpers::catalog_error("PO 关键字正则初始化失败"))
}

/// 当前续行追加到哪个字段
#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Context,
    Id,
    IdPlural,
    Str,
    StrPlural(usize),
}

#[derive(Debug, Default)]
struct EntryBuilder {
    context: Option<String>,
    msgid: Option<String>,
    msgid_plural: Option<String>,
    msgstr: Option<String>,
    msgstr_plural: Vec<String>,
    comments: Vec<String>,
    extracted_comments: Vec<String>,
    references: Vec<String>,
    flags: Vec<String>,
    previous: Vec<String>,
    obsolete: bool,
    field: Option<Field>,
}

impl EntryBuilder {
    fn has_translation_part(&self) -> bool {
        self.msgstr.is_some() || !self.msgstr_plural.is_empty()
    }

    fn is_blank(&self) -> bool {
        self.msgid.is_none()
            && self.comments.is_empty()
            && self.extracted_comments.is_empty()
            && self.references.is_empty()
            && self.flags.is_empty()
            && self.previous.is_empty()
    }

    fn push(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::Context => self.context.get_or_insert_with(String::new),
            Field::Id => self.msgid.get_or_insert_with(String::new),
            Field::IdPlural => self.msgid_plural.get_or_insert_with(String::new),
            Field::Str => self.msgstr.get_or_insert_with(String::new),
            Field::StrPlural(index) => {
                if self.msgstr_plural.len() <= index {
                    self.msgstr_plural.resize(index + 1, String::new());
                }
                &mut self.msgstr_plural[index]
            }
        };
        target.push_str(text);
        self.field = Some(field);
    }

    fn into_entry(self) -> CatalogEntry {
        let mut entry = CatalogEntry::with_translation(
            self.msgid.unwrap_or_default(),
            self.msgstr.unwrap_or_default(),
        );
        entry.context = self.context;
        entry.plural_source = self.msgid_plural;
        entry.plural_translations = self.msgstr_plural;
        entry.comments = self.comments;
        entry.extracted_comments = self.extracted_comments;
        entry.references = self.references;
        entry.flags = self.flags;
        entry.previous = self.previous;
        entry
    }
}

struct Parser {
    catalog: Catalog,
    current: EntryBuilder,
    seen_header: bool,
}

impl Parser {
    fn new() -> Self {
        Self {
            catalog: Catalog::new(CatalogFormat::Po),
            current: EntryBuilder::default(),
            seen_header: false,
        }
    }

    fn flush(&mut self) {
        let builder = std::mem::take(&mut self.current);
        if builder.msgid.is_none() {
            return;
        }

        let is_header = !self.seen_header
            && !builder.obsolete
            && builder.context.is_none()
            && builder.msgid.as_deref() == Some("");

        if is_header {
            self.seen_header = true;
            let mut header = CatalogHeader::parse(builder.msgstr.as_deref().unwrap_or_default());
            header.comments = builder.comments;
            header.flags = builder.flags;
            self.catalog.header = header;
        } else if builder.obsolete {
            self.catalog.obsolete.push(builder.into_entry());
        } else {
            self.catalog.entries.push(builder.into_entry());
        }
    }

    fn parse_line(&mut self, line_no: usize, raw: &str) -> TranslationResult<()> {
        let line = raw.trim();

        if line.is_empty() {
            if self.current.msgid.is_some() {
                self.flush();
            }
            return Ok(());
        }

        if let Some(rest) = line.strip_prefix("#~") {
            let rest = rest.trim_start();
            if rest.starts_with('|') {
                return self.parse_line(line_no, &format!("#{}", rest));
            }
            if self.current.has_translation_part() && !self.current.obsolete {
                self.flush();
            }
            self.current.obsolete = true;
            return self.parse_keyword_or_continuation(line_no, rest);
        }

        if let Some(comment) = line.strip_prefix('#') {
            if self.current.has_translation_part() {
                self.flush();
            }

            match comment.chars().next() {
                Some(',') => self.current.flags.extend(
                    comment[1..]
                        .split(',')
                        .map(str::trim)
                        .filter(|flag| !flag.is_empty())
                        .map(str::to_string),
                ),
                Some(':') => self
                    .current
                    .references
                    .extend(comment[1..].split_whitespace().map(str::to_string)),
                Some('.') => self.current.extracted_comments.push(comment[1..].trim().to_string()),
                Some('|') => self.current.previous.push(comment[1..].trim().to_string()),
                _ => self
                    .current
                    .comments
                    .push(comment.strip_prefix(' ').unwrap_or(comment).to_string()),
            }
            return Ok(());
        }

        self.parse_keyword_or_continuation(line_no, line)
    }

    fn parse_keyword_or_continuation(&mut self, line_no: usize, line: &str) -> TranslationResult<()> {
        if line.starts_with('"') {
            let field = self
                .current
                .field
                .ok_or_else(|| helpers::catalog_error(format!("第 {} 行: 续行前缺少关键字", line_no)))?;
            let text = quoted(line)
                .ok_or_else(|| helpers::catalog_error(format!("第 {} 行: 字符串格式错误", line_no)))?;
            self.current.push(field, &unescape(text));
            return Ok(());
        }

        let caps = keyword_regex()?
            .captures(line)
            .ok_or_else(|| helpers::catalog_error(format!("第 {} 行: 无法识别的内容: {}", line_no, line)))?;

        let keyword = caps.get(1).map_or("", |m| m.as_str());
        let index = caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok());
        let text = unescape(caps.get(3).map_or("", |m| m.as_str()));

        let field = match (keyword, index) {
            ("msgctxt", None) => Field::Context,
            ("msgid", None) => Field::Id,
            ("msgid_plural", None) => Field::IdPlural,
            ("msgstr", None) => Field::Str,
            ("msgstr", Some(i)) => Field::StrPlural(i),
            _ => {
                return Err(helpers::catalog_error(format!(
                    "第 {} 行: 关键字不能带索引: {}",
                    line_no, keyword
                )))
            }
        };

        // 新条目从 msgctxt 或 msgid 开始
        if matches!(field, Field::Context | Field::Id)
            && (self.current.has_translation_part()
                || (field == Field::Context && self.current.msgid.is_some()))
        {
            let obsolete = self.current.obsolete;
            self.flush();
            self.current.obsolete = obsolete;
        }

        if matches!(field, Field::Str | Field::StrPlural(_)) && self.current.msgid.is_none() {
            return Err(helpers::catalog_error(format!("第 {} 行: msgstr 之前缺少 msgid", line_no)));
        }

        self.current.push(field, &text);
        Ok(())
    }

    fn finish(mut self) -> Catalog {
        self.flush();
        self.catalog
    }
}

fn quoted(line: &str) -> Option<&str> {
    line.trim_end().strip_prefix('"')?.strip_suffix('"')
}

/// 解析 C 风格转义
fn unescape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }

        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('a') => result.push('\u{07}'),
            Some('b') => result.push('\u{08}'),
            Some('f') => result.push('\u{0C}'),
            Some('v') => result.push('\u{0B}'),
            Some('"') => result.push('"'),
            Some('\\') => result.push('\\'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}

fn escape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            '\t' => result.push_str("\\t"),
            '\r' => result.push_str("\\r"),
            '\u{07}' => result.push_str("\\a"),
            '\u{08}' => result.push_str("\\b"),
            '\u{0C}' => result.push_str("\\f"),
            '\u{0B}' => result.push_str("\\v"),
            _ => result.push(c),
        }
    }
    result
}

/// 解析 PO 文件内容
pub fn parse(bytes: &[u8]) -> TranslationResult<Catalog> {
    let charset = charset_from(&String::from_utf8_lossy(bytes));
    let text = decode_text(bytes, charset.as_deref())?;

    let mut parser = Parser::new();
    for (index, line) in text.lines().enumerate() {
        parser.parse_line(index + 1, line)?;
    }

    if !parser.current.is_blank() && parser.current.msgid.is_none() {
        tracing::debug!("忽略文件末尾的孤立注释");
    }

    Ok(parser.finish())
}

fn write_string(out: &mut String, prefix: &str, keyword: &str, text: &str) {
    let pieces: Vec<&str> = text.split_inclusive('\n').collect();

    if pieces.len() <= 1 {
        let _ = writeln!(out, "{}{} \"{}\"", prefix, keyword, escape(text));
        return;
    }

    let _ = writeln!(out, "{}{} \"\"", prefix, keyword);
    for piece in pieces {
        let _ = writeln!(out, "{}\"{}\"", prefix, escape(piece));
    }
}

fn write_entry(out: &mut String, entry: &CatalogEntry, obsolete: bool) {
    let prefix = if obsolete { "#~ " } else { "" };

    for comment in &entry.comments {
        if comment.is_empty() {
            out.push_str("#\n");
        } else {
            let _ = writeln!(out, "# {}", comment);
        }
    }
    for comment in &entry.extracted_comments {
        let _ = writeln!(out, "#. {}", comment);
    }
    if !entry.references.is_empty() {
        let _ = writeln!(out, "#: {}", entry.references.join(" "));
    }
    if !entry.flags.is_empty() {
        let _ = writeln!(out, "#, {}", entry.flags.join(", "));
    }
    for previous in &entry.previous {
        let _ = writeln!(out, "#| {}", previous);
    }

    if let Some(context) = &entry.context {
        write_string(out, prefix, "msgctxt", context);
    }
    write_string(out, prefix, "msgid", entry.source_text());

    match &entry.plural_source {
        Some(plural) => {
            write_string(out, prefix, "msgid_plural", plural);
            for (index, form) in entry.plural_forms().iter().enumerate() {
                write_string(out, prefix, &format!("msgstr[{}]", index), form);
            }
        }
        None => write_string(out, prefix, "msgstr", entry.translated_text()),
    }
}

/// 输出 PO 文本（UTF-8）
pub fn write(catalog: &Catalog) -> String {
    let mut out = String::new();
    let header = &catalog.header;

    if !header.is_empty() {
        for comment in &header.comments {
            if comment.is_empty() {
                out.push_str("#\n");
            } else {
                let _ = writeln!(out, "# {}", comment);
            }
        }
        if !header.flags.is_empty() {
            let _ = writeln!(out, "#, {}", header.flags.join(", "));
        }
        out.push_str("msgid \"\"\nmsgstr \"\"\n");
        for (key, value) in &header.fields {
            let _ = writeln!(out, "\"{}\"", escape(&format!("{}: {}\n", key, value)));
        }
        out.push('\n');
    }

    for (index, entry) in catalog.entries.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        write_entry(&mut out, entry, false);
    }

    for entry in &catalog.obsolete {
        out.push('\n');
        write_entry(&mut out, entry, true);
    }

    out
}
