//! 目录条目
//!
//! 源文本在一次运行中不可变，译文和状态只能通过
//! [`CatalogEntry::apply_translation`] 与 [`CatalogEntry::mark_failed`] 修改

use serde::Serialize;

/// 条目翻译状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    #[default]
    Pending,
    Translated,
    Failed,
}

/// 一个可翻译单元（对应 PO 中的一条 msgid）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CatalogEntry {
    source_text: String,
    translated_text: String,
    status: EntryStatus,

    /// msgctxt
    pub context: Option<String>,
    /// msgid_plural
    pub plural_source: Option<String>,
    /// msgstr[n]
    pub plural_translations: Vec<String>,

    pub comments: Vec<String>,
    pub extracted_comments: Vec<String>,
    pub references: Vec<String>,
    pub flags: Vec<String>,
    /// `#|` 行，原样保留
    pub previous: Vec<String>,
}

impl CatalogEntry {
    pub fn new(source_text: impl Into<String>) -> Self {
        Self {
            source_text: source_text.into(),
            ..Default::default()
        }
    }

    /// 创建带已有译文的条目（从文件读入时使用），状态仍为 Pending
    pub fn with_translation(source_text: impl Into<String>, translated_text: impl Into<String>) -> Self {
        Self {
            source_text: source_text.into(),
            translated_text: translated_text.into(),
            ..Default::default()
        }
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn translated_text(&self) -> &str {
        &self.translated_text
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    /// 源文本去除空白后非空
    pub fn is_translatable(&self) -> bool {
        !self.source_text.trim().is_empty()
    }

    pub fn is_fuzzy(&self) -> bool {
        self.flags.iter().any(|flag| flag == "fuzzy")
    }

    pub fn is_plural(&self) -> bool {
        self.plural_source.is_some()
    }

    /// 是否存在可写入 MO 的译文
    pub fn has_translation(&self) -> bool {
        if self.is_plural() {
            !self.translated_text.is_empty() || self.plural_translations.iter().any(|t| !t.is_empty())
        } else {
            !self.translated_text.is_empty()
        }
    }

    pub fn apply_translation(&mut self, text: impl Into<String>) {
        self.translated_text = text.into();
        self.status = EntryStatus::Translated;
    }

    /// 标记失败，保留原有译文
    pub fn mark_failed(&mut self) {
        self.status = EntryStatus::Failed;
    }

    /// 输出时的复数译文：空的复数形式使用单数译文补齐
    pub fn plural_forms(&self) -> Vec<String> {
        if self.plural_translations.is_empty() {
            return vec![self.translated_text.clone()];
        }

        self.plural_translations
            .iter()
            .map(|form| {
                if form.is_empty() {
                    self.translated_text.clone()
                } else {
                    form.clone()
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_only_source_is_not_translatable() {
        assert!(!CatalogEntry::new("  \n\t").is_translatable());
        assert!(CatalogEntry::new(" Open ").is_translatable());
    }

    #[test]
    fn failure_keeps_existing_translation() {
        let mut entry = CatalogEntry::with_translation("Save", "保存");
        entry.mark_failed();
        assert_eq!(entry.status(), EntryStatus::Failed);
        assert_eq!(entry.translated_text(), "保存");
    }

    #[test]
    fn plural_forms_fall_back_to_singular_translation() {
        let mut entry = CatalogEntry::new("%d file");
        entry.plural_source = Some("%d files".to_string());
        entry.plural_translations = vec![String::new(), "%d Dateien".to_string()];
        entry.apply_translation("%d Datei");

        assert_eq!(entry.plural_forms(), vec!["%d Datei", "%d Dateien"]);
        assert!(entry.has_translation());
    }
}
