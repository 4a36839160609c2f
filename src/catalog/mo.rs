//! MO 二进制格式的读取与输出
//!
//! 布局：魔数、版本、条目数、原文表偏移、译文表偏移、哈希表大小与偏移，
//! 之后是 (长度, 偏移) 表和以 NUL 结尾的字符串。输出不生成哈希表

use super::{charset_from, decode_text, Catalog, CatalogEntry, CatalogFormat, CatalogHeader};
use crate::translation::error::{helpers, TranslationResult};

const MAGIC: u32 = 0x9504_12de;
const HEADER_SIZE: usize = 28;
const CONTEXT_SEPARATOR: u8 = 0x04;

#[derive(Debug, Clone, Copy)]
enum Endian {
    Little,
    Big,
}

struct Reader<'a> {
    bytes: &'a [u8],
    endian: Endian,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> TranslationResult<Self> {
        let magic = bytes
            .get(0..4)
            .ok_or_else(|| helpers::catalog_error("MO 文件过短"))?;
        let magic = [magic[0], magic[1], magic[2], magic[3]];

        let endian = if u32::from_le_bytes(magic) == MAGIC {
            Endian::Little
        } else if u32::from_be_bytes(magic) == MAGIC {
            Endian::Big
        } else {
            return Err(helpers::catalog_error("不是有效的 MO 文件（魔数错误）"));
        };

        Ok(Self { bytes, endian })
    }

    fn u32_at(&self, offset: usize) -> TranslationResult<usize> {
        let raw = offset
            .checked_add(4)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or_else(|| helpers::catalog_error(format!("MO 文件在偏移 {} 处被截断", offset)))?;
        let raw = [raw[0], raw[1], raw[2], raw[3]];

        let value = match self.endian {
            Endian::Little => u32::from_le_bytes(raw),
            Endian::Big => u32::from_be_bytes(raw),
        };
        Ok(value as usize)
    }

    /// 描述符表 `count` 项必须完整落在文件内
    fn check_table(&self, table: usize, count: usize) -> TranslationResult<()> {
        let fits = count
            .checked_mul(8)
            .and_then(|size| table.checked_add(size))
            .is_some_and(|end| end <= self.bytes.len());

        if fits {
            Ok(())
        } else {
            Err(helpers::catalog_error(format!(
                "MO 描述符表越界: 偏移 {} 条目数 {} 文件大小 {}",
                table,
                count,
                self.bytes.len()
            )))
        }
    }

    /// 读取描述符表中第 `index` 项指向的字符串
    fn string_at(&self, table: usize, index: usize) -> TranslationResult<&'a [u8]> {
        let descriptor = index
            .checked_mul(8)
            .and_then(|size| table.checked_add(size))
            .ok_or_else(|| helpers::catalog_error("MO 描述符偏移溢出"))?;
        let length = self.u32_at(descriptor)?;
        let offset = self.u32_at(descriptor + 4)?;

        offset
            .checked_add(length)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or_else(|| helpers::catalog_error(format!("MO 字符串越界: 偏移 {} 长度 {}", offset, length)))
    }
}

/// 解析 MO 文件内容
pub fn parse(bytes: &[u8]) -> TranslationResult<Catalog> {
    let reader = Reader::new(bytes)?;

    let revision = reader.u32_at(4)?;
    if revision >> 16 > 1 {
        return Err(helpers::catalog_error(format!("不支持的 MO 版本: {:#x}", revision)));
    }

    let count = reader.u32_at(8)?;
    let originals = reader.u32_at(12)?;
    let translations = reader.u32_at(16)?;
    reader.check_table(originals, count)?;
    reader.check_table(translations, count)?;

    let mut pairs = Vec::with_capacity(count);
    for index in 0..count {
        pairs.push((
            reader.string_at(originals, index)?,
            reader.string_at(translations, index)?,
        ));
    }

    let charset = pairs
        .iter()
        .find(|(key, _)| key.is_empty())
        .and_then(|(_, value)| charset_from(&String::from_utf8_lossy(value)));

    let mut catalog = Catalog::new(CatalogFormat::Mo);

    for (key, value) in pairs {
        if key.is_empty() {
            catalog.header = CatalogHeader::parse(&decode_text(value, charset.as_deref())?);
            continue;
        }

        let (context, key) = match key.iter().position(|&b| b == CONTEXT_SEPARATOR) {
            Some(pos) => (Some(decode_text(&key[..pos], charset.as_deref())?), &key[pos + 1..]),
            None => (None, key),
        };

        let mut ids = key.splitn(2, |&b| b == 0);
        let msgid = decode_text(ids.next().unwrap_or_default(), charset.as_deref())?;
        let plural = ids.next().map(|p| decode_text(p, charset.as_deref())).transpose()?;

        let mut entry = match plural {
            Some(plural) => {
                let forms = value
                    .split(|&b| b == 0)
                    .map(|form| decode_text(form, charset.as_deref()))
                    .collect::<TranslationResult<Vec<_>>>()?;
                let mut entry = CatalogEntry::with_translation(msgid, forms.first().cloned().unwrap_or_default());
                entry.plural_source = Some(plural);
                entry.plural_translations = forms;
                entry
            }
            None => CatalogEntry::with_translation(msgid, decode_text(value, charset.as_deref())?),
        };
        entry.context = context;
        catalog.entries.push(entry);
    }

    Ok(catalog)
}

fn entry_key(entry: &CatalogEntry) -> Vec<u8> {
    let mut key = Vec::new();
    if let Some(context) = &entry.context {
        key.extend_from_slice(context.as_bytes());
        key.push(CONTEXT_SEPARATOR);
    }
    key.extend_from_slice(entry.source_text().as_bytes());
    if let Some(plural) = &entry.plural_source {
        key.push(0);
        key.extend_from_slice(plural.as_bytes());
    }
    key
}

fn entry_value(entry: &CatalogEntry) -> Vec<u8> {
    if entry.is_plural() {
        entry.plural_forms().join("\0").into_bytes()
    } else {
        entry.translated_text().as_bytes().to_vec()
    }
}

/// 输出小端 MO 文件；跳过 fuzzy 与没有译文的条目
pub fn write(catalog: &Catalog) -> Vec<u8> {
    let mut pairs: Vec<(Vec<u8>, Vec<u8>)> = catalog
        .entries
        .iter()
        .filter(|entry| !entry.is_fuzzy() && entry.has_translation() && !entry.source_text().is_empty())
        .map(|entry| (entry_key(entry), entry_value(entry)))
        .collect();

    if !catalog.header.fields.is_empty() {
        pairs.push((Vec::new(), catalog.header.to_msgstr().into_bytes()));
    }

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let count = pairs.len();
    let originals_offset = HEADER_SIZE;
    let translations_offset = originals_offset + count * 8;
    let strings_offset = translations_offset + count * 8;

    let mut table = Vec::with_capacity(count * 16);
    let mut strings = Vec::new();
    let mut descriptors = Vec::with_capacity(count * 2);

    for (key, _) in &pairs {
        descriptors.push((key.len(), strings_offset + strings.len()));
        strings.extend_from_slice(key);
        strings.push(0);
    }
    for (_, value) in &pairs {
        descriptors.push((value.len(), strings_offset + strings.len()));
        strings.extend_from_slice(value);
        strings.push(0);
    }
    for (length, offset) in descriptors {
        table.extend_from_slice(&(length as u32).to_le_bytes());
        table.extend_from_slice(&(offset as u32).to_le_bytes());
    }

    let mut out = Vec::with_capacity(HEADER_SIZE + table.len() + strings.len());
    for word in [
        MAGIC,
        0,
        count as u32,
        originals_offset as u32,
        translations_offset as u32,
        0,
        strings_offset as u32,
    ] {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out.extend_from_slice(&table);
    out.extend_from_slice(&strings);
    out
}
