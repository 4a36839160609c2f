//! 批次划分
//!
//! 批次是条目序列上连续、互不重叠的下标区间，按顺序拼接后恰好覆盖全部条目

use std::ops::Range;

use crate::catalog::CatalogEntry;
use crate::translation::config::{BatchMode, TranslationConfig};

/// 批次大小策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPolicy {
    /// 每批最多 N 个条目
    FixedCount(usize),
    /// 每批源文本字符数累计不超过预算
    CharBudget(usize),
}

impl Default for BatchPolicy {
    fn default() -> Self {
        BatchPolicy::FixedCount(crate::translation::config::constants::DEFAULT_BATCH_SIZE)
    }
}

impl From<&TranslationConfig> for BatchPolicy {
    fn from(config: &TranslationConfig) -> Self {
        match config.batch_mode {
            BatchMode::Fixed => BatchPolicy::FixedCount(config.batch_size),
            BatchMode::Chars => BatchPolicy::CharBudget(config.char_budget),
        }
    }
}

/// 一个批次
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub index: usize,
    pub range: Range<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// 空白条目占位但不计字符
fn planned_chars(entry: &CatalogEntry) -> usize {
    if entry.is_translatable() {
        entry.source_text().chars().count()
    } else {
        0
    }
}

/// 批次规划器
#[derive(Debug, Clone, Default)]
pub struct BatchPlanner {
    policy: BatchPolicy,
}

impl BatchPlanner {
    pub fn new(policy: BatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> BatchPolicy {
        self.policy
    }

    pub fn plan(&self, entries: &[CatalogEntry]) -> Vec<Batch> {
        let ranges = match self.policy {
            BatchPolicy::FixedCount(size) => Self::plan_fixed(entries.len(), size.max(1)),
            BatchPolicy::CharBudget(budget) => Self::plan_chars(entries, budget),
        };

        let batches: Vec<Batch> = ranges
            .into_iter()
            .enumerate()
            .map(|(index, range)| Batch { index, range })
            .collect();

        tracing::debug!(
            "批次规划完成: {} 个条目 -> {} 个批次 ({:?})",
            entries.len(),
            batches.len(),
            self.policy
        );
        batches
    }

    fn plan_fixed(len: usize, size: usize) -> Vec<Range<usize>> {
        (0..len)
            .step_by(size)
            .map(|start| start..(start + size).min(len))
            .collect()
    }

    fn plan_chars(entries: &[CatalogEntry], budget: usize) -> Vec<Range<usize>> {
        let mut ranges = Vec::new();
        let mut start = 0;
        let mut chars = 0;

        for (index, entry) in entries.iter().enumerate() {
            let len = planned_chars(entry);

            if index > start && chars + len > budget {
                ranges.push(start..index);
                start = index;
                chars = 0;
            }
            chars += len;
        }

        if start < entries.len() {
            ranges.push(start..entries.len());
        }
        ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries_with_lengths(lengths: &[usize]) -> Vec<CatalogEntry> {
        lengths.iter().map(|&len| CatalogEntry::new("x".repeat(len))).collect()
    }

    fn assert_covers(batches: &[Batch], len: usize) {
        let flattened: Vec<usize> = batches.iter().flat_map(|b| b.range.clone()).collect();
        assert_eq!(flattened, (0..len).collect::<Vec<_>>());
        assert!(batches.iter().all(|b| !b.is_empty()));
        assert!(batches.iter().enumerate().all(|(i, b)| b.index == i));
    }

    #[test]
    fn test_fixed_count_sizes() {
        let entries = entries_with_lengths(&[3; 120]);
        let batches = BatchPlanner::new(BatchPolicy::FixedCount(50)).plan(&entries);

        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![50, 50, 20]);
        assert_covers(&batches, 120);
    }

    #[test]
    fn test_char_budget_closes_batch_before_overflow() {
        let entries = entries_with_lengths(&[4, 4, 2, 5, 1, 9, 3]);
        let batches = BatchPlanner::new(BatchPolicy::CharBudget(10)).plan(&entries);

        let ranges: Vec<Range<usize>> = batches.iter().map(|b| b.range.clone()).collect();
        assert_eq!(ranges, vec![0..3, 3..5, 5..6, 6..7]);
        assert_covers(&batches, entries.len());
    }

    #[test]
    fn test_oversized_entry_forms_its_own_batch() {
        let entries = entries_with_lengths(&[2, 50, 2]);
        let batches = BatchPlanner::new(BatchPolicy::CharBudget(10)).plan(&entries);

        let ranges: Vec<Range<usize>> = batches.iter().map(|b| b.range.clone()).collect();
        assert_eq!(ranges, vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn test_blank_entries_take_a_slot_but_no_budget() {
        let mut entries = entries_with_lengths(&[5, 5]);
        entries.insert(1, CatalogEntry::new("     "));
        let batches = BatchPlanner::new(BatchPolicy::CharBudget(10)).plan(&entries);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].range, 0..3);
    }

    #[test]
    fn test_coverage_for_many_shapes() {
        for len in [0usize, 1, 2, 7, 49, 50, 51, 173] {
            let lengths: Vec<usize> = (0..len).map(|i| (i * 37) % 23).collect();
            let entries = entries_with_lengths(&lengths);

            for policy in [
                BatchPolicy::FixedCount(1),
                BatchPolicy::FixedCount(7),
                BatchPolicy::FixedCount(50),
                BatchPolicy::CharBudget(1),
                BatchPolicy::CharBudget(30),
                BatchPolicy::CharBudget(2000),
            ] {
                assert_covers(&BatchPlanner::new(policy).plan(&entries), len);
            }
        }
    }

    #[test]
    fn test_policy_from_config() {
        let mut config = TranslationConfig::default();
        assert_eq!(BatchPolicy::from(&config), BatchPolicy::FixedCount(50));

        config.batch_mode = BatchMode::Chars;
        assert_eq!(BatchPolicy::from(&config), BatchPolicy::CharBudget(2000));
    }
}
