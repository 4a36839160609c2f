//! 翻译流水线集成测试
//!
//! 测试批次规划、分隔符往返、数量不匹配时的拆分以及进度事件

use std::path::Path;

use catalog_translator::catalog::EntryStatus;
use catalog_translator::translation::{BatchPolicy, Pipeline, PipelineEvent};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{collecting_sink, fixed_pipeline, AssertionHelper, Behavior, FakeFactory, TestDataGenerator};

/// 固定批次覆盖全部条目
#[test]
fn test_fixed_batches_cover_all_entries() {
    let factory = FakeFactory::uppercase();
    let log = factory.log();
    let mut entries = TestDataGenerator::numbered_entries(120);
    let mut events = Vec::new();

    let mut pipeline = Pipeline::new(factory, fixed_pipeline(50));
    let summary = pipeline.run(&mut entries, &mut collecting_sink(&mut events)).unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.requests, 3);
    assert_eq!(summary.processed, 120);
    assert_eq!(summary.translated, 120);
    assert_eq!(summary.failed(), 0);
    assert!(!summary.cancelled);

    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.translated_text(), format!("ENTRY {}", i));
        assert_eq!(entry.status(), EntryStatus::Translated);
    }

    // 每个请求携带一个批次的全部条目
    let requests = log.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[0].starts_with("[0]entry 0"));
    assert!(requests[2].contains("[19]entry 119"));

    // 进度间隔为 0 时每个批次后都有一个进度事件
    let processed: Vec<usize> = events
        .iter()
        .filter_map(|event| match event {
            PipelineEvent::Progress(update) => Some(update.processed),
            _ => None,
        })
        .collect();
    assert_eq!(processed, vec![50, 100, 120]);
    AssertionHelper::assert_progress_monotonic(&events);

    println!("✅ 120 个条目分 3 批全部翻译完成");
}

/// 一个批次失败不影响其他批次
#[test]
fn test_failed_batch_is_recorded_and_run_continues() {
    let factory = FakeFactory::new(Behavior::RejectContaining("entry 7".to_string()));
    let mut entries = TestDataGenerator::numbered_entries(10);
    let mut events = Vec::new();

    let mut pipeline = Pipeline::new(factory, fixed_pipeline(5));
    let summary = pipeline
        .execute(&mut entries, Path::new("/tmp/out_zh.po"), &mut collecting_sink(&mut events))
        .unwrap();

    assert_eq!(summary.processed, 10);
    assert_eq!(summary.translated, 5);
    assert_eq!(summary.ledger.iter().collect::<Vec<_>>(), vec![5, 6, 7, 8, 9]);

    for entry in &entries[..5] {
        assert_eq!(entry.status(), EntryStatus::Translated);
    }
    for entry in &entries[5..] {
        assert_eq!(entry.status(), EntryStatus::Failed);
        assert_eq!(entry.translated_text(), "");
    }

    AssertionHelper::assert_single_terminal(&events);
    match events.last() {
        Some(PipelineEvent::Completion(report)) => {
            assert_eq!(report.failed_entries, 5);
            assert_eq!(report.total_processed, 10);
            assert_eq!(report.output_filename, "out_zh.po");
            assert_eq!(report.warning.as_deref(), Some("有 5 个条目翻译失败"));
        }
        other => panic!("expected completion, got {:?}", other),
    }

    println!("✅ 失败批次被记录，运行继续");
}

/// 数量不匹配时拆分直到单条，请求数有上界
#[test]
fn test_count_mismatch_bisects_down_to_single_entries() {
    let factory = FakeFactory::new(Behavior::DropLastSegment);
    let log = factory.log();
    let mut entries = TestDataGenerator::numbered_entries(8);
    let mut events = Vec::new();

    let mut pipeline = Pipeline::new(factory, fixed_pipeline(8));
    let summary = pipeline.run(&mut entries, &mut collecting_sink(&mut events)).unwrap();

    assert_eq!(summary.translated, 8);
    assert_eq!(summary.failed(), 0);
    assert_eq!(summary.bisections, 7);
    assert!(log.calls() <= 2 * 8 - 1, "请求数超过上界: {}", log.calls());

    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.translated_text(), format!("ENTRY {}", i));
    }

    // 单条请求不带位置标记
    let requests = log.requests();
    assert!(requests.iter().any(|request| request == "entry 0"));
    assert!(requests.iter().all(|request| request != "[0]entry 0"));

    println!("✅ 数量不匹配拆分 {} 次，共 {} 次请求", summary.bisections, log.calls());
}

/// 字符预算划分批次
#[test]
fn test_char_budget_policy() {
    let factory = FakeFactory::uppercase();
    let mut entries = TestDataGenerator::numbered_entries(10);
    let mut events = Vec::new();

    let mut config = fixed_pipeline(50);
    // 每个条目 7 个字符，两个一批
    config.policy = BatchPolicy::CharBudget(20);

    let mut pipeline = Pipeline::new(factory, config);
    let summary = pipeline.run(&mut entries, &mut collecting_sink(&mut events)).unwrap();

    assert_eq!(summary.batches, 5);
    assert_eq!(summary.translated, 10);

    println!("✅ 字符预算划分为 {} 个批次", summary.batches);
}

/// 空白条目计入进度但不发送
#[test]
fn test_blank_entries_are_skipped_not_sent() {
    let factory = FakeFactory::uppercase();
    let log = factory.log();
    let mut entries = TestDataGenerator::entries(&["Hello", "", "  ", "World"]);
    let mut events = Vec::new();

    let mut pipeline = Pipeline::new(factory, fixed_pipeline(10));
    let summary = pipeline.run(&mut entries, &mut collecting_sink(&mut events)).unwrap();

    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.translated, 2);
    assert_eq!(summary.processed, 4);
    assert_eq!(entries[1].status(), EntryStatus::Pending);
    assert_eq!(entries[3].translated_text(), "WORLD");

    let requests = log.requests();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].contains("[1]"));
    assert!(requests[0].contains("[3]World"));

    println!("✅ 空白条目被跳过");
}

/// 进度预览包含前文条目
#[test]
fn test_progress_preview_window() {
    let factory = FakeFactory::uppercase();
    let mut entries = TestDataGenerator::numbered_entries(10);
    let mut events = Vec::new();

    let mut pipeline = Pipeline::new(factory, fixed_pipeline(5));
    pipeline.run(&mut entries, &mut collecting_sink(&mut events)).unwrap();

    let previews: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            PipelineEvent::Progress(update) => Some(update.preview.clone()),
            _ => None,
        })
        .collect();

    assert_eq!(previews.len(), 2);
    assert_eq!(previews[0].len(), 5);
    assert_eq!(previews[1].len(), 10);
    assert_eq!(previews[1][0].msgid, "entry 0");
    assert_eq!(previews[1][9].msgstr, "ENTRY 9");

    println!("✅ 进度预览窗口正确");
}
