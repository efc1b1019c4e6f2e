// ==========================================
// 日报导入流程集成测试
// ==========================================
// 覆盖: 表头定位 → 行抽取 → 逐行校验（挂起/处理）→ 落库
// 仓储: InMemoryFleetRepository
// ==========================================

use chrono::NaiveDate;
use fleet_import::config::ImportSettings;
use fleet_import::domain::{
    Completion, ConflictDetail, ConflictKind, ImportStatus, StatusTag, DAILY_ENTRY_COLUMNS,
};
use fleet_import::domain::RawGrid;
use fleet_import::importer::{
    parse_date_text, CsvDecoder, HeaderLocator, ImportError, ImportResult, ImportSession,
    Resolution, RunOutcome, SheetDecoder, StepOutcome,
};
use fleet_import::repository::{FleetRepository, InMemoryFleetRepository};
use std::sync::Arc;

use test_helpers::{
    active_driver, data_row, grid_with, header_row, persisted_entry, terminated_driver, text_row,
    ymd,
};

fn store_with_drivers(names: &[&str]) -> Arc<InMemoryFleetRepository> {
    Arc::new(InMemoryFleetRepository::with_data(
        names.iter().map(|n| active_driver(n)).collect(),
        Vec::new(),
    ))
}

fn session_for(store: &Arc<InMemoryFleetRepository>) -> ImportSession {
    ImportSession::new(store.clone(), ImportSettings::default())
}

fn conflict_detail(session: &ImportSession) -> ConflictDetail {
    session
        .state()
        .conflict()
        .expect("应处于挂起状态")
        .detail
        .clone()
}

// ==========================================
// 基本场景
// ==========================================

#[tokio::test]
async fn test_header_after_title_rows_and_dmy_date() {
    let store = store_with_drivers(&["John"]);
    let mut session = session_for(&store);

    let outcome = session
        .begin(grid_with(vec![data_row("31/01/2024", "John", "Day")]))
        .await
        .unwrap();
    assert_eq!(outcome, StepOutcome::Started { rows: 1 });

    let row = &session.state().queue[0];
    assert_eq!(row.line_number, 4);
    assert_eq!(row.date, ymd(2024, 1, 31));
    assert_eq!(row.fields.date, "2024-01-31");

    let outcome = session.run().await.unwrap();
    assert!(matches!(outcome, RunOutcome::Committed(r) if r.inserted == 1 && r.deleted == 0));

    let entries = store.list_daily_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].date, ymd(2024, 1, 31));
    assert_eq!(entries[0].day, "Wednesday");
    assert_eq!(entries[0].rent, 900.0);
    assert_eq!(entries[0].notes.as_deref(), Some("Imported"));
}

#[tokio::test]
async fn test_batch_duplicate_override_displaces_earlier_row() {
    let store = store_with_drivers(&["John"]);
    let mut session = session_for(&store);

    session
        .begin(grid_with(vec![
            data_row("31/01/2024", "John", "Day"),
            data_row("31/01/2024", "John", "Day"),
        ]))
        .await
        .unwrap();

    let outcome = session.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Suspended(ConflictKind::DuplicateEntry));
    match conflict_detail(&session) {
        ConflictDetail::DuplicateEntry {
            is_batch_duplicate, ..
        } => assert!(is_batch_duplicate),
        other => panic!("unexpected conflict: {:?}", other),
    }

    assert_eq!(
        session.resolve(Resolution::Override).await.unwrap(),
        StepOutcome::Resumed
    );
    let outcome = session.run().await.unwrap();
    assert!(matches!(outcome, RunOutcome::Committed(r) if r.inserted == 1));

    let state = session.state();
    assert_eq!(state.valid_entries.len(), 1);
    assert_eq!(state.valid_entries[0].row.line_number, 5);
    assert_eq!(state.skipped_rows.len(), 1);
    assert_eq!(state.skipped_rows[0].line_number, 4);
    assert_eq!(state.skipped_rows[0].reason, "Replaced by override at line 5");
    assert_eq!(store.list_daily_entries().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_driver_register_and_retry() {
    let store = store_with_drivers(&["John"]);
    let mut session = session_for(&store);

    session
        .begin(grid_with(vec![data_row("31/01/2024", "Unknown Guy", "Day")]))
        .await
        .unwrap();

    let outcome = session.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Suspended(ConflictKind::MissingDriver));
    assert_eq!(
        conflict_detail(&session),
        ConflictDetail::MissingDriver {
            driver_name: "Unknown Guy".to_string()
        }
    );

    session
        .resolve(Resolution::RegisterDriver {
            name: "Unknown Guy".to_string(),
            mobile: "9000000001".to_string(),
        })
        .await
        .unwrap();
    // 同一行被重新校验并接收
    assert_eq!(session.state().cursor, 0);

    let outcome = session.run().await.unwrap();
    assert!(matches!(outcome, RunOutcome::Committed(r) if r.inserted == 1));

    let drivers = store.list_drivers().await.unwrap();
    assert!(drivers.iter().any(|d| d.name == "Unknown Guy" && d.is_active()));
    assert_eq!(
        store.list_daily_entries().await.unwrap()[0].driver,
        "Unknown Guy"
    );
}

#[tokio::test]
async fn test_incomplete_row_skip_records_reason() {
    let store = store_with_drivers(&["John"]);
    let mut session = session_for(&store);

    session
        .begin(grid_with(vec![
            data_row("31/01/2024", "John", ""),
            data_row("01/02/2024", "John", "Day"),
        ]))
        .await
        .unwrap();

    let outcome = session.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Suspended(ConflictKind::IncompleteRow));
    assert_eq!(
        conflict_detail(&session),
        ConflictDetail::IncompleteRow {
            missing_fields: vec!["Shift".to_string()]
        }
    );

    let before = session.state().cursor;
    session.resolve(Resolution::Skip).await.unwrap();
    assert_eq!(session.state().cursor, before + 1);
    assert_eq!(
        session.state().skipped_rows[0].reason,
        "Missing mandatory fields: Shift"
    );

    let outcome = session.run().await.unwrap();
    assert!(matches!(outcome, RunOutcome::Committed(r) if r.inserted == 1));
}

#[tokio::test]
async fn test_weekday_only_row_is_garbage() {
    let store = store_with_drivers(&["John"]);
    let mut session = session_for(&store);

    session
        .begin(grid_with(vec![
            data_row("30/01/2024", "John", "Day"),
            text_row(&["", "Tuesday"]),
            data_row("31/01/2024", "John", "Night"),
        ]))
        .await
        .unwrap();

    let state = session.state();
    assert_eq!(state.queue.len(), 2);
    assert!(state.skipped_rows.is_empty());
    assert_eq!(state.queue[1].line_number, 6);
}

#[tokio::test]
async fn test_section_marker_stops_extraction() {
    let store = store_with_drivers(&["John"]);
    let mut session = session_for(&store);

    session
        .begin(grid_with(vec![
            data_row("30/01/2024", "John", "Day"),
            text_row(&["Driver Summary"]),
            data_row("31/01/2024", "John", "Day"),
        ]))
        .await
        .unwrap();

    assert_eq!(session.state().queue.len(), 1);
}

// ==========================================
// 与已落库流水的冲突
// ==========================================

#[tokio::test]
async fn test_persisted_duplicate_override_deletes_then_inserts() {
    let store = Arc::new(InMemoryFleetRepository::with_data(
        vec![active_driver("John")],
        vec![persisted_entry("E-1", ymd(2024, 1, 31), "john", "Day")],
    ));
    let mut session = session_for(&store);

    session
        .begin(grid_with(vec![data_row("31/01/2024", "John", "Day")]))
        .await
        .unwrap();

    let outcome = session.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Suspended(ConflictKind::DuplicateEntry));
    match conflict_detail(&session) {
        ConflictDetail::DuplicateEntry {
            existing,
            is_batch_duplicate,
            ..
        } => {
            assert!(!is_batch_duplicate);
            assert_eq!(existing.id, "E-1");
        }
        other => panic!("unexpected conflict: {:?}", other),
    }

    session.resolve(Resolution::Override).await.unwrap();
    assert!(session.state().overridden_ids.contains("E-1"));

    let outcome = session.run().await.unwrap();
    assert!(matches!(outcome, RunOutcome::Committed(r) if r.deleted == 1 && r.inserted == 1));

    let entries = store.list_daily_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_ne!(entries[0].id, "E-1");
    assert_eq!(entries[0].rent, 900.0);
}

#[tokio::test]
async fn test_duplicate_ignores_shift() {
    // 重复判定只看 (日期, 司机)；同日不同班次同样视为重复
    let store = store_with_drivers(&["John"]);
    let mut session = session_for(&store);

    session
        .begin(grid_with(vec![
            data_row("31/01/2024", "John", "Day"),
            data_row("31/01/2024", "john", "Night"),
        ]))
        .await
        .unwrap();

    let outcome = session.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Suspended(ConflictKind::DuplicateEntry));
}

#[tokio::test]
async fn test_terminated_driver_is_missing() {
    let store = Arc::new(InMemoryFleetRepository::with_data(
        vec![terminated_driver("Ravi")],
        Vec::new(),
    ));
    let mut session = session_for(&store);

    session
        .begin(grid_with(vec![data_row("31/01/2024", "Ravi", "Day")]))
        .await
        .unwrap();

    let outcome = session.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Suspended(ConflictKind::MissingDriver));
}

// ==========================================
// 操作员决定的边界
// ==========================================

#[tokio::test]
async fn test_rejected_resolution_keeps_conflict() {
    let store = store_with_drivers(&["John"]);
    let mut session = session_for(&store);

    session
        .begin(grid_with(vec![data_row("31/01/2024", "Ghost", "Day")]))
        .await
        .unwrap();
    session.run().await.unwrap();
    let before = session.state().clone();

    // 覆盖只适用于重复流水
    let err = session.resolve(Resolution::Override).await.unwrap_err();
    assert!(matches!(
        err,
        ImportError::ResolutionNotAllowed {
            kind: ConflictKind::MissingDriver,
            ..
        }
    ));
    assert_eq!(session.state(), &before);

    // 与在职司机重名
    let err = session
        .resolve(Resolution::RegisterDriver {
            name: "JOHN".to_string(),
            mobile: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::DriverAlreadyExists(_)));
    assert_eq!(session.state(), &before);
    assert_eq!(store.list_drivers().await.unwrap().len(), 1);

    // 空姓名回退到表格中的姓名
    session
        .resolve(Resolution::RegisterDriver {
            name: "  ".to_string(),
            mobile: String::new(),
        })
        .await
        .unwrap();
    assert!(session.run().await.is_ok());
    assert!(store
        .list_drivers()
        .await
        .unwrap()
        .iter()
        .any(|d| d.name == "Ghost"));
}

#[tokio::test]
async fn test_terminate_discards_everything() {
    let store = store_with_drivers(&["John"]);
    let mut session = session_for(&store);

    session
        .begin(grid_with(vec![
            data_row("30/01/2024", "John", "Day"),
            data_row("31/01/2024", "Ghost", "Day"),
        ]))
        .await
        .unwrap();
    session.run().await.unwrap();
    assert_eq!(session.state().valid_entries.len(), 1);

    assert_eq!(
        session.resolve(Resolution::Terminate).await.unwrap(),
        StepOutcome::Discarded
    );
    let state = session.state();
    assert_eq!(state.tag(), StatusTag::Idle);
    assert_eq!(state.cursor, 0);
    assert!(state.queue.is_empty());
    assert!(state.valid_entries.is_empty());
    assert!(store.list_daily_entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_events_outside_their_state_are_rejected() {
    let store = store_with_drivers(&["John"]);
    let mut session = session_for(&store);

    let err = session.resolve(Resolution::Skip).await.unwrap_err();
    assert!(matches!(
        err,
        ImportError::InvalidTransition {
            from: StatusTag::Idle,
            ..
        }
    ));
    assert!(session.run().await.is_err());
    assert!(session.retry_finalize().await.is_err());

    session
        .begin(grid_with(vec![data_row("31/01/2024", "John", "Day")]))
        .await
        .unwrap();
    session.run().await.unwrap();

    // 完成后不能再次开始，需要先 reset
    let err = session
        .begin(grid_with(vec![data_row("01/02/2024", "John", "Day")]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ImportError::InvalidTransition {
            from: StatusTag::Done,
            ..
        }
    ));
    assert_eq!(session.reset().unwrap(), StepOutcome::Reset);
    assert_eq!(session.state().tag(), StatusTag::Idle);
}

// ==========================================
// 硬停止
// ==========================================

#[tokio::test]
async fn test_header_not_found() {
    let store = store_with_drivers(&["John"]);
    let mut session = session_for(&store);

    let grid = vec![
        text_row(&["Fleet Daily Report"]),
        text_row(&["Date", "Notes"]),
        text_row(&["31/01/2024", "ok"]),
    ];
    let err = session.begin(grid).await.unwrap_err();
    match err {
        ImportError::HeaderNotFound {
            best_matches,
            required,
        } => {
            assert_eq!(best_matches, 1);
            assert_eq!(required, 3);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(session.state().tag(), StatusTag::Idle);
}

#[tokio::test]
async fn test_no_valid_rows_publishes_skipped() {
    let store = store_with_drivers(&["John"]);
    let mut session = session_for(&store);

    let err = session
        .begin(grid_with(vec![
            data_row("not a date", "John", "Day"),
            data_row("31/13/2024", "John", "Day"),
        ]))
        .await
        .unwrap_err();
    match err {
        ImportError::NoValidRows { skipped } => assert_eq!(skipped.len(), 2),
        other => panic!("unexpected error: {:?}", other),
    }

    let state = session.state();
    assert_eq!(state.tag(), StatusTag::Idle);
    assert_eq!(state.skipped_rows.len(), 2);
    assert!(state
        .skipped_rows
        .iter()
        .all(|s| s.reason == "Invalid or missing date"));
}

// ==========================================
// 落库失败与重试
// ==========================================

#[tokio::test]
async fn test_finalize_failure_then_manual_retry() {
    let store = store_with_drivers(&["John"]);
    let mut session = session_for(&store);

    session
        .begin(grid_with(vec![
            data_row("30/01/2024", "John", "Day"),
            data_row("31/01/2024", "John", "Day"),
        ]))
        .await
        .unwrap();

    store.set_fail_writes(true);
    let err = session.run().await.unwrap_err();
    assert!(matches!(err, ImportError::FinalizeFailed(_)));
    assert!(matches!(
        session.state().status,
        ImportStatus::Done {
            completion: Completion::Failed { .. }
        }
    ));
    // 内存状态保留
    assert_eq!(session.state().valid_entries.len(), 2);

    store.set_fail_writes(false);
    let report = session.retry_finalize().await.unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(store.list_daily_entries().await.unwrap().len(), 2);

    // 已提交后不允许再次重试
    assert!(session.retry_finalize().await.is_err());
}

// ==========================================
// 不变量
// ==========================================

#[tokio::test]
async fn test_each_processed_row_lands_in_exactly_one_bucket() {
    let store = Arc::new(InMemoryFleetRepository::with_data(
        vec![active_driver("John"), active_driver("Ravi")],
        vec![persisted_entry("E-9", ymd(2024, 2, 2), "Ravi", "Day")],
    ));
    let mut session = session_for(&store);

    session
        .begin(grid_with(vec![
            data_row("01/02/2024", "John", "Day"),
            data_row("01/02/2024", "John", "Night"),
            data_row("02/02/2024", "Ravi", "Day"),
            data_row("02/02/2024", "Ghost", "Day"),
            data_row("03/02/2024", "Ravi", ""),
            data_row("bad", "Ravi", "Day"),
            data_row("04/02/2024", "Ravi", "Day"),
        ]))
        .await
        .unwrap();

    let mut decisions = vec![
        Resolution::Skip,     // 本批次重复
        Resolution::Override, // 已落库重复
        Resolution::RegisterDriver {
            name: String::new(),
            mobile: String::new(),
        },
        Resolution::Skip, // 缺少班次
    ]
    .into_iter();

    loop {
        match session.run().await.unwrap() {
            RunOutcome::Suspended(_) => {
                let decision = decisions.next().expect("冲突数量超出预期");
                session.resolve(decision).await.unwrap();
            }
            RunOutcome::Committed(report) => {
                assert_eq!(report.inserted, 4);
                assert_eq!(report.deleted, 1);
                break;
            }
        }
    }

    let state = session.state();
    for row in &state.queue {
        let accepted = state.is_accepted(row.line_number);
        let skipped = state.is_skipped(row.line_number);
        assert!(accepted ^ skipped, "行 {} 必须恰好在一个桶中", row.line_number);
    }
    // 日期无法解析的行在抽取阶段跳过
    assert!(state.is_skipped(9));

    // 输出中不存在重复的 (日期, 司机)
    let mut slots: Vec<(NaiveDate, String)> = state
        .valid_entries
        .iter()
        .map(|v| (v.entry.date, v.entry.driver.to_lowercase()))
        .collect();
    let total = slots.len();
    slots.sort();
    slots.dedup();
    assert_eq!(slots.len(), total);
}

#[test]
fn test_header_detection_is_deterministic() {
    let locator = HeaderLocator::new(&ImportSettings::default());
    let grid = vec![
        text_row(&["Report"]),
        header_row(),
        header_row(),
        data_row("31/01/2024", "John", "Day"),
    ];

    let first = locator.locate(&grid, DAILY_ENTRY_COLUMNS).unwrap();
    let second = locator.locate(&grid, DAILY_ENTRY_COLUMNS).unwrap();
    assert_eq!(first, second);
    // 并列时取最靠前的行
    assert_eq!(first.row_index, 1);
}

#[test]
fn test_date_parsing_is_idempotent() {
    for raw in ["31/01/2024", "2024-01-31", "45322", "31-Jan-2024", "20240131"] {
        let parsed = parse_date_text(raw).unwrap();
        let iso = parsed.format("%Y-%m-%d").to_string();
        assert_eq!(parse_date_text(&iso), Some(parsed), "raw={}", raw);
        assert_eq!(parsed, ymd(2024, 1, 31), "raw={}", raw);
    }
}

// ==========================================
// 解码器替换
// ==========================================

/// 固定返回预置网格的解码器
struct FixedGridDecoder(RawGrid);

impl SheetDecoder for FixedGridDecoder {
    fn decode(&self, _bytes: &[u8]) -> ImportResult<RawGrid> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn test_custom_decoder_replaces_default() {
    fleet_import::logging::init_test();
    let store = store_with_drivers(&["John"]);
    let mut session = session_for(&store).with_decoder(Box::new(FixedGridDecoder(grid_with(
        vec![data_row("31/01/2024", "John", "Day")],
    ))));

    // 字节内容被忽略，网格来自解码器
    let outcome = session.begin_from_bytes(b"ignored").await.unwrap();
    assert_eq!(outcome, StepOutcome::Started { rows: 1 });

    let outcome = session.run().await.unwrap();
    assert!(matches!(outcome, RunOutcome::Committed(r) if r.inserted == 1));
}

#[tokio::test]
async fn test_latin1_driver_name_suspends_instead_of_failing_file() {
    fleet_import::logging::init_test();
    let store = store_with_drivers(&["John"]);
    let mut session = session_for(&store).with_decoder(Box::new(CsvDecoder));

    let bytes = b"Date,Driver,Shift,QR CODE,Rent\n\
31/01/2024,Jos\xE9,Day,Q1,900\n\
01/02/2024,John,Day,Q1,900\n";
    let outcome = session.begin_from_bytes(bytes).await.unwrap();
    assert_eq!(outcome, StepOutcome::Started { rows: 2 });

    let outcome = session.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Suspended(ConflictKind::MissingDriver));
    match conflict_detail(&session) {
        ConflictDetail::MissingDriver { driver_name } => {
            assert_eq!(driver_name, "Jos\u{FFFD}");
        }
        other => panic!("unexpected conflict: {:?}", other),
    }

    session.resolve(Resolution::Skip).await.unwrap();
    let outcome = session.run().await.unwrap();
    assert!(matches!(outcome, RunOutcome::Committed(r) if r.inserted == 1));
    assert_eq!(store.list_daily_entries().await.unwrap().len(), 1);
}
