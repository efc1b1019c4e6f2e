// ==========================================
// 车队运营后台 - 逐行校验流水线（状态机）
// ==========================================
// 状态: idle → running → (suspended ⇄ running)* → done
// 校验顺序（首个失败即挂起，不累计）:
//   1. 完整性  2. 司机存在且在职  3. 重复（已落库 / 本批次）
// 红线: step 不做任何 I/O；先校验事件合法性，再修改状态
// ==========================================

use crate::domain::{
    CanonicalRow, ColumnSpec, Completion, Conflict, ConflictDetail, ConflictKind, DailyEntry,
    ImportState, ImportStatus, SkippedRow, ValidEntry, ValidationStage, DAILY_ENTRY_COLUMNS,
};
use crate::importer::cell_normalizer::{parse_flexible_number, weekday_name};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::snapshot::ValidationSnapshot;
use tracing::{debug, info};
use uuid::Uuid;

/// 接收行的备注
pub const IMPORTED_NOTE: &str = "Imported";
/// 重复冲突被跳过时的原因
pub const REASON_DUPLICATE_SKIPPED: &str = "Duplicate entry skipped by user";

// ==========================================
// PipelineEvent - 状态机输入
// ==========================================
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// 载入抽取结果并开始（仅 idle）
    Start {
        queue: Vec<CanonicalRow>,
        skipped: Vec<SkippedRow>,
    },
    /// 处理游标所在行（仅 running）
    Tick,
    /// 跳过当前冲突行（仅 suspended）
    Skip,
    /// 覆盖重复流水并就地重新校验（仅 duplicate-entry）
    Override,
    /// 事实已变化（新登记司机），当前行从第 1 步重新校验（仅 missing-driver）
    Revalidate,
    /// 放弃整批（running / suspended）
    Terminate,
    /// 回到 idle（done / idle）
    Reset,
}

impl PipelineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::Start { .. } => "start",
            PipelineEvent::Tick => "tick",
            PipelineEvent::Skip => "skip",
            PipelineEvent::Override => "override",
            PipelineEvent::Revalidate => "revalidate",
            PipelineEvent::Terminate => "terminate",
            PipelineEvent::Reset => "reset",
        }
    }
}

/// 单步结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Started { rows: usize },
    Accepted { line_number: usize },
    Suspended(ConflictKind),
    Resumed,
    /// 队列耗尽，进入 done（待落库）
    Completed,
    /// 整批放弃，回到 idle
    Discarded,
    Reset,
}

// ==========================================
// ValidationPipeline
// ==========================================
pub struct ValidationPipeline {
    columns: &'static [ColumnSpec],
}

impl Default for ValidationPipeline {
    fn default() -> Self {
        Self::new(DAILY_ENTRY_COLUMNS)
    }
}

impl ValidationPipeline {
    pub fn new(columns: &'static [ColumnSpec]) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &'static [ColumnSpec] {
        self.columns
    }

    /// 状态转换
    ///
    /// # 参数
    /// - state: 唯一可变状态
    /// - snapshot: 司机 / 已落库流水的一致视图
    /// - event: 输入事件
    ///
    /// # 返回
    /// - Ok(StepOutcome): 转换完成
    /// - Err(InvalidTransition / ResolutionNotAllowed): 状态未被修改
    /// - Err(NoValidRows): 队列为空，状态保持 idle 并公布被跳过的行
    pub fn step(
        &self,
        state: &mut ImportState,
        snapshot: &ValidationSnapshot,
        event: PipelineEvent,
    ) -> ImportResult<StepOutcome> {
        let from = state.tag();
        let invalid = |event: &PipelineEvent| ImportError::InvalidTransition {
            from,
            event: event.name().to_string(),
        };

        match (&state.status, event) {
            (ImportStatus::Idle, PipelineEvent::Start { queue, skipped }) => {
                if queue.is_empty() {
                    *state = ImportState {
                        skipped_rows: skipped.clone(),
                        ..ImportState::default()
                    };
                    return Err(ImportError::NoValidRows { skipped });
                }
                let rows = queue.len();
                *state = ImportState {
                    queue,
                    skipped_rows: skipped,
                    status: ImportStatus::Running,
                    ..ImportState::default()
                };
                info!(rows, skipped = state.skipped_rows.len(), "校验流水线启动");
                Ok(StepOutcome::Started { rows })
            }

            (ImportStatus::Running, PipelineEvent::Tick) => Ok(self.tick(state, snapshot)),

            (ImportStatus::Suspended { conflict }, PipelineEvent::Skip) => {
                let skipped = SkippedRow::from_row(&conflict.row, skip_reason(&conflict.detail));
                debug!(line = skipped.line_number, reason = %skipped.reason, "冲突行跳过");
                state.skipped_rows.push(skipped);
                state.cursor += 1;
                resume(state, ValidationStage::Completeness);
                Ok(StepOutcome::Resumed)
            }

            (ImportStatus::Suspended { conflict }, PipelineEvent::Override) => {
                let ConflictDetail::DuplicateEntry {
                    existing,
                    is_batch_duplicate,
                    ..
                } = &conflict.detail
                else {
                    return Err(ImportError::ResolutionNotAllowed {
                        kind: conflict.kind(),
                        action: "override".to_string(),
                    });
                };
                let existing_id = existing.id.clone();
                let is_batch = *is_batch_duplicate;
                let line_number = conflict.row.line_number;

                if is_batch {
                    if let Some(pos) = state
                        .valid_entries
                        .iter()
                        .position(|v| v.entry.id == existing_id)
                    {
                        let displaced = state.valid_entries.remove(pos);
                        state.skipped_rows.push(SkippedRow::from_row(
                            &displaced.row,
                            format!("Replaced by override at line {}", line_number),
                        ));
                    }
                } else {
                    state.overridden_ids.insert(existing_id.clone());
                }
                debug!(line = line_number, existing = %existing_id, is_batch, "重复流水覆盖");

                resume(state, ValidationStage::EntityExistence);
                Ok(StepOutcome::Resumed)
            }

            (ImportStatus::Suspended { conflict }, PipelineEvent::Revalidate) => {
                if conflict.kind() != ConflictKind::MissingDriver {
                    return Err(ImportError::ResolutionNotAllowed {
                        kind: conflict.kind(),
                        action: "register".to_string(),
                    });
                }
                resume(state, ValidationStage::Completeness);
                Ok(StepOutcome::Resumed)
            }

            (ImportStatus::Running | ImportStatus::Suspended { .. }, PipelineEvent::Terminate) => {
                info!(
                    cursor = state.cursor,
                    accepted = state.valid_entries.len(),
                    "导入已放弃，丢弃全部进度"
                );
                *state = ImportState::default();
                Ok(StepOutcome::Discarded)
            }

            (ImportStatus::Idle | ImportStatus::Done { .. }, PipelineEvent::Reset) => {
                *state = ImportState::default();
                Ok(StepOutcome::Reset)
            }

            (_, event) => Err(invalid(&event)),
        }
    }

    fn tick(&self, state: &mut ImportState, snapshot: &ValidationSnapshot) -> StepOutcome {
        let Some(row) = state.current_row().cloned() else {
            state.status = ImportStatus::Done {
                completion: Completion::Pending,
            };
            info!(
                accepted = state.valid_entries.len(),
                skipped = state.skipped_rows.len(),
                overridden = state.overridden_ids.len(),
                "队列处理完毕"
            );
            return StepOutcome::Completed;
        };

        match self.check_row(state, snapshot, &row) {
            Ok(entry) => {
                let line_number = row.line_number;
                state.valid_entries.push(ValidEntry { row, entry });
                state.cursor += 1;
                state.recheck_from = ValidationStage::Completeness;
                StepOutcome::Accepted { line_number }
            }
            Err(detail) => {
                let conflict = Conflict {
                    position: state.cursor,
                    row,
                    detail,
                };
                let kind = conflict.kind();
                debug!(line = conflict.row.line_number, cursor = state.cursor, conflict = %kind, "流水线挂起");
                state.status = ImportStatus::Suspended { conflict };
                StepOutcome::Suspended(kind)
            }
        }
    }

    /// 从 state.recheck_from 开始逐项校验
    ///
    /// # 返回
    /// - Ok(DailyEntry): 全部通过，生成的新记录
    /// - Err(ConflictDetail): 首个失败项
    fn check_row(
        &self,
        state: &ImportState,
        snapshot: &ValidationSnapshot,
        row: &CanonicalRow,
    ) -> Result<DailyEntry, ConflictDetail> {
        if state.recheck_from <= ValidationStage::Completeness {
            let missing_fields = self.missing_required(row);
            if !missing_fields.is_empty() {
                return Err(ConflictDetail::IncompleteRow { missing_fields });
            }
        }

        if state.recheck_from <= ValidationStage::EntityExistence
            && !snapshot.has_active_driver(row.driver())
        {
            return Err(ConflictDetail::MissingDriver {
                driver_name: row.driver().to_string(),
            });
        }

        let incoming = build_entry(row);

        if let Some(existing) =
            snapshot.find_persisted_duplicate(row.date, row.driver(), &state.overridden_ids)
        {
            return Err(ConflictDetail::DuplicateEntry {
                existing: existing.clone(),
                incoming,
                is_batch_duplicate: false,
            });
        }

        if let Some(earlier) = state
            .valid_entries
            .iter()
            .find(|v| v.entry.same_slot(row.date, row.driver()))
        {
            return Err(ConflictDetail::DuplicateEntry {
                existing: earlier.entry.clone(),
                incoming,
                is_batch_duplicate: true,
            });
        }

        Ok(incoming)
    }

    fn missing_required(&self, row: &CanonicalRow) -> Vec<String> {
        self.columns
            .iter()
            .filter(|spec| spec.required && row.fields.get(spec.field).trim().is_empty())
            .map(|spec| spec.label.to_string())
            .collect()
    }
}

fn resume(state: &mut ImportState, recheck_from: ValidationStage) {
    state.status = ImportStatus::Running;
    state.recheck_from = recheck_from;
}

/// 规范行 → 待落库记录（新 UUID，金额容错转换，星期缺省时由日期推导）
fn build_entry(row: &CanonicalRow) -> DailyEntry {
    let f = &row.fields;
    let day = if f.day.trim().is_empty() {
        weekday_name(row.date)
    } else {
        f.day.clone()
    };

    DailyEntry {
        id: Uuid::new_v4().to_string(),
        date: row.date,
        day,
        vehicle: f.vehicle.clone(),
        driver: f.driver.clone(),
        shift: f.shift.clone(),
        qr_code: f.qr_code.clone(),
        rent: parse_flexible_number(&f.rent),
        collection: parse_flexible_number(&f.collection),
        fuel: parse_flexible_number(&f.fuel),
        due: parse_flexible_number(&f.due),
        payout: parse_flexible_number(&f.payout),
        notes: Some(IMPORTED_NOTE.to_string()),
    }
}

/// 跳过原因（面向操作员）
pub fn skip_reason(detail: &ConflictDetail) -> String {
    match detail {
        ConflictDetail::IncompleteRow { missing_fields } => {
            format!("Missing mandatory fields: {}", missing_fields.join(", "))
        }
        ConflictDetail::MissingDriver { driver_name } => {
            format!("Driver not found: {}", driver_name)
        }
        ConflictDetail::DuplicateEntry { .. } => REASON_DUPLICATE_SKIPPED.to_string(),
    }
}
