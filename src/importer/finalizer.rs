// ==========================================
// 车队运营后台 - 落库
// ==========================================
// 顺序: 先删除被覆盖的已落库流水，再一次性批量插入
// 失败: 标记 done + Failed，保留内存状态供复核；不自动重试、不回滚
// 重跑: 批量插入为 INSERT IF ABSENT，删除不存在的 ID 为空操作，人工重跑安全
// ==========================================

use crate::domain::{Completion, FinalizeReport, ImportState, ImportStatus};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::FleetRepository;
use tracing::{error, info};

pub struct Finalizer;

impl Finalizer {
    /// 执行落库
    ///
    /// # 前置条件
    /// - state 处于 done（Pending 或 Failed）
    ///
    /// # 返回
    /// - Ok(FinalizeReport): 删除数 / 插入数，状态置为 Committed
    /// - Err(FinalizeFailed): 状态置为 Failed，其余内存状态不变
    pub async fn finalize(
        state: &mut ImportState,
        store: &dyn FleetRepository,
    ) -> ImportResult<FinalizeReport> {
        match &state.status {
            ImportStatus::Done {
                completion: Completion::Pending | Completion::Failed { .. },
            } => {}
            _ => {
                return Err(ImportError::InvalidTransition {
                    from: state.tag(),
                    event: "finalize".to_string(),
                })
            }
        }

        match Self::write(state, store).await {
            Ok(report) => {
                info!(
                    deleted = report.deleted,
                    inserted = report.inserted,
                    skipped = state.skipped_rows.len(),
                    "导入落库完成"
                );
                state.status = ImportStatus::Done {
                    completion: Completion::Committed(report),
                };
                Ok(report)
            }
            Err(e) => {
                let message = e.to_string();
                error!(error = %message, "导入落库失败");
                state.status = ImportStatus::Done {
                    completion: Completion::Failed {
                        message: message.clone(),
                    },
                };
                Err(ImportError::FinalizeFailed(message))
            }
        }
    }

    async fn write(
        state: &ImportState,
        store: &dyn FleetRepository,
    ) -> ImportResult<FinalizeReport> {
        let mut deleted = 0;
        for id in &state.overridden_ids {
            if store.delete_daily_entry(id).await? {
                deleted += 1;
            }
        }

        let entries = state
            .valid_entries
            .iter()
            .map(|v| v.entry.clone())
            .collect();
        let inserted = store.bulk_insert_daily_entries(entries).await?;

        Ok(FinalizeReport { deleted, inserted })
    }
}
