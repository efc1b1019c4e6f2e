// ==========================================
// 车队运营后台 - 冲突处理器
// ==========================================
// 职责: 把操作员的决定转换为流水线事件
// - skip / override / terminate: 直接映射
// - register-driver: 先经持久化层登记司机，刷新快照，再就地重新校验
// 红线: 登记失败时流水线保持挂起，等待下一个决定
// ==========================================

use crate::domain::{ConflictDetail, ImportState, NewDriver};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::pipeline::{PipelineEvent, StepOutcome, ValidationPipeline};
use crate::importer::snapshot::ValidationSnapshot;
use crate::repository::{FleetRepository, RepositoryError};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// 操作员对当前冲突的决定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Resolution {
    Skip,
    /// 登记司机后重新校验当前行；name 为空时使用表格中的姓名
    RegisterDriver {
        #[serde(default)]
        name: String,
        #[serde(default)]
        mobile: String,
    },
    Override,
    Terminate,
}

impl Resolution {
    pub fn name(&self) -> &'static str {
        match self {
            Resolution::Skip => "skip",
            Resolution::RegisterDriver { .. } => "register-driver",
            Resolution::Override => "override",
            Resolution::Terminate => "terminate",
        }
    }
}

pub struct ConflictResolver;

impl ConflictResolver {
    /// 应用决定
    ///
    /// # 参数
    /// - pipeline: 校验流水线
    /// - state: 导入状态（必须处于 suspended，terminate 另允许 running）
    /// - snapshot: 校验快照（登记成功后追加新司机）
    /// - store: 持久化协作方
    /// - resolution: 操作员决定
    pub async fn resolve(
        pipeline: &ValidationPipeline,
        state: &mut ImportState,
        snapshot: &mut ValidationSnapshot,
        store: &dyn FleetRepository,
        resolution: Resolution,
    ) -> ImportResult<StepOutcome> {
        let event = match resolution {
            Resolution::Skip => PipelineEvent::Skip,
            Resolution::Override => PipelineEvent::Override,
            Resolution::Terminate => PipelineEvent::Terminate,
            Resolution::RegisterDriver { name, mobile } => {
                Self::register_driver(state, snapshot, store, &name, &mobile).await?;
                PipelineEvent::Revalidate
            }
        };

        pipeline.step(state, snapshot, event)
    }

    async fn register_driver(
        state: &ImportState,
        snapshot: &mut ValidationSnapshot,
        store: &dyn FleetRepository,
        typed_name: &str,
        mobile: &str,
    ) -> ImportResult<()> {
        let conflict = state.conflict().ok_or_else(|| ImportError::InvalidTransition {
            from: state.tag(),
            event: "register-driver".to_string(),
        })?;
        let ConflictDetail::MissingDriver { driver_name } = &conflict.detail else {
            return Err(ImportError::ResolutionNotAllowed {
                kind: conflict.kind(),
                action: "register-driver".to_string(),
            });
        };

        let name = match typed_name.trim() {
            "" => driver_name.trim(),
            typed => typed,
        };
        if name.is_empty() {
            return Err(ImportError::DriverNameRequired);
        }
        if snapshot.has_active_driver(name) {
            warn!(name, "登记被拒绝: 同名在职司机已存在");
            return Err(ImportError::DriverAlreadyExists(name.to_string()));
        }

        let new_driver = NewDriver {
            name: name.to_string(),
            mobile: mobile.trim().to_string(),
            join_date: Local::now().date_naive(),
        };
        let created = match store.create_driver(new_driver).await {
            Ok(driver) => driver,
            Err(RepositoryError::UniqueConstraintViolation(msg)) => {
                warn!(name, %msg, "登记被拒绝: 持久化层唯一约束");
                return Err(ImportError::DriverAlreadyExists(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        info!(driver_id = %created.id, name = %created.name, line = conflict.row.line_number, "冲突处理: 新司机已登记");
        snapshot.register(created);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CanonicalRow, ConflictKind, RowFields, StatusTag};
    use crate::repository::InMemoryFleetRepository;
    use chrono::NaiveDate;

    fn row(driver: &str) -> CanonicalRow {
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        CanonicalRow {
            line_number: 4,
            date,
            fields: RowFields {
                date: date.to_string(),
                driver: driver.to_string(),
                shift: "Day".to_string(),
                qr_code: "Q1".to_string(),
                rent: "900".to_string(),
                ..RowFields::default()
            },
        }
    }

    async fn suspended_on(driver: &str, store: &InMemoryFleetRepository) -> (ImportState, ValidationSnapshot) {
        let pipeline = ValidationPipeline::default();
        let snapshot = ValidationSnapshot::load(store).await.unwrap();
        let mut state = ImportState::default();
        pipeline
            .step(
                &mut state,
                &snapshot,
                PipelineEvent::Start {
                    queue: vec![row(driver)],
                    skipped: Vec::new(),
                },
            )
            .unwrap();
        pipeline.step(&mut state, &snapshot, PipelineEvent::Tick).unwrap();
        (state, snapshot)
    }

    #[tokio::test]
    async fn test_register_with_empty_name_uses_row_name() {
        let store = InMemoryFleetRepository::new();
        let (mut state, mut snapshot) = suspended_on("Unknown Guy", &store).await;
        assert_eq!(state.conflict().unwrap().kind(), ConflictKind::MissingDriver);

        let pipeline = ValidationPipeline::default();
        let outcome = ConflictResolver::resolve(
            &pipeline,
            &mut state,
            &mut snapshot,
            &store,
            Resolution::RegisterDriver {
                name: "  ".to_string(),
                mobile: "9000".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(outcome, StepOutcome::Resumed);
        assert_eq!(state.cursor, 0);

        let drivers = store.list_drivers().await.unwrap();
        assert_eq!(drivers.len(), 1);
        assert_eq!(drivers[0].name, "Unknown Guy");
        assert!(snapshot.has_active_driver("unknown guy"));

        let outcome = pipeline.step(&mut state, &snapshot, PipelineEvent::Tick).unwrap();
        assert_eq!(outcome, StepOutcome::Accepted { line_number: 4 });
    }

    #[tokio::test]
    async fn test_register_collision_keeps_suspended() {
        let store = InMemoryFleetRepository::new();
        let (mut state, mut snapshot) = suspended_on("Jon", &store).await;

        // 持久化层在快照加载后才出现同名司机
        store
            .create_driver(NewDriver {
                name: "John".to_string(),
                mobile: String::new(),
                join_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            })
            .await
            .unwrap();

        let err = ConflictResolver::resolve(
            &ValidationPipeline::default(),
            &mut state,
            &mut snapshot,
            &store,
            Resolution::RegisterDriver {
                name: "JOHN".to_string(),
                mobile: String::new(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ImportError::DriverAlreadyExists(_)));
        assert_eq!(state.tag(), StatusTag::Suspended);
        assert_eq!(snapshot.driver_count(), 0);
    }

    #[tokio::test]
    async fn test_register_not_allowed_for_other_conflicts() {
        let store = InMemoryFleetRepository::new();
        let (mut state, mut snapshot) = suspended_on("", &store).await;
        assert_eq!(state.conflict().unwrap().kind(), ConflictKind::IncompleteRow);

        let err = ConflictResolver::resolve(
            &ValidationPipeline::default(),
            &mut state,
            &mut snapshot,
            &store,
            Resolution::RegisterDriver {
                name: "Someone".to_string(),
                mobile: String::new(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ImportError::ResolutionNotAllowed { .. }));
        assert!(store.list_drivers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_terminate_from_any_conflict() {
        let store = InMemoryFleetRepository::new();
        let (mut state, mut snapshot) = suspended_on("", &store).await;

        let outcome = ConflictResolver::resolve(
            &ValidationPipeline::default(),
            &mut state,
            &mut snapshot,
            &store,
            Resolution::Terminate,
        )
        .await
        .unwrap();
        assert_eq!(outcome, StepOutcome::Discarded);
        assert_eq!(state.tag(), StatusTag::Idle);
    }

    #[test]
    fn test_resolution_json_shape() {
        let json = serde_json::to_string(&Resolution::RegisterDriver {
            name: "A".to_string(),
            mobile: String::new(),
        })
        .unwrap();
        assert_eq!(json, r#"{"action":"register-driver","name":"A","mobile":""}"#);

        let parsed: Resolution = serde_json::from_str(r#"{"action":"skip"}"#).unwrap();
        assert_eq!(parsed, Resolution::Skip);
    }
}
