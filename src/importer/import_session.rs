// ==========================================
// 车队运营后台 - 导入会话
// ==========================================
// 职责: 整合导入流程，从文件字节到落库
// 流程: 解码 → 表头定位 → 行抽取 → 加载快照 → 逐行校验（可挂起）→ 落库
// 并发: 单会话单线程推进，行与行之间让出执行权；挂起时无限期等待操作员
// ==========================================

use crate::config::{ImportConfigReader, ImportSettings};
use crate::domain::{
    Completion, ConflictKind, FinalizeReport, ImportState, ImportStatus, RawGrid, StatusTag,
};
use crate::importer::conflict_resolver::{ConflictResolver, Resolution};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{SheetDecoder, UniversalSheetDecoder};
use crate::importer::finalizer::Finalizer;
use crate::importer::header_locator::HeaderLocator;
use crate::importer::pipeline::{PipelineEvent, StepOutcome, ValidationPipeline};
use crate::importer::row_extractor::RowExtractor;
use crate::importer::skipped_report::write_skipped_rows;
use crate::importer::snapshot::ValidationSnapshot;
use crate::repository::FleetRepository;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// run 的停止点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// 等待操作员处理冲突
    Suspended(ConflictKind),
    /// 队列耗尽且落库成功
    Committed(FinalizeReport),
}

/// 进度快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgress {
    pub status: StatusTag,
    pub processed: usize,
    pub total: usize,
    pub accepted: usize,
    pub skipped: usize,
    pub overridden: usize,
}

// ==========================================
// ImportSession
// ==========================================
pub struct ImportSession {
    // 持久化协作方
    store: Arc<dyn FleetRepository>,

    // 阈值配置
    settings: ImportSettings,

    // 导入组件
    decoder: Box<dyn SheetDecoder>,
    pipeline: ValidationPipeline,

    // 会话状态
    state: ImportState,
    snapshot: ValidationSnapshot,
}

impl ImportSession {
    /// 创建会话（默认解码器按文件头识别 Excel / CSV）
    pub fn new(store: Arc<dyn FleetRepository>, settings: ImportSettings) -> Self {
        Self {
            store,
            settings,
            decoder: Box::new(UniversalSheetDecoder),
            pipeline: ValidationPipeline::default(),
            state: ImportState::default(),
            snapshot: ValidationSnapshot::default(),
        }
    }

    /// 从配置读取器加载阈值后创建会话
    pub async fn from_config(
        store: Arc<dyn FleetRepository>,
        config: &dyn ImportConfigReader,
    ) -> ImportResult<Self> {
        let settings = config
            .load_import_settings()
            .await
            .map_err(|e| ImportError::Other(anyhow::anyhow!("导入配置读取失败: {}", e)))?;
        Ok(Self::new(store, settings))
    }

    /// 替换解码器
    pub fn with_decoder(mut self, decoder: Box<dyn SheetDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn state(&self) -> &ImportState {
        &self.state
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub fn progress(&self) -> ImportProgress {
        ImportProgress {
            status: self.state.tag(),
            processed: self.state.cursor,
            total: self.state.queue.len(),
            accepted: self.state.valid_entries.len(),
            skipped: self.state.skipped_rows.len(),
            overridden: self.state.overridden_ids.len(),
        }
    }

    /// 解码文件字节并开始
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    pub async fn begin_from_bytes(&mut self, bytes: &[u8]) -> ImportResult<StepOutcome> {
        self.ensure_idle("start")?;
        let grid = self.decoder.decode(bytes)?;
        self.begin(grid).await
    }

    /// 定位表头、抽取数据行、加载快照并启动流水线
    ///
    /// # 返回
    /// - Ok(Started): 进入 running
    /// - Err(HeaderNotFound / NoValidRows): 硬停止，保持 idle
    #[instrument(skip(self, grid), fields(rows = grid.len()))]
    pub async fn begin(&mut self, grid: RawGrid) -> ImportResult<StepOutcome> {
        self.ensure_idle("start")?;
        let columns = self.pipeline.columns();

        let locator = HeaderLocator::new(&self.settings);
        let Some(location) = locator.locate(&grid, columns) else {
            let best_matches = locator
                .best_candidate(&grid, columns)
                .map(|(_, count)| count)
                .unwrap_or(0);
            warn!(best_matches, "未找到表头行");
            return Err(ImportError::HeaderNotFound {
                best_matches,
                required: self.settings.min_header_matches,
            });
        };
        info!(
            header_row = location.row_index,
            matched = location.matched_fields,
            "表头定位完成"
        );

        let extracted = RowExtractor::new(&self.settings).extract(&grid, &location, columns);
        info!(
            queued = extracted.queue.len(),
            skipped = extracted.skipped.len(),
            stop = ?extracted.stop,
            "数据行抽取完成"
        );

        if !extracted.queue.is_empty() {
            self.snapshot = ValidationSnapshot::load(self.store.as_ref()).await?;
            info!(
                drivers = self.snapshot.driver_count(),
                entries = self.snapshot.entry_count(),
                "校验快照已加载"
            );
        }

        self.pipeline.step(
            &mut self.state,
            &self.snapshot,
            PipelineEvent::Start {
                queue: extracted.queue,
                skipped: extracted.skipped,
            },
        )
    }

    /// 处理一行
    pub fn advance(&mut self) -> ImportResult<StepOutcome> {
        self.pipeline
            .step(&mut self.state, &self.snapshot, PipelineEvent::Tick)
    }

    /// 连续推进直到挂起或完成；队列耗尽时自动落库
    pub async fn run(&mut self) -> ImportResult<RunOutcome> {
        loop {
            match &self.state.status {
                ImportStatus::Running => {
                    if self.advance()? == StepOutcome::Completed {
                        let report = self.finalize().await?;
                        return Ok(RunOutcome::Committed(report));
                    }
                    tokio::task::yield_now().await;
                }
                ImportStatus::Suspended { conflict } => {
                    return Ok(RunOutcome::Suspended(conflict.kind()));
                }
                ImportStatus::Done {
                    completion: Completion::Pending,
                } => {
                    let report = self.finalize().await?;
                    return Ok(RunOutcome::Committed(report));
                }
                _ => {
                    return Err(ImportError::InvalidTransition {
                        from: self.state.tag(),
                        event: "run".to_string(),
                    })
                }
            }
        }
    }

    /// 应用操作员对当前冲突的决定
    #[instrument(skip(self), fields(action = resolution.name()))]
    pub async fn resolve(&mut self, resolution: Resolution) -> ImportResult<StepOutcome> {
        let outcome = ConflictResolver::resolve(
            &self.pipeline,
            &mut self.state,
            &mut self.snapshot,
            self.store.as_ref(),
            resolution,
        )
        .await?;
        if outcome == StepOutcome::Discarded {
            self.snapshot = ValidationSnapshot::default();
        }
        Ok(outcome)
    }

    /// 放弃整批（running / suspended）
    pub fn terminate(&mut self) -> ImportResult<StepOutcome> {
        let outcome =
            self.pipeline
                .step(&mut self.state, &self.snapshot, PipelineEvent::Terminate)?;
        self.snapshot = ValidationSnapshot::default();
        Ok(outcome)
    }

    /// 落库失败后人工重试
    pub async fn retry_finalize(&mut self) -> ImportResult<FinalizeReport> {
        match &self.state.status {
            ImportStatus::Done {
                completion: Completion::Failed { .. },
            } => self.finalize().await,
            _ => Err(ImportError::InvalidTransition {
                from: self.state.tag(),
                event: "retry-finalize".to_string(),
            }),
        }
    }

    /// done / idle → idle
    pub fn reset(&mut self) -> ImportResult<StepOutcome> {
        let outcome = self
            .pipeline
            .step(&mut self.state, &self.snapshot, PipelineEvent::Reset)?;
        self.snapshot = ValidationSnapshot::default();
        Ok(outcome)
    }

    /// 导出跳过行 CSV
    pub fn export_skipped<W: Write>(&self, out: W) -> ImportResult<usize> {
        write_skipped_rows(&self.state.skipped_rows, out)
    }

    async fn finalize(&mut self) -> ImportResult<FinalizeReport> {
        Finalizer::finalize(&mut self.state, self.store.as_ref()).await
    }

    fn ensure_idle(&self, event: &str) -> ImportResult<()> {
        match self.state.tag() {
            StatusTag::Idle => Ok(()),
            from => Err(ImportError::InvalidTransition {
                from,
                event: event.to_string(),
            }),
        }
    }
}
