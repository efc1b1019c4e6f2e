// ==========================================
// 车队运营后台 - 日报导入API
// ==========================================
// 职责: 封装导入会话，供宿主（控制台 / 前端命令）调用
// 并发: 单会话由异步互斥锁保护，同一时刻只有一个导入在推进
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ImportConfigReader;
use crate::domain::{Completion, Conflict, FinalizeReport, ImportStatus, SkippedRow, StatusTag};
use crate::importer::{
    ImportError, ImportProgress, ImportSession, Resolution, RunOutcome, UniversalSheetDecoder,
};
use crate::repository::FleetRepository;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// 导入进度响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgressResponse {
    /// 状态标签（idle / running / suspended / done）
    pub status: StatusTag,
    /// 计数
    pub progress: ImportProgress,
    /// 当前冲突（仅 suspended）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<Conflict>,
    /// 被跳过的行（含原因）
    pub skipped_rows: Vec<SkippedRow>,
    /// 落库结果（仅 done + committed）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<FinalizeReport>,
    /// 落库失败原因（仅 done + failed）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// 冲突处理请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionRequest {
    /// 操作员决定
    pub resolution: Resolution,
}

/// 日报导入API
pub struct ImportApi {
    session: Mutex<ImportSession>,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    pub fn new(session: ImportSession) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }

    /// 从配置读取阈值后创建
    pub async fn from_config(
        store: Arc<dyn FleetRepository>,
        config: &dyn ImportConfigReader,
    ) -> ApiResult<Self> {
        let session = ImportSession::from_config(store, config).await?;
        Ok(Self::new(session))
    }

    /// 导入日报文件并推进到第一个冲突（或完成）
    ///
    /// # 参数
    /// - file_path: 文件路径（xlsx / xls / ods / csv）
    ///
    /// # 返回
    /// - Ok(ImportProgressResponse): suspended 或 done
    /// - Err(ApiError::ImportError): 格式不支持 / 表头未找到 / 无有效行
    /// - Err(ApiError::FinalizeError): 落库失败（可调用 retry_finalize）
    pub async fn import_daily_entries(&self, file_path: &str) -> ApiResult<ImportProgressResponse> {
        let path = Path::new(file_path);
        UniversalSheetDecoder::check_extension(path)?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::ImportError(format!("文件读取失败: {}: {}", file_path, e)))?;

        let mut session = self.session.lock().await;
        if session.state().tag() == StatusTag::Done {
            session.reset()?;
        }

        info!(file = file_path, bytes = bytes.len(), "开始导入日报文件");
        match session.begin_from_bytes(&bytes).await {
            Ok(_) => {}
            Err(ImportError::NoValidRows { skipped }) => {
                warn!(skipped = skipped.len(), "文件中没有可导入的行");
                return Err(ApiError::ImportError(format!(
                    "文件中没有可导入的行（跳过 {} 行）",
                    skipped.len()
                )));
            }
            Err(e) => return Err(e.into()),
        }

        Self::drive(&mut session).await
    }

    /// 查询当前进度
    pub async fn get_progress(&self) -> ImportProgressResponse {
        let session = self.session.lock().await;
        Self::snapshot(&session)
    }

    /// 处理当前冲突并继续推进
    ///
    /// # 返回
    /// - Err(ApiError::ConflictResolutionError): 决定被拒绝，仍停留在当前冲突
    pub async fn resolve_conflict(
        &self,
        request: ResolutionRequest,
    ) -> ApiResult<ImportProgressResponse> {
        let mut session = self.session.lock().await;
        session.resolve(request.resolution).await?;
        match session.state().tag() {
            StatusTag::Running => Self::drive(&mut session).await,
            _ => Ok(Self::snapshot(&session)),
        }
    }

    /// 放弃整批
    pub async fn cancel_import(&self) -> ApiResult<ImportProgressResponse> {
        let mut session = self.session.lock().await;
        session.terminate()?;
        Ok(Self::snapshot(&session))
    }

    /// 落库失败后人工重试
    pub async fn retry_finalize(&self) -> ApiResult<ImportProgressResponse> {
        let mut session = self.session.lock().await;
        session.retry_finalize().await?;
        Ok(Self::snapshot(&session))
    }

    /// 回到 idle
    pub async fn reset(&self) -> ApiResult<ImportProgressResponse> {
        let mut session = self.session.lock().await;
        session.reset()?;
        Ok(Self::snapshot(&session))
    }

    /// 导出跳过行 CSV
    ///
    /// # 返回
    /// - Ok(usize): 写出的行数
    pub async fn export_skipped_rows(&self, file_path: &str) -> ApiResult<usize> {
        let mut buf = Vec::new();
        let written = self.session.lock().await.export_skipped(&mut buf)?;
        tokio::fs::write(file_path, buf)
            .await
            .map_err(|e| ApiError::InternalError(format!("跳过行导出失败: {}: {}", file_path, e)))?;
        info!(file = file_path, rows = written, "跳过行已导出");
        Ok(written)
    }

    async fn drive(session: &mut ImportSession) -> ApiResult<ImportProgressResponse> {
        match session.run().await {
            Ok(RunOutcome::Suspended(kind)) => {
                info!(kind = %kind, "导入挂起，等待操作员处理");
            }
            Ok(RunOutcome::Committed(report)) => {
                info!(
                    inserted = report.inserted,
                    deleted = report.deleted,
                    "导入完成"
                );
            }
            Err(e) => return Err(e.into()),
        }
        Ok(Self::snapshot(session))
    }

    fn snapshot(session: &ImportSession) -> ImportProgressResponse {
        let state = session.state();
        let (report, failure) = match &state.status {
            ImportStatus::Done {
                completion: Completion::Committed(report),
            } => (Some(*report), None),
            ImportStatus::Done {
                completion: Completion::Failed { message },
            } => (None, Some(message.clone())),
            _ => (None, None),
        };

        ImportProgressResponse {
            status: state.tag(),
            progress: session.progress(),
            conflict: state.conflict().cloned(),
            skipped_rows: state.skipped_rows.clone(),
            report,
            failure,
        }
    }
}
