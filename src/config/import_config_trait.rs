// ==========================================
// 车队运营后台 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::import_settings::ImportSettings;
use async_trait::async_trait;
use std::error::Error;

/// 配置读取结果（跨 await 需要 Send + Sync）
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取表头扫描行数
    ///
    /// # 默认值
    /// - 30
    async fn get_header_scan_rows(&self) -> ConfigResult<usize>;

    /// 获取表头最少命中字段数
    ///
    /// # 默认值
    /// - 3
    async fn get_min_header_matches(&self) -> ConfigResult<usize>;

    /// 获取连续垃圾行上限
    ///
    /// # 默认值
    /// - 3
    ///
    /// # 用途
    /// - 连续垃圾行数超过该值时视为表格结束
    async fn get_max_garbage_streak(&self) -> ConfigResult<usize>;

    /// 获取分节标记列表
    ///
    /// # 返回
    /// - Vec<String>: 小写标记（如 "total"）
    async fn get_section_markers(&self) -> ConfigResult<Vec<String>>;

    /// 一次性读取全部导入阈值
    async fn load_import_settings(&self) -> ConfigResult<ImportSettings> {
        Ok(ImportSettings {
            header_scan_rows: self.get_header_scan_rows().await?,
            min_header_matches: self.get_min_header_matches().await?,
            max_garbage_streak: self.get_max_garbage_streak().await?,
            section_markers: self.get_section_markers().await?,
        })
    }
}
