// ==========================================
// 车队运营后台 - 导入阈值配置
// ==========================================
// 职责: 表头定位 / 行抽取使用的经验阈值
// 存储: config_kv 表（缺省时使用 Default）
// ==========================================

use serde::{Deserialize, Serialize};

/// 默认分节标记（首列小写后包含任一即停止抽取）
pub const DEFAULT_SECTION_MARKERS: &[&str] =
    &["driver summary", "weekly status", "profit", "loss", "total"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSettings {
    /// 表头扫描的最大行数
    pub header_scan_rows: usize,
    /// 表头行最少命中字段数（绝对下限，与必填字段数无关）
    pub min_header_matches: usize,
    /// 连续垃圾行超过该值即视为表格结束
    pub max_garbage_streak: usize,
    /// 分节标记（小写）
    pub section_markers: Vec<String>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            header_scan_rows: 30,
            min_header_matches: 3,
            max_garbage_streak: 3,
            section_markers: DEFAULT_SECTION_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}
