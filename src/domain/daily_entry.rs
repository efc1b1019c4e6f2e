// ==========================================
// 车队运营后台 - 日报流水领域模型
// ==========================================
// 用途: 导入落库的最终单元；重复检测的比对对象
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// DailyEntry - 司机日报流水
// ==========================================
// 对齐: daily_entries 表
// 口径: due > 0 表示司机欠款，due < 0 表示应付司机
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyEntry {
    pub id: String,            // 流水 ID（UUID）
    pub date: NaiveDate,       // 日期
    pub day: String,           // 星期
    pub vehicle: String,       // 车辆
    pub driver: String,        // 司机姓名
    pub shift: String,         // 班次
    pub qr_code: String,       // 收款码
    pub rent: f64,             // 租金
    pub collection: f64,       // 收款
    pub fuel: f64,             // 油费
    pub due: f64,              // 结余
    pub payout: f64,           // 付给司机
    pub notes: Option<String>, // 备注
}

impl DailyEntry {
    /// (日期, 司机) 粒度的重复判定；司机姓名大小写不敏感
    ///
    /// 班次/车辆不参与比较：同一司机同一天只允许一条流水
    pub fn same_slot(&self, date: NaiveDate, driver: &str) -> bool {
        self.date == date && self.driver.trim().to_lowercase() == driver.trim().to_lowercase()
    }
}
