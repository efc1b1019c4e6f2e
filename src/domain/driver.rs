// ==========================================
// 车队运营后台 - 司机领域模型
// ==========================================
// 用途: 导入校验的实体存在性检查 / 冲突处理中的快速登记
// ==========================================

use crate::domain::types::DriverStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// Driver - 司机主数据
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: String,                          // 司机 ID（UUID）
    pub name: String,                        // 姓名（大小写不敏感唯一）
    pub mobile: String,                      // 手机号
    pub join_date: NaiveDate,                // 入职日期
    pub termination_date: Option<NaiveDate>, // 离职日期（有值即视为离职）
    pub deposit: f64,                        // 押金
    pub qr_code: String,                     // 收款码
    pub vehicle: String,                     // 当前车辆
    pub status: DriverStatus,                // 在职状态
    pub current_shift: String,               // 当前班次（Day / Night）
}

impl Driver {
    /// 在职判定：状态为 Active 且没有离职日期
    pub fn is_active(&self) -> bool {
        self.status == DriverStatus::Active && self.termination_date.is_none()
    }

    /// 姓名比较（大小写不敏感，忽略首尾空白）
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }
}

// ==========================================
// NewDriver - 冲突处理时快速登记的司机
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDriver {
    pub name: String,
    pub mobile: String,
    pub join_date: NaiveDate,
}

impl NewDriver {
    /// 生成完整司机记录（默认: 在职 / 押金 0 / 白班）
    pub fn into_driver(self, id: String) -> Driver {
        Driver {
            id,
            name: self.name,
            mobile: self.mobile,
            join_date: self.join_date,
            termination_date: None,
            deposit: 0.0,
            qr_code: String::new(),
            vehicle: String::new(),
            status: DriverStatus::Active,
            current_shift: "Day".to_string(),
        }
    }
}
