// ==========================================
// 车队运营后台 - 单元格标准化
// ==========================================
// 职责: TRIM / 日期容错解析 / 金额容错解析
// 红线: 所有函数不返回错误、不 panic，失败时返回空串 / None / 0
// ==========================================

use crate::domain::RawCell;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};

/// 表格日期序列号的零点（1900 闰年 bug 已折算）
fn serial_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

const MIN_YEAR: i32 = 2000;
const MAX_YEAR: i32 = 2100;

// 自然语言 / 带时间日期的兜底格式
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
    "%d-%b-%Y",
    "%d-%b-%y",
    "%a, %d %b %Y",
];

/// 单元格转文本（TRIM）
///
/// # 规则
/// - Empty → ""
/// - 数字 → 最短十进制表示（900.0 → "900"）
/// - 错误值 → 原文（如 "#N/A"），由下游按非法数字处理
pub fn clean_cell(cell: &RawCell) -> String {
    match cell {
        RawCell::Empty => String::new(),
        RawCell::Text(s) => s.trim().to_string(),
        RawCell::Number(n) | RawCell::DateSerial(n) => n.to_string(),
        RawCell::Bool(b) => b.to_string(),
        RawCell::Error(e) => e.trim().to_string(),
    }
}

/// 容错日期解析
///
/// # 顺序
/// 1. 数字 / 日期序列号 → 1899-12-30 起算天数
/// 2. 纯数字文本 → 先按序列号，再按 8 位 YYYYMMDD
/// 3. `/ . -` 分隔三段 → 日/月/年，否则 年/月/日，否则 月/日/年
/// 4. 带时间的 ISO 文本 / 英文月份名
///
/// # 返回
/// - Some(NaiveDate): 年份在 [2000, 2100] 内的合法日期
/// - None: 无法解析
pub fn parse_flexible_date(cell: &RawCell) -> Option<NaiveDate> {
    match cell {
        RawCell::Number(n) | RawCell::DateSerial(n) => from_serial(*n),
        RawCell::Text(s) => parse_date_text(s),
        RawCell::Empty | RawCell::Bool(_) | RawCell::Error(_) => None,
    }
}

/// 文本日期解析（规则同 parse_flexible_date）
pub fn parse_date_text(value: &str) -> Option<NaiveDate> {
    let text = value.trim();
    if text.is_empty() {
        return None;
    }

    if is_numeric_literal(text) {
        if let Some(date) = text.parse::<f64>().ok().and_then(from_serial) {
            return Some(date);
        }
        if text.len() == 8 && text.bytes().all(|b| b.is_ascii_digit()) {
            let year = text[0..4].parse().ok()?;
            let month = text[4..6].parse().ok()?;
            let day = text[6..8].parse().ok()?;
            if let Some(date) = build_date(year, month, day) {
                return Some(date);
            }
        }
    }

    if let Some((a, b, c)) = split_triple(text) {
        // 日/月/年 优先
        if let Some(date) = build_date(c, b as u32, a as u32) {
            return Some(date);
        }
        if let Some(date) = build_date(a, b as u32, c as u32) {
            return Some(date);
        }
        if let Some(date) = build_date(c, a as u32, b as u32) {
            return Some(date);
        }
    }

    parse_fallback(text)
}

/// 容错金额解析
///
/// 去除千分位、货币符号等非数字字符后取最长的前导浮点字面量；
/// 无法解析时返回 0，永不返回 NaN
pub fn parse_flexible_number(value: &str) -> f64 {
    let stripped: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if stripped.is_empty() {
        return 0.0;
    }

    let literal = leading_float_literal(&stripped);
    literal
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

/// 日期 → 表格序列号（parse_flexible_date 的逆运算）
pub fn to_serial(date: NaiveDate) -> f64 {
    (date - serial_epoch()).num_days() as f64
}

/// 英文星期全称（Wednesday）
pub fn weekday_name(date: NaiveDate) -> String {
    date.format("%A").to_string()
}

// ==========================================
// 内部工具
// ==========================================

fn from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }
    // 小数部分是当天的时间，只取日历日；跨度远超 [2000, 2100] 时先截断避免 Duration 溢出
    let days = serial.floor();
    if !(0.0..=100_000.0).contains(&days) {
        return None;
    }
    let date = serial_epoch().checked_add_signed(Duration::days(days as i64))?;
    in_range(date)
}

fn build_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let full_year = if (0..100).contains(&year) {
        year + 2000
    } else {
        year
    };
    if !(MIN_YEAR..=MAX_YEAR).contains(&full_year) {
        return None;
    }
    NaiveDate::from_ymd_opt(full_year, month, day)
}

fn in_range(date: NaiveDate) -> Option<NaiveDate> {
    if (MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        Some(date)
    } else {
        None
    }
}

/// `-?\d+(\.\d+)?`
fn is_numeric_literal(text: &str) -> bool {
    let body = text.strip_prefix('-').unwrap_or(text);
    let mut parts = body.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_ok = match parts.next() {
        Some(frac) => !frac.is_empty() && frac.bytes().all(|b| b.is_ascii_digit()),
        None => true,
    };
    !int_part.is_empty() && int_part.bytes().all(|b| b.is_ascii_digit()) && frac_ok
}

/// `\d{1,4}[/.-]\d{1,2}[/.-]\d{1,4}`（分隔符可混用）
fn split_triple(text: &str) -> Option<(i32, i32, i32)> {
    let parts: Vec<&str> = text.split(['/', '.', '-']).collect();
    if parts.len() != 3 {
        return None;
    }
    let max_len = [4, 2, 4];
    let mut nums = [0i32; 3];
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() || part.len() > max_len[i] || !part.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        nums[i] = part.parse().ok()?;
    }
    Some((nums[0], nums[1], nums[2]))
}

fn parse_fallback(text: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return in_range(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return in_range(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return in_range(date);
        }
    }
    None
}

/// 取前导浮点字面量: `-?\d*\.?\d*`，至少含一位数字
fn leading_float_literal(text: &str) -> &str {
    let bytes = text.as_bytes();
    let mut end = 0;
    if bytes.first() == Some(&b'-') {
        end = 1;
    }
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut last_valid = 0;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => {
                seen_digit = true;
                end += 1;
                last_valid = end;
            }
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    if seen_digit {
        &text[..last_valid]
    } else {
        ""
    }
}
