// ==========================================
// 车队运营后台 - 跳过行导出
// ==========================================
// 用途: 把 SkippedRow 导出为 CSV，供线下复核
// ==========================================

use crate::domain::SkippedRow;
use crate::importer::error::ImportResult;
use csv::Writer;
use std::io::Write;

const HEADER: [&str; 12] = [
    "Line",
    "Date",
    "Driver",
    "QR Code",
    "Vehicle",
    "Shift",
    "Rent",
    "Collection",
    "Fuel",
    "Due",
    "Payout",
    "Reason",
];

/// 写出跳过行（按行号排序）
pub fn write_skipped_rows<W: Write>(rows: &[SkippedRow], out: W) -> ImportResult<usize> {
    let mut sorted: Vec<&SkippedRow> = rows.iter().collect();
    sorted.sort_by_key(|r| r.line_number);

    let mut writer = Writer::from_writer(out);
    writer.write_record(HEADER)?;
    for row in &sorted {
        let f = &row.fields;
        let line = row.line_number.to_string();
        writer.write_record([
            line.as_str(),
            f.date.as_str(),
            f.driver.as_str(),
            f.qr_code.as_str(),
            f.vehicle.as_str(),
            f.shift.as_str(),
            f.rent.as_str(),
            f.collection.as_str(),
            f.fuel.as_str(),
            f.due.as_str(),
            f.payout.as_str(),
            row.reason.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(sorted.len())
}
