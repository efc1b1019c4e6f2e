// ==========================================
// 车队运营后台 - 日报导入控制台入口
// ==========================================
// 用法:
//   fleet-import <file> [--db <db_path>] [--skipped-out <csv_path>] [--json-log]
//
// 冲突出现时在终端提示操作员选择处理方式；日志写 stderr
// ==========================================

use anyhow::{bail, Context};
use fleet_import::api::{ImportProgressResponse, ResolutionRequest};
use fleet_import::app::{get_default_db_path, AppState};
use fleet_import::domain::{ConflictDetail, StatusTag};
use fleet_import::importer::Resolution;
use fleet_import::logging;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

struct CliArgs {
    file: String,
    db_path: Option<String>,
    skipped_out: Option<String>,
    json_log: bool,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut file = None;
    let mut db_path = None;
    let mut skipped_out = None;
    let mut json_log = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => db_path = Some(args.next().context("--db 需要路径参数")?),
            "--skipped-out" => {
                skipped_out = Some(args.next().context("--skipped-out 需要路径参数")?)
            }
            "--json-log" => json_log = true,
            other if other.starts_with("--") => bail!("未知参数: {}", other),
            other => file = Some(other.to_string()),
        }
    }

    Ok(CliArgs {
        file: file.context("用法: fleet-import <file> [--db <db_path>] [--skipped-out <csv_path>]")?,
        db_path,
        skipped_out,
        json_log,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    if args.json_log {
        logging::init_json();
    } else {
        logging::init();
    }

    tracing::info!("{} v{}", fleet_import::APP_NAME, fleet_import::VERSION);

    let db_path = args.db_path.clone().unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    let api = state.import_api.clone();

    let mut progress = api.import_daily_entries(&args.file).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while progress.status == StatusTag::Suspended {
        print_conflict(&progress);
        let Some(resolution) = prompt_resolution(&progress, &mut lines).await? else {
            println!("输入结束，放弃本次导入");
            progress = api.cancel_import().await?;
            break;
        };
        match api.resolve_conflict(ResolutionRequest { resolution }).await {
            Ok(next) => progress = next,
            Err(e) => {
                // 决定被拒绝时仍停留在当前冲突
                println!("处理失败: {}", e);
                progress = api.get_progress().await;
            }
        }
    }

    print_summary(&progress);

    if let Some(path) = &args.skipped_out {
        let written = api.export_skipped_rows(path).await?;
        println!("跳过行已导出: {} ({} 行)", path, written);
    }

    Ok(())
}

fn print_conflict(progress: &ImportProgressResponse) {
    let Some(conflict) = &progress.conflict else {
        return;
    };
    let row = &conflict.row;
    println!();
    println!(
        "第 {} 行 [{}] {} / {} / {}",
        row.line_number,
        conflict.kind(),
        row.fields.date,
        row.fields.driver,
        row.fields.shift
    );
    match &conflict.detail {
        ConflictDetail::IncompleteRow { missing_fields } => {
            println!("  缺少必填字段: {}", missing_fields.join(", "));
        }
        ConflictDetail::MissingDriver { driver_name } => {
            println!("  司机不存在或已离职: {}", driver_name);
        }
        ConflictDetail::DuplicateEntry {
            existing,
            is_batch_duplicate,
            ..
        } => {
            let origin = if *is_batch_duplicate { "本批次" } else { "已落库" };
            println!(
                "  与{}流水重复: {} {} 班次={} 租金={}",
                origin, existing.date, existing.driver, existing.shift, existing.rent
            );
        }
    }
}

async fn prompt_resolution(
    progress: &ImportProgressResponse,
    lines: &mut Lines<BufReader<Stdin>>,
) -> anyhow::Result<Option<Resolution>> {
    let Some(conflict) = &progress.conflict else {
        return Ok(None);
    };
    let choices = match conflict.detail {
        ConflictDetail::IncompleteRow { .. } => "[s]跳过 [t]放弃整批",
        ConflictDetail::MissingDriver { .. } => "[s]跳过 [r]登记司机 [t]放弃整批",
        ConflictDetail::DuplicateEntry { .. } => "[s]跳过 [o]覆盖 [t]放弃整批",
    };

    loop {
        print_prompt(&format!("{} > ", choices)).await?;
        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        let resolution = match line.trim().to_lowercase().as_str() {
            "s" | "skip" => Resolution::Skip,
            "o" | "override" => Resolution::Override,
            "t" | "terminate" => Resolution::Terminate,
            "r" | "register" => {
                print_prompt(&format!("姓名（回车使用 {}）> ", conflict.row.fields.driver)).await?;
                let name = lines.next_line().await?.unwrap_or_default();
                print_prompt("手机号（可留空）> ").await?;
                let mobile = lines.next_line().await?.unwrap_or_default();
                Resolution::RegisterDriver { name, mobile }
            }
            _ => {
                println!("无效输入");
                continue;
            }
        };
        return Ok(Some(resolution));
    }
}

async fn print_prompt(text: &str) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

fn print_summary(progress: &ImportProgressResponse) {
    println!();
    println!("状态: {}", progress.status);
    println!(
        "处理 {}/{} 行，接收 {}，跳过 {}，覆盖 {}",
        progress.progress.processed,
        progress.progress.total,
        progress.progress.accepted,
        progress.progress.skipped,
        progress.progress.overridden
    );
    if let Some(report) = &progress.report {
        println!("落库完成: 插入 {}，删除 {}", report.inserted, report.deleted);
    }
    if let Some(failure) = &progress.failure {
        println!("落库失败: {}", failure);
    }
}
