// ==========================================
// 运维事件报表导入系统 - 命令行入口
// ==========================================
// 用法:
//   ops-incident-report [--db <path>] import <file> [--no-persist]
//   ops-incident-report [--db <path>] groups links|tags <file>
//   ops-incident-report [--db <path>] window set <from> <to> [weekly|custom|disabled]
//   ops-incident-report [--db <path>] window clear|reset
//   ops-incident-report [--db <path>] config show
//   ops-incident-report [--db <path>] config set <key> <value>
//   ops-incident-report [--db <path>] rules list business_unit|status_mapping
//   ops-incident-report [--db <path>] rules seed
//   ops-incident-report [--db <path>] batch <batch_id>
//   ops-incident-report [--db <path>] override <record_id> <status>
// 输出: stdout 为 JSON，日志写 stderr
// ==========================================

use anyhow::{anyhow, bail, Context};
use ops_incident_report::domain::rule::RulePurpose;
use ops_incident_report::{logging, ImportApi};
use serde::Serialize;
use std::path::PathBuf;

const USAGE: &str = "用法: ops-incident-report [--db <path>] <import|groups|window|config|rules|batch|override> ...";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let db_path = take_db_flag(&mut args)?.unwrap_or_else(get_default_db_path);

    tracing::info!(version = ops_incident_report::VERSION, db_path = %db_path, "{}", ops_incident_report::APP_NAME);
    let api = ImportApi::new(&db_path).with_context(|| format!("无法打开数据库: {}", db_path))?;

    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["import", file, rest @ ..] => {
            let persist = !rest.contains(&"--no-persist");
            print_json(&api.import_file(file, persist).await?)
        }
        ["groups", "links", file] => print_json(&api.link_groups(file).await?),
        ["groups", "tags", file] => print_json(&api.tag_groups(file).await?),
        ["window", "set", from, to] => print_json(&api.set_cut_window(from, to, "weekly")?),
        ["window", "set", from, to, kind] => print_json(&api.set_cut_window(from, to, kind)?),
        ["window", "clear"] => {
            api.clear_cut_window()?;
            println!("{{}}");
            Ok(())
        }
        ["window", "reset"] => print_json(&api.reset_cut_window_to_current_cycle().await?),
        ["config", "show"] => {
            println!("{}", api.config_snapshot()?);
            Ok(())
        }
        ["config", "set", key, value] => {
            api.set_config(key, value)?;
            println!("{}", api.config_snapshot()?);
            Ok(())
        }
        ["rules", "list", purpose] => {
            let purpose = RulePurpose::parse(purpose)
                .ok_or_else(|| anyhow!("未知规则用途: {} (business_unit / status_mapping)", purpose))?;
            print_json(&api.list_rules(purpose)?)
        }
        ["rules", "seed"] => print_json(&api.seed_default_rules()?),
        ["batch", batch_id] => print_json(&api.get_batch(batch_id)?),
        ["override", record_id, status] => {
            let record_id: i64 = record_id
                .parse()
                .with_context(|| format!("record_id 必须为整数: {}", record_id))?;
            print_json(&api.override_status(record_id, status).await?)
        }
        _ => bail!(USAGE),
    }
}

/// 取出 --db <path> 参数
fn take_db_flag(args: &mut Vec<String>) -> anyhow::Result<Option<String>> {
    let Some(pos) = args.iter().position(|a| a == "--db") else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        bail!("--db 缺少路径参数");
    }
    let path = args.remove(pos + 1);
    args.remove(pos);
    Ok(Some(path))
}

/// 默认数据库路径
///
/// # 规则
/// - 环境变量 OPS_INCIDENT_DB_PATH 优先
/// - 其次为用户数据目录下的 ops-incident-report/ops_incident_report.db
/// - 取不到数据目录时使用当前目录
fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("OPS_INCIDENT_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./ops_incident_report.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("ops-incident-report");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("ops_incident_report.db");
        }
    }
    path.to_string_lossy().to_string()
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
