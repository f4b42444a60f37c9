// Admin utility: validate an interval-rule CSV and replace the rule catalog of a database.
//
// Usage:
//   cargo run --bin import_interval_rules -- <rules.csv> [db_path]
//
// db_path defaults to $VACCINE_SCHEDULER_DB_PATH, then the user data directory.
// A rejected catalog leaves the stored rules untouched. The stored catalog is not
// loaded first, so a damaged catalog can still be replaced.

use anyhow::{bail, Context};
use vaccine_scheduler::db::default_db_path;
use vaccine_scheduler::importer::RuleCsvImporter;
use vaccine_scheduler::logging;

fn main() -> anyhow::Result<()> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let csv_path = match args.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        Some(p) => p,
        None => bail!("usage: import_interval_rules <rules.csv> [db_path]"),
    };
    let db_path = args
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default_db_path);

    tracing::info!(csv = %csv_path, db = %db_path, "开始导入间隔规则");

    let importer = RuleCsvImporter::open(&db_path)
        .with_context(|| format!("无法打开数据库: {}", db_path))?;
    let summary = importer
        .import_file(&csv_path)
        .with_context(|| format!("导入失败: {}", csv_path))?;

    println!(
        "rows_read={} rules_written={} duplicates_collapsed={} self_rules={} pair_rules={}",
        summary.rows_read,
        summary.rules_written,
        summary.duplicates_collapsed,
        summary.self_rules,
        summary.pair_rules
    );
    Ok(())
}
