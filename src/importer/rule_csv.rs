// ==========================================
// 疫苗接种排期 - 间隔规则 CSV 导入
// ==========================================
// 列: vaccine_id, related_vaccine_id, min_interval_days, can_be_given_together
// - related_vaccine_id 为空 → 自身规则（加强针间隔）
// - can_be_given_together 缺省为 false；接受 true/false/1/0/yes/no
// 红线: 整个目录先经 RuleGraph::load 校验，通过后才写库
// ==========================================

use crate::config::config_manager::parse_flag;
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::IntervalRule;
use crate::engine::RuleGraph;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::{IntervalRuleRepository, RepositoryError};
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};

const COL_VACCINE: &str = "vaccine_id";
const COL_RELATED: &str = "related_vaccine_id";
const COL_INTERVAL: &str = "min_interval_days";
const COL_TOGETHER: &str = "can_be_given_together";

/// 导入结果汇总
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleImportSummary {
    /// 读取的有效数据行数（不含空行）
    pub rows_read: usize,
    /// 去重后写入的规则数
    pub rules_written: usize,
    /// 被合并的完全重复行数
    pub duplicates_collapsed: usize,
    pub self_rules: usize,
    /// 涉及的无序疫苗对数
    pub pair_rules: usize,
}

// ==========================================
// RuleCsvImporter
// ==========================================
pub struct RuleCsvImporter {
    rule_repo: Arc<IntervalRuleRepository>,
}

impl RuleCsvImporter {
    pub fn new(rule_repo: Arc<IntervalRuleRepository>) -> Self {
        Self { rule_repo }
    }

    /// 直接打开数据库（初始化 schema）
    ///
    /// 不加载库中现有规则：库内目录已损坏时仍可用新目录整体替换。
    pub fn open(db_path: &str) -> ImportResult<Self> {
        let conn = open_sqlite_connection(db_path).map_err(RepositoryError::from)?;
        init_schema(&conn).map_err(RepositoryError::from)?;
        let conn = Arc::new(Mutex::new(conn));
        Ok(Self::new(Arc::new(IntervalRuleRepository::from_connection(conn))))
    }

    /// 解析 CSV 文件为规则列表（不校验规则之间的关系）
    pub fn parse_file<P: AsRef<Path>>(path: P) -> ImportResult<Vec<IntervalRule>> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        if let Some(ext) = path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(ImportError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }

        let file = File::open(path)?;
        Self::parse_reader(file)
    }

    /// 从任意读取源解析
    pub fn parse_reader<R: Read>(reader: R) -> ImportResult<Vec<IntervalRule>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: HashMap<String, usize> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(idx, h)| (h.trim().trim_start_matches('\u{feff}').to_ascii_lowercase(), idx))
            .collect();

        for required in [COL_VACCINE, COL_INTERVAL] {
            if !columns.contains_key(required) {
                return Err(ImportError::MissingColumn(required.to_string()));
            }
        }

        let mut rules = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            // 表头为第 1 行
            let row = idx + 2;
            let record = result?;

            // 跳过完全空白的行
            if record.iter().all(|v| v.trim().is_empty()) {
                continue;
            }

            let field = |name: &str| field_value(&columns, &record, name).to_string();

            let vaccine_id = field(COL_VACCINE);
            if vaccine_id.is_empty() {
                return Err(ImportError::FieldMappingError {
                    row,
                    message: format!("{} 为空", COL_VACCINE),
                });
            }

            let related = field(COL_RELATED);
            let related_vaccine_id = if related.is_empty() {
                None
            } else {
                Some(related)
            };

            let raw_interval = field(COL_INTERVAL);
            let min_interval_days =
                raw_interval
                    .parse::<u32>()
                    .map_err(|e| ImportError::TypeConversionError {
                        row,
                        field: COL_INTERVAL.to_string(),
                        message: format!("'{}': {}", raw_interval, e),
                    })?;

            let raw_together = field(COL_TOGETHER);
            let can_be_given_together = if raw_together.is_empty() {
                false
            } else {
                parse_flag(&raw_together).ok_or_else(|| ImportError::TypeConversionError {
                    row,
                    field: COL_TOGETHER.to_string(),
                    message: format!("'{}' 不是有效的布尔值", raw_together),
                })?
            };

            rules.push(IntervalRule {
                vaccine_id,
                related_vaccine_id,
                min_interval_days,
                can_be_given_together,
            });
        }

        Ok(rules)
    }

    /// 校验并整体替换规则目录
    ///
    /// 规则图拒绝时不写库，原目录保持不变。
    pub fn import_file<P: AsRef<Path>>(&self, path: P) -> ImportResult<RuleImportSummary> {
        let path = path.as_ref();
        let rules = Self::parse_file(path)?;
        let rows_read = rules.len();

        let graph = RuleGraph::load(rules).map_err(|e| {
            tracing::warn!(file = %path.display(), error = %e, "规则目录校验失败");
            e
        })?;

        let declared = graph.declared_rules();
        let rules_written = self.rule_repo.replace_all(&declared)?;

        let summary = RuleImportSummary {
            rows_read,
            rules_written,
            duplicates_collapsed: rows_read - rules_written,
            self_rules: graph.self_rule_count(),
            pair_rules: graph.pair_count(),
        };

        tracing::info!(
            file = %path.display(),
            rows_read = summary.rows_read,
            rules_written = summary.rules_written,
            duplicates_collapsed = summary.duplicates_collapsed,
            "规则目录导入完成"
        );
        Ok(summary)
    }
}

fn field_value<'r>(columns: &HashMap<String, usize>, record: &'r StringRecord, name: &str) -> &'r str {
    columns
        .get(name)
        .and_then(|&i| record.get(i))
        .map(str::trim)
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_self_and_pair_rules() {
        let csv = "vaccine_id,related_vaccine_id,min_interval_days,can_be_given_together\n\
                   DTaP,,28,false\n\
                   MMR,Varicella,28,no\n\
                   Hib,PCV13,0,YES\n";
        let rules = RuleCsvImporter::parse_reader(csv.as_bytes()).unwrap();

        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0], IntervalRule::self_rule("DTaP", 28));
        assert_eq!(rules[1], IntervalRule::pair("MMR", "Varicella", 28, false));
        assert!(rules[2].can_be_given_together);
    }

    #[test]
    fn test_parse_header_case_and_missing_optional_column() {
        let csv = "Vaccine_ID , MIN_INTERVAL_DAYS\nHepB,28\n,\n";
        let rules = RuleCsvImporter::parse_reader(csv.as_bytes()).unwrap();

        assert_eq!(rules.len(), 1);
        assert!(rules[0].related_vaccine_id.is_none());
        assert!(!rules[0].can_be_given_together);
    }

    #[test]
    fn test_missing_required_column() {
        let csv = "vaccine_id,related_vaccine_id\nDTaP,\n";
        let err = RuleCsvImporter::parse_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, ImportError::MissingColumn(c) if c == COL_INTERVAL));
    }

    #[test]
    fn test_negative_interval_reports_row() {
        let csv = "vaccine_id,min_interval_days\nDTaP,28\nHepB,-7\n";
        let err = RuleCsvImporter::parse_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, ImportError::TypeConversionError { row: 3, .. }));
    }

    #[test]
    fn test_bad_flag_rejected() {
        let csv = "vaccine_id,related_vaccine_id,min_interval_days,can_be_given_together\nMMR,Varicella,28,maybe\n";
        let err = RuleCsvImporter::parse_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, ImportError::TypeConversionError { row: 2, .. }));
    }

    #[test]
    fn test_parse_file_checks_extension_and_existence() {
        let mut temp_file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        writeln!(temp_file, "vaccine_id,min_interval_days").unwrap();
        let err = RuleCsvImporter::parse_file(temp_file.path()).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(_)));

        let err = RuleCsvImporter::parse_file("non_existent.csv").unwrap_err();
        assert!(matches!(err, ImportError::FileNotFound(_)));
    }
}
