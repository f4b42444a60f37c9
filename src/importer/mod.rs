// ==========================================
// 疫苗接种排期 - 数据导入层
// ==========================================
// 职责: 间隔规则目录 CSV 导入
// 流程: 解析 → RuleGraph::load 校验 → 单事务整体替换
// ==========================================

pub mod error;
pub mod rule_csv;

pub use error::{ImportError, ImportResult};
pub use rule_csv::{RuleCsvImporter, RuleImportSummary};
