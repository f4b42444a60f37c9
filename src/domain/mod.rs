// ==========================================
// 疫苗接种排期 - 领域模型层
// ==========================================
// 职责: 定义接种记录、间隔规则、判定类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod rule;
pub mod types;
pub mod vaccination;

// 重导出核心类型
pub use rule::{IntervalRule, RuleDefinition, RuleRef};
pub use types::{HistoryIssueKind, RejectionKind, RuleResolution, SequenceIssue};
pub use vaccination::{Candidate, VaccinationRecord};
