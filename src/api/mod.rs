// ==========================================
// 疫苗接种排期 - API 层
// ==========================================
// 职责: 调用层门面；读取历史快照、串行化"判定-落库"、规则重载
// ==========================================

pub mod error;
pub mod vaccination_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use vaccination_api::{AdministrationOutcome, RuleReloadSummary, VaccinationApi};
