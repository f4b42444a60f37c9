// ==========================================
// 儿童疫苗接种排期 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 接种间隔/剂次判定（诊所人员最终确认）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 判定规则
pub mod engine;

// 导入层 - 规则目录
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/schema）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 调用层门面
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    Candidate, HistoryIssueKind, IntervalRule, RejectionKind, RuleDefinition, RuleRef,
    RuleResolution, SequenceIssue, VaccinationRecord,
};

// 引擎
pub use engine::{
    BatchResult, DoseSequencer, EligibilityDecision, IntervalEvaluator, RecordStore, Rejection,
    RuleGraph, RuleGraphError, RuleGraphHandle, RuleStore, SchedulingEngine,
};

// API
pub use api::{ApiError, ApiResult, VaccinationApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "儿童疫苗接种排期";
