// ==========================================
// 疫苗接种排期 - 引擎层
// ==========================================
// 职责: 接种间隔/剂次规则判定
// 红线: Engine 不拼 SQL、不写日志、不改历史；所有拒绝必须输出原因
// ==========================================

pub mod collaborators;
pub mod decision;
pub mod dose_sequencer;
pub mod error;
pub mod events;
pub mod interval;
pub mod rule_graph;
pub mod scheduling;

// 重导出核心引擎
pub use collaborators::{RecordStore, RuleGraphHandle, RuleStore};
pub use decision::{BatchResult, CoadministrationConflict, EligibilityDecision, Rejection};
pub use dose_sequencer::{DoseSequencer, HistoryIssue, SequenceResult};
pub use error::{EngineError, RuleGraphError, RuleRefreshError, StoreError};
pub use events::{
    AdministrationEvent, AdministrationEventPublisher, AdministrationEventType,
    NoOpEventPublisher, OptionalEventPublisher,
};
pub use interval::{BindingConstraint, EvaluationResult, IntervalEvaluator, SameDayConflict};
pub use rule_graph::{DirectedRule, RuleGraph};
pub use scheduling::SchedulingEngine;
