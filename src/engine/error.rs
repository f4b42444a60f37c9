// ==========================================
// 疫苗接种排期 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 仅描述配置错误与调用方输入错误；
//       "暂不可接种" 是正常判定结果，不在此列
// ==========================================

use crate::domain::IntervalRule;
use std::error::Error;
use thiserror::Error;

/// 协作方（记录仓储/规则仓储）返回的错误
pub type StoreError = Box<dyn Error + Send + Sync>;

/// 规则图加载错误（启动/管理数据错误，不是单次请求错误）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleGraphError {
    /// 同一有序疫苗对存在取值不同的多条规则，或自身规则存在两种声明形式
    #[error("规则冲突: {from}->{to}, existing={existing:?}, incoming={incoming:?}")]
    ConflictingRule {
        from: String,
        to: String,
        existing: IntervalRule,
        incoming: IntervalRule,
    },

    #[error("规则无效: {rule:?}, 原因: {reason}")]
    InvalidRule { rule: IntervalRule, reason: String },
}

/// 引擎调用错误
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("同日批次无效: {0}")]
    InvalidBatch(String),

    #[error("读取接种历史失败: {0}")]
    Store(#[source] StoreError),
}

/// 规则图刷新错误（读取失败或新规则集被拒绝，旧规则图保持不变）
#[derive(Error, Debug)]
pub enum RuleRefreshError {
    #[error("读取规则失败: {0}")]
    Store(#[source] StoreError),

    #[error(transparent)]
    Graph(#[from] RuleGraphError),

    #[error("规则图锁获取失败: {0}")]
    Lock(String),
}
