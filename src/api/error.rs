// ==========================================
// 疫苗接种排期 - API层错误类型
// ==========================================
// 职责: 汇总各层错误，转换为调用方可理解的错误消息
// 说明: "暂不可接种" 是 EligibilityDecision 的取值，不是错误
// ==========================================

use crate::engine::{EngineError, RuleGraphError, RuleRefreshError};
use crate::importer::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 调用方输入错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("同日批次无效: {0}")]
    InvalidBatch(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 规则目录错误
    // ==========================================
    /// 新规则集被规则图拒绝，当前规则保持不变
    #[error("规则目录被拒绝: {0}")]
    RuleCatalogRejected(#[from] RuleGraphError),

    // ==========================================
    // 并发控制错误
    // ==========================================
    /// 同一儿童同一疫苗同一剂次已被其他写者落库
    #[error("接种记录并发冲突: {0}")]
    ConcurrentAdministration(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 导入/配置错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::ConcurrentAdministration(msg)
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::DatabaseError(format!("外键约束违反: {}", msg))
            }
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidBatch(msg) => ApiError::InvalidBatch(msg),
            EngineError::Store(e) => ApiError::DatabaseError(e.to_string()),
        }
    }
}

impl From<RuleRefreshError> for ApiError {
    fn from(err: RuleRefreshError) -> Self {
        match err {
            RuleRefreshError::Graph(e) => ApiError::RuleCatalogRejected(e),
            RuleRefreshError::Store(e) => ApiError::DatabaseError(e.to_string()),
            RuleRefreshError::Lock(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::RuleRejected(e) => ApiError::RuleCatalogRejected(e),
            ImportError::Repository(e) => ApiError::from(e),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IntervalRule;

    #[test]
    fn test_unique_violation_maps_to_concurrent_administration() {
        let err: ApiError = RepositoryError::UniqueConstraintViolation("dup".to_string()).into();
        assert!(matches!(err, ApiError::ConcurrentAdministration(_)));
    }

    #[test]
    fn test_rejected_import_keeps_graph_error() {
        let graph_err = RuleGraphError::InvalidRule {
            rule: IntervalRule::self_rule("", 0),
            reason: "EMPTY_VACCINE_ID".to_string(),
        };
        let err: ApiError = ImportError::RuleRejected(graph_err.clone()).into();
        assert!(matches!(err, ApiError::RuleCatalogRejected(e) if e == graph_err));
    }
}
