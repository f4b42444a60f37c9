// ==========================================
// 疫苗接种排期 - 领域类型定义
// ==========================================
// 职责: 判定结果分类、序列问题分类、规则解析方向
// 序列化格式: SCREAMING_SNAKE_CASE (与存储/传输一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 拒绝类型 (Rejection Kind)
// ==========================================
// 红线: 不合格是正常结果值，不是异常
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionKind {
    SequenceViolation,        // 剂次序号/日期不连续
    IntervalViolation,        // 早于最早可接种日期
    CoadministrationConflict, // 同日不可联合接种
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionKind::SequenceViolation => write!(f, "SEQUENCE_VIOLATION"),
            RejectionKind::IntervalViolation => write!(f, "INTERVAL_VIOLATION"),
            RejectionKind::CoadministrationConflict => write!(f, "COADMINISTRATION_CONFLICT"),
        }
    }
}

// ==========================================
// 剂次序列问题 (Sequence Issue)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SequenceIssue {
    DoseNumberMismatch,   // 剂次号 != 已有剂次数 + 1
    NotAfterPreviousDose, // 日期未严格晚于上一剂
}

impl fmt::Display for SequenceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceIssue::DoseNumberMismatch => write!(f, "DOSE_NUMBER_MISMATCH"),
            SequenceIssue::NotAfterPreviousDose => write!(f, "NOT_AFTER_PREVIOUS_DOSE"),
        }
    }
}

// ==========================================
// 历史记录完整性问题 (History Issue Kind)
// ==========================================
// 用于审计已落库的接种历史（只读，不修复）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryIssueKind {
    DoseGap,           // 剂次号跳号
    DuplicateDose,     // 剂次号重复
    NonIncreasingDate, // 后一剂日期不晚于前一剂
}

impl fmt::Display for HistoryIssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryIssueKind::DoseGap => write!(f, "DOSE_GAP"),
            HistoryIssueKind::DuplicateDose => write!(f, "DUPLICATE_DOSE"),
            HistoryIssueKind::NonIncreasingDate => write!(f, "NON_INCREASING_DATE"),
        }
    }
}

// ==========================================
// 规则解析方式 (Rule Resolution)
// ==========================================
// Declared: 命中查询方向上声明的规则
// Reversed: 查询方向未声明，使用反向规则的间隔
// SelfRule: 同一疫苗的加强针间隔
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleResolution {
    Declared,
    Reversed,
    SelfRule,
}

impl fmt::Display for RuleResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleResolution::Declared => write!(f, "DECLARED"),
            RuleResolution::Reversed => write!(f, "REVERSED"),
            RuleResolution::SelfRule => write!(f, "SELF_RULE"),
        }
    }
}
