// ==========================================
// 疫苗接种排期 - 判定结果
// ==========================================
// 红线: 所有拒绝必须输出原因（可解释、可审计）
// ==========================================

use crate::domain::{Candidate, RejectionKind, RuleRef, SequenceIssue};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 拒绝原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rejection {
    SequenceViolation {
        expected_dose_number: u32,
        requested_dose_number: u32,
        previous_dose_date: Option<NaiveDate>,
        issue: SequenceIssue,
    },
    IntervalViolation {
        earliest_eligible_date: NaiveDate,
        blocking_rule: RuleRef,
        min_interval_days: u32,
        prior_record_id: String,
        prior_vaccine_id: String,
        prior_date: NaiveDate,
    },
    CoadministrationConflict {
        conflicting_vaccine_id: String,
        /// 历史中的同日记录；批次内冲突时为 None
        conflicting_record_id: Option<String>,
        rule: RuleRef,
    },
}

impl Rejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            Rejection::SequenceViolation { .. } => RejectionKind::SequenceViolation,
            Rejection::IntervalViolation { .. } => RejectionKind::IntervalViolation,
            Rejection::CoadministrationConflict { .. } => RejectionKind::CoadministrationConflict,
        }
    }

    /// 人类可读原因
    pub fn reason(&self) -> String {
        match self {
            Rejection::SequenceViolation {
                expected_dose_number,
                requested_dose_number,
                previous_dose_date,
                issue,
            } => match (issue, previous_dose_date) {
                (SequenceIssue::NotAfterPreviousDose, Some(prev)) => format!(
                    "SEQUENCE_VIOLATION: dose {} must be after previous dose on {}",
                    requested_dose_number, prev
                ),
                _ => format!(
                    "SEQUENCE_VIOLATION: expected dose {}, requested {}",
                    expected_dose_number, requested_dose_number
                ),
            },
            Rejection::IntervalViolation {
                earliest_eligible_date,
                blocking_rule,
                min_interval_days,
                prior_vaccine_id,
                prior_date,
                ..
            } => format!(
                "INTERVAL_VIOLATION: rule {} requires {} days after {} on {}, earliest {}",
                blocking_rule, min_interval_days, prior_vaccine_id, prior_date, earliest_eligible_date
            ),
            Rejection::CoadministrationConflict {
                conflicting_vaccine_id,
                rule,
                ..
            } => format!(
                "COADMINISTRATION_CONFLICT: cannot be given on the same day as {} (rule {})",
                conflicting_vaccine_id, rule
            ),
        }
    }
}

/// 单次接种判定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityDecision {
    pub child_id: String,
    pub candidate: Candidate,
    pub eligible: bool,
    pub expected_dose_number: u32,
    /// 剂次校验失败时未计算，为 None；无约束时也为 None
    pub earliest_eligible_date: Option<NaiveDate>,
    pub rejection: Option<Rejection>,
}

impl EligibilityDecision {
    pub fn rejection_kind(&self) -> Option<RejectionKind> {
        self.rejection.as_ref().map(Rejection::kind)
    }

    /// 原因代码（ELIGIBLE 或拒绝类型）
    pub fn reason_code(&self) -> String {
        match &self.rejection {
            Some(rejection) => rejection.kind().to_string(),
            None => "ELIGIBLE".to_string(),
        }
    }

    pub fn reasons(&self) -> Vec<String> {
        match &self.rejection {
            Some(rejection) => vec![rejection.reason()],
            None => vec![format!(
                "ELIGIBLE: dose {} of {} on {}",
                self.candidate.dose_number, self.candidate.vaccine_id, self.candidate.date
            )],
        }
    }
}

/// 批次内禁止同日接种的疫苗对（a < b，与候选顺序无关）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoadministrationConflict {
    pub vaccine_a: String,
    pub vaccine_b: String,
    pub rule: RuleRef,
}

/// 同日批次判定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub child_id: String,
    pub date: NaiveDate,
    pub decisions: Vec<EligibilityDecision>,
    pub conflicts: Vec<CoadministrationConflict>,
}

impl BatchResult {
    /// 整个批次可执行：无同日冲突且每个候选都合格
    pub fn is_accepted(&self) -> bool {
        self.conflicts.is_empty() && self.decisions.iter().all(|d| d.eligible)
    }

    pub fn has_conflict(&self, vaccine_a: &str, vaccine_b: &str) -> bool {
        self.conflicts.iter().any(|c| {
            (c.vaccine_a == vaccine_a && c.vaccine_b == vaccine_b)
                || (c.vaccine_a == vaccine_b && c.vaccine_b == vaccine_a)
        })
    }
}
