// ==========================================
// 疫苗接种排期 - 排期引擎
// ==========================================
// 职责: 编排 RuleGraph + IntervalEvaluator + DoseSequencer
// 输出: CanSchedule / ValidateBatch / NextEligibleDate
// 红线: 只读快照，不修改任何历史；"暂不可接种" 以结果值返回
// ==========================================

use crate::domain::{Candidate, VaccinationRecord};
use crate::engine::collaborators::RecordStore;
use crate::engine::decision::{
    BatchResult, CoadministrationConflict, EligibilityDecision, Rejection,
};
use crate::engine::dose_sequencer::DoseSequencer;
use crate::engine::error::EngineError;
use crate::engine::interval::IntervalEvaluator;
use crate::engine::rule_graph::RuleGraph;
use chrono::NaiveDate;
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;

// ==========================================
// SchedulingEngine - 排期引擎
// ==========================================
#[derive(Debug, Clone)]
pub struct SchedulingEngine {
    graph: Arc<RuleGraph>,
}

impl SchedulingEngine {
    pub fn new(graph: Arc<RuleGraph>) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &RuleGraph {
        &self.graph
    }

    // ===== 通过 RecordStore 读取历史 =====

    /// 判定候选接种
    pub fn can_schedule(
        &self,
        records: &dyn RecordStore,
        child_id: &str,
        candidate: &Candidate,
    ) -> Result<EligibilityDecision, EngineError> {
        let history = records.get_history(child_id).map_err(EngineError::Store)?;
        Ok(self.can_schedule_snapshot(child_id, &history, candidate))
    }

    /// 判定同日批次
    pub fn validate_batch(
        &self,
        records: &dyn RecordStore,
        child_id: &str,
        candidates: &[Candidate],
    ) -> Result<BatchResult, EngineError> {
        let history = records.get_history(child_id).map_err(EngineError::Store)?;
        self.validate_batch_snapshot(child_id, &history, candidates)
    }

    /// 下一剂最早可接种日期（None 表示不受约束）
    pub fn next_eligible_date(
        &self,
        records: &dyn RecordStore,
        child_id: &str,
        vaccine_id: &str,
    ) -> Result<Option<NaiveDate>, EngineError> {
        let history = records.get_history(child_id).map_err(EngineError::Store)?;
        Ok(self.next_eligible_date_snapshot(child_id, &history, vaccine_id))
    }

    // ===== 基于调用方提供的历史快照 =====

    /// 判定候选接种
    ///
    /// # 顺序
    /// 1. 剂次校验：失败直接返回 SEQUENCE_VIOLATION（不做间隔判定）
    /// 2. 间隔判定：早于最早日期返回 INTERVAL_VIOLATION
    /// 3. 历史中存在同日且禁止联合接种的记录返回 COADMINISTRATION_CONFLICT
    pub fn can_schedule_snapshot(
        &self,
        child_id: &str,
        history: &[VaccinationRecord],
        candidate: &Candidate,
    ) -> EligibilityDecision {
        let history = history_of(child_id, history);

        let sequence = DoseSequencer::validate(&history, candidate);
        if let Some(issue) = sequence.issue {
            return EligibilityDecision {
                child_id: child_id.to_string(),
                candidate: candidate.clone(),
                eligible: false,
                expected_dose_number: sequence.expected_dose_number,
                earliest_eligible_date: None,
                rejection: Some(Rejection::SequenceViolation {
                    expected_dose_number: sequence.expected_dose_number,
                    requested_dose_number: candidate.dose_number,
                    previous_dose_date: sequence.previous_dose_date,
                    issue,
                }),
            };
        }

        let evaluation = IntervalEvaluator::evaluate(&history, candidate, &self.graph);

        let rejection = if let Some(blocking) = evaluation.blocking_rule {
            Some(Rejection::IntervalViolation {
                earliest_eligible_date: blocking.earliest_eligible_date,
                blocking_rule: blocking.rule,
                min_interval_days: blocking.min_interval_days,
                prior_record_id: blocking.prior_record_id,
                prior_vaccine_id: blocking.prior_vaccine_id,
                prior_date: blocking.prior_date,
            })
        } else {
            evaluation
                .same_day_conflicts
                .into_iter()
                .next()
                .map(|conflict| Rejection::CoadministrationConflict {
                    conflicting_vaccine_id: conflict.vaccine_id,
                    conflicting_record_id: Some(conflict.record_id),
                    rule: conflict.rule,
                })
        };

        EligibilityDecision {
            child_id: child_id.to_string(),
            candidate: candidate.clone(),
            eligible: rejection.is_none(),
            expected_dose_number: sequence.expected_dose_number,
            earliest_eligible_date: evaluation.earliest_eligible_date,
            rejection,
        }
    }

    /// 判定同日批次
    ///
    /// # 规则
    /// - 批次非空、日期一致、同一疫苗不得出现两次，否则 InvalidBatch
    /// - 每个候选独立对照历史判定
    /// - 批次内两两检查联合接种，冲突与间隔结果无关，按 (a < b) 归一化
    pub fn validate_batch_snapshot(
        &self,
        child_id: &str,
        history: &[VaccinationRecord],
        candidates: &[Candidate],
    ) -> Result<BatchResult, EngineError> {
        let date = validate_batch_shape(candidates)?;

        let decisions = candidates
            .iter()
            .map(|candidate| self.can_schedule_snapshot(child_id, history, candidate))
            .collect();

        let mut conflicts = Vec::new();
        for (i, first) in candidates.iter().enumerate() {
            for second in &candidates[i + 1..] {
                if let Some(rule) = self
                    .graph
                    .coadministration_conflict(&first.vaccine_id, &second.vaccine_id)
                {
                    let (vaccine_a, vaccine_b) = if first.vaccine_id <= second.vaccine_id {
                        (first.vaccine_id.clone(), second.vaccine_id.clone())
                    } else {
                        (second.vaccine_id.clone(), first.vaccine_id.clone())
                    };
                    conflicts.push(CoadministrationConflict {
                        vaccine_a,
                        vaccine_b,
                        rule,
                    });
                }
            }
        }
        conflicts.sort_by(|x, y| (&x.vaccine_a, &x.vaccine_b).cmp(&(&y.vaccine_a, &y.vaccine_b)));

        Ok(BatchResult {
            child_id: child_id.to_string(),
            date,
            decisions,
            conflicts,
        })
    }

    /// 下一剂最早可接种日期（忽略剂次约束，用于排期提示）
    pub fn next_eligible_date_snapshot(
        &self,
        child_id: &str,
        history: &[VaccinationRecord],
        vaccine_id: &str,
    ) -> Option<NaiveDate> {
        let history = history_of(child_id, history);
        IntervalEvaluator::binding_constraint(&history, vaccine_id, &self.graph)
            .map(|b| b.earliest_eligible_date)
    }
}

// ==========================================
// 辅助函数
// ==========================================

// 仅保留该儿童的记录；快照本就属于该儿童时不复制
fn history_of<'a>(child_id: &str, history: &'a [VaccinationRecord]) -> Cow<'a, [VaccinationRecord]> {
    if history.iter().all(|r| r.child_id == child_id) {
        Cow::Borrowed(history)
    } else {
        Cow::Owned(
            history
                .iter()
                .filter(|r| r.child_id == child_id)
                .cloned()
                .collect(),
        )
    }
}

fn validate_batch_shape(candidates: &[Candidate]) -> Result<NaiveDate, EngineError> {
    let first = candidates
        .first()
        .ok_or_else(|| EngineError::InvalidBatch("批次为空".to_string()))?;

    let mut seen = HashSet::new();
    for candidate in candidates {
        if candidate.date != first.date {
            return Err(EngineError::InvalidBatch(format!(
                "批次日期不一致: {} vs {}",
                first.date, candidate.date
            )));
        }
        if !seen.insert(candidate.vaccine_id.as_str()) {
            return Err(EngineError::InvalidBatch(format!(
                "同一疫苗在批次中出现多次: {}",
                candidate.vaccine_id
            )));
        }
    }

    Ok(first.date)
}
