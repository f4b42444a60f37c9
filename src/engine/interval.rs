// ==========================================
// 疫苗接种排期 - 接种间隔判定
// ==========================================
// 职责: 根据接种历史与规则图计算最早可接种日期
// 红线: 无状态、无副作用、无 I/O 操作
// ==========================================
// 约束取值: 所有单条约束日期中的最大值（最晚者为绑定约束）
// 并列处理: 优先最近一次接种的历史记录
// ==========================================

use crate::domain::{Candidate, RuleRef, VaccinationRecord};
use crate::engine::rule_graph::RuleGraph;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// 绑定约束（产生最晚约束日期的那条规则与历史记录）
///
/// 约束日期超出 NaiveDate 可表示范围时，earliest_eligible_date 记为 NaiveDate::MAX，
/// 且 beyond_date_range = true：任何可表示的日期都不满足该约束。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingConstraint {
    pub earliest_eligible_date: NaiveDate,
    pub beyond_date_range: bool,
    pub rule: RuleRef,
    pub min_interval_days: u32,
    pub prior_record_id: String,
    pub prior_vaccine_id: String,
    pub prior_date: NaiveDate,
}

/// 历史中同日且禁止联合接种的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SameDayConflict {
    pub record_id: String,
    pub vaccine_id: String,
    pub rule: RuleRef,
}

/// 间隔判定结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub eligible: bool,
    /// None 表示不受任何规则约束
    pub earliest_eligible_date: Option<NaiveDate>,
    /// 仅在不合格时给出
    pub blocking_rule: Option<BindingConstraint>,
    pub same_day_conflicts: Vec<SameDayConflict>,
}

// ==========================================
// IntervalEvaluator - 纯函数工具类
// ==========================================
pub struct IntervalEvaluator;

impl IntervalEvaluator {
    /// 判定候选接种是否满足间隔约束
    ///
    /// # 规则
    /// - 不同疫苗的历史记录: prior_date + min_interval_days(prior → candidate)
    /// - 同一疫苗: 仅使用最近一剂 + 自身规则间隔
    /// - 可联合接种的规则只用于同日判定，不参与间隔计算
    /// - eligible ⇔ candidate.date >= earliest_eligible_date
    /// - 约束日期溢出时不合格
    pub fn evaluate(
        history: &[VaccinationRecord],
        candidate: &Candidate,
        graph: &RuleGraph,
    ) -> EvaluationResult {
        let binding = Self::binding_constraint(history, &candidate.vaccine_id, graph);
        let earliest_eligible_date = binding.as_ref().map(|b| b.earliest_eligible_date);

        let eligible = match &binding {
            Some(b) => !b.beyond_date_range && candidate.date >= b.earliest_eligible_date,
            None => true,
        };

        EvaluationResult {
            eligible,
            earliest_eligible_date,
            blocking_rule: if eligible { None } else { binding },
            same_day_conflicts: Self::same_day_conflicts(history, candidate, graph),
        }
    }

    /// 计算某疫苗下一剂的绑定约束（不考虑候选日期与剂次）
    ///
    /// # 返回
    /// - Some(BindingConstraint): 最晚的约束
    /// - None: 无任何适用规则
    pub fn binding_constraint(
        history: &[VaccinationRecord],
        vaccine_id: &str,
        graph: &RuleGraph,
    ) -> Option<BindingConstraint> {
        // (约束日期, 是否溢出, 历史接种日期, 历史位置) 取最大
        let mut best: Option<((NaiveDate, bool, NaiveDate, usize), BindingConstraint)> = None;

        let mut consider = |index: usize, record: &VaccinationRecord| {
            let Some(rule) = graph.lookup(&record.vaccine_id, vaccine_id) else {
                return;
            };
            if record.vaccine_id != vaccine_id && rule.can_coadminister {
                return;
            }

            let (earliest, beyond_date_range) =
                match add_days(record.administered_on, rule.min_interval_days) {
                    Some(date) => (date, false),
                    None => (NaiveDate::MAX, true),
                };
            let rank = (earliest, beyond_date_range, record.administered_on, index);
            if best.as_ref().map_or(true, |(current, _)| rank > *current) {
                best = Some((
                    rank,
                    BindingConstraint {
                        earliest_eligible_date: earliest,
                        beyond_date_range,
                        rule: rule.source,
                        min_interval_days: rule.min_interval_days,
                        prior_record_id: record.record_id.clone(),
                        prior_vaccine_id: record.vaccine_id.clone(),
                        prior_date: record.administered_on,
                    },
                ));
            }
        };

        // 同一疫苗只取最近一剂（日期相同取历史中靠后者）
        let mut latest_same: Option<(usize, &VaccinationRecord)> = None;

        for (index, record) in history.iter().enumerate() {
            if record.vaccine_id == vaccine_id {
                let newer = latest_same
                    .map_or(true, |(_, latest)| record.administered_on >= latest.administered_on);
                if newer {
                    latest_same = Some((index, record));
                }
            } else {
                consider(index, record);
            }
        }

        if let Some((index, record)) = latest_same {
            consider(index, record);
        }

        best.map(|(_, constraint)| constraint)
    }

    /// 历史中与候选同日、且规则禁止联合接种的记录
    pub fn same_day_conflicts(
        history: &[VaccinationRecord],
        candidate: &Candidate,
        graph: &RuleGraph,
    ) -> Vec<SameDayConflict> {
        history
            .iter()
            .filter(|r| r.administered_on == candidate.date && r.vaccine_id != candidate.vaccine_id)
            .filter_map(|r| {
                graph
                    .coadministration_conflict(&r.vaccine_id, &candidate.vaccine_id)
                    .map(|rule| SameDayConflict {
                        record_id: r.record_id.clone(),
                        vaccine_id: r.vaccine_id.clone(),
                        rule,
                    })
            })
            .collect()
    }
}

fn add_days(date: NaiveDate, days: u32) -> Option<NaiveDate> {
    date.checked_add_days(Days::new(u64::from(days)))
}
