// ==========================================
// 疫苗接种排期 - 剂次序列校验
// ==========================================
// 规则: 同一 (儿童, 疫苗) 的剂次号从 1 开始连续，且按接种日期严格递增
// 红线: 无状态、无副作用
// ==========================================

use crate::domain::{Candidate, HistoryIssueKind, SequenceIssue, VaccinationRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 剂次校验结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceResult {
    pub ok: bool,
    pub expected_dose_number: u32,
    pub previous_dose_date: Option<NaiveDate>,
    pub issue: Option<SequenceIssue>,
}

/// 已有历史的完整性问题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryIssue {
    pub vaccine_id: String,
    pub kind: HistoryIssueKind,
    pub dose_number: u32,
    pub record_id: String,
    pub detail: String,
}

// ==========================================
// DoseSequencer - 纯函数工具类
// ==========================================
pub struct DoseSequencer;

impl DoseSequencer {
    /// 校验候选剂次
    ///
    /// # 规则
    /// - expected_dose_number = 该疫苗已有记录数 + 1
    /// - ok ⇔ dose_number == expected 且 (无历史 或 日期严格晚于最近一剂)
    pub fn validate(history: &[VaccinationRecord], candidate: &Candidate) -> SequenceResult {
        let same_vaccine = history
            .iter()
            .filter(|r| r.vaccine_id == candidate.vaccine_id);

        let mut count: u32 = 0;
        let mut previous_dose_date: Option<NaiveDate> = None;
        for record in same_vaccine {
            count += 1;
            previous_dose_date = previous_dose_date.max(Some(record.administered_on));
        }
        let expected_dose_number = count + 1;

        let issue = if candidate.dose_number != expected_dose_number {
            Some(SequenceIssue::DoseNumberMismatch)
        } else if previous_dose_date.is_some_and(|prev| candidate.date <= prev) {
            Some(SequenceIssue::NotAfterPreviousDose)
        } else {
            None
        };

        SequenceResult {
            ok: issue.is_none(),
            expected_dose_number,
            previous_dose_date,
            issue,
        }
    }

    /// 审计已有历史（按疫苗分组）
    ///
    /// # 检查项
    /// - DUPLICATE_DOSE: 剂次号重复
    /// - DOSE_GAP: 剂次号未从 1 连续
    /// - NON_INCREASING_DATE: 剂次号递增但日期未严格递增
    pub fn audit_history(history: &[VaccinationRecord]) -> Vec<HistoryIssue> {
        let mut by_vaccine: BTreeMap<&str, Vec<&VaccinationRecord>> = BTreeMap::new();
        for record in history {
            by_vaccine
                .entry(record.vaccine_id.as_str())
                .or_default()
                .push(record);
        }

        let mut issues = Vec::new();
        for (vaccine_id, mut records) in by_vaccine {
            records.sort_by_key(|r| (r.dose_number, r.administered_on));

            let mut expected: u32 = 1;
            let mut previous: Option<&VaccinationRecord> = None;
            for record in records {
                if let Some(prev) = previous {
                    if prev.dose_number == record.dose_number {
                        issues.push(HistoryIssue {
                            vaccine_id: vaccine_id.to_string(),
                            kind: HistoryIssueKind::DuplicateDose,
                            dose_number: record.dose_number,
                            record_id: record.record_id.clone(),
                            detail: format!("剂次 {} 重复 (另见 {})", record.dose_number, prev.record_id),
                        });
                        continue;
                    }
                    if record.administered_on <= prev.administered_on {
                        issues.push(HistoryIssue {
                            vaccine_id: vaccine_id.to_string(),
                            kind: HistoryIssueKind::NonIncreasingDate,
                            dose_number: record.dose_number,
                            record_id: record.record_id.clone(),
                            detail: format!(
                                "剂次 {} 日期 {} 未晚于剂次 {} 日期 {}",
                                record.dose_number,
                                record.administered_on,
                                prev.dose_number,
                                prev.administered_on
                            ),
                        });
                    }
                }

                if record.dose_number != expected {
                    issues.push(HistoryIssue {
                        vaccine_id: vaccine_id.to_string(),
                        kind: HistoryIssueKind::DoseGap,
                        dose_number: record.dose_number,
                        record_id: record.record_id.clone(),
                        detail: format!("期望剂次 {}，实际 {}", expected, record.dose_number),
                    });
                }

                expected = record.dose_number.saturating_add(1);
                previous = Some(record);
            }
        }

        issues
    }
}
