// ==========================================
// 疫苗接种排期 - 接种记录与候选接种
// ==========================================
// 红线: 接种记录落库后不可变、只追加、不删除
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// VaccinationRecord - 接种记录
// ==========================================
/// 已落库的接种事实
///
/// 传输/存储字段与诊所现有记录表一致：儿童、疫苗、接种日期、剂次、反应备注。
/// `record_id` 与 `created_at` 为存储层元数据。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaccinationRecord {
    pub record_id: String,
    pub child_id: String,
    pub vaccine_id: String,
    pub administered_on: NaiveDate,
    pub dose_number: u32,
    #[serde(default)]
    pub reaction_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VaccinationRecord {
    /// 由已通过判定的候选接种生成新记录
    pub fn from_candidate(
        child_id: &str,
        candidate: &Candidate,
        reaction_notes: Option<String>,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4().to_string(),
            child_id: child_id.to_string(),
            vaccine_id: candidate.vaccine_id.clone(),
            administered_on: candidate.date,
            dose_number: candidate.dose_number,
            reaction_notes: reaction_notes.filter(|n| !n.trim().is_empty()),
            created_at: Utc::now(),
        }
    }
}

// ==========================================
// Candidate - 候选接种（未落库）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub vaccine_id: String,
    pub date: NaiveDate,
    pub dose_number: u32,
}

impl Candidate {
    pub fn new(vaccine_id: impl Into<String>, date: NaiveDate, dose_number: u32) -> Self {
        Self {
            vaccine_id: vaccine_id.into(),
            date,
            dose_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_candidate_copies_fields() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let candidate = Candidate::new("MMR", date, 1);

        let record = VaccinationRecord::from_candidate("C001", &candidate, Some("低热".to_string()));

        assert_eq!(record.child_id, "C001");
        assert_eq!(record.vaccine_id, "MMR");
        assert_eq!(record.administered_on, date);
        assert_eq!(record.dose_number, 1);
        assert_eq!(record.reaction_notes.as_deref(), Some("低热"));
        assert!(!record.record_id.is_empty());
    }

    #[test]
    fn test_blank_reaction_notes_are_dropped() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let candidate = Candidate::new("MMR", date, 1);

        let record = VaccinationRecord::from_candidate("C001", &candidate, Some("  ".to_string()));
        assert!(record.reaction_notes.is_none());
    }

    #[test]
    fn test_record_transport_shape() {
        let json = r#"{
            "record_id": "R1",
            "child_id": "C001",
            "vaccine_id": "MMR",
            "administered_on": "2024-01-01",
            "dose_number": 1,
            "created_at": "2024-01-01T08:00:00Z"
        }"#;

        let record: VaccinationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.administered_on, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(record.reaction_notes.is_none());
    }
}
