// ==========================================
// 疫苗接种排期 - 接种记录仓储
// ==========================================
// 红线: Repository 不含业务逻辑；记录只追加，不更新、不删除
// 并发: append_serialized 以 BEGIN IMMEDIATE 事务包住"读历史-判定-写入"，
//       UNIQUE(child_id, vaccine_id, dose_number) 兜底
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::VaccinationRecord;
use crate::engine::{RecordStore, StoreError};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT record_id, child_id, vaccine_id, administered_on, dose_number, reaction_notes, created_at
    FROM vaccination_record
"#;

// ==========================================
// VaccinationRecordRepository - 接种记录仓储
// ==========================================
pub struct VaccinationRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl VaccinationRecordRepository {
    /// 创建新的 VaccinationRecordRepository 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询儿童接种历史（按接种日期、剂次升序）
    pub fn list_by_child(&self, child_id: &str) -> RepositoryResult<Vec<VaccinationRecord>> {
        let conn = self.get_conn()?;
        query_by_child(&conn, child_id)
    }

    /// 按主键查询
    ///
    /// # 返回
    /// - Ok(Some(record)): 找到
    /// - Ok(None): 未找到
    pub fn find_by_id(&self, record_id: &str) -> RepositoryResult<Option<VaccinationRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE record_id = ?1", SELECT_COLUMNS);
        let record = conn
            .query_row(&sql, params![record_id], map_record)
            .optional()?;
        Ok(record)
    }

    /// 串行化的"判定-落库"
    ///
    /// # 流程
    /// 1. BEGIN IMMEDIATE（同库其他写者在 busy_timeout 内等待）
    /// 2. 在事务内读取该儿童历史
    /// 3. 交给 decide 判定；返回 Some(record) 表示接受并写入
    /// 4. COMMIT
    ///
    /// decide 返回的记录必须属于 child_id。
    pub fn append_serialized<T, F>(
        &self,
        child_id: &str,
        decide: F,
    ) -> RepositoryResult<(T, Option<VaccinationRecord>)>
    where
        F: FnOnce(&[VaccinationRecord]) -> (T, Option<VaccinationRecord>),
    {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let history = query_by_child(&tx, child_id)?;
        let (outcome, record) = decide(&history);

        if let Some(record) = &record {
            if record.child_id != child_id {
                return Err(RepositoryError::ValidationError(format!(
                    "记录归属不一致: expected child_id={}, actual={}",
                    child_id, record.child_id
                )));
            }
            insert_record(&tx, record)?;
            tracing::debug!(
                record_id = %record.record_id,
                child_id = %record.child_id,
                vaccine_id = %record.vaccine_id,
                dose_number = record.dose_number,
                "接种记录已写入"
            );
        }

        tx.commit()?;
        Ok((outcome, record))
    }

    /// 补录外部历史（纸质接种本、外院记录），不经过判定
    ///
    /// 仍受唯一索引约束。
    pub fn append_unchecked(&self, record: &VaccinationRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        insert_record(&conn, record)
    }

    /// 统计某儿童的记录数
    pub fn count_by_child(&self, child_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM vaccination_record WHERE child_id = ?1",
            params![child_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl RecordStore for VaccinationRecordRepository {
    fn get_history(&self, child_id: &str) -> Result<Vec<VaccinationRecord>, StoreError> {
        Ok(self.list_by_child(child_id)?)
    }
}

fn query_by_child(conn: &Connection, child_id: &str) -> RepositoryResult<Vec<VaccinationRecord>> {
    let sql = format!(
        "{} WHERE child_id = ?1 ORDER BY administered_on ASC, dose_number ASC, created_at ASC",
        SELECT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(params![child_id], map_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

fn insert_record(conn: &Connection, record: &VaccinationRecord) -> RepositoryResult<()> {
    if record.dose_number == 0 {
        return Err(RepositoryError::FieldValueError {
            field: "dose_number".to_string(),
            message: "剂次必须 >= 1".to_string(),
        });
    }

    conn.execute(
        r#"
        INSERT INTO vaccination_record (
            record_id, child_id, vaccine_id, administered_on,
            dose_number, reaction_notes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            record.record_id,
            record.child_id,
            record.vaccine_id,
            record.administered_on,
            record.dose_number,
            record.reaction_notes,
            record.created_at,
        ],
    )?;
    Ok(())
}

fn map_record(row: &Row<'_>) -> rusqlite::Result<VaccinationRecord> {
    Ok(VaccinationRecord {
        record_id: row.get(0)?,
        child_id: row.get(1)?,
        vaccine_id: row.get(2)?,
        administered_on: row.get(3)?,
        dose_number: row.get(4)?,
        reaction_notes: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::domain::Candidate;
    use chrono::NaiveDate;

    fn setup() -> VaccinationRecordRepository {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        VaccinationRecordRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn record(child: &str, vaccine: &str, date: &str, dose: u32) -> VaccinationRecord {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        VaccinationRecord::from_candidate(child, &Candidate::new(vaccine, date, dose), None)
    }

    #[test]
    fn test_history_sorted_and_filtered_by_child() {
        let repo = setup();
        repo.append_unchecked(&record("C001", "DTaP", "2024-03-01", 2)).unwrap();
        repo.append_unchecked(&record("C001", "DTaP", "2024-01-01", 1)).unwrap();
        repo.append_unchecked(&record("C002", "DTaP", "2024-01-15", 1)).unwrap();

        let history = repo.list_by_child("C001").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].dose_number, 1);
        assert_eq!(history[1].dose_number, 2);
        assert!(history.iter().all(|r| r.child_id == "C001"));
    }

    #[test]
    fn test_find_by_id_round_trips_fields() {
        let repo = setup();
        let mut rec = record("C001", "MMR", "2024-01-01", 1);
        rec.reaction_notes = Some("低热".to_string());
        repo.append_unchecked(&rec).unwrap();

        let found = repo.find_by_id(&rec.record_id).unwrap().unwrap();
        assert_eq!(found.administered_on, rec.administered_on);
        assert_eq!(found.reaction_notes.as_deref(), Some("低热"));
        assert!(repo.find_by_id("missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_dose_hits_unique_index() {
        let repo = setup();
        repo.append_unchecked(&record("C001", "DTaP", "2024-01-01", 1)).unwrap();
        let err = repo
            .append_unchecked(&record("C001", "DTaP", "2024-02-01", 1))
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn test_append_serialized_writes_only_when_accepted() {
        let repo = setup();

        let (seen, written) = repo
            .append_serialized("C001", |history| (history.len(), None))
            .unwrap();
        assert_eq!(seen, 0);
        assert!(written.is_none());
        assert_eq!(repo.count_by_child("C001").unwrap(), 0);

        let rec = record("C001", "DTaP", "2024-01-01", 1);
        let (_, written) = repo
            .append_serialized("C001", |_| ((), Some(rec.clone())))
            .unwrap();
        assert_eq!(written.unwrap().record_id, rec.record_id);
        assert_eq!(repo.count_by_child("C001").unwrap(), 1);
    }

    #[test]
    fn test_append_serialized_rejects_foreign_child() {
        let repo = setup();
        let rec = record("C002", "DTaP", "2024-01-01", 1);
        let result = repo.append_serialized("C001", |_| ((), Some(rec)));

        assert!(matches!(result, Err(RepositoryError::ValidationError(_))));
        assert_eq!(repo.count_by_child("C002").unwrap(), 0);
    }
}
