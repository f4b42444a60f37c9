// ==========================================
// 疫苗接种排期 - 间隔规则仓储
// ==========================================
// 红线: Repository 不含业务逻辑；规则合法性由 RuleGraph::load 判定，
//       未通过 RuleGraph::load 的目录不落库
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::IntervalRule;
use crate::engine::{RuleGraph, RuleStore, StoreError};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// IntervalRuleRepository - 间隔规则仓储
// ==========================================
pub struct IntervalRuleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl IntervalRuleRepository {
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

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询全部规则（按疫苗、关联疫苗排序）
    pub fn list_all(&self) -> RepositoryResult<Vec<IntervalRule>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT vaccine_id, related_vaccine_id, min_interval_days, can_be_given_together
            FROM interval_rule
            ORDER BY vaccine_id ASC, IFNULL(related_vaccine_id, '') ASC
            "#,
        )?;

        let rules = stmt
            .query_map([], |row| {
                Ok(IntervalRule {
                    vaccine_id: row.get(0)?,
                    related_vaccine_id: row.get(1)?,
                    min_interval_days: row.get(2)?,
                    can_be_given_together: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    /// 整体替换规则目录（单事务）
    ///
    /// 写入前先经 RuleGraph::load 校验；被拒绝时返回 ValidationError，原目录不变。
    ///
    /// # 返回
    /// 写入的规则条数
    pub fn replace_all(&self, rules: &[IntervalRule]) -> RepositoryResult<usize> {
        RuleGraph::load(rules.iter().cloned())
            .map_err(|e| RepositoryError::ValidationError(e.to_string()))?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM interval_rule", [])?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO interval_rule (
                    vaccine_id, related_vaccine_id, min_interval_days, can_be_given_together
                ) VALUES (?1, ?2, ?3, ?4)
                "#,
            )?;
            for rule in rules {
                stmt.execute(params![
                    rule.vaccine_id,
                    rule.related_vaccine_id,
                    rule.min_interval_days,
                    rule.can_be_given_together,
                ])?;
            }
        }

        tx.commit()?;
        tracing::info!(rule_count = rules.len(), "间隔规则目录已替换");
        Ok(rules.len())
    }

    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM interval_rule", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl RuleStore for IntervalRuleRepository {
    fn get_all_rules(&self) -> Result<Vec<IntervalRule>, StoreError> {
        Ok(self.list_all()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn setup() -> IntervalRuleRepository {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        IntervalRuleRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_replace_all_and_list() {
        let repo = setup();
        let rules = vec![
            IntervalRule::self_rule("DTaP", 28),
            IntervalRule::pair("MMR", "Varicella", 28, false),
        ];
        assert_eq!(repo.replace_all(&rules).unwrap(), 2);

        let loaded = repo.list_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].vaccine_id, "DTaP");
        assert!(loaded[0].related_vaccine_id.is_none());
        assert_eq!(loaded[1].related_vaccine_id.as_deref(), Some("Varicella"));
        assert!(!loaded[1].can_be_given_together);
    }

    #[test]
    fn test_replace_all_is_atomic_on_duplicate() {
        let repo = setup();
        repo.replace_all(&[IntervalRule::self_rule("DTaP", 28)]).unwrap();

        let result = repo.replace_all(&[
            IntervalRule::self_rule("HepB", 28),
            IntervalRule::self_rule("HepB", 28),
        ]);
        assert!(matches!(result, Err(RepositoryError::UniqueConstraintViolation(_))));

        let loaded = repo.list_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].vaccine_id, "DTaP");
    }

    #[test]
    fn test_replace_all_rejects_invalid_catalog() {
        let repo = setup();
        repo.replace_all(&[IntervalRule::self_rule("DTaP", 28)]).unwrap();

        let result = repo.replace_all(&[IntervalRule::pair("Hib", "PCV13", 7, true)]);
        assert!(matches!(result, Err(RepositoryError::ValidationError(_))));

        let result = repo.replace_all(&[
            IntervalRule::pair("MMR", "Varicella", 28, false),
            IntervalRule::pair("MMR", "Varicella", 14, false),
        ]);
        assert!(matches!(result, Err(RepositoryError::ValidationError(_))));

        let loaded = repo.list_all().unwrap();
        assert_eq!(loaded, vec![IntervalRule::self_rule("DTaP", 28)]);
    }
}
