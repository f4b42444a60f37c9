// ==========================================
// 配置管理器测试（文件数据库）
// ==========================================


#[cfg(test)]
mod config_test {
    use vaccine_scheduler::config::{config_keys, ConfigManager};
    use vaccine_scheduler::db::{open_sqlite_connection, read_schema_version, CURRENT_SCHEMA_VERSION};

    use crate::test_helpers::create_test_db;

    #[test]
    fn test_config_persists_across_managers() {
        let (_tmp, db_path) = create_test_db().unwrap();

        let writer = ConfigManager::new(&db_path).unwrap();
        writer.set_config_value(config_keys::BUSY_TIMEOUT_MS, "1500").unwrap();
        writer.set_config_value(config_keys::LOG_DECISIONS, "0").unwrap();

        let reader = ConfigManager::new(&db_path).unwrap();
        assert_eq!(reader.get_busy_timeout_ms().unwrap(), 1500);
        assert!(!reader.is_log_decisions().unwrap());
        assert!(reader.is_rules_auto_reload().unwrap());

        let configs = reader.list_configs().unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs.get(config_keys::BUSY_TIMEOUT_MS).map(String::as_str), Some("1500"));
    }

    #[test]
    fn test_snapshot_round_trip_between_databases() {
        let (_tmp_a, db_a) = create_test_db().unwrap();
        let (_tmp_b, db_b) = create_test_db().unwrap();

        let source = ConfigManager::new(&db_a).unwrap();
        source.set_config_value(config_keys::RULES_AUTO_RELOAD, "no").unwrap();
        let snapshot = source.get_config_snapshot().unwrap();

        let target = ConfigManager::new(&db_b).unwrap();
        assert_eq!(target.restore_config_from_snapshot(&snapshot).unwrap(), 1);
        assert!(!target.is_rules_auto_reload().unwrap());
    }

    #[test]
    fn test_schema_version_recorded() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let conn = open_sqlite_connection(&db_path).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }
}
