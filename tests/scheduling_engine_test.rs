// ==========================================
// 排期引擎集成测试
// ==========================================
// 职责: 通过 RecordStore/RuleStore 协作方验证判定行为
// ==========================================


#[cfg(test)]
mod scheduling_engine_test {
    use std::sync::Arc;

    use vaccine_scheduler::domain::{IntervalRule, RejectionKind, RuleRef, VaccinationRecord};
    use vaccine_scheduler::engine::{
        EngineError, RecordStore, Rejection, RuleGraph, RuleGraphError, RuleGraphHandle,
        RuleStore, SchedulingEngine, StoreError,
    };

    use crate::test_helpers::{candidate, date, record, standard_rules};

    // ==========================================
    // 测试辅助
    // ==========================================

    struct MemoryRecords(Vec<VaccinationRecord>);

    impl RecordStore for MemoryRecords {
        fn get_history(&self, child_id: &str) -> Result<Vec<VaccinationRecord>, StoreError> {
            let mut history: Vec<_> = self
                .0
                .iter()
                .filter(|r| r.child_id == child_id)
                .cloned()
                .collect();
            history.sort_by_key(|r| (r.administered_on, r.dose_number));
            Ok(history)
        }
    }

    struct UnavailableRecords;

    impl RecordStore for UnavailableRecords {
        fn get_history(&self, _child_id: &str) -> Result<Vec<VaccinationRecord>, StoreError> {
            Err("record store offline".into())
        }
    }

    struct MemoryRules(Vec<IntervalRule>);

    impl RuleStore for MemoryRules {
        fn get_all_rules(&self) -> Result<Vec<IntervalRule>, StoreError> {
            Ok(self.0.clone())
        }
    }

    fn engine(rules: Vec<IntervalRule>) -> SchedulingEngine {
        SchedulingEngine::new(Arc::new(RuleGraph::load(rules).unwrap()))
    }

    // ==========================================
    // 典型场景: MMR → Varicella 28 天
    // ==========================================

    #[test]
    fn test_mmr_varicella_scenario() {
        let engine = engine(vec![IntervalRule::pair("MMR", "Varicella", 28, false)]);
        let store = MemoryRecords(vec![record("C001", "MMR", date(2024, 1, 1), 1)]);

        let early = engine
            .can_schedule(&store, "C001", &candidate("Varicella", date(2024, 1, 20), 1))
            .unwrap();
        assert!(!early.eligible);
        assert_eq!(early.rejection_kind(), Some(RejectionKind::IntervalViolation));
        assert_eq!(early.earliest_eligible_date, Some(date(2024, 1, 29)));
        match early.rejection.as_ref().unwrap() {
            Rejection::IntervalViolation {
                blocking_rule,
                min_interval_days,
                prior_vaccine_id,
                ..
            } => {
                assert_eq!(blocking_rule, &RuleRef::pair("MMR", "Varicella"));
                assert_eq!(*min_interval_days, 28);
                assert_eq!(prior_vaccine_id, "MMR");
            }
            other => panic!("unexpected rejection: {:?}", other),
        }

        let on_time = engine
            .can_schedule(&store, "C001", &candidate("Varicella", date(2024, 1, 29), 1))
            .unwrap();
        assert!(on_time.eligible);
        assert_eq!(on_time.reason_code(), "ELIGIBLE");

        for day in [date(2024, 1, 2), date(2024, 1, 29), date(2024, 6, 1)] {
            let wrong_dose = engine
                .can_schedule(&store, "C001", &candidate("Varicella", day, 2))
                .unwrap();
            assert_eq!(wrong_dose.rejection_kind(), Some(RejectionKind::SequenceViolation));
            assert_eq!(wrong_dose.expected_dose_number, 1);
        }
    }

    #[test]
    fn test_no_rule_batch_has_no_conflict() {
        let engine = engine(standard_rules());
        let store = MemoryRecords(vec![]);

        let result = engine
            .validate_batch(
                &store,
                "C001",
                &[
                    candidate("VaccineA", date(2024, 3, 1), 1),
                    candidate("VaccineB", date(2024, 3, 1), 1),
                ],
            )
            .unwrap();

        assert!(result.conflicts.is_empty());
        assert!(result.is_accepted());
    }

    // ==========================================
    // 可测试性质
    // ==========================================

    #[test]
    fn test_unrelated_vaccine_always_eligible() {
        let engine = engine(standard_rules());
        let store = MemoryRecords(vec![
            record("C001", "MMR", date(2024, 1, 1), 1),
            record("C001", "DTaP", date(2024, 1, 1), 1),
        ]);

        for day in [date(2023, 12, 1), date(2024, 1, 1), date(2024, 1, 2), date(2030, 1, 1)] {
            let decision = engine
                .can_schedule(&store, "C001", &candidate("HepB", day, 1))
                .unwrap();
            assert!(decision.eligible, "HepB on {} should be eligible", day);
            assert_eq!(decision.earliest_eligible_date, None);
        }
    }

    #[test]
    fn test_interval_boundary_is_inclusive() {
        let last_a = date(2024, 2, 10);
        for d in [1u32, 7, 28, 60, 365] {
            let engine = engine(vec![IntervalRule::pair("A", "B", d, false)]);
            let store = MemoryRecords(vec![record("C001", "A", last_a, 1)]);
            let boundary = last_a + chrono::Duration::days(i64::from(d));

            let before = engine
                .can_schedule(&store, "C001", &candidate("B", boundary - chrono::Duration::days(1), 1))
                .unwrap();
            let exact = engine
                .can_schedule(&store, "C001", &candidate("B", boundary, 1))
                .unwrap();

            assert!(!before.eligible, "d={}", d);
            assert_eq!(before.earliest_eligible_date, Some(boundary));
            assert!(exact.eligible, "d={}", d);
        }
    }

    #[test]
    fn test_only_next_dose_number_passes() {
        let engine = engine(vec![IntervalRule::self_rule("DTaP", 28)]);
        let store = MemoryRecords(vec![
            record("C001", "DTaP", date(2024, 1, 1), 1),
            record("C001", "DTaP", date(2024, 2, 1), 2),
        ]);

        // 间隔早已满足，只有剂次 3 可通过
        let on = date(2025, 1, 1);
        for dose in 1..=5 {
            let decision = engine
                .can_schedule(&store, "C001", &candidate("DTaP", on, dose))
                .unwrap();
            if dose == 3 {
                assert!(decision.eligible);
            } else {
                assert_eq!(decision.rejection_kind(), Some(RejectionKind::SequenceViolation));
                assert_eq!(decision.expected_dose_number, 3);
            }
        }
    }

    #[test]
    fn test_batch_conflict_is_order_independent() {
        let engine = engine(standard_rules());
        let store = MemoryRecords(vec![]);
        let on = date(2024, 5, 1);

        let forward = engine
            .validate_batch(&store, "C001", &[candidate("MMR", on, 1), candidate("Varicella", on, 1)])
            .unwrap();
        let backward = engine
            .validate_batch(&store, "C001", &[candidate("Varicella", on, 1), candidate("MMR", on, 1)])
            .unwrap();

        assert!(forward.has_conflict("MMR", "Varicella"));
        assert_eq!(forward.conflicts, backward.conflicts);
        assert!(!forward.is_accepted());

        let allowed = engine
            .validate_batch(&store, "C001", &[candidate("PCV13", on, 1), candidate("Hib", on, 1)])
            .unwrap();
        assert!(allowed.conflicts.is_empty());
    }

    #[test]
    fn test_rule_resolution_is_order_independent() {
        let graph = Arc::new(RuleGraph::load(vec![IntervalRule::pair("A", "B", 14, false)]).unwrap());
        let engine = SchedulingEngine::new(graph.clone());

        assert_eq!(graph.lookup("A", "B").unwrap().min_interval_days, 14);
        assert_eq!(graph.lookup("B", "A").unwrap().min_interval_days, 14);

        let first = date(2024, 4, 1);
        let a_then_b = MemoryRecords(vec![record("C001", "A", first, 1)]);
        let b_then_a = MemoryRecords(vec![record("C001", "B", first, 1)]);

        let next_b = engine.next_eligible_date(&a_then_b, "C001", "B").unwrap();
        let next_a = engine.next_eligible_date(&b_then_a, "C001", "A").unwrap();
        assert_eq!(next_b, Some(date(2024, 4, 15)));
        assert_eq!(next_a, next_b);
    }

    // ==========================================
    // 同日冲突与历史
    // ==========================================

    #[test]
    fn test_same_day_history_record_conflicts() {
        let engine = engine(vec![IntervalRule::pair("Hib", "PCV13", 0, false)]);
        let on = date(2024, 7, 1);
        let store = MemoryRecords(vec![record("C001", "PCV13", on, 1)]);

        let decision = engine
            .can_schedule(&store, "C001", &candidate("Hib", on, 1))
            .unwrap();
        assert_eq!(decision.rejection_kind(), Some(RejectionKind::CoadministrationConflict));

        let next_day = engine
            .can_schedule(&store, "C001", &candidate("Hib", date(2024, 7, 2), 1))
            .unwrap();
        assert!(next_day.eligible);
    }

    #[test]
    fn test_other_children_are_ignored() {
        let engine = engine(standard_rules());
        let store = MemoryRecords(vec![record("C002", "MMR", date(2024, 1, 1), 1)]);

        let decision = engine
            .can_schedule(&store, "C001", &candidate("Varicella", date(2024, 1, 2), 1))
            .unwrap();
        assert!(decision.eligible);
    }

    // ==========================================
    // 错误路径
    // ==========================================

    #[test]
    fn test_invalid_batches_are_errors() {
        let engine = engine(standard_rules());
        let store = MemoryRecords(vec![]);

        let empty = engine.validate_batch(&store, "C001", &[]);
        assert!(matches!(empty, Err(EngineError::InvalidBatch(_))));

        let mixed = engine.validate_batch(
            &store,
            "C001",
            &[candidate("MMR", date(2024, 1, 1), 1), candidate("Hib", date(2024, 1, 2), 1)],
        );
        assert!(matches!(mixed, Err(EngineError::InvalidBatch(_))));

        let repeated = engine.validate_batch(
            &store,
            "C001",
            &[candidate("MMR", date(2024, 1, 1), 1), candidate("MMR", date(2024, 1, 1), 2)],
        );
        assert!(matches!(repeated, Err(EngineError::InvalidBatch(_))));
    }

    #[test]
    fn test_store_failure_is_propagated() {
        let engine = engine(standard_rules());
        let result = engine.can_schedule(&UnavailableRecords, "C001", &candidate("MMR", date(2024, 1, 1), 1));
        assert!(matches!(result, Err(EngineError::Store(_))));
    }

    #[test]
    fn test_conflicting_catalog_is_rejected_at_load() {
        let differing = RuleGraph::load(vec![
            IntervalRule::pair("MMR", "Varicella", 28, false),
            IntervalRule::pair("MMR", "Varicella", 30, false),
        ]);
        assert!(matches!(differing, Err(RuleGraphError::ConflictingRule { .. })));

        let both_self_forms = RuleGraph::load(vec![
            IntervalRule::self_rule("DTaP", 28),
            IntervalRule::pair("DTaP", "DTaP", 28, false),
        ]);
        assert!(matches!(both_self_forms, Err(RuleGraphError::ConflictingRule { .. })));
    }

    #[test]
    fn test_handle_keeps_previous_graph_on_rejected_refresh() {
        let handle = RuleGraphHandle::load_from(&MemoryRules(standard_rules())).unwrap();
        let in_flight = handle.snapshot();

        let bad = MemoryRules(vec![
            IntervalRule::self_rule("DTaP", 28),
            IntervalRule::self_rule("DTaP", 21),
        ]);
        assert!(handle.refresh(&bad).is_err());
        assert_eq!(handle.snapshot().rule_count(), in_flight.rule_count());

        let good = MemoryRules(vec![IntervalRule::self_rule("HepB", 28)]);
        handle.refresh(&good).unwrap();
        assert_eq!(handle.snapshot().rule_count(), 1);
        assert_eq!(in_flight.rule_count(), 3);
    }
}
