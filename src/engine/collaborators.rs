// ==========================================
// 疫苗接种排期 - 外部协作方接口
// ==========================================
// 职责: 定义引擎读取历史/规则所需的 trait，实现依赖倒置
// 说明: Engine 层定义 trait，Repository 层实现
// ==========================================

use crate::domain::{IntervalRule, VaccinationRecord};
use crate::engine::error::{RuleRefreshError, StoreError};
use crate::engine::rule_graph::RuleGraph;
use std::sync::{Arc, RwLock};

/// 接种记录来源
pub trait RecordStore: Send + Sync {
    /// 获取儿童接种历史（按接种日期升序）
    fn get_history(&self, child_id: &str) -> Result<Vec<VaccinationRecord>, StoreError>;
}

/// 间隔规则来源
pub trait RuleStore: Send + Sync {
    fn get_all_rules(&self) -> Result<Vec<IntervalRule>, StoreError>;
}

// ==========================================
// RuleGraphHandle - 规则图快照持有者
// ==========================================
/// 规则变更时重建新图并整体替换；正在进行的判定继续使用旧快照
#[derive(Clone, Default)]
pub struct RuleGraphHandle {
    current: Arc<RwLock<Arc<RuleGraph>>>,
}

impl RuleGraphHandle {
    pub fn new(graph: RuleGraph) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(graph))),
        }
    }

    /// 从规则来源构建
    pub fn load_from(store: &dyn RuleStore) -> Result<Self, RuleRefreshError> {
        let rules = store.get_all_rules().map_err(RuleRefreshError::Store)?;
        Ok(Self::new(RuleGraph::load(rules)?))
    }

    /// 当前快照
    pub fn snapshot(&self) -> Arc<RuleGraph> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// 重新读取规则并替换；读取失败或规则被拒绝时保留旧图
    pub fn refresh(&self, store: &dyn RuleStore) -> Result<Arc<RuleGraph>, RuleRefreshError> {
        let rules = store.get_all_rules().map_err(RuleRefreshError::Store)?;
        let graph = Arc::new(RuleGraph::load(rules)?);
        self.replace(Arc::clone(&graph))?;
        Ok(graph)
    }

    pub fn replace(&self, graph: Arc<RuleGraph>) -> Result<(), RuleRefreshError> {
        let mut guard = self
            .current
            .write()
            .map_err(|e| RuleRefreshError::Lock(e.to_string()))?;
        *guard = graph;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedRules(Mutex<Vec<IntervalRule>>);

    impl RuleStore for FixedRules {
        fn get_all_rules(&self) -> Result<Vec<IntervalRule>, StoreError> {
            Ok(self.0.lock().map_err(|e| e.to_string())?.clone())
        }
    }

    #[test]
    fn test_refresh_swaps_graph() {
        let store = FixedRules(Mutex::new(vec![IntervalRule::self_rule("DTaP", 28)]));
        let handle = RuleGraphHandle::load_from(&store).unwrap();
        let before = handle.snapshot();

        store
            .0
            .lock()
            .unwrap()
            .push(IntervalRule::pair("MMR", "Varicella", 28, false));
        handle.refresh(&store).unwrap();

        assert_eq!(before.rule_count(), 1);
        assert_eq!(handle.snapshot().rule_count(), 2);
    }

    #[test]
    fn test_rejected_refresh_keeps_old_graph() {
        let store = FixedRules(Mutex::new(vec![IntervalRule::self_rule("DTaP", 28)]));
        let handle = RuleGraphHandle::load_from(&store).unwrap();

        store
            .0
            .lock()
            .unwrap()
            .push(IntervalRule::self_rule("DTaP", 30));
        let err = handle.refresh(&store).unwrap_err();

        assert!(matches!(err, RuleRefreshError::Graph(_)));
        assert_eq!(handle.snapshot().lookup("DTaP", "DTaP").unwrap().min_interval_days, 28);
    }
}
