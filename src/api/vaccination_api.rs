// ==========================================
// 疫苗接种排期 - 接种 API
// ==========================================
// 职责:
// 1. 可接种判定 / 同日批次判定 / 下一剂最早日期
// 2. 串行化的"判定-落库"（同一儿童不会因并发出现重复剂次）
// 3. 规则目录导入与规则图重建替换
// 4. 历史完整性审计
// ==========================================

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::db::{configure_sqlite_connection_with_timeout, init_schema, open_sqlite_connection};
use crate::domain::{Candidate, VaccinationRecord};
use crate::engine::{
    AdministrationEvent, BatchResult, DoseSequencer, EligibilityDecision, HistoryIssue,
    OptionalEventPublisher, RuleGraph, RuleGraphHandle, SchedulingEngine,
};
use crate::importer::{RuleCsvImporter, RuleImportSummary};
use crate::repository::{IntervalRuleRepository, VaccinationRecordRepository};

const EVENT_SOURCE: &str = "vaccination_api";

/// 登记接种结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdministrationOutcome {
    pub decision: EligibilityDecision,
    /// 判定通过时新写入的记录
    pub record: Option<VaccinationRecord>,
}

impl AdministrationOutcome {
    pub fn is_recorded(&self) -> bool {
        self.record.is_some()
    }
}

/// 规则图重建结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleReloadSummary {
    pub rule_count: usize,
    pub self_rules: usize,
    pub pair_rules: usize,
}

impl From<&RuleGraph> for RuleReloadSummary {
    fn from(graph: &RuleGraph) -> Self {
        Self {
            rule_count: graph.rule_count(),
            self_rules: graph.self_rule_count(),
            pair_rules: graph.pair_count(),
        }
    }
}

// ==========================================
// VaccinationApi - 接种 API
// ==========================================
pub struct VaccinationApi {
    record_repo: Arc<VaccinationRecordRepository>,
    rule_repo: Arc<IntervalRuleRepository>,
    config: Arc<ConfigManager>,
    rules: RuleGraphHandle,
    publisher: OptionalEventPublisher,
}

impl VaccinationApi {
    /// 创建 VaccinationApi，并从规则仓储构建初始规则图
    ///
    /// 规则目录被拒绝时返回 RuleCatalogRejected，不以空规则启动。
    pub fn new(
        record_repo: Arc<VaccinationRecordRepository>,
        rule_repo: Arc<IntervalRuleRepository>,
        config: Arc<ConfigManager>,
        publisher: OptionalEventPublisher,
    ) -> ApiResult<Self> {
        let rules = RuleGraphHandle::load_from(&*rule_repo)?;
        let graph = rules.snapshot();
        tracing::info!(
            rule_count = graph.rule_count(),
            self_rules = graph.self_rule_count(),
            pair_rules = graph.pair_count(),
            "规则图已加载"
        );

        Ok(Self {
            record_repo,
            rule_repo,
            config,
            rules,
            publisher,
        })
    }

    /// 打开数据库（初始化 schema）并组装 API
    ///
    /// 所有仓储共享同一连接；busy_timeout 取自配置。
    pub fn open(db_path: &str, publisher: OptionalEventPublisher) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        init_schema(&conn).map_err(|e| ApiError::DatabaseError(e.to_string()))?;
        let conn = Arc::new(Mutex::new(conn));

        let config = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| ApiError::ConfigError(e.to_string()))?,
        );
        let busy_timeout_ms = config
            .get_busy_timeout_ms()
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        {
            let guard = conn
                .lock()
                .map_err(|e| ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", e)))?;
            configure_sqlite_connection_with_timeout(&guard, busy_timeout_ms)
                .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        }

        let record_repo = Arc::new(VaccinationRecordRepository::from_connection(conn.clone()));
        let rule_repo = Arc::new(IntervalRuleRepository::from_connection(conn));
        Self::new(record_repo, rule_repo, config, publisher)
    }

    /// 当前规则图快照
    pub fn rule_graph(&self) -> Arc<RuleGraph> {
        self.rules.snapshot()
    }

    fn engine(&self) -> SchedulingEngine {
        SchedulingEngine::new(self.rules.snapshot())
    }

    // ==========================================
    // 判定查询
    // ==========================================

    /// 判定单个候选接种
    #[instrument(skip(self, candidate), fields(vaccine_id = %candidate.vaccine_id, dose_number = candidate.dose_number))]
    pub fn can_schedule(&self, child_id: &str, candidate: &Candidate) -> ApiResult<EligibilityDecision> {
        validate_child_id(child_id)?;
        validate_candidate(candidate)?;

        let decision = self
            .engine()
            .can_schedule(&*self.record_repo, child_id, candidate)?;
        self.log_decision(&decision);
        Ok(decision)
    }

    /// 判定同日批次
    #[instrument(skip(self, candidates), fields(batch_size = candidates.len()))]
    pub fn validate_batch(&self, child_id: &str, candidates: &[Candidate]) -> ApiResult<BatchResult> {
        validate_child_id(child_id)?;
        for candidate in candidates {
            validate_candidate(candidate)?;
        }

        let result = self
            .engine()
            .validate_batch(&*self.record_repo, child_id, candidates)?;

        for decision in &result.decisions {
            self.log_decision(decision);
        }
        if !result.conflicts.is_empty() {
            tracing::info!(
                child_id = %child_id,
                date = %result.date,
                conflicts = result.conflicts.len(),
                "同日批次存在禁止联合接种的疫苗对"
            );
        }
        Ok(result)
    }

    /// 下一剂最早可接种日期（None 表示不受间隔约束）
    #[instrument(skip(self))]
    pub fn next_eligible_date(&self, child_id: &str, vaccine_id: &str) -> ApiResult<Option<NaiveDate>> {
        validate_child_id(child_id)?;
        if vaccine_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("疫苗ID不能为空".to_string()));
        }

        Ok(self
            .engine()
            .next_eligible_date(&*self.record_repo, child_id, vaccine_id)?)
    }

    // ==========================================
    // 登记接种
    // ==========================================

    /// 判定并登记接种
    ///
    /// 判定与写入在同一写事务内完成：并发登记同一剂次时，
    /// 后到者读到先到者的记录，得到 SEQUENCE_VIOLATION 判定而不是重复落库。
    #[instrument(skip(self, candidate, reaction_notes), fields(vaccine_id = %candidate.vaccine_id, dose_number = candidate.dose_number))]
    pub fn record_administration(
        &self,
        child_id: &str,
        candidate: &Candidate,
        reaction_notes: Option<String>,
    ) -> ApiResult<AdministrationOutcome> {
        validate_child_id(child_id)?;
        validate_candidate(candidate)?;

        let engine = self.engine();
        let (decision, record) = self.record_repo.append_serialized(child_id, |history| {
            let decision = engine.can_schedule_snapshot(child_id, history, candidate);
            let record = decision
                .eligible
                .then(|| VaccinationRecord::from_candidate(child_id, candidate, reaction_notes));
            (decision, record)
        })?;

        self.log_decision(&decision);

        if let Some(record) = &record {
            tracing::info!(
                record_id = %record.record_id,
                child_id = %record.child_id,
                vaccine_id = %record.vaccine_id,
                dose_number = record.dose_number,
                administered_on = %record.administered_on,
                "接种已登记"
            );
            self.publish(AdministrationEvent::record_appended(
                &record.child_id,
                &record.vaccine_id,
                record.dose_number,
                record.administered_on,
                Some(EVENT_SOURCE.to_string()),
            ));
        }

        Ok(AdministrationOutcome { decision, record })
    }

    /// 儿童接种历史（按接种日期升序）
    pub fn history(&self, child_id: &str) -> ApiResult<Vec<VaccinationRecord>> {
        validate_child_id(child_id)?;
        Ok(self.record_repo.list_by_child(child_id)?)
    }

    /// 审计已有历史的完整性（剂次缺口、重复剂次、日期不递增）
    pub fn audit_history(&self, child_id: &str) -> ApiResult<Vec<HistoryIssue>> {
        validate_child_id(child_id)?;
        let history = self.record_repo.list_by_child(child_id)?;
        let issues = DoseSequencer::audit_history(&history);

        if !issues.is_empty() {
            tracing::warn!(child_id = %child_id, issue_count = issues.len(), "接种历史存在完整性问题");
        }
        Ok(issues)
    }

    // ==========================================
    // 规则目录
    // ==========================================

    /// 从规则仓储重建规则图并替换
    ///
    /// 新规则集被拒绝时旧规则图继续生效。
    #[instrument(skip(self))]
    pub fn reload_rules(&self) -> ApiResult<RuleReloadSummary> {
        let graph = self.rules.refresh(&*self.rule_repo).map_err(|e| {
            tracing::warn!(error = %e, "规则图重建失败，保留当前规则图");
            e
        })?;

        let summary = RuleReloadSummary::from(&*graph);
        tracing::info!(
            rule_count = summary.rule_count,
            self_rules = summary.self_rules,
            pair_rules = summary.pair_rules,
            "规则图已替换"
        );
        self.publish(AdministrationEvent::rules_reloaded(Some(EVENT_SOURCE.to_string())));
        Ok(summary)
    }

    /// 导入规则目录 CSV；rules_auto_reload 打开时随即替换规则图
    #[instrument(skip(self, path))]
    pub fn import_rules_csv<P: AsRef<Path>>(&self, path: P) -> ApiResult<RuleImportSummary> {
        let summary = RuleCsvImporter::new(self.rule_repo.clone()).import_file(path)?;

        let auto_reload = self.config.is_rules_auto_reload().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "读取 rules_auto_reload 失败，按默认值处理");
            true
        });
        if auto_reload {
            self.reload_rules()?;
        }

        Ok(summary)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn log_decision(&self, decision: &EligibilityDecision) {
        let enabled = self.config.is_log_decisions().unwrap_or(true);
        if !enabled {
            return;
        }

        tracing::info!(
            child_id = %decision.child_id,
            vaccine_id = %decision.candidate.vaccine_id,
            dose_number = decision.candidate.dose_number,
            date = %decision.candidate.date,
            eligible = decision.eligible,
            reason_code = %decision.reason_code(),
            earliest_eligible_date = ?decision.earliest_eligible_date,
            "接种判定"
        );
    }

    fn publish(&self, event: AdministrationEvent) {
        let event_type = event.event_type.as_str().to_string();
        if let Err(e) = self.publisher.publish(event) {
            tracing::warn!(event_type = %event_type, error = %e, "事件发布失败");
        }
    }
}

fn validate_child_id(child_id: &str) -> ApiResult<()> {
    if child_id.trim().is_empty() {
        return Err(ApiError::InvalidInput("儿童ID不能为空".to_string()));
    }
    Ok(())
}

fn validate_candidate(candidate: &Candidate) -> ApiResult<()> {
    if candidate.vaccine_id.trim().is_empty() {
        return Err(ApiError::InvalidInput("疫苗ID不能为空".to_string()));
    }
    if candidate.dose_number == 0 {
        return Err(ApiError::InvalidInput("剂次必须 >= 1".to_string()));
    }
    Ok(())
}
