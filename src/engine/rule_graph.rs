// ==========================================
// 疫苗接种排期 - 规则图
// ==========================================
// 职责: 按疫苗对索引间隔规则，解析方向与重复
// 红线: 加载后只读；规则变更时重建并替换，不原地修改
// 红线: 同一有序疫苗对的冲突规则在加载时拒绝，不静默覆盖
// ==========================================

use crate::domain::{IntervalRule, RuleDefinition, RuleRef, RuleResolution};
use crate::engine::error::RuleGraphError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ==========================================
// DirectedRule - 方向化规则查询结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectedRule {
    pub from_vaccine: String,
    pub to_vaccine: String,
    pub min_interval_days: u32,
    pub can_coadminister: bool,
    /// 实际生效的声明规则
    pub source: RuleRef,
    pub resolution: RuleResolution,
}

// 成对规则条目：定义 + 禁止同日接种的声明来源
#[derive(Debug, Clone)]
struct PairEntry {
    definition: RuleDefinition,
    forbidding: Option<RuleRef>,
}

// ==========================================
// RuleGraph - 规则图
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct RuleGraph {
    self_rules: HashMap<String, RuleDefinition>,
    pair_rules: HashMap<(String, String), PairEntry>,
    // 去重后的声明规则，按 (vaccine_id, related_vaccine_id) 排序
    declared: BTreeMap<(String, Option<String>), IntervalRule>,
}

impl RuleGraph {
    /// 加载规则
    ///
    /// # 规则
    /// 1. 疫苗 ID 不能为空；可联合接种的规则间隔必须为 0
    /// 2. 同一有序对完全相同的重复声明合并；取值不同则 ConflictingRule
    /// 3. related 为空与 related == vaccine_id 同时声明自身规则 → ConflictingRule
    /// 4. 成对规则按无序对合并两个方向；任一方向禁止同日接种则该对禁止
    pub fn load<I>(rules: I) -> Result<Self, RuleGraphError>
    where
        I: IntoIterator<Item = IntervalRule>,
    {
        let mut graph = RuleGraph::default();

        for rule in rules {
            let rule = normalize(rule)?;

            let key = (rule.vaccine_id.clone(), rule.related_vaccine_id.clone());
            if let Some(existing) = graph.declared.get(&key) {
                if existing == &rule {
                    continue;
                }
                return Err(RuleGraphError::ConflictingRule {
                    from: rule.vaccine_id.clone(),
                    to: target_of(&rule).to_string(),
                    existing: existing.clone(),
                    incoming: rule,
                });
            }

            if rule.is_self_referential() {
                graph.insert_self_rule(&rule)?;
            } else {
                graph.insert_pair_rule(&rule);
            }
            graph.declared.insert(key, rule);
        }

        Ok(graph)
    }

    fn insert_self_rule(&mut self, rule: &IntervalRule) -> Result<(), RuleGraphError> {
        // 另一种声明形式已存在：不猜测优先级
        if self.self_rules.contains_key(&rule.vaccine_id) {
            let other_form = match &rule.related_vaccine_id {
                Some(_) => (rule.vaccine_id.clone(), None),
                None => (rule.vaccine_id.clone(), Some(rule.vaccine_id.clone())),
            };
            let existing = self
                .declared
                .get(&other_form)
                .cloned()
                .unwrap_or_else(|| IntervalRule::self_rule(rule.vaccine_id.clone(), 0));
            return Err(RuleGraphError::ConflictingRule {
                from: rule.vaccine_id.clone(),
                to: rule.vaccine_id.clone(),
                existing,
                incoming: rule.clone(),
            });
        }

        self.self_rules.insert(
            rule.vaccine_id.clone(),
            RuleDefinition::SelfRule {
                vaccine_id: rule.vaccine_id.clone(),
                interval_days: rule.min_interval_days,
                can_coadminister: rule.can_be_given_together,
            },
        );
        Ok(())
    }

    fn insert_pair_rule(&mut self, rule: &IntervalRule) {
        let from = rule.vaccine_id.as_str();
        let to = target_of(rule);
        let key = pair_key(from, to);

        let entry = self.pair_rules.entry(key.clone()).or_insert_with(|| PairEntry {
            definition: RuleDefinition::PairRule {
                vaccine_a: key.0.clone(),
                vaccine_b: key.1.clone(),
                interval_days_a_to_b: None,
                interval_days_b_to_a: None,
                can_coadminister: true,
            },
            forbidding: None,
        });

        if let RuleDefinition::PairRule {
            vaccine_a,
            interval_days_a_to_b,
            interval_days_b_to_a,
            can_coadminister,
            ..
        } = &mut entry.definition
        {
            if from == vaccine_a.as_str() {
                *interval_days_a_to_b = Some(rule.min_interval_days);
            } else {
                *interval_days_b_to_a = Some(rule.min_interval_days);
            }

            if !rule.can_be_given_together {
                *can_coadminister = false;
                if entry.forbidding.is_none() {
                    entry.forbidding = Some(rule.rule_ref());
                }
            }
        }
    }

    /// 查询方向化规则
    ///
    /// # 规则
    /// - from == to: 仅查自身规则（加强针间隔）
    /// - 否则先查 from→to，未声明则使用 to→from 的间隔
    /// - 无规则返回 None（不受约束，不是错误）
    pub fn lookup(&self, from_vaccine: &str, to_vaccine: &str) -> Option<DirectedRule> {
        if from_vaccine == to_vaccine {
            let definition = self.self_rules.get(from_vaccine)?;
            let (days, _) = definition.interval_for(from_vaccine, to_vaccine)?;
            let can_coadminister = match definition {
                RuleDefinition::SelfRule {
                    can_coadminister, ..
                } => *can_coadminister,
                RuleDefinition::PairRule { .. } => false,
            };
            return Some(DirectedRule {
                from_vaccine: from_vaccine.to_string(),
                to_vaccine: to_vaccine.to_string(),
                min_interval_days: days,
                can_coadminister,
                source: RuleRef::self_rule(from_vaccine),
                resolution: RuleResolution::SelfRule,
            });
        }

        let entry = self.pair_rules.get(&pair_key(from_vaccine, to_vaccine))?;
        let (days, reversed) = entry.definition.interval_for(from_vaccine, to_vaccine)?;
        let can_coadminister = match &entry.definition {
            RuleDefinition::PairRule {
                can_coadminister, ..
            } => *can_coadminister,
            RuleDefinition::SelfRule { .. } => false,
        };

        let (source, resolution) = if reversed {
            (
                RuleRef::pair(to_vaccine, from_vaccine),
                RuleResolution::Reversed,
            )
        } else {
            (
                RuleRef::pair(from_vaccine, to_vaccine),
                RuleResolution::Declared,
            )
        };

        Some(DirectedRule {
            from_vaccine: from_vaccine.to_string(),
            to_vaccine: to_vaccine.to_string(),
            min_interval_days: days,
            can_coadminister,
            source,
            resolution,
        })
    }

    /// 两种不同疫苗能否同日接种（与参数顺序无关）
    pub fn coadministration_allowed(&self, vaccine_a: &str, vaccine_b: &str) -> bool {
        self.coadministration_conflict(vaccine_a, vaccine_b).is_none()
    }

    /// 若该对疫苗禁止同日接种，返回禁止它的声明规则
    pub fn coadministration_conflict(&self, vaccine_a: &str, vaccine_b: &str) -> Option<RuleRef> {
        if vaccine_a == vaccine_b {
            return None;
        }
        self.pair_rules
            .get(&pair_key(vaccine_a, vaccine_b))
            .and_then(|entry| entry.forbidding.clone())
    }

    /// 规则定义（自身规则在前，按疫苗 ID 排序）
    pub fn definitions(&self) -> Vec<RuleDefinition> {
        let mut self_rules: Vec<_> = self.self_rules.iter().collect();
        self_rules.sort_by(|a, b| a.0.cmp(b.0));
        let mut pairs: Vec<_> = self.pair_rules.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));

        self_rules
            .into_iter()
            .map(|(_, def)| def.clone())
            .chain(pairs.into_iter().map(|(_, entry)| entry.definition.clone()))
            .collect()
    }

    /// 去重后的声明规则（用于落库/导出）
    pub fn declared_rules(&self) -> Vec<IntervalRule> {
        self.declared.values().cloned().collect()
    }

    pub fn rule_count(&self) -> usize {
        self.declared.len()
    }

    pub fn self_rule_count(&self) -> usize {
        self.self_rules.len()
    }

    pub fn pair_count(&self) -> usize {
        self.pair_rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }
}

// ==========================================
// 辅助函数
// ==========================================

fn normalize(mut rule: IntervalRule) -> Result<IntervalRule, RuleGraphError> {
    rule.vaccine_id = rule.vaccine_id.trim().to_string();
    rule.related_vaccine_id = rule
        .related_vaccine_id
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    if rule.vaccine_id.is_empty() {
        return Err(RuleGraphError::InvalidRule {
            rule,
            reason: "vaccine_id 为空".to_string(),
        });
    }

    if rule.can_be_given_together && rule.min_interval_days != 0 {
        let reason = format!(
            "可联合接种的规则 min_interval_days 必须为 0 (实际 {})",
            rule.min_interval_days
        );
        return Err(RuleGraphError::InvalidRule { rule, reason });
    }

    Ok(rule)
}

fn target_of(rule: &IntervalRule) -> &str {
    rule.related_vaccine_id
        .as_deref()
        .unwrap_or(rule.vaccine_id.as_str())
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}
