// ==========================================
// 疫苗接种排期 - 接种间隔规则
// ==========================================
// IntervalRule: 存储/传输的扁平形态（related_vaccine_id 可空）
// RuleDefinition: 引擎内部的标签化形态（自身规则 / 成对规则）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// IntervalRule - 扁平规则（存储/传输形态）
// ==========================================
/// 间隔规则
///
/// - `related_vaccine_id = None`：同一疫苗的加强针间隔（自身规则）
/// - `related_vaccine_id = Some(x)`：先接种 `vaccine_id` 后接种 `x` 的最小间隔
/// - `can_be_given_together = true` 时 `min_interval_days` 必须为 0，仅用于同日联合接种判定
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntervalRule {
    pub vaccine_id: String,
    #[serde(default)]
    pub related_vaccine_id: Option<String>,
    pub min_interval_days: u32,
    pub can_be_given_together: bool,
}

impl IntervalRule {
    /// 自身规则（加强针间隔）
    pub fn self_rule(vaccine_id: impl Into<String>, min_interval_days: u32) -> Self {
        Self {
            vaccine_id: vaccine_id.into(),
            related_vaccine_id: None,
            min_interval_days,
            can_be_given_together: false,
        }
    }

    /// 成对规则（vaccine_id → related_vaccine_id）
    pub fn pair(
        vaccine_id: impl Into<String>,
        related_vaccine_id: impl Into<String>,
        min_interval_days: u32,
        can_be_given_together: bool,
    ) -> Self {
        Self {
            vaccine_id: vaccine_id.into(),
            related_vaccine_id: Some(related_vaccine_id.into()),
            min_interval_days,
            can_be_given_together,
        }
    }

    /// 是否作用于同一疫苗（related 为空，或与 vaccine_id 相同）
    pub fn is_self_referential(&self) -> bool {
        match &self.related_vaccine_id {
            None => true,
            Some(related) => related == &self.vaccine_id,
        }
    }

    pub fn rule_ref(&self) -> RuleRef {
        RuleRef {
            vaccine_id: self.vaccine_id.clone(),
            related_vaccine_id: self.related_vaccine_id.clone(),
        }
    }
}

// ==========================================
// RuleRef - 规则引用（用于诊断/审计）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleRef {
    pub vaccine_id: String,
    #[serde(default)]
    pub related_vaccine_id: Option<String>,
}

impl RuleRef {
    pub fn self_rule(vaccine_id: &str) -> Self {
        Self {
            vaccine_id: vaccine_id.to_string(),
            related_vaccine_id: None,
        }
    }

    pub fn pair(vaccine_id: &str, related_vaccine_id: &str) -> Self {
        Self {
            vaccine_id: vaccine_id.to_string(),
            related_vaccine_id: Some(related_vaccine_id.to_string()),
        }
    }
}

impl fmt::Display for RuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.related_vaccine_id {
            Some(related) => write!(f, "{}->{}", self.vaccine_id, related),
            None => write!(f, "{}(self)", self.vaccine_id),
        }
    }
}

// ==========================================
// RuleDefinition - 标签化规则
// ==========================================
/// 规则加载后的内部形态
///
/// PairRule 以无序对 (vaccine_a < vaccine_b) 存储，两个方向的间隔分别保存；
/// 某方向未声明时为 None，查询时回退到反向间隔。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleDefinition {
    SelfRule {
        vaccine_id: String,
        interval_days: u32,
        /// 声明值；同一疫苗的同日重复剂次仍由剂次校验拒绝
        can_coadminister: bool,
    },
    PairRule {
        vaccine_a: String,
        vaccine_b: String,
        interval_days_a_to_b: Option<u32>,
        interval_days_b_to_a: Option<u32>,
        can_coadminister: bool,
    },
}

impl RuleDefinition {
    /// 按查询方向解析间隔
    ///
    /// # 返回
    /// - Some((days, reversed)): reversed=true 表示使用了反向声明的间隔
    /// - None: 该定义不涉及此方向
    pub fn interval_for(&self, from: &str, to: &str) -> Option<(u32, bool)> {
        match self {
            RuleDefinition::SelfRule {
                vaccine_id,
                interval_days,
                ..
            } => (from == vaccine_id && to == vaccine_id).then_some((*interval_days, false)),
            RuleDefinition::PairRule {
                vaccine_a,
                vaccine_b,
                interval_days_a_to_b,
                interval_days_b_to_a,
                ..
            } => {
                let (exact, reverse) = if from == vaccine_a && to == vaccine_b {
                    (interval_days_a_to_b, interval_days_b_to_a)
                } else if from == vaccine_b && to == vaccine_a {
                    (interval_days_b_to_a, interval_days_a_to_b)
                } else {
                    return None;
                };

                match (exact, reverse) {
                    (Some(days), _) => Some((*days, false)),
                    (None, Some(days)) => Some((*days, true)),
                    (None, None) => None,
                }
            }
        }
    }
}
