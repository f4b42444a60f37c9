// ==========================================
// 疫苗接种排期 - 引擎层事件发布
// ==========================================
// 职责: 定义接种事件发布 trait，实现依赖倒置
// 说明: Engine 层定义 trait，通知层（邮件/消息）在外部实现
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 接种事件类型
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdministrationEventType {
    /// 接种记录已追加
    RecordAppended,
    /// 规则图已重建
    RulesReloaded,
}

impl AdministrationEventType {
    pub fn as_str(&self) -> &str {
        match self {
            AdministrationEventType::RecordAppended => "RecordAppended",
            AdministrationEventType::RulesReloaded => "RulesReloaded",
        }
    }
}

/// 接种事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdministrationEvent {
    pub event_type: AdministrationEventType,
    pub child_id: Option<String>,
    pub vaccine_id: Option<String>,
    pub dose_number: Option<u32>,
    pub administered_on: Option<NaiveDate>,
    /// 事件来源描述
    pub source: Option<String>,
}

impl AdministrationEvent {
    pub fn record_appended(
        child_id: &str,
        vaccine_id: &str,
        dose_number: u32,
        administered_on: NaiveDate,
        source: Option<String>,
    ) -> Self {
        Self {
            event_type: AdministrationEventType::RecordAppended,
            child_id: Some(child_id.to_string()),
            vaccine_id: Some(vaccine_id.to_string()),
            dose_number: Some(dose_number),
            administered_on: Some(administered_on),
            source,
        }
    }

    pub fn rules_reloaded(source: Option<String>) -> Self {
        Self {
            event_type: AdministrationEventType::RulesReloaded,
            child_id: None,
            vaccine_id: None,
            dose_number: None,
            administered_on: None,
            source,
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 接种事件发布者 Trait
pub trait AdministrationEventPublisher: Send + Sync {
    /// 发布事件
    ///
    /// # 返回
    /// - `Ok(message_id)`: 消息 ID（如果支持）或空字符串
    /// - `Err`: 发布失败
    fn publish(&self, event: AdministrationEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl AdministrationEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: AdministrationEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - event_type={}",
            event.event_type.as_str()
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn AdministrationEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn AdministrationEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（如果有发布者）
    pub fn publish(&self, event: AdministrationEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(publisher) => publisher.publish(event),
            None => {
                tracing::debug!(
                    "OptionalEventPublisher: 未配置发布者，跳过事件 - event_type={}",
                    event.event_type.as_str()
                );
                Ok(String::new())
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_appended_event() {
        let on = NaiveDate::from_ymd_opt(2024, 1, 29).unwrap();
        let event = AdministrationEvent::record_appended("C001", "Varicella", 1, on, None);

        assert_eq!(event.event_type, AdministrationEventType::RecordAppended);
        assert_eq!(event.child_id.as_deref(), Some("C001"));
        assert_eq!(event.administered_on, Some(on));
    }

    #[test]
    fn test_rules_reloaded_event_has_no_child() {
        let event = AdministrationEvent::rules_reloaded(Some("import".to_string()));
        assert!(event.child_id.is_none());
        assert_eq!(event.event_type.as_str(), "RulesReloaded");
    }

    #[test]
    fn test_optional_publisher_none() {
        let publisher = OptionalEventPublisher::none();
        assert!(!publisher.is_configured());

        let result = publisher.publish(AdministrationEvent::rules_reloaded(None));
        assert!(result.is_ok());
    }

    #[test]
    fn test_optional_publisher_with_noop() {
        let noop = Arc::new(NoOpEventPublisher) as Arc<dyn AdministrationEventPublisher>;
        let publisher = OptionalEventPublisher::with_publisher(noop);
        assert!(publisher.is_configured());

        let result = publisher.publish(AdministrationEvent::rules_reloaded(None));
        assert!(result.unwrap().is_empty());
    }
}
