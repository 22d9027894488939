//! Built-in generators.

use super::Generator;
use crate::core::{Notification, Parameters, SaxEvent, NOTIFYING_OBJECT};
use crate::environment::Environment;
use crate::errors::{SitemapError, SitemapResult};
use async_trait::async_trait;

/// Generates the notification document stored by the error handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifyingGenerator;

#[async_trait]
impl Generator for NotifyingGenerator {
    async fn generate(
        &self,
        env: &Environment,
        _source: Option<&str>,
        _params: &Parameters,
    ) -> SitemapResult<Vec<SaxEvent>> {
        let value = env
            .object_model()
            .get(NOTIFYING_OBJECT)
            .ok_or_else(|| SitemapError::processing("No notification available for this request"))?;
        let notification: Notification = serde_json::from_value(value)?;
        Ok(notification.to_events())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generates_stored_notification() {
        let env = Environment::new("broken");
        let notification = Notification::from_error(&SitemapError::processing("boom"));
        env.object_model()
            .insert(NOTIFYING_OBJECT, serde_json::to_value(&notification).unwrap());

        let events = NotifyingGenerator
            .generate(&env, None, &Parameters::new())
            .await
            .unwrap();
        assert!(events.contains(&SaxEvent::text("boom")));
    }

    #[tokio::test]
    async fn test_missing_notification_is_processing_error() {
        let env = Environment::new("broken");
        let err = NotifyingGenerator
            .generate(&env, None, &Parameters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SitemapError::Processing(_)));
    }
}
