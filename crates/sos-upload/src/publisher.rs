//! CNM message publishing
//!
//! One publish attempt per granule, no internal retries. Deduplication
//! across runs is the downstream system's responsibility, keyed by the
//! message identifier.

use crate::message::CnmMessage;
use async_trait::async_trait;
use aws_sdk_sns::Client as SnsClient;
use aws_sdk_ssm::Client as SsmClient;
use sos_common::{Result, SosError};
use tokio::sync::OnceCell;
use tracing::info;

/// Pub/sub boundary used by the orchestrator
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one message; at-most-once delivery attempt
    async fn publish(&self, message: &CnmMessage) -> Result<()>;
}

/// SNS-backed notifier with the topic ARN resolved from SSM on first use
pub struct SnsNotifier {
    sns: SnsClient,
    ssm: SsmClient,
    topic_parameter: String,
    topic_arn: OnceCell<String>,
}

impl SnsNotifier {
    pub fn new(sns: SnsClient, ssm: SsmClient, topic_parameter: impl Into<String>) -> Self {
        Self {
            sns,
            ssm,
            topic_parameter: topic_parameter.into(),
            topic_arn: OnceCell::new(),
        }
    }

    async fn resolve_topic(&self) -> Result<&str> {
        let arn = self
            .topic_arn
            .get_or_try_init(|| async {
                let response = self
                    .ssm
                    .get_parameter()
                    .name(&self.topic_parameter)
                    .with_decryption(true)
                    .send()
                    .await
                    .map_err(|e| {
                        SosError::publish(format!(
                            "failed to resolve topic from parameter '{}': {e}",
                            self.topic_parameter
                        ))
                    })?;

                response
                    .parameter()
                    .and_then(|p| p.value())
                    .map(|v| v.to_string())
                    .ok_or_else(|| {
                        SosError::publish(format!(
                            "topic parameter '{}' has no value",
                            self.topic_parameter
                        ))
                    })
            })
            .await?;

        Ok(arn.as_str())
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    async fn publish(&self, message: &CnmMessage) -> Result<()> {
        let topic_arn = self.resolve_topic().await?;
        let body = serde_json::to_string(message)?;

        self.sns
            .publish()
            .topic_arn(topic_arn)
            .message(body)
            .send()
            .await
            .map_err(|e| {
                SosError::publish(format!(
                    "failed to publish '{}' to {topic_arn}: {e}",
                    message.identifier
                ))
            })?;

        info!(
            identifier = %message.identifier,
            topic = %topic_arn,
            "Published CNM message"
        );

        Ok(())
    }
}
