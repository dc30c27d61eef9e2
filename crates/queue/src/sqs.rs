//! AWS SQS transport.

use async_trait::async_trait;
use aws_config::default_provider::credentials::DefaultCredentialsChain;
use aws_credential_types::Credentials;
use aws_sdk_sqs::config::{BehaviorVersion, Region};
use aws_sdk_sqs::types::{Message, MessageSystemAttributeName, QueueAttributeName};
use aws_sdk_sqs::Client;
use chrono::{TimeZone, Utc};
use tracing::{debug, info};

use wellwatch_core::config::{AwsConfig, QueueConfig};

use crate::consumer::{QueueConsumer, QueueHealth, QueueMessage};
use crate::error::QueueError;

/// Per-request message cap imposed by SQS.
const MAX_BATCH: u32 = 10;
/// Longest long-poll SQS accepts.
const MAX_WAIT_SECS: i32 = 20;

/// Long-polling SQS transport. A nack resets visibility to 0 so the message
/// is redelivered immediately.
pub struct SqsConsumer {
    client: Client,
    queue_url: String,
    dlq_url: Option<String>,
    visibility_timeout_secs: i32,
    wait_time_secs: i32,
}

impl SqsConsumer {
    pub async fn new(aws: &AwsConfig, queue: &QueueConfig) -> Result<Self, QueueError> {
        let queue_url = queue
            .url
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| QueueError::Config("QUEUE_URL is not set".into()))?;
        let client = Client::from_conf(sqs_config(aws).await);
        info!(queue_url = %queue_url, region = %aws.region, "SQS transport ready");

        Ok(Self {
            client,
            queue_url,
            dlq_url: queue.dlq_url.clone(),
            visibility_timeout_secs: queue.visibility_timeout_secs,
            wait_time_secs: queue.wait_time_secs.clamp(0, MAX_WAIT_SECS),
        })
    }

    async fn approximate_depth(&self, url: &str) -> Result<Option<u64>, QueueError> {
        let resp = self
            .client
            .get_queue_attributes()
            .queue_url(url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .send()
            .await
            .map_err(|e| QueueError::Connection(format!("get_queue_attributes: {e:?}")))?;

        Ok(resp
            .attributes()
            .and_then(|a| a.get(&QueueAttributeName::ApproximateNumberOfMessages))
            .and_then(|v| v.parse().ok()))
    }
}

/// SQS-only client config. `aws_config::defaults()` is avoided because it
/// picks up a process-wide `AWS_ENDPOINT_URL` aimed at other services.
async fn sqs_config(aws: &AwsConfig) -> aws_sdk_sqs::Config {
    let region = Region::new(aws.region.clone());
    let builder = aws_sdk_sqs::Config::builder()
        .region(region.clone())
        .behavior_version(BehaviorVersion::latest());

    let builder = match (&aws.access_key_id, &aws.secret_access_key) {
        (Some(id), Some(secret)) => builder.credentials_provider(Credentials::new(
            id,
            secret,
            aws.session_token.clone(),
            None,
            "wellwatch-env",
        )),
        _ => builder.credentials_provider(DefaultCredentialsChain::builder().region(region).build().await),
    };

    match aws.endpoint_url.as_deref() {
        Some(endpoint) => builder.endpoint_url(with_scheme(endpoint)).build(),
        None => builder.build(),
    }
}

/// LocalStack-style `host:port` endpoints get `https://` unless a scheme is given.
fn with_scheme(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    }
}

fn system_attribute<T: std::str::FromStr>(msg: &Message, name: MessageSystemAttributeName) -> Option<T> {
    msg.attributes().and_then(|a| a.get(&name)).and_then(|v| v.parse().ok())
}

/// A received SQS message without a receipt handle cannot be acked and is
/// rejected.
fn to_queue_message(msg: &Message) -> Result<QueueMessage, QueueError> {
    let id = msg.message_id().unwrap_or("unknown").to_string();
    let receipt_handle = msg
        .receipt_handle()
        .ok_or_else(|| QueueError::Parse(format!("message {id} has no receipt handle")))?
        .to_string();
    let timestamp = system_attribute::<i64>(msg, MessageSystemAttributeName::SentTimestamp)
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now);

    Ok(QueueMessage {
        body: msg.body().unwrap_or_default().to_string(),
        receipt_handle,
        timestamp,
        attempt_count: system_attribute(msg, MessageSystemAttributeName::ApproximateReceiveCount).unwrap_or(1),
        id,
    })
}

#[async_trait]
impl QueueConsumer for SqsConsumer {
    async fn open(&self) -> Result<(), QueueError> {
        let depth = self.approximate_depth(&self.queue_url).await?;
        info!(queue_url = %self.queue_url, depth = ?depth, "SQS queue open");
        Ok(())
    }

    async fn poll_batch(&self, max_messages: u32) -> Result<Vec<QueueMessage>, QueueError> {
        let capped = max_messages.clamp(1, MAX_BATCH) as i32;

        let resp = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(capped)
            .wait_time_seconds(self.wait_time_secs)
            .visibility_timeout(self.visibility_timeout_secs)
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .send()
            .await
            .map_err(|e| QueueError::Connection(format!("receive_message: {e:?}")))?;

        let received = resp.messages();
        debug!(count = received.len(), "SQS receive");
        received.iter().map(to_queue_message).collect()
    }

    async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Ack(format!("delete_message: {e:?}")))?;
        Ok(())
    }

    async fn nack(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(0)
            .send()
            .await
            .map_err(|e| QueueError::Provider(format!("change_message_visibility: {e:?}")))?;
        Ok(())
    }

    async fn health_check(&self) -> Result<QueueHealth, QueueError> {
        let count = self.approximate_depth(&self.queue_url).await?;
        Ok(QueueHealth {
            connected: true,
            approximate_message_count: count,
            provider: "sqs".to_string(),
        })
    }

    async fn dlq_depth(&self) -> Result<Option<u64>, QueueError> {
        match &self.dlq_url {
            Some(url) => self.approximate_depth(url).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aws() -> AwsConfig {
        AwsConfig {
            region: "us-east-1".into(),
            access_key_id: Some("test".into()),
            secret_access_key: Some("test".into()),
            session_token: None,
            endpoint_url: Some("localhost:4566".into()),
        }
    }

    #[test]
    fn endpoint_gets_a_scheme() {
        assert_eq!(with_scheme("localhost:4566"), "https://localhost:4566");
        assert_eq!(with_scheme("http://localhost:4566"), "http://localhost:4566");
    }

    #[test]
    fn converts_received_messages() {
        let msg = Message::builder()
            .message_id("m-1")
            .receipt_handle("rh-1")
            .body("{}")
            .attributes(MessageSystemAttributeName::SentTimestamp, "1700000000000")
            .attributes(MessageSystemAttributeName::ApproximateReceiveCount, "3")
            .build();
        let q = to_queue_message(&msg).unwrap();
        assert_eq!((q.id.as_str(), q.receipt_handle.as_str(), q.body.as_str()), ("m-1", "rh-1", "{}"));
        assert_eq!(q.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(q.attempt_count, 3);

        let orphan = Message::builder().message_id("m-2").body("{}").build();
        assert!(matches!(to_queue_message(&orphan), Err(QueueError::Parse(_))));
    }

    #[tokio::test]
    async fn new_requires_queue_url() {
        let queue = QueueConfig {
            url: None,
            dlq_url: None,
            visibility_timeout_secs: 30,
            wait_time_secs: 20,
        };
        let err = SqsConsumer::new(&aws(), &queue).await.err().unwrap();
        assert!(matches!(err, QueueError::Config(_)));
    }

    #[tokio::test]
    async fn new_clamps_wait_time() {
        let queue = QueueConfig {
            url: Some("http://localhost:4566/000000000000/telemetry".into()),
            dlq_url: None,
            visibility_timeout_secs: 30,
            wait_time_secs: 60,
        };
        let consumer = SqsConsumer::new(&aws(), &queue).await.unwrap();
        assert_eq!(consumer.wait_time_secs, 20);
        assert!(consumer.dlq_depth().await.unwrap().is_none());
    }
}
