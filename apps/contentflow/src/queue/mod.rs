//! Inbound event queues feeding the workers.
//!
//! Delivery is at-least-once. A batch is received, handed to a worker, then
//! settled with the worker's `BatchResponse`: acknowledged messages are
//! removed, failed ones are held back for a delay that doubles with each
//! delivery and then redelivered, until `max_receive_count` deliveries have
//! happened, after which they are dead-lettered.

pub mod memory;
pub mod redis;

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use self::memory::MemoryQueue;
pub use self::redis::RedisQueue;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Envelope encoding error: {0}")]
    Envelope(#[from] serde_json::Error),
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

/// What sits on the queue. `receive_count` is the number of deliveries
/// that have already happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Envelope {
    pub message_id: String,
    pub body: String,
    pub receive_count: u32,
}

impl Envelope {
    pub fn new(body: String) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            body,
            receive_count: 0,
        }
    }
}

/// One delivered message, as handed to a worker.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub message_id: String,
    pub body: String,
    /// Includes this delivery.
    pub receive_count: u32,
    /// Backend handle for settling: the raw envelope text for Redis.
    pub(crate) receipt: String,
}

impl QueueMessage {
    pub(crate) fn delivered(envelope: Envelope, receipt: String) -> Self {
        Self {
            message_id: envelope.message_id,
            body: envelope.body,
            receive_count: envelope.receive_count + 1,
            receipt,
        }
    }

    #[cfg(test)]
    pub fn for_test(body: impl Into<String>) -> Self {
        let envelope = Envelope::new(body.into());
        let receipt = envelope.message_id.clone();
        Self::delivered(envelope, receipt)
    }

    fn redelivery(&self) -> Envelope {
        Envelope {
            message_id: self.message_id.clone(),
            body: self.body.clone(),
            receive_count: self.receive_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
}

/// Per-item failure report returned by a worker for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub batch_item_failures: Vec<BatchItemFailure>,
}

impl BatchResponse {
    pub fn fail(&mut self, message_id: &str) {
        if !self.is_failed(message_id) {
            self.batch_item_failures.push(BatchItemFailure {
                item_identifier: message_id.to_string(),
            });
        }
    }

    pub fn is_failed(&self, message_id: &str) -> bool {
        self.batch_item_failures
            .iter()
            .any(|f| f.item_identifier == message_id)
    }

    pub fn failed_ids(&self) -> HashSet<&str> {
        self.batch_item_failures
            .iter()
            .map(|f| f.item_identifier.as_str())
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Settling
// ────────────────────────────────────────────────────────────────────────────

/// Upper bound on the hold before any single redelivery.
pub const MAX_REDELIVERY_DELAY: Duration = Duration::from_secs(15 * 60);

/// How often, and how soon, a failed message comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeliveryPolicy {
    pub max_receive_count: u32,
    /// Hold after the first failed delivery; doubles after each further one.
    pub retry_delay: Duration,
}

impl RedeliveryPolicy {
    pub fn new(max_receive_count: u32, retry_delay: Duration) -> Self {
        Self {
            max_receive_count: max_receive_count.max(1),
            retry_delay,
        }
    }

    /// Hold before the next delivery of a message that has already been
    /// delivered `receive_count` times.
    pub fn delay_after(&self, receive_count: u32) -> Duration {
        let doublings = receive_count.saturating_sub(1).min(16);
        self.retry_delay
            .saturating_mul(1 << doublings)
            .min(MAX_REDELIVERY_DELAY)
    }
}

/// What happens to one delivered message when its batch is settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Disposition {
    Ack,
    Retry { envelope: Envelope, delay: Duration },
    DeadLetter(Envelope),
}

pub(crate) fn disposition(message: &QueueMessage, failed: bool, policy: &RedeliveryPolicy) -> Disposition {
    if !failed {
        Disposition::Ack
    } else if message.receive_count >= policy.max_receive_count {
        Disposition::DeadLetter(message.redelivery())
    } else {
        Disposition::Retry {
            envelope: message.redelivery(),
            delay: policy.delay_after(message.receive_count),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SettleSummary {
    pub acked: usize,
    pub retried: usize,
    pub dead_lettered: usize,
}

impl SettleSummary {
    pub(crate) fn record(&mut self, disposition: &Disposition) {
        match disposition {
            Disposition::Ack => self.acked += 1,
            Disposition::Retry { .. } => self.retried += 1,
            Disposition::DeadLetter(_) => self.dead_lettered += 1,
        }
    }
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, body: String) -> Result<String, QueueError>;

    /// Receives up to `max` messages without blocking. Messages still held
    /// back after a failure are not returned.
    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, QueueError>;

    async fn settle(
        &self,
        batch: &[QueueMessage],
        response: &BatchResponse,
    ) -> Result<SettleSummary, QueueError>;
}

/// Serializes `event` and sends it.
pub async fn send_json<T: Serialize + Sync>(
    queue: &dyn MessageQueue,
    event: &T,
) -> Result<String, QueueError> {
    queue.send(serde_json::to_string(event)?).await
}
