use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{
    disposition, BatchResponse, Disposition, Envelope, MessageQueue, QueueError, QueueMessage,
    RedeliveryPolicy, SettleSummary,
};

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Envelope>,
    in_flight: HashMap<String, Envelope>,
    /// Failed envelopes and when they become deliverable again.
    delayed: Vec<(Instant, Envelope)>,
    dead: Vec<Envelope>,
}

impl QueueState {
    /// Moves every delayed envelope that is due onto `ready`, earliest first.
    fn promote_due(&mut self, now: Instant) {
        let (mut due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.delayed)
            .into_iter()
            .partition(|(at, _)| *at <= now);
        self.delayed = waiting;
        due.sort_by_key(|(at, _)| *at);
        self.ready.extend(due.into_iter().map(|(_, envelope)| envelope));
    }
}

/// In-process queue with the same delivery semantics as `RedisQueue`.
#[derive(Clone)]
pub struct MemoryQueue {
    name: String,
    policy: RedeliveryPolicy,
    state: Arc<Mutex<QueueState>>,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>, policy: RedeliveryPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            state: Arc::new(Mutex::new(QueueState::default())),
        }
    }

    /// Redelivers failed messages on the next receive.
    #[cfg(test)]
    pub fn immediate(name: &str, max_receive_count: u32) -> Self {
        Self::new(name, RedeliveryPolicy::new(max_receive_count, std::time::Duration::ZERO))
    }

    #[cfg(test)]
    pub async fn delayed(&self) -> usize {
        self.state.lock().await.delayed.len()
    }

    #[cfg(test)]
    pub async fn pending(&self) -> usize {
        self.state.lock().await.ready.len()
    }

    #[cfg(test)]
    pub async fn dead_letters(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .dead
            .iter()
            .map(|e| e.message_id.clone())
            .collect()
    }

    /// Bodies of pending messages, in delivery order.
    #[cfg(test)]
    pub async fn pending_bodies(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .ready
            .iter()
            .map(|e| e.body.clone())
            .collect()
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, body: String) -> Result<String, QueueError> {
        let envelope = Envelope::new(body);
        let message_id = envelope.message_id.clone();
        self.state.lock().await.ready.push_back(envelope);
        debug!(queue = %self.name, message_id = %message_id, "Message sent");
        Ok(message_id)
    }

    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, QueueError> {
        let mut state = self.state.lock().await;
        state.promote_due(Instant::now());
        let mut batch = Vec::new();

        while batch.len() < max {
            let Some(envelope) = state.ready.pop_front() else { break };
            let receipt = envelope.message_id.clone();
            state.in_flight.insert(receipt.clone(), envelope.clone());
            batch.push(QueueMessage::delivered(envelope, receipt));
        }

        Ok(batch)
    }

    async fn settle(
        &self,
        batch: &[QueueMessage],
        response: &BatchResponse,
    ) -> Result<SettleSummary, QueueError> {
        let failed = response.failed_ids();
        let mut summary = SettleSummary::default();
        let mut state = self.state.lock().await;
        let now = Instant::now();

        for message in batch {
            if state.in_flight.remove(&message.receipt).is_none() {
                warn!(queue = %self.name, message_id = %message.message_id, "Settling unknown message");
                continue;
            }

            let outcome = disposition(message, failed.contains(message.message_id.as_str()), &self.policy);
            summary.record(&outcome);

            match outcome {
                Disposition::Ack => {}
                Disposition::Retry { envelope, delay } => state.delayed.push((now + delay, envelope)),
                Disposition::DeadLetter(envelope) => {
                    warn!(
                        queue = %self.name,
                        message_id = %envelope.message_id,
                        receive_count = envelope.receive_count,
                        "Message exhausted its deliveries, dead-lettering"
                    );
                    state.dead.push(envelope);
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_receive_is_fifo_and_bounded() {
        let queue = MemoryQueue::immediate("q", 3);
        for i in 0..5 {
            queue.send(format!("m{i}")).await.unwrap();
        }

        let batch = queue.receive(3).await.unwrap();
        let bodies: Vec<&str> = batch.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["m0", "m1", "m2"]);
        assert!(batch.iter().all(|m| m.receive_count == 1));
        assert_eq!(queue.pending().await, 2);
    }

    #[tokio::test]
    async fn test_ack_removes_and_failure_redelivers() {
        let queue = MemoryQueue::immediate("q", 3);
        queue.send("ok".into()).await.unwrap();
        let failing_id = queue.send("bad".into()).await.unwrap();

        let batch = queue.receive(10).await.unwrap();
        let mut response = BatchResponse::default();
        response.fail(&failing_id);
        let summary = queue.settle(&batch, &response).await.unwrap();

        assert_eq!(summary.acked, 1);
        assert_eq!(summary.retried, 1);
        assert_eq!(queue.pending().await, 0);
        assert_eq!(queue.delayed().await, 1);

        let again = queue.receive(10).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].message_id, failing_id);
        assert_eq!(again[0].receive_count, 2);
    }

    #[tokio::test]
    async fn test_dead_letter_after_max_receive_count() {
        let queue = MemoryQueue::immediate("q", 2);
        let id = queue.send("poison".into()).await.unwrap();
        let mut response = BatchResponse::default();
        response.fail(&id);

        for _ in 0..2 {
            let batch = queue.receive(10).await.unwrap();
            assert_eq!(batch.len(), 1);
            queue.settle(&batch, &response).await.unwrap();
        }

        assert_eq!(queue.pending().await, 0);
        assert_eq!(queue.dead_letters().await, vec![id]);
        assert!(queue.receive(10).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_message_is_held_back_before_redelivery() {
        let queue = MemoryQueue::new("q", RedeliveryPolicy::new(3, Duration::from_secs(30)));
        let id = queue.send("later".into()).await.unwrap();
        let mut response = BatchResponse::default();
        response.fail(&id);

        let batch = queue.receive(10).await.unwrap();
        queue.settle(&batch, &response).await.unwrap();
        assert!(queue.receive(10).await.unwrap().is_empty());
        assert_eq!(queue.delayed().await, 1);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(queue.receive(10).await.unwrap().is_empty());

        tokio::time::advance(Duration::from_secs(1)).await;
        let second = queue.receive(10).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].receive_count, 2);
        queue.settle(&second, &response).await.unwrap();

        // The second hold is twice as long.
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(queue.receive(10).await.unwrap().is_empty());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(queue.receive(10).await.unwrap()[0].receive_count, 3);
    }

    #[tokio::test]
    async fn test_empty_receive() {
        let queue = MemoryQueue::immediate("q", 3);
        assert!(queue.receive(10).await.unwrap().is_empty());
        let summary = queue.settle(&[], &BatchResponse::default()).await.unwrap();
        assert_eq!(summary, SettleSummary::default());
    }
}
