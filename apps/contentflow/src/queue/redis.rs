use async_trait::async_trait;
use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::Script;
use tracing::{debug, info, warn};

use super::{
    disposition, BatchResponse, Disposition, Envelope, MessageQueue, QueueError, QueueMessage,
    RedeliveryPolicy, SettleSummary,
};

/// KEYS[1] delayed set, KEYS[2] pending list, ARGV[1] now in epoch millis.
/// Moves every due member onto the list in one step so two consumers
/// cannot both promote the same envelope.
const PROMOTE_DUE_SCRIPT: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1])
for _, raw in ipairs(due) do
    redis.call('ZREM', KEYS[1], raw)
    redis.call('LPUSH', KEYS[2], raw)
end
return #due
"#;

/// Reliable Redis list queue.
///
/// `<name>` holds pending envelopes (pushed left, consumed right).
/// `receive` moves each envelope into `<name>:processing` with `LMOVE`,
/// so a crash mid-batch leaves it recoverable rather than lost.
/// Failed envelopes wait in the `<name>:delayed` sorted set, scored by the
/// epoch millis at which they are due, and are moved back by `receive`.
#[derive(Clone)]
pub struct RedisQueue {
    conn: MultiplexedConnection,
    name: String,
    processing: String,
    delayed: String,
    dead: String,
    policy: RedeliveryPolicy,
    promote_due: Script,
}

impl RedisQueue {
    pub async fn connect(
        client: &redis::Client,
        name: impl Into<String>,
        policy: RedeliveryPolicy,
    ) -> Result<Self, QueueError> {
        let name = name.into();
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            processing: format!("{name}:processing"),
            delayed: format!("{name}:delayed"),
            dead: format!("{name}:dead"),
            name,
            policy,
            promote_due: Script::new(PROMOTE_DUE_SCRIPT),
        })
    }

    /// Moves everything left in `:processing` back onto the queue.
    /// Call once at startup, before any consumer runs.
    pub async fn recover(&self) -> Result<usize, QueueError> {
        let mut conn = self.conn.clone();
        let mut recovered = 0;
        loop {
            let moved: Option<String> = redis::cmd("LMOVE")
                .arg(&self.processing)
                .arg(&self.name)
                .arg("LEFT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }

        if recovered > 0 {
            info!(queue = %self.name, recovered, "Recovered in-flight messages");
        }
        Ok(recovered)
    }

    async fn dead_letter_raw(&self, raw: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .cmd("LREM")
            .arg(&self.processing)
            .arg(1)
            .arg(raw)
            .ignore()
            .cmd("LPUSH")
            .arg(&self.dead)
            .arg(raw)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MessageQueue for RedisQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, body: String) -> Result<String, QueueError> {
        let envelope = Envelope::new(body);
        let raw = serde_json::to_string(&envelope)?;
        let mut conn = self.conn.clone();
        redis::cmd("LPUSH")
            .arg(&self.name)
            .arg(raw)
            .query_async::<_, ()>(&mut conn)
            .await?;

        debug!(queue = %self.name, message_id = %envelope.message_id, "Message sent");
        Ok(envelope.message_id)
    }

    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, QueueError> {
        let mut conn = self.conn.clone();
        let promoted: usize = self
            .promote_due
            .key(&self.delayed)
            .key(&self.name)
            .arg(Utc::now().timestamp_millis())
            .invoke_async(&mut conn)
            .await?;
        if promoted > 0 {
            debug!(queue = %self.name, promoted, "Delayed messages due again");
        }

        let mut batch = Vec::with_capacity(max);

        while batch.len() < max {
            let raw: Option<String> = redis::cmd("LMOVE")
                .arg(&self.name)
                .arg(&self.processing)
                .arg("RIGHT")
                .arg("LEFT")
                .query_async(&mut conn)
                .await?;
            let Some(raw) = raw else { break };

            match serde_json::from_str::<Envelope>(&raw) {
                Ok(envelope) => batch.push(QueueMessage::delivered(envelope, raw)),
                Err(e) => {
                    warn!(queue = %self.name, "Dead-lettering unreadable envelope: {e}");
                    self.dead_letter_raw(&raw).await?;
                }
            }
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
        let now_ms = Utc::now().timestamp_millis();
        let mut pipe = redis::pipe();
        pipe.atomic();

        for message in batch {
            let outcome = disposition(message, failed.contains(message.message_id.as_str()), &self.policy);
            summary.record(&outcome);

            pipe.cmd("LREM")
                .arg(&self.processing)
                .arg(1)
                .arg(&message.receipt)
                .ignore();

            match outcome {
                Disposition::Ack => {}
                Disposition::Retry { envelope, delay } => {
                    let due_ms = now_ms.saturating_add(i64::try_from(delay.as_millis()).unwrap_or(i64::MAX));
                    pipe.cmd("ZADD")
                        .arg(&self.delayed)
                        .arg(due_ms)
                        .arg(serde_json::to_string(&envelope)?)
                        .ignore();
                }
                Disposition::DeadLetter(envelope) => {
                    warn!(
                        queue = %self.name,
                        message_id = %envelope.message_id,
                        receive_count = envelope.receive_count,
                        "Message exhausted its deliveries, dead-lettering"
                    );
                    pipe.cmd("LPUSH")
                        .arg(&self.dead)
                        .arg(serde_json::to_string(&envelope)?)
                        .ignore();
                }
            }
        }

        if !batch.is_empty() {
            let mut conn = self.conn.clone();
            pipe.query_async::<_, ()>(&mut conn).await?;
        }

        Ok(summary)
    }
}
