use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::{QueueContext, QueueCore};
use crate::sqs::attributes::QueueKind;
use crate::sqs::blocking::{InterruptibleQueue, VisibilityHeap};
use crate::sqs::error::{Result, SqsError};
use crate::sqs::message::{MessageContent, MessageRef, ReceiveResult};

/// At-least-once queue delivering the oldest visible message first.
pub struct StandardQueue {
    pub(crate) core: QueueCore<()>,
    visible: VisibilityHeap,
}

impl StandardQueue {
    pub fn new(
        name: &str,
        region: &str,
        account_id: &str,
        attributes: Option<&HashMap<String, String>>,
        tags: Option<HashMap<String, String>>,
        ctx: &QueueContext,
    ) -> Result<Self> {
        Ok(StandardQueue {
            core: QueueCore::new(
                name,
                region,
                account_id,
                QueueKind::Standard,
                attributes,
                tags,
                ctx,
            )?,
            visible: InterruptibleQueue::new(),
        })
    }

    pub fn put(
        &self,
        content: MessageContent,
        visibility_timeout: Option<u32>,
        message_deduplication_id: Option<String>,
        _message_group_id: Option<String>,
        delay_seconds: Option<u32>,
    ) -> Result<MessageRef> {
        if let Some(dedup_id) = message_deduplication_id.filter(|id| !id.is_empty()) {
            return Err(SqsError::InvalidParameterValue(format!(
                "Value {dedup_id} for parameter MessageDeduplicationId is invalid. Reason: The \
                 request includes a parameter that is not valid for this queue type."
            )));
        }

        let now = self.core.now();
        let message = Arc::new(
            self.core
                .new_message(content, now)
                .with_visibility_timeout(
                    visibility_timeout.unwrap_or_else(|| self.core.visibility_timeout()),
                )
                .with_delay_seconds(Some(
                    delay_seconds.unwrap_or_else(|| self.core.delay_seconds()),
                )),
        );

        if message.is_delayed(now) {
            let mut state = self.core.state.lock();
            state
                .delayed
                .insert(message.id().to_string(), message.clone());
        } else {
            self.visible.put(message.clone());
        }
        Ok(message)
    }

    pub async fn receive(
        &self,
        num_messages: usize,
        wait_time_seconds: Option<u32>,
        visibility_timeout: Option<u32>,
        poll_empty_queue: bool,
    ) -> ReceiveResult {
        let wait = wait_time_seconds.unwrap_or_else(|| self.core.wait_time_seconds());
        let visibility_timeout =
            visibility_timeout.unwrap_or_else(|| self.core.visibility_timeout());
        let max_receive_count = self.core.max_receive_count();
        let deadline = Instant::now() + Duration::from_secs(wait as u64);
        let mut block = wait > 0;
        let mut result = ReceiveResult::default();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(message) = self.visible.get(block, remaining).await else {
                break;
            };
            if !poll_empty_queue {
                block = false;
            }
            if message.is_deleted() {
                continue;
            }
            self.core
                .accept_delivery(message, visibility_timeout, max_receive_count, &mut result);
            if result.successful.len() >= num_messages {
                break;
            }
        }

        self.register(&mut result);
        result
    }

    fn register(&self, result: &mut ReceiveResult) {
        if result.successful.is_empty() {
            return;
        }
        let mut state = self.core.state.lock();
        for message in &result.successful {
            let handle = self.core.register_delivery(&mut state, message);
            result.receipt_handles.push(handle);
            if message.visibility_timeout() == 0 {
                self.visible.put(message.clone());
            } else {
                state
                    .inflight
                    .insert(message.id().to_string(), message.clone());
            }
        }
    }

    pub fn remove(&self, receipt_handle: &str) -> Result<()> {
        self.core.remove_with(
            receipt_handle,
            |_, _, _| Ok(()),
            |state, message| {
                if state.inflight.remove(message.id()).is_none() {
                    // received with a zero timeout, so it went straight back to the heap
                    self.visible.with_buffer(|heap| heap.remove(message.id()));
                }
            },
        )
    }

    pub fn update_visibility_timeout(
        &self,
        receipt_handle: &str,
        visibility_timeout: u32,
    ) -> Result<()> {
        self.core
            .update_visibility_timeout_with(receipt_handle, visibility_timeout, |_, message| {
                self.visible.put(message)
            })
    }

    /// Makes a message popped by `receive` visible again.
    pub fn restore(&self, message: MessageRef) {
        self.visible.put(message);
    }

    pub fn set_queue_attributes(&self, attrs: &HashMap<String, String>) -> Result<()> {
        self.core.set_queue_attributes(attrs)
    }

    pub fn requeue_inflight_messages(&self) -> usize {
        self.core
            .requeue_inflight_with(|_, message| self.visible.put(message))
    }

    pub fn enqueue_delayed_messages(&self) -> usize {
        self.core
            .enqueue_delayed_with(|_, message| self.visible.put(message))
    }

    pub fn remove_expired_messages(&self) -> usize {
        let threshold = self.core.now() - self.core.message_retention_period() as f64;
        let _state = self.core.state.lock();
        let expired = self
            .visible
            .with_buffer(|heap| heap.remove_expired(threshold));
        for message in &expired {
            debug!(queue = %self.core.arn(), message_id = %message.id(), "message expired");
        }
        expired.len()
    }

    pub fn approx_number_of_messages(&self) -> usize {
        self.visible.len()
    }

    pub fn clear(&self) {
        let mut state = self.core.state.lock();
        state.clear_messages();
        self.visible.clear();
    }

    pub fn purge(&self, delay_retry: bool) -> Result<()> {
        self.core
            .purge_with(delay_retry, |_| self.visible.clear())
    }

    pub fn shutdown(&self) {
        self.visible.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqs::clock::ManualClock;
    use crate::sqs::sequence::MessageSequence;

    fn queue(attrs: &[(&str, &str)]) -> (StandardQueue, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let ctx = QueueContext {
            clock: clock.clone(),
            sequence: Arc::new(MessageSequence::new()),
        };
        let attrs: HashMap<String, String> = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let queue =
            StandardQueue::new("q", "us-east-1", "000000000000", Some(&attrs), None, &ctx)
                .unwrap();
        (queue, clock)
    }

    #[tokio::test]
    async fn zero_visibility_receive_keeps_message_visible() {
        let (queue, _clock) = queue(&[]);
        queue
            .put(MessageContent::new("a"), None, None, None, None)
            .unwrap();

        let result = queue.receive(1, Some(0), Some(0), false).await;
        assert_eq!(result.successful.len(), 1);
        assert_eq!(queue.approx_number_of_messages(), 1);
        assert_eq!(queue.core.approx_number_of_messages_not_visible(), 0);

        queue.remove(&result.receipt_handles[0]).unwrap();
        assert_eq!(queue.approx_number_of_messages(), 0);
    }

    #[tokio::test]
    async fn deleting_a_requeued_message_pulls_it_from_the_heap() {
        let (queue, clock) = queue(&[]);
        queue
            .put(MessageContent::new("a"), None, None, None, None)
            .unwrap();
        let first = queue.receive(1, Some(0), Some(5), false).await;

        clock.advance(6.0);
        assert_eq!(queue.requeue_inflight_messages(), 1);
        queue.remove(&first.receipt_handles[0]).unwrap();

        let second = queue.receive(1, Some(0), None, false).await;
        assert!(second.successful.is_empty());
    }

    #[tokio::test]
    async fn delayed_message_waits_for_the_sweep() {
        let (queue, clock) = queue(&[("DelaySeconds", "10")]);
        queue
            .put(MessageContent::new("a"), None, None, None, None)
            .unwrap();
        assert_eq!(queue.core.approx_number_of_messages_delayed(), 1);

        clock.advance(5.0);
        assert_eq!(queue.enqueue_delayed_messages(), 0);
        clock.advance(6.0);
        assert_eq!(queue.enqueue_delayed_messages(), 1);
        assert_eq!(queue.approx_number_of_messages(), 1);
    }

    #[tokio::test]
    async fn deduplication_id_is_rejected() {
        let (queue, _clock) = queue(&[]);
        let err = queue
            .put(MessageContent::new("a"), None, Some("d".into()), None, None)
            .unwrap_err();
        assert!(matches!(err, SqsError::InvalidParameterValue(_)));
    }

    #[tokio::test]
    async fn retention_drops_old_visible_messages() {
        let (queue, clock) = queue(&[("MessageRetentionPeriod", "60")]);
        queue
            .put(MessageContent::new("old"), None, None, None, None)
            .unwrap();
        clock.advance(30.0);
        queue
            .put(MessageContent::new("new"), None, None, None, None)
            .unwrap();
        clock.advance(31.0);
        assert_eq!(queue.remove_expired_messages(), 1);
        assert_eq!(queue.approx_number_of_messages(), 1);
    }

    #[tokio::test]
    async fn purge_is_rate_limited() {
        let (queue, clock) = queue(&[]);
        queue.purge(true).unwrap();
        assert!(matches!(
            queue.purge(true),
            Err(SqsError::PurgeQueueInProgress(_))
        ));
        queue.purge(false).unwrap();
        clock.advance(61.0);
        queue.purge(true).unwrap();
    }
}
