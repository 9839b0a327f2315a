use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::{QueueContext, QueueCore, QueueState};
use crate::sqs::attributes::{QueueKind, DELAY_SECONDS};
use crate::sqs::blocking::{Buffer, GroupScheduler, InterruptibleQueue, MessageHeap};
use crate::sqs::constants::DEDUPLICATION_INTERVAL_IN_SEC;
use crate::sqs::error::{Result, SqsError};
use crate::sqs::message::{sha256_hex, MessageContent, MessageRef, ReceiveResult};

/// Messages sharing a group id, oldest first.
#[derive(Debug)]
pub struct MessageGroup {
    id: String,
    messages: MessageHeap,
}

impl MessageGroup {
    pub fn new(id: impl Into<String>) -> Self {
        MessageGroup {
            id: id.into(),
            messages: MessageHeap::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: MessageRef) {
        self.messages.push(message);
    }

    pub fn pop(&mut self) -> Option<MessageRef> {
        self.messages.pop()
    }
}

#[derive(Debug, Default)]
pub(crate) struct FifoState {
    deduplication: HashMap<String, MessageRef>,
    message_groups: HashMap<String, MessageGroup>,
    /// Groups with a delivery outstanding. Never handed out while listed here.
    inflight_groups: HashSet<String>,
}

/// Exactly-once, per-group ordered queue.
pub struct FifoQueue {
    pub(crate) core: QueueCore<FifoState>,
    message_group_queue: GroupScheduler,
    /// Read at creation; later changes to the attribute do not alter deduplication.
    deduplication_scope: String,
}

impl FifoQueue {
    pub fn new(
        name: &str,
        region: &str,
        account_id: &str,
        attributes: Option<&HashMap<String, String>>,
        tags: Option<HashMap<String, String>>,
        ctx: &QueueContext,
    ) -> Result<Self> {
        let core = QueueCore::new(
            name,
            region,
            account_id,
            QueueKind::Fifo,
            attributes,
            tags,
            ctx,
        )?;
        let deduplication_scope = core.attributes().deduplication_scope;
        Ok(FifoQueue {
            core,
            message_group_queue: InterruptibleQueue::new(),
            deduplication_scope,
        })
    }

    pub fn put(
        &self,
        mut content: MessageContent,
        visibility_timeout: Option<u32>,
        message_deduplication_id: Option<String>,
        message_group_id: Option<String>,
        delay_seconds: Option<u32>,
    ) -> Result<MessageRef> {
        if let Some(delay) = delay_seconds.filter(|d| *d > 0) {
            return Err(SqsError::InvalidParameterValue(format!(
                "Value {delay} for parameter DelaySeconds is invalid. Reason: The request include \
                 parameter that is not valid for this queue type."
            )));
        }
        let group_id = message_group_id
            .filter(|g| !g.is_empty())
            .ok_or_else(|| {
                SqsError::MissingParameter(
                    "The request must contain the parameter MessageGroupId.".into(),
                )
            })?;
        let attributes = self.core.attributes();
        let dedup_id = match message_deduplication_id.filter(|d| !d.is_empty()) {
            Some(id) => id,
            None if attributes.content_based_deduplication => {
                sha256_hex(content.body.as_bytes())
            }
            None => {
                return Err(SqsError::InvalidParameterValue(
                    "The queue should either have ContentBasedDeduplication enabled or \
                     MessageDeduplicationId provided explicitly"
                        .into(),
                ))
            }
        };

        let now = self.core.now();
        let mut state = self.core.state.lock();
        state
            .ext
            .deduplication
            .retain(|_, m| m.priority() + DEDUPLICATION_INTERVAL_IN_SEC > now);
        let duplicate_of = state
            .ext
            .deduplication
            .get(&dedup_id)
            .filter(|original| {
                self.deduplication_scope != "messageGroup"
                    || original.group_id() == Some(group_id.as_str())
            })
            .map(|original| original.id().to_string());
        let duplicate = duplicate_of.is_some();
        if let Some(original_id) = duplicate_of {
            content.message_id = original_id;
        }

        let sequence_number = self.core.next_sequence_number();
        let message = Arc::new(
            self.core
                .new_message(content, now)
                .with_fifo(group_id, dedup_id.clone(), sequence_number)
                .with_visibility_timeout(
                    visibility_timeout.unwrap_or(attributes.visibility_timeout),
                )
                .with_delay_seconds(Some(attributes.delay_seconds)),
        );
        if duplicate {
            debug!(queue = %self.core.arn(), message_id = %message.id(), dedup_id = %dedup_id, "dropping duplicate message");
            return Ok(message);
        }

        if message.is_delayed(now) {
            state
                .delayed
                .insert(message.id().to_string(), message.clone());
        } else {
            self.put_message(&mut state, message.clone());
        }
        state.ext.deduplication.insert(dedup_id, message.clone());
        Ok(message)
    }

    /// Places a visible message into its group and schedules the group if it may be handed out.
    fn put_message(&self, state: &mut QueueState<FifoState>, message: MessageRef) {
        let Some(group_id) = message.group_id().map(str::to_string) else {
            return;
        };
        let fresh = message.receive_count() < 1;
        let ext = &mut state.ext;
        let group = ext
            .message_groups
            .entry(group_id.clone())
            .or_insert_with(|| MessageGroup::new(group_id.clone()));
        let previously_empty = group.is_empty();
        group.push(message);

        if ext.inflight_groups.contains(&group_id) {
            // a new message must not release a group that is being worked on
            if fresh {
                return;
            }
            ext.inflight_groups.remove(&group_id);
            self.message_group_queue.put(group_id);
        } else if previously_empty {
            self.message_group_queue.put(group_id);
        }
    }

    /// Fills up to `num_messages`, draining one group at a time before moving to the next.
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
        let mut touched_groups = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(group_id) = self.message_group_queue.get(block, remaining).await else {
                break;
            };
            if !self.drain_group(
                &group_id,
                num_messages,
                visibility_timeout,
                max_receive_count,
                &mut result,
            ) {
                continue;
            }
            touched_groups.push(group_id);
            if !poll_empty_queue {
                block = false;
            }
            if result.successful.len() >= num_messages {
                break;
            }
        }

        self.register(&mut result, &touched_groups);
        result
    }

    /// Claims the group and pops its messages into `result`. False if the group was not claimable.
    fn drain_group(
        &self,
        group_id: &str,
        num_messages: usize,
        visibility_timeout: u32,
        max_receive_count: Option<u32>,
        result: &mut ReceiveResult,
    ) -> bool {
        let mut state = self.core.state.lock();
        let FifoState {
            message_groups,
            inflight_groups,
            ..
        } = &mut state.ext;
        let Some(group) = message_groups.get_mut(group_id) else {
            return false;
        };
        // empty groups linger after deletes or expiry; stale entries can name a claimed group
        if group.is_empty() || inflight_groups.contains(group_id) {
            return false;
        }
        inflight_groups.insert(group_id.to_string());

        while result.successful.len() < num_messages {
            let Some(message) = group.pop() else {
                break;
            };
            if message.is_deleted() {
                continue;
            }
            self.core
                .accept_delivery(message, visibility_timeout, max_receive_count, result);
        }
        true
    }

    fn register(&self, result: &mut ReceiveResult, touched_groups: &[String]) {
        if touched_groups.is_empty() {
            return;
        }
        let mut state = self.core.state.lock();
        for message in &result.successful {
            let handle = self.core.register_delivery(&mut state, message);
            result.receipt_handles.push(handle);
            if message.visibility_timeout() == 0 {
                self.put_message(&mut state, message.clone());
            } else {
                state
                    .inflight
                    .insert(message.id().to_string(), message.clone());
            }
        }
        // groups drained only into the dead-letter list or past deleted entries have nothing in flight
        for group_id in touched_groups {
            self.update_group_visibility(&mut state, group_id);
        }
    }

    fn update_group_visibility(&self, state: &mut QueueState<FifoState>, group_id: &str) {
        if !state.ext.inflight_groups.contains(group_id) {
            return;
        }
        if state
            .inflight
            .values()
            .any(|m| m.group_id() == Some(group_id))
        {
            return;
        }
        state.ext.inflight_groups.remove(group_id);
        if state
            .ext
            .message_groups
            .get(group_id)
            .is_some_and(|g| !g.is_empty())
        {
            self.message_group_queue.put(group_id.to_string());
        }
    }

    /// Returns a message popped by `receive` to its group without releasing a claimed group.
    pub fn restore(&self, message: MessageRef) {
        let Some(group_id) = message.group_id().map(str::to_string) else {
            return;
        };
        let mut state = self.core.state.lock();
        let ext = &mut state.ext;
        let group = ext
            .message_groups
            .entry(group_id.clone())
            .or_insert_with(|| MessageGroup::new(group_id.clone()));
        let previously_empty = group.is_empty();
        group.push(message);
        if previously_empty && !ext.inflight_groups.contains(&group_id) {
            self.message_group_queue.put(group_id);
        }
    }

    pub fn update_message_group_visibility(&self, group_id: &str) {
        let mut state = self.core.state.lock();
        self.update_group_visibility(&mut state, group_id);
    }

    pub fn remove(&self, receipt_handle: &str) -> Result<()> {
        self.core.remove_with(
            receipt_handle,
            |message, info, now| {
                if now - info.last_received > message.visibility_timeout() as f64 {
                    return Err(SqsError::InvalidParameterValue(format!(
                        "Value {receipt_handle} for parameter ReceiptHandle is invalid. Reason: \
                         The receipt handle has expired."
                    )));
                }
                Ok(())
            },
            |state, message| {
                state.inflight.remove(message.id());
                if let Some(group_id) = message.group_id() {
                    self.update_group_visibility(state, group_id);
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
            .update_visibility_timeout_with(receipt_handle, visibility_timeout, |state, message| {
                self.put_message(state, message)
            })
    }

    /// Also moves the new `DelaySeconds` onto messages that are still delayed.
    pub fn set_queue_attributes(&self, attrs: &HashMap<String, String>) -> Result<()> {
        self.core.set_queue_attributes(attrs)?;
        if attrs.contains_key(DELAY_SECONDS) {
            let delay = self.core.delay_seconds();
            let state = self.core.state.lock();
            for message in state.delayed.values() {
                message.set_delay_seconds(delay);
            }
        }
        Ok(())
    }

    pub fn requeue_inflight_messages(&self) -> usize {
        self.core
            .requeue_inflight_with(|state, message| self.put_message(state, message))
    }

    pub fn enqueue_delayed_messages(&self) -> usize {
        self.core
            .enqueue_delayed_with(|state, message| self.put_message(state, message))
    }

    pub fn remove_expired_messages(&self) -> usize {
        let threshold = self.core.now() - self.core.message_retention_period() as f64;
        let mut state = self.core.state.lock();
        let mut removed = 0;
        for group in state.ext.message_groups.values_mut() {
            for message in group.messages.remove_expired(threshold) {
                debug!(
                    queue = %self.core.arn(),
                    message_id = %message.id(),
                    group = %group.id,
                    "message expired"
                );
                removed += 1;
            }
        }
        removed
    }

    pub fn approx_number_of_messages(&self) -> usize {
        let state = self.core.state.lock();
        state.ext.message_groups.values().map(MessageGroup::len).sum()
    }

    pub fn clear(&self) {
        let mut state = self.core.state.lock();
        state.clear_messages();
        state.ext = FifoState::default();
        self.message_group_queue.clear();
    }

    pub fn purge(&self, delay_retry: bool) -> Result<()> {
        self.core.purge_with(delay_retry, |state| {
            state.ext = FifoState::default();
            self.message_group_queue.clear();
        })
    }

    pub fn shutdown(&self) {
        self.message_group_queue.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqs::clock::ManualClock;
    use crate::sqs::sequence::MessageSequence;

    fn queue(attrs: &[(&str, &str)]) -> (FifoQueue, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let ctx = QueueContext {
            clock: clock.clone(),
            sequence: Arc::new(MessageSequence::new()),
        };
        let mut map: HashMap<String, String> = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        map.insert("FifoQueue".into(), "true".into());
        let queue =
            FifoQueue::new("q.fifo", "us-east-1", "000000000000", Some(&map), None, &ctx)
                .unwrap();
        (queue, clock)
    }

    fn send(queue: &FifoQueue, body: &str, group: &str, dedup: &str) -> MessageRef {
        queue
            .put(
                MessageContent::new(body),
                None,
                Some(dedup.into()),
                Some(group.into()),
                None,
            )
            .unwrap()
    }

    fn bodies(result: &ReceiveResult) -> Vec<&str> {
        result.successful.iter().map(|m| m.body()).collect()
    }

    #[tokio::test]
    async fn claimed_group_stays_hidden_until_deleted() {
        let (queue, _clock) = queue(&[]);
        send(&queue, "a1", "a", "1");
        send(&queue, "a2", "a", "2");
        send(&queue, "b1", "b", "3");

        let first = queue.receive(1, Some(0), None, false).await;
        assert_eq!(bodies(&first), vec!["a1"]);

        let second = queue.receive(10, Some(0), None, false).await;
        assert_eq!(bodies(&second), vec!["b1"]);

        let third = queue.receive(10, Some(0), None, false).await;
        assert!(third.successful.is_empty());

        queue.remove(&first.receipt_handles[0]).unwrap();
        let fourth = queue.receive(10, Some(0), None, false).await;
        assert_eq!(bodies(&fourth), vec!["a2"]);
    }

    #[tokio::test]
    async fn duplicates_within_the_window_are_dropped() {
        let (queue, clock) = queue(&[]);
        let original = send(&queue, "x", "g", "same");
        let duplicate = send(&queue, "x", "g", "same");
        assert_eq!(original.id(), duplicate.id());
        assert_eq!(queue.approx_number_of_messages(), 1);

        clock.advance(DEDUPLICATION_INTERVAL_IN_SEC + 1.0);
        let later = send(&queue, "x", "g", "same");
        assert_ne!(original.id(), later.id());
        assert_eq!(queue.approx_number_of_messages(), 2);
    }

    #[tokio::test]
    async fn message_group_scope_deduplicates_per_group() {
        let (queue, _clock) = queue(&[("DeduplicationScope", "messageGroup")]);
        let a = send(&queue, "x", "a", "same");
        let b = send(&queue, "x", "b", "same");
        assert_ne!(a.id(), b.id());
        assert_eq!(queue.approx_number_of_messages(), 2);
    }

    #[tokio::test]
    async fn content_based_deduplication_hashes_the_body() {
        let (queue, _clock) = queue(&[("ContentBasedDeduplication", "true")]);
        let first = queue
            .put(MessageContent::new("body"), None, None, Some("g".into()), None)
            .unwrap();
        assert_eq!(first.dedup_id(), Some(sha256_hex(b"body").as_str()));
        queue
            .put(MessageContent::new("body"), None, None, Some("g".into()), None)
            .unwrap();
        assert_eq!(queue.approx_number_of_messages(), 1);
    }

    #[tokio::test]
    async fn put_rejects_per_message_delay_and_missing_ids() {
        let (queue, _clock) = queue(&[]);
        let delayed = queue.put(
            MessageContent::new("x"),
            None,
            Some("d".into()),
            Some("g".into()),
            Some(5),
        );
        assert!(matches!(delayed, Err(SqsError::InvalidParameterValue(_))));

        let no_group = queue.put(MessageContent::new("x"), None, Some("d".into()), None, None);
        assert!(matches!(no_group, Err(SqsError::MissingParameter(_))));

        let no_dedup = queue.put(MessageContent::new("x"), None, None, Some("g".into()), None);
        assert!(matches!(no_dedup, Err(SqsError::InvalidParameterValue(_))));

        queue
            .put(
                MessageContent::new("x"),
                None,
                Some("d".into()),
                Some("g".into()),
                Some(0),
            )
            .unwrap();
    }

    #[tokio::test]
    async fn expired_receipt_handle_cannot_delete() {
        let (queue, clock) = queue(&[]);
        send(&queue, "x", "g", "1");
        let result = queue.receive(1, Some(0), Some(10), false).await;
        clock.advance(11.0);
        let err = queue.remove(&result.receipt_handles[0]).unwrap_err();
        assert!(matches!(err, SqsError::InvalidParameterValue(_)));
    }

    #[tokio::test]
    async fn requeued_message_releases_its_group() {
        let (queue, clock) = queue(&[]);
        send(&queue, "x", "g", "1");
        queue.receive(1, Some(0), Some(5), false).await;
        assert!(queue.receive(1, Some(0), None, false).await.successful.is_empty());

        clock.advance(6.0);
        assert_eq!(queue.requeue_inflight_messages(), 1);
        let again = queue.receive(1, Some(0), None, false).await;
        assert_eq!(bodies(&again), vec!["x"]);
        assert_eq!(again.successful[0].receive_count(), 2);
    }

    #[tokio::test]
    async fn group_drained_to_dead_letters_is_released() {
        let policy = r#"{"deadLetterTargetArn":"arn:aws:sqs:us-east-1:000000000000:dlq.fifo","maxReceiveCount":1}"#;
        let (queue, _clock) = queue(&[("RedrivePolicy", policy)]);
        send(&queue, "x", "g", "1");

        let first = queue.receive(1, Some(0), Some(0), false).await;
        assert_eq!(first.successful.len(), 1);
        let second = queue.receive(1, Some(0), None, false).await;
        assert!(second.successful.is_empty());
        assert_eq!(second.dead_letter_messages.len(), 1);

        send(&queue, "y", "g", "2");
        let third = queue.receive(1, Some(0), None, false).await;
        assert_eq!(bodies(&third), vec!["y"]);
    }

    #[tokio::test]
    async fn retroactive_delay_change_applies_to_delayed_messages() {
        let (queue, clock) = queue(&[("DelaySeconds", "10")]);
        send(&queue, "x", "g", "1");
        assert_eq!(queue.core.approx_number_of_messages_delayed(), 1);

        let attrs = HashMap::from([("DelaySeconds".to_string(), "0".to_string())]);
        queue.set_queue_attributes(&attrs).unwrap();
        clock.advance(1.0);
        assert_eq!(queue.enqueue_delayed_messages(), 1);
        assert_eq!(queue.approx_number_of_messages(), 1);
    }
}
