mod fifo;
mod standard;

pub use fifo::{FifoQueue, MessageGroup};
pub use standard::StandardQueue;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::arn::{partition_for_region, queue_arn, queue_url};
use super::attributes::{
    QueueAttributes, QueueKind, RedrivePolicy, ALL, APPROXIMATE_NUMBER_OF_MESSAGES,
    APPROXIMATE_NUMBER_OF_MESSAGES_DELAYED, APPROXIMATE_NUMBER_OF_MESSAGES_NOT_VISIBLE,
    FIFO_QUEUE, QUEUE_ARN, QUEUE_ATTRIBUTE_NAMES,
};
use super::clock::SharedClock;
use super::constants::PURGE_RETRY_INTERVAL;
use super::error::{Result, SqsError};
use super::message::{Message, MessageContent, MessageRef, ReceiveResult};
use super::receipt::{decode_receipt_handle, encode_receipt_handle, ReceiptHandleInfo};
use super::sequence::MessageSequence;
use super::validation::validate_queue_name;

/// Collaborators every queue of an engine shares.
#[derive(Clone)]
pub struct QueueContext {
    pub clock: SharedClock,
    pub sequence: Arc<MessageSequence>,
}

/// Structures guarded by the queue mutex.
#[derive(Debug, Default)]
pub(crate) struct QueueState<S> {
    pub(crate) delayed: HashMap<String, MessageRef>,
    pub(crate) inflight: HashMap<String, MessageRef>,
    pub(crate) receipts: HashMap<String, MessageRef>,
    pub(crate) purge_timestamp: Option<f64>,
    pub(crate) ext: S,
}

impl<S> QueueState<S> {
    fn clear_messages(&mut self) {
        self.delayed.clear();
        self.inflight.clear();
        self.receipts.clear();
    }
}

/// Identity, attributes and the receipt/inflight/delay bookkeeping common to both queue types.
pub struct QueueCore<S> {
    name: String,
    region: String,
    account_id: String,
    arn: String,
    kind: QueueKind,
    clock: SharedClock,
    sequence: Arc<MessageSequence>,
    ordinal: AtomicU64,
    attributes: RwLock<QueueAttributes>,
    tags: RwLock<HashMap<String, String>>,
    pub(crate) state: Mutex<QueueState<S>>,
}

impl<S: Default> QueueCore<S> {
    fn new(
        name: &str,
        region: &str,
        account_id: &str,
        kind: QueueKind,
        attributes: Option<&HashMap<String, String>>,
        tags: Option<HashMap<String, String>>,
        ctx: &QueueContext,
    ) -> Result<Self> {
        validate_queue_name(name, kind)?;
        let now = ctx.clock.now();
        let mut queue_attributes = QueueAttributes::new(kind, now as i64);
        if let Some(attrs) = attributes {
            QueueAttributes::validate_names(kind, attrs)?;
            queue_attributes.apply(attrs)?;
        }
        Ok(QueueCore {
            name: name.to_string(),
            region: region.to_string(),
            account_id: account_id.to_string(),
            arn: queue_arn(name, account_id, region),
            kind,
            clock: ctx.clock.clone(),
            sequence: ctx.sequence.clone(),
            ordinal: AtomicU64::new(0),
            attributes: RwLock::new(queue_attributes),
            tags: RwLock::new(tags.unwrap_or_default()),
            state: Mutex::new(QueueState::default()),
        })
    }
}

impl<S> QueueCore<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn arn(&self) -> &str {
        &self.arn
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub(crate) fn next_sequence_number(&self) -> String {
        self.sequence.next()
    }

    pub(crate) fn next_ordinal(&self) -> u64 {
        self.ordinal.fetch_add(1, Ordering::Relaxed)
    }

    pub fn attributes(&self) -> QueueAttributes {
        self.attributes.read().clone()
    }

    pub fn visibility_timeout(&self) -> u32 {
        self.attributes.read().visibility_timeout
    }

    pub fn delay_seconds(&self) -> u32 {
        self.attributes.read().delay_seconds
    }

    pub fn wait_time_seconds(&self) -> u32 {
        self.attributes.read().receive_message_wait_time_seconds
    }

    pub fn maximum_message_size(&self) -> u32 {
        self.attributes.read().maximum_message_size
    }

    pub fn message_retention_period(&self) -> u32 {
        self.attributes.read().message_retention_period
    }

    pub fn redrive_policy(&self) -> Option<RedrivePolicy> {
        self.attributes.read().redrive_policy.clone()
    }

    pub fn max_receive_count(&self) -> Option<u32> {
        self.attributes
            .read()
            .redrive_policy
            .as_ref()
            .map(|rp| rp.max_receive_count)
    }

    pub fn validate_queue_attributes(&self, attrs: &HashMap<String, String>) -> Result<()> {
        QueueAttributes::validate_names(self.kind, attrs)
    }

    pub fn set_queue_attributes(&self, attrs: &HashMap<String, String>) -> Result<()> {
        if attrs.is_empty() {
            return Ok(());
        }
        self.validate_queue_attributes(attrs)?;
        let mut current = self.attributes.write();
        let mut updated = current.clone();
        updated.apply(attrs)?;
        updated.last_modified_timestamp = self.now() as i64;
        *current = updated;
        Ok(())
    }

    /// Name of the first requested attribute that differs from the queue's current value.
    pub fn attribute_mismatch(&self, attrs: &HashMap<String, String>) -> Result<Option<String>> {
        self.validate_queue_attributes(attrs)?;
        let mut rest = attrs.clone();
        rest.remove(FIFO_QUEUE);
        Ok(self
            .attributes
            .read()
            .first_mismatch(&rest)?
            .map(String::from))
    }

    fn attribute_snapshot(&self, counts: [usize; 3]) -> BTreeMap<String, String> {
        let mut all = self.attributes.read().to_map();
        all.insert(QUEUE_ARN.into(), self.arn.clone());
        all.insert(APPROXIMATE_NUMBER_OF_MESSAGES.into(), counts[0].to_string());
        all.insert(
            APPROXIMATE_NUMBER_OF_MESSAGES_NOT_VISIBLE.into(),
            counts[1].to_string(),
        );
        all.insert(
            APPROXIMATE_NUMBER_OF_MESSAGES_DELAYED.into(),
            counts[2].to_string(),
        );
        all
    }

    /// Resolves the requested attribute names against a snapshot taken with the given
    /// visible/not-visible/delayed counts.
    fn select_attributes(
        &self,
        names: &[String],
        counts: [usize; 3],
    ) -> Result<BTreeMap<String, String>> {
        if names.is_empty() {
            return Ok(BTreeMap::new());
        }
        for name in names {
            if name != ALL && !QUEUE_ATTRIBUTE_NAMES.contains(&name.as_str()) {
                return Err(SqsError::InvalidAttributeName(format!(
                    "Unknown Attribute {name}."
                )));
            }
        }
        let all = self.attribute_snapshot(counts);
        if names.iter().any(|n| n == ALL) {
            return Ok(all);
        }
        Ok(names
            .iter()
            .filter_map(|n| all.get(n).map(|v| (n.clone(), v.clone())))
            .collect())
    }

    pub fn tags(&self) -> HashMap<String, String> {
        self.tags.read().clone()
    }

    pub fn tag(&self, tags: HashMap<String, String>) {
        self.tags.write().extend(tags);
    }

    pub fn untag(&self, keys: &[String]) {
        let mut tags = self.tags.write();
        for key in keys {
            tags.remove(key);
        }
    }

    fn default_policy(&self) -> Value {
        json!({
            "Version": "2008-10-17",
            "Id": format!("{}/SQSDefaultPolicy", self.arn),
            "Statement": [],
        })
    }

    fn load_policy(&self, document: Option<&String>) -> Value {
        let mut policy = document
            .and_then(|doc| serde_json::from_str::<Value>(doc).ok())
            .filter(Value::is_object)
            .unwrap_or_else(|| self.default_policy());
        if !policy["Statement"].is_array() {
            policy["Statement"] = json!([]);
        }
        policy
    }

    pub fn add_permission(
        &self,
        label: &str,
        actions: &[String],
        account_ids: &[String],
    ) -> Result<()> {
        if actions.is_empty() {
            return Err(SqsError::MissingParameter(
                "The request must contain the parameter Actions.".into(),
            ));
        }
        if account_ids.is_empty() {
            return Err(SqsError::MissingParameter(
                "The request must contain the parameter AWSAccountIds.".into(),
            ));
        }
        let partition = partition_for_region(&self.region);
        let principals: Vec<String> = account_ids
            .iter()
            .map(|id| format!("arn:{partition}:iam::{id}:root"))
            .collect();
        let actions: Vec<String> = actions.iter().map(|a| format!("SQS:{a}")).collect();
        let statement = json!({
            "Sid": label,
            "Effect": "Allow",
            "Principal": { "AWS": one_or_many(principals) },
            "Action": one_or_many(actions),
            "Resource": self.arn,
        });

        let mut attributes = self.attributes.write();
        let mut policy = self.load_policy(attributes.policy.as_ref());
        let statements = policy["Statement"].as_array_mut().ok_or_else(|| {
            SqsError::InvalidAttributeValue("Policy statement list is malformed.".into())
        })?;
        if statements.iter().any(|s| s["Sid"] == label) {
            return Err(SqsError::InvalidParameterValue(format!(
                "Value {label} for parameter Label is invalid. Reason: Already exists."
            )));
        }
        statements.push(statement);
        attributes.policy = Some(policy.to_string());
        Ok(())
    }

    pub fn remove_permission(&self, label: &str) -> Result<()> {
        let mut attributes = self.attributes.write();
        let mut policy = self.load_policy(attributes.policy.as_ref());
        let statements = policy["Statement"].as_array_mut().ok_or_else(|| {
            SqsError::InvalidAttributeValue("Policy statement list is malformed.".into())
        })?;
        let before = statements.len();
        statements.retain(|s| s["Sid"] != label);
        if statements.len() == before {
            return Err(SqsError::InvalidParameterValue(format!(
                "Value {label} for parameter Label is invalid. Reason: can't find label."
            )));
        }
        attributes.policy = if statements.is_empty() {
            None
        } else {
            Some(policy.to_string())
        };
        Ok(())
    }

    pub fn validate_receipt_handle(&self, receipt_handle: &str) -> Result<ReceiptHandleInfo> {
        let info = decode_receipt_handle(receipt_handle)?;
        if info.queue_arn != self.arn {
            return Err(SqsError::ReceiptHandleIsInvalid(format!(
                "The input receipt handle \"{receipt_handle}\" is not a valid receipt handle."
            )));
        }
        Ok(info)
    }

    pub fn create_receipt_handle(&self, message: &Message) -> String {
        let last_received = message.last_received().unwrap_or_else(|| self.now());
        encode_receipt_handle(&self.arn, message.id(), last_received)
    }

    /// Mints a handle for a fresh delivery and records it.
    pub(crate) fn register_delivery(
        &self,
        state: &mut QueueState<S>,
        message: &MessageRef,
    ) -> String {
        let handle = self.create_receipt_handle(message);
        message.add_receipt_handle(handle.clone());
        state.receipts.insert(handle.clone(), message.clone());
        handle
    }

    /// Counts a delivery of `message` and sorts it into the result.
    pub(crate) fn accept_delivery(
        &self,
        message: MessageRef,
        visibility_timeout: u32,
        max_receive_count: Option<u32>,
        result: &mut ReceiveResult,
    ) {
        let receive_count = message.mark_received(visibility_timeout, self.now());
        debug!(queue = %self.arn, message_id = %message.id(), "de-queued message");
        match max_receive_count {
            Some(max) if receive_count > max => {
                debug!(
                    queue = %self.arn,
                    message_id = %message.id(),
                    receive_count,
                    "message exceeded its receive count, marking it for DLQ"
                );
                result.dead_letter_messages.push(message);
            }
            _ => {
                message.increment_approximate_receive_count();
                result.successful.push(message);
            }
        }
    }

    pub(crate) fn update_visibility_timeout_with(
        &self,
        receipt_handle: &str,
        visibility_timeout: u32,
        requeue: impl FnOnce(&mut QueueState<S>, MessageRef),
    ) -> Result<()> {
        self.validate_receipt_handle(receipt_handle)?;
        let mut state = self.state.lock();
        let message = state.receipts.get(receipt_handle).cloned().ok_or_else(|| {
            SqsError::InvalidParameterValue(format!(
                "Value {receipt_handle} for parameter ReceiptHandle is invalid. Reason: Message \
                 does not exist or is not available for visibility timeout change."
            ))
        })?;
        if !state.inflight.contains_key(message.id()) {
            return Ok(());
        }
        message.update_visibility_timeout(visibility_timeout, self.now());
        if visibility_timeout == 0 {
            info!(queue = %self.arn, message_id = %message.id(), "terminating the visibility timeout");
            state.inflight.remove(message.id());
            requeue(&mut *state, message);
        }
        Ok(())
    }

    /// Deletes the message behind `receipt_handle`. Unknown handles are a no-op.
    pub(crate) fn remove_with(
        &self,
        receipt_handle: &str,
        pre_delete: impl FnOnce(&Message, &ReceiptHandleInfo, f64) -> Result<()>,
        on_remove: impl FnOnce(&mut QueueState<S>, &MessageRef),
    ) -> Result<()> {
        let info = self.validate_receipt_handle(receipt_handle)?;
        let mut state = self.state.lock();
        let Some(message) = state.receipts.get(receipt_handle).cloned() else {
            debug!(queue = %self.arn, receipt_handle, "no in-flight message found for receipt handle");
            return Ok(());
        };
        pre_delete(message.as_ref(), &info, self.now())?;
        message.mark_deleted();
        debug!(queue = %self.arn, message_id = %message.id(), "deleting message");
        for handle in message.take_receipt_handles() {
            state.receipts.remove(&handle);
        }
        on_remove(&mut *state, &message);
        Ok(())
    }

    pub(crate) fn requeue_inflight_with(
        &self,
        mut put: impl FnMut(&mut QueueState<S>, MessageRef),
    ) -> usize {
        let mut state = self.state.lock();
        if state.inflight.is_empty() {
            return 0;
        }
        let now = self.now();
        let visible: Vec<MessageRef> = state
            .inflight
            .values()
            .filter(|m| m.is_visible(now))
            .cloned()
            .collect();
        for message in &visible {
            debug!(queue = %self.arn, message_id = %message.id(), "re-queueing inflight message");
            state.inflight.remove(message.id());
            put(&mut *state, message.clone());
        }
        visible.len()
    }

    pub(crate) fn enqueue_delayed_with(
        &self,
        mut put: impl FnMut(&mut QueueState<S>, MessageRef),
    ) -> usize {
        let mut state = self.state.lock();
        if state.delayed.is_empty() {
            return 0;
        }
        let now = self.now();
        let ready: Vec<MessageRef> = state
            .delayed
            .values()
            .filter(|m| !m.is_delayed(now))
            .cloned()
            .collect();
        for message in &ready {
            debug!(queue = %self.arn, message_id = %message.id(), "enqueueing delayed message");
            state.delayed.remove(message.id());
            put(&mut *state, message.clone());
        }
        ready.len()
    }

    /// Builds a message stamped with the current time as both creation time and priority.
    pub(crate) fn new_message(&self, content: MessageContent, now: f64) -> Message {
        Message::new(content, now, now, self.next_ordinal())
    }

    fn purge_with(&self, delay_retry: bool, clear: impl FnOnce(&mut QueueState<S>)) -> Result<()> {
        let now = self.now();
        let mut state = self.state.lock();
        if delay_retry {
            if let Some(last) = state.purge_timestamp {
                if last + PURGE_RETRY_INTERVAL > now {
                    return Err(SqsError::PurgeQueueInProgress(format!(
                        "Only one PurgeQueue operation on {} is allowed every 60 seconds.",
                        self.name
                    )));
                }
            }
        }
        state.purge_timestamp = Some(now);
        state.clear_messages();
        clear(&mut *state);
        info!(queue = %self.arn, "purged queue");
        Ok(())
    }

    pub fn approx_number_of_messages_not_visible(&self) -> usize {
        self.state.lock().inflight.len()
    }

    pub fn approx_number_of_messages_delayed(&self) -> usize {
        self.state.lock().delayed.len()
    }
}

fn one_or_many(mut values: Vec<String>) -> Value {
    if values.len() == 1 {
        Value::String(values.remove(0))
    } else {
        json!(values)
    }
}

/// Standard or FIFO queue; the two differ only in how messages are put, received and removed.
pub enum Queue {
    Standard(StandardQueue),
    Fifo(FifoQueue),
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue").field("arn", &self.arn()).finish_non_exhaustive()
    }
}

macro_rules! dispatch {
    ($queue:expr, $q:ident => $body:expr) => {
        match $queue {
            Queue::Standard($q) => $body,
            Queue::Fifo($q) => $body,
        }
    };
}

impl Queue {
    /// Creates a queue; `FifoQueue=true` in `attributes` selects the FIFO variant.
    pub fn create(
        name: &str,
        region: &str,
        account_id: &str,
        attributes: Option<&HashMap<String, String>>,
        tags: Option<HashMap<String, String>>,
        ctx: &QueueContext,
    ) -> Result<Queue> {
        let fifo = attributes
            .and_then(|a| a.get(FIFO_QUEUE))
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        if fifo {
            FifoQueue::new(name, region, account_id, attributes, tags, ctx).map(Queue::Fifo)
        } else {
            StandardQueue::new(name, region, account_id, attributes, tags, ctx)
                .map(Queue::Standard)
        }
    }

    pub fn kind(&self) -> QueueKind {
        match self {
            Queue::Standard(_) => QueueKind::Standard,
            Queue::Fifo(_) => QueueKind::Fifo,
        }
    }

    pub fn is_fifo(&self) -> bool {
        matches!(self, Queue::Fifo(_))
    }

    pub fn name(&self) -> &str {
        dispatch!(self, q => q.core.name())
    }

    pub fn arn(&self) -> &str {
        dispatch!(self, q => q.core.arn())
    }

    pub fn region(&self) -> &str {
        dispatch!(self, q => q.core.region())
    }

    pub fn account_id(&self) -> &str {
        dispatch!(self, q => q.core.account_id())
    }

    pub fn url(&self, host: &str) -> String {
        queue_url(host, self.account_id(), self.name())
    }

    pub fn put(
        &self,
        content: MessageContent,
        visibility_timeout: Option<u32>,
        message_deduplication_id: Option<String>,
        message_group_id: Option<String>,
        delay_seconds: Option<u32>,
    ) -> Result<MessageRef> {
        dispatch!(self, q => q.put(
            content,
            visibility_timeout,
            message_deduplication_id,
            message_group_id,
            delay_seconds,
        ))
    }

    pub async fn receive(
        &self,
        num_messages: usize,
        wait_time_seconds: Option<u32>,
        visibility_timeout: Option<u32>,
        poll_empty_queue: bool,
    ) -> ReceiveResult {
        match self {
            Queue::Standard(q) => {
                q.receive(num_messages, wait_time_seconds, visibility_timeout, poll_empty_queue)
                    .await
            }
            Queue::Fifo(q) => {
                q.receive(num_messages, wait_time_seconds, visibility_timeout, poll_empty_queue)
                    .await
            }
        }
    }

    pub fn remove(&self, receipt_handle: &str) -> Result<()> {
        dispatch!(self, q => q.remove(receipt_handle))
    }

    pub fn update_visibility_timeout(
        &self,
        receipt_handle: &str,
        visibility_timeout: u32,
    ) -> Result<()> {
        dispatch!(self, q => q.update_visibility_timeout(receipt_handle, visibility_timeout))
    }

    /// Puts back a message that `receive` took out but did not deliver.
    pub fn restore(&self, message: MessageRef) {
        dispatch!(self, q => q.restore(message))
    }

    /// Drops every message without touching identity, attributes or tags.
    pub fn clear(&self) {
        dispatch!(self, q => q.clear())
    }

    /// Clears the queue, refusing a repeat within 60 s when `delay_retry` is set.
    pub fn purge(&self, delay_retry: bool) -> Result<()> {
        dispatch!(self, q => q.purge(delay_retry))
    }

    pub fn requeue_inflight_messages(&self) -> usize {
        dispatch!(self, q => q.requeue_inflight_messages())
    }

    pub fn enqueue_delayed_messages(&self) -> usize {
        dispatch!(self, q => q.enqueue_delayed_messages())
    }

    pub fn remove_expired_messages(&self) -> usize {
        dispatch!(self, q => q.remove_expired_messages())
    }

    /// Wakes every blocked receive with an empty result.
    pub fn shutdown(&self) {
        dispatch!(self, q => q.shutdown())
    }

    pub fn approx_number_of_messages(&self) -> usize {
        dispatch!(self, q => q.approx_number_of_messages())
    }

    pub fn approx_number_of_messages_not_visible(&self) -> usize {
        dispatch!(self, q => q.core.approx_number_of_messages_not_visible())
    }

    pub fn approx_number_of_messages_delayed(&self) -> usize {
        dispatch!(self, q => q.core.approx_number_of_messages_delayed())
    }

    /// Empty `names` yields an empty map, `All` yields everything.
    pub fn get_queue_attributes(&self, names: &[String]) -> Result<BTreeMap<String, String>> {
        let counts = [
            self.approx_number_of_messages(),
            self.approx_number_of_messages_not_visible(),
            self.approx_number_of_messages_delayed(),
        ];
        dispatch!(self, q => q.core.select_attributes(names, counts))
    }

    pub fn set_queue_attributes(&self, attrs: &HashMap<String, String>) -> Result<()> {
        dispatch!(self, q => q.set_queue_attributes(attrs))
    }

    pub fn validate_queue_attributes(&self, attrs: &HashMap<String, String>) -> Result<()> {
        dispatch!(self, q => q.core.validate_queue_attributes(attrs))
    }

    pub fn attribute_mismatch(&self, attrs: &HashMap<String, String>) -> Result<Option<String>> {
        dispatch!(self, q => q.core.attribute_mismatch(attrs))
    }

    pub fn attributes(&self) -> QueueAttributes {
        dispatch!(self, q => q.core.attributes())
    }

    pub fn redrive_policy(&self) -> Option<RedrivePolicy> {
        dispatch!(self, q => q.core.redrive_policy())
    }

    pub fn visibility_timeout(&self) -> u32 {
        dispatch!(self, q => q.core.visibility_timeout())
    }

    pub fn wait_time_seconds(&self) -> u32 {
        dispatch!(self, q => q.core.wait_time_seconds())
    }

    pub fn maximum_message_size(&self) -> u32 {
        dispatch!(self, q => q.core.maximum_message_size())
    }

    pub fn add_permission(
        &self,
        label: &str,
        actions: &[String],
        account_ids: &[String],
    ) -> Result<()> {
        dispatch!(self, q => q.core.add_permission(label, actions, account_ids))
    }

    pub fn remove_permission(&self, label: &str) -> Result<()> {
        dispatch!(self, q => q.core.remove_permission(label))
    }

    pub fn tags(&self) -> HashMap<String, String> {
        dispatch!(self, q => q.core.tags())
    }

    pub fn tag(&self, tags: HashMap<String, String>) {
        dispatch!(self, q => q.core.tag(tags))
    }

    pub fn untag(&self, keys: &[String]) {
        dispatch!(self, q => q.core.untag(keys))
    }

    pub fn create_receipt_handle(&self, message: &Message) -> String {
        dispatch!(self, q => q.core.create_receipt_handle(message))
    }

    /// Releases the group if none of its messages is in flight any more. No-op on standard queues.
    pub fn update_message_group_visibility(&self, message_group_id: &str) {
        if let Queue::Fifo(q) = self {
            q.update_message_group_visibility(message_group_id);
        }
    }
}
