use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use md5::{Digest as Md5Digest, Md5};
use parking_lot::Mutex;
use sha2::Sha256;
use uuid::Uuid;

use super::types::MessageAttributeValue;

pub const MESSAGE_GROUP_ID: &str = "MessageGroupId";
pub const MESSAGE_DEDUPLICATION_ID: &str = "MessageDeduplicationId";
pub const SEQUENCE_NUMBER: &str = "SequenceNumber";
pub const SENDER_ID: &str = "SenderId";
pub const SENT_TIMESTAMP: &str = "SentTimestamp";
pub const AWS_TRACE_HEADER: &str = "AWSTraceHeader";
pub const APPROXIMATE_RECEIVE_COUNT: &str = "ApproximateReceiveCount";
pub const APPROXIMATE_FIRST_RECEIVE_TIMESTAMP: &str = "ApproximateFirstReceiveTimestamp";
pub const DEAD_LETTER_QUEUE_SOURCE_ARN: &str = "DeadLetterQueueSourceArn";

pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Digest of message attributes as SQS computes it: names sorted, each field length-prefixed.
pub fn compute_md5_of_attributes(attrs: &HashMap<String, MessageAttributeValue>) -> Option<String> {
    if attrs.is_empty() {
        return None;
    }
    let mut keys: Vec<&String> = attrs.keys().collect();
    keys.sort();

    let mut buf: Vec<u8> = Vec::new();
    for key in keys {
        let attr = &attrs[key];
        push_length_prefixed(&mut buf, key.as_bytes());
        push_length_prefixed(&mut buf, attr.data_type.as_bytes());

        // transport type: 1 for String/Number, 2 for Binary
        if attr.data_type.starts_with("Binary") {
            buf.push(2);
            if let Some(ref bv) = attr.binary_value {
                let decoded = STANDARD.decode(bv).unwrap_or_default();
                push_length_prefixed(&mut buf, &decoded);
            }
        } else {
            buf.push(1);
            if let Some(ref sv) = attr.string_value {
                push_length_prefixed(&mut buf, sv.as_bytes());
            }
        }
    }

    Some(md5_hex(&buf))
}

fn push_length_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

/// The caller-built payload of a message. Never changes once enqueued.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageContent {
    pub message_id: String,
    pub body: String,
    pub md5_of_body: String,
    pub message_attributes: HashMap<String, MessageAttributeValue>,
    pub md5_of_message_attributes: Option<String>,
    /// System attributes such as `SenderId` and `SentTimestamp`.
    pub attributes: BTreeMap<String, String>,
}

impl MessageContent {
    pub fn new(body: impl Into<String>) -> Self {
        let body = body.into();
        MessageContent {
            message_id: Uuid::new_v4().to_string(),
            md5_of_body: md5_hex(body.as_bytes()),
            body,
            message_attributes: HashMap::new(),
            md5_of_message_attributes: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_message_attributes(mut self, attrs: HashMap<String, MessageAttributeValue>) -> Self {
        self.md5_of_message_attributes = compute_md5_of_attributes(&attrs);
        self.message_attributes = attrs;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// Per-delivery bookkeeping, guarded by the message's own lock.
#[derive(Debug, Default)]
struct MessageState {
    receive_count: u32,
    approximate_receive_count: u32,
    delay_seconds: Option<u32>,
    visibility_timeout: u32,
    visibility_deadline: Option<f64>,
    last_received: Option<f64>,
    first_received: Option<f64>,
    deleted: bool,
    receipt_handles: HashSet<String>,
}

/// One enqueued item: immutable content plus mutable delivery state.
pub struct Message {
    content: MessageContent,
    created: f64,
    priority: f64,
    ordinal: u64,
    group_id: Option<String>,
    dedup_id: Option<String>,
    sequence_number: Option<String>,
    state: Mutex<MessageState>,
}

pub type MessageRef = Arc<Message>;

impl Message {
    pub fn new(content: MessageContent, created: f64, priority: f64, ordinal: u64) -> Self {
        let approximate_receive_count = content
            .attributes
            .get(APPROXIMATE_RECEIVE_COUNT)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        Message {
            content,
            created,
            priority,
            ordinal,
            group_id: None,
            dedup_id: None,
            sequence_number: None,
            state: Mutex::new(MessageState {
                approximate_receive_count,
                ..Default::default()
            }),
        }
    }

    pub fn with_fifo(mut self, group_id: String, dedup_id: String, sequence_number: String) -> Self {
        self.group_id = Some(group_id);
        self.dedup_id = Some(dedup_id);
        self.sequence_number = Some(sequence_number);
        self
    }

    pub fn with_visibility_timeout(mut self, seconds: u32) -> Self {
        self.state.get_mut().visibility_timeout = seconds;
        self
    }

    pub fn with_delay_seconds(mut self, seconds: Option<u32>) -> Self {
        self.state.get_mut().delay_seconds = seconds;
        self
    }

    pub fn id(&self) -> &str {
        &self.content.message_id
    }

    pub fn body(&self) -> &str {
        &self.content.body
    }

    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    pub fn created(&self) -> f64 {
        self.created
    }

    pub fn priority(&self) -> f64 {
        self.priority
    }

    pub fn group_id(&self) -> Option<&str> {
        self.group_id.as_deref()
    }

    pub fn dedup_id(&self) -> Option<&str> {
        self.dedup_id.as_deref()
    }

    pub fn sequence_number(&self) -> Option<&str> {
        self.sequence_number.as_deref()
    }

    pub fn dead_letter_queue_source_arn(&self) -> Option<&str> {
        self.content
            .attributes
            .get(DEAD_LETTER_QUEUE_SOURCE_ARN)
            .map(String::as_str)
    }

    pub fn receive_count(&self) -> u32 {
        self.state.lock().receive_count
    }

    pub fn approximate_receive_count(&self) -> u32 {
        self.state.lock().approximate_receive_count
    }

    pub fn increment_approximate_receive_count(&self) {
        self.state.lock().approximate_receive_count += 1;
    }

    pub fn visibility_timeout(&self) -> u32 {
        self.state.lock().visibility_timeout
    }

    pub fn visibility_deadline(&self) -> Option<f64> {
        self.state.lock().visibility_deadline
    }

    pub fn last_received(&self) -> Option<f64> {
        self.state.lock().last_received
    }

    pub fn first_received(&self) -> Option<f64> {
        self.state.lock().first_received
    }

    pub fn delay_seconds(&self) -> Option<u32> {
        self.state.lock().delay_seconds
    }

    pub fn set_delay_seconds(&self, seconds: u32) {
        self.state.lock().delay_seconds = Some(seconds);
    }

    pub fn update_visibility_timeout(&self, seconds: u32, now: f64) {
        let mut state = self.state.lock();
        state.visibility_timeout = seconds;
        state.visibility_deadline = Some(now + seconds as f64);
    }

    /// Records a delivery at `now` and returns the new receive count.
    pub fn mark_received(&self, visibility_timeout: u32, now: f64) -> u32 {
        let mut state = self.state.lock();
        state.receive_count += 1;
        state.visibility_timeout = visibility_timeout;
        state.last_received = Some(now);
        state.visibility_deadline = Some(now + visibility_timeout as f64);
        if state.first_received.is_none() {
            state.first_received = Some(now);
        }
        state.receive_count
    }

    pub fn is_visible(&self, now: f64) -> bool {
        match self.state.lock().visibility_deadline {
            None => true,
            Some(deadline) => now >= deadline,
        }
    }

    pub fn is_delayed(&self, now: f64) -> bool {
        match self.state.lock().delay_seconds {
            Some(delay) if delay > 0 => now <= self.created + delay as f64,
            _ => false,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.state.lock().deleted
    }

    pub fn mark_deleted(&self) {
        self.state.lock().deleted = true;
    }

    pub fn add_receipt_handle(&self, handle: String) {
        self.state.lock().receipt_handles.insert(handle);
    }

    pub fn take_receipt_handles(&self) -> HashSet<String> {
        std::mem::take(&mut self.state.lock().receipt_handles)
    }

    /// Full system attribute map as a consumer sees it.
    pub fn attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = self.content.attributes.clone();
        if let Some(ref group_id) = self.group_id {
            attrs.insert(MESSAGE_GROUP_ID.into(), group_id.clone());
        }
        if let Some(ref dedup_id) = self.dedup_id {
            attrs.insert(MESSAGE_DEDUPLICATION_ID.into(), dedup_id.clone());
        }
        if let Some(ref seq) = self.sequence_number {
            attrs.insert(SEQUENCE_NUMBER.into(), seq.clone());
        }
        let state = self.state.lock();
        attrs.insert(
            APPROXIMATE_RECEIVE_COUNT.into(),
            state.approximate_receive_count.to_string(),
        );
        if let Some(first) = state.first_received {
            attrs.insert(
                APPROXIMATE_FIRST_RECEIVE_TIMESTAMP.into(),
                ((first * 1000.0) as i64).to_string(),
            );
        }
        attrs
    }

    /// Content to enqueue when this message is handed to another queue.
    pub fn to_content(&self) -> MessageContent {
        let mut content = self.content.clone();
        content.attributes.insert(
            APPROXIMATE_RECEIVE_COUNT.into(),
            self.approximate_receive_count().to_string(),
        );
        content
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Message {}

impl Hash for Message {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id())
            .field("group", &self.group_id)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Heap entry ordering messages so the lowest priority pops first; ties go to the earlier enqueue.
#[derive(Debug, Clone)]
pub struct ByPriority(pub MessageRef);

impl PartialEq for ByPriority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ByPriority {}

impl PartialOrd for ByPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .priority
            .total_cmp(&self.0.priority)
            .then_with(|| other.0.ordinal.cmp(&self.0.ordinal))
    }
}

/// Outcome of one receive call. `receipt_handles[i]` belongs to `successful[i]`.
#[derive(Debug, Default)]
pub struct ReceiveResult {
    pub successful: Vec<MessageRef>,
    pub receipt_handles: Vec<String>,
    /// Messages received more often than the redrive policy allows.
    pub dead_letter_messages: Vec<MessageRef>,
}
