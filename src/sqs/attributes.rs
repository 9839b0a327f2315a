use std::collections::{BTreeMap, HashMap};

use super::constants::{
    DEFAULT_MAXIMUM_MESSAGE_SIZE, DEFAULT_MESSAGE_RETENTION_PERIOD, DEFAULT_VISIBILITY_TIMEOUT,
    MAX_DELAY_SECONDS, MAX_RECEIVE_COUNT, MAX_VISIBILITY_TIMEOUT, MAX_WAIT_TIME_SECONDS,
};
use super::error::{Result, SqsError};

pub const ALL: &str = "All";
pub const POLICY: &str = "Policy";
pub const VISIBILITY_TIMEOUT: &str = "VisibilityTimeout";
pub const MAXIMUM_MESSAGE_SIZE: &str = "MaximumMessageSize";
pub const MESSAGE_RETENTION_PERIOD: &str = "MessageRetentionPeriod";
pub const APPROXIMATE_NUMBER_OF_MESSAGES: &str = "ApproximateNumberOfMessages";
pub const APPROXIMATE_NUMBER_OF_MESSAGES_NOT_VISIBLE: &str =
    "ApproximateNumberOfMessagesNotVisible";
pub const APPROXIMATE_NUMBER_OF_MESSAGES_DELAYED: &str = "ApproximateNumberOfMessagesDelayed";
pub const CREATED_TIMESTAMP: &str = "CreatedTimestamp";
pub const LAST_MODIFIED_TIMESTAMP: &str = "LastModifiedTimestamp";
pub const QUEUE_ARN: &str = "QueueArn";
pub const DELAY_SECONDS: &str = "DelaySeconds";
pub const RECEIVE_MESSAGE_WAIT_TIME_SECONDS: &str = "ReceiveMessageWaitTimeSeconds";
pub const REDRIVE_POLICY: &str = "RedrivePolicy";
pub const REDRIVE_ALLOW_POLICY: &str = "RedriveAllowPolicy";
pub const FIFO_QUEUE: &str = "FifoQueue";
pub const CONTENT_BASED_DEDUPLICATION: &str = "ContentBasedDeduplication";
pub const KMS_MASTER_KEY_ID: &str = "KmsMasterKeyId";
pub const KMS_DATA_KEY_REUSE_PERIOD_SECONDS: &str = "KmsDataKeyReusePeriodSeconds";
pub const DEDUPLICATION_SCOPE: &str = "DeduplicationScope";
pub const FIFO_THROUGHPUT_LIMIT: &str = "FifoThroughputLimit";
pub const SQS_MANAGED_SSE_ENABLED: &str = "SqsManagedSseEnabled";

/// Every attribute name a queue knows about, `All` excluded.
pub const QUEUE_ATTRIBUTE_NAMES: &[&str] = &[
    POLICY,
    VISIBILITY_TIMEOUT,
    MAXIMUM_MESSAGE_SIZE,
    MESSAGE_RETENTION_PERIOD,
    APPROXIMATE_NUMBER_OF_MESSAGES,
    APPROXIMATE_NUMBER_OF_MESSAGES_NOT_VISIBLE,
    APPROXIMATE_NUMBER_OF_MESSAGES_DELAYED,
    CREATED_TIMESTAMP,
    LAST_MODIFIED_TIMESTAMP,
    QUEUE_ARN,
    DELAY_SECONDS,
    RECEIVE_MESSAGE_WAIT_TIME_SECONDS,
    REDRIVE_POLICY,
    REDRIVE_ALLOW_POLICY,
    FIFO_QUEUE,
    CONTENT_BASED_DEDUPLICATION,
    KMS_MASTER_KEY_ID,
    KMS_DATA_KEY_REUSE_PERIOD_SECONDS,
    DEDUPLICATION_SCOPE,
    FIFO_THROUGHPUT_LIMIT,
    SQS_MANAGED_SSE_ENABLED,
];

/// Computed by the queue itself; callers may read but never set them.
pub const READ_ONLY_ATTRIBUTES: &[&str] = &[
    APPROXIMATE_NUMBER_OF_MESSAGES,
    APPROXIMATE_NUMBER_OF_MESSAGES_NOT_VISIBLE,
    APPROXIMATE_NUMBER_OF_MESSAGES_DELAYED,
    CREATED_TIMESTAMP,
    LAST_MODIFIED_TIMESTAMP,
    QUEUE_ARN,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Standard,
    Fifo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedrivePolicy {
    pub dead_letter_target_arn: String,
    pub max_receive_count: u32,
}

impl RedrivePolicy {
    pub fn from_json(s: &str) -> Result<Self> {
        let v: serde_json::Value = serde_json::from_str(s).map_err(|e| {
            SqsError::InvalidParameterValue(format!(
                "Value {s} for parameter RedrivePolicy is invalid. Reason: {e}"
            ))
        })?;
        let arn = v
            .get("deadLetterTargetArn")
            .and_then(|v| v.as_str())
            .filter(|arn| !arn.is_empty())
            .ok_or_else(|| {
                SqsError::InvalidParameterValue(
                    "The required parameter 'deadLetterTargetArn' is missing".into(),
                )
            })?
            .to_string();
        let raw_count = v.get("maxReceiveCount").ok_or_else(|| {
            SqsError::InvalidParameterValue(
                "The required parameter 'maxReceiveCount' is missing".into(),
            )
        })?;
        let max_count = raw_count
            .as_u64()
            .or_else(|| raw_count.as_str().and_then(|s| s.parse().ok()))
            .filter(|count| (1..=MAX_RECEIVE_COUNT as u64).contains(count))
            .ok_or_else(|| {
                SqsError::InvalidParameterValue(format!(
                    "Value {s} for parameter RedrivePolicy is invalid. Reason: Invalid value for \
                     maxReceiveCount: {raw_count}, valid values are from 1 to 1000 both inclusive."
                ))
            })? as u32;
        Ok(RedrivePolicy {
            dead_letter_target_arn: arn,
            max_receive_count: max_count,
        })
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({
            "deadLetterTargetArn": self.dead_letter_target_arn,
            "maxReceiveCount": self.max_receive_count,
        })
        .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedriveAllowPolicy {
    pub redrive_permission: String,
    pub source_queue_arns: Option<Vec<String>>,
}

impl RedriveAllowPolicy {
    pub fn from_json(s: &str) -> Result<Self> {
        let v: serde_json::Value = serde_json::from_str(s).map_err(|e| {
            SqsError::InvalidAttributeValue(format!("Invalid RedriveAllowPolicy JSON: {e}"))
        })?;
        let perm = v
            .get("redrivePermission")
            .and_then(|v| v.as_str())
            .unwrap_or("allowAll")
            .to_string();
        if !matches!(perm.as_str(), "allowAll" | "denyAll" | "byQueue") {
            return Err(SqsError::InvalidAttributeValue(format!(
                "Invalid value for the parameter RedriveAllowPolicy. Reason: Invalid \
                 redrivePermission {perm}."
            )));
        }
        let arns = v.get("sourceQueueArns").and_then(|v| {
            v.as_array().map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
        });
        Ok(RedriveAllowPolicy {
            redrive_permission: perm,
            source_queue_arns: arns,
        })
    }

    pub fn to_json(&self) -> String {
        let mut m = serde_json::Map::new();
        m.insert(
            "redrivePermission".into(),
            serde_json::Value::String(self.redrive_permission.clone()),
        );
        if let Some(ref arns) = self.source_queue_arns {
            m.insert(
                "sourceQueueArns".into(),
                serde_json::Value::Array(
                    arns.iter()
                        .map(|a| serde_json::Value::String(a.clone()))
                        .collect(),
                ),
            );
        }
        serde_json::Value::Object(m).to_string()
    }
}

/// Settable attributes of a queue. Computed values are merged in by the queue at read time.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueAttributes {
    pub kind: QueueKind,
    pub visibility_timeout: u32,
    pub message_retention_period: u32,
    pub delay_seconds: u32,
    pub maximum_message_size: u32,
    pub receive_message_wait_time_seconds: u32,
    pub policy: Option<String>,
    pub redrive_policy: Option<RedrivePolicy>,
    pub redrive_allow_policy: Option<RedriveAllowPolicy>,
    pub content_based_deduplication: bool,
    pub deduplication_scope: String,
    pub fifo_throughput_limit: String,
    pub sqs_managed_sse_enabled: bool,
    pub kms_master_key_id: Option<String>,
    pub kms_data_key_reuse_period_seconds: Option<u32>,
    pub created_timestamp: i64,
    pub last_modified_timestamp: i64,
}

impl QueueAttributes {
    pub fn new(kind: QueueKind, now_secs: i64) -> Self {
        QueueAttributes {
            kind,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            message_retention_period: DEFAULT_MESSAGE_RETENTION_PERIOD,
            delay_seconds: 0,
            maximum_message_size: DEFAULT_MAXIMUM_MESSAGE_SIZE,
            receive_message_wait_time_seconds: 0,
            policy: None,
            redrive_policy: None,
            redrive_allow_policy: None,
            content_based_deduplication: false,
            deduplication_scope: "queue".into(),
            fifo_throughput_limit: "perQueue".into(),
            sqs_managed_sse_enabled: true,
            kms_master_key_id: None,
            kms_data_key_reuse_period_seconds: None,
            created_timestamp: now_secs,
            last_modified_timestamp: now_secs,
        }
    }

    pub fn is_fifo(&self) -> bool {
        self.kind == QueueKind::Fifo
    }

    /// Rejects names that cannot be set on a queue of this kind.
    pub fn validate_names(kind: QueueKind, attrs: &HashMap<String, String>) -> Result<()> {
        for (key, value) in attrs {
            let key = key.as_str();
            if !QUEUE_ATTRIBUTE_NAMES.contains(&key) || READ_ONLY_ATTRIBUTES.contains(&key) {
                return Err(SqsError::InvalidAttributeName(format!(
                    "Unknown Attribute {key}."
                )));
            }
            match kind {
                QueueKind::Standard => {
                    if key == FIFO_THROUGHPUT_LIMIT || key == DEDUPLICATION_SCOPE {
                        return Err(SqsError::InvalidAttributeName(format!(
                            "You can specify the {key} only when FifoQueue is set to true."
                        )));
                    }
                    if key == FIFO_QUEUE || key == CONTENT_BASED_DEDUPLICATION {
                        return Err(SqsError::InvalidAttributeName(format!(
                            "Unknown Attribute {key}."
                        )));
                    }
                }
                QueueKind::Fifo => {
                    if key == FIFO_QUEUE && !value.eq_ignore_ascii_case("true") {
                        return Err(SqsError::InvalidAttributeValue(
                            "Invalid value for the parameter FifoQueue. Reason: Modifying queue \
                             type is not supported."
                                .into(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Applies already name-validated attributes, checking each value.
    pub fn apply(&mut self, attrs: &HashMap<String, String>) -> Result<()> {
        for (key, value) in attrs {
            match key.as_str() {
                VISIBILITY_TIMEOUT => {
                    self.visibility_timeout =
                        parse_in_range(key, value, 0, MAX_VISIBILITY_TIMEOUT)?;
                }
                MESSAGE_RETENTION_PERIOD => {
                    self.message_retention_period = parse_in_range(key, value, 60, 1_209_600)?;
                }
                DELAY_SECONDS => {
                    self.delay_seconds = parse_in_range(key, value, 0, MAX_DELAY_SECONDS)?;
                }
                MAXIMUM_MESSAGE_SIZE => {
                    self.maximum_message_size =
                        parse_in_range(key, value, 1024, DEFAULT_MAXIMUM_MESSAGE_SIZE)?;
                }
                RECEIVE_MESSAGE_WAIT_TIME_SECONDS => {
                    self.receive_message_wait_time_seconds =
                        parse_in_range(key, value, 0, MAX_WAIT_TIME_SECONDS)?;
                }
                POLICY => {
                    self.policy = if value.is_empty() {
                        None
                    } else {
                        Some(value.clone())
                    };
                }
                REDRIVE_POLICY => {
                    self.redrive_policy = if value.is_empty() {
                        None
                    } else {
                        Some(RedrivePolicy::from_json(value)?)
                    };
                }
                REDRIVE_ALLOW_POLICY => {
                    self.redrive_allow_policy = if value.is_empty() {
                        None
                    } else {
                        Some(RedriveAllowPolicy::from_json(value)?)
                    };
                }
                FIFO_QUEUE => {
                    // fixed at creation, validate_names already checked the value
                }
                CONTENT_BASED_DEDUPLICATION => {
                    self.content_based_deduplication = parse_bool(key, value)?;
                }
                DEDUPLICATION_SCOPE => {
                    if value != "queue" && value != "messageGroup" {
                        return Err(SqsError::InvalidAttributeValue(format!(
                            "Invalid value for the parameter {key}. Reason: must be queue or \
                             messageGroup."
                        )));
                    }
                    self.deduplication_scope = value.clone();
                }
                FIFO_THROUGHPUT_LIMIT => {
                    if value != "perQueue" && value != "perMessageGroupId" {
                        return Err(SqsError::InvalidAttributeValue(format!(
                            "Invalid value for the parameter {key}. Reason: must be perQueue or \
                             perMessageGroupId."
                        )));
                    }
                    self.fifo_throughput_limit = value.clone();
                }
                SQS_MANAGED_SSE_ENABLED => {
                    self.sqs_managed_sse_enabled = parse_bool(key, value)?;
                }
                KMS_MASTER_KEY_ID => {
                    self.kms_master_key_id = if value.is_empty() {
                        None
                    } else {
                        Some(value.clone())
                    };
                }
                KMS_DATA_KEY_REUSE_PERIOD_SECONDS => {
                    self.kms_data_key_reuse_period_seconds =
                        Some(parse_in_range(key, value, 60, 86_400)?);
                }
                _ => {
                    return Err(SqsError::InvalidAttributeName(format!(
                        "Unknown Attribute {key}."
                    )));
                }
            }
        }
        Ok(())
    }

    /// The stored attributes as strings. Excludes `QueueArn` and the approximate counts.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert(VISIBILITY_TIMEOUT.into(), self.visibility_timeout.to_string());
        m.insert(
            MESSAGE_RETENTION_PERIOD.into(),
            self.message_retention_period.to_string(),
        );
        m.insert(DELAY_SECONDS.into(), self.delay_seconds.to_string());
        m.insert(
            MAXIMUM_MESSAGE_SIZE.into(),
            self.maximum_message_size.to_string(),
        );
        m.insert(
            RECEIVE_MESSAGE_WAIT_TIME_SECONDS.into(),
            self.receive_message_wait_time_seconds.to_string(),
        );
        m.insert(
            CREATED_TIMESTAMP.into(),
            self.created_timestamp.to_string(),
        );
        m.insert(
            LAST_MODIFIED_TIMESTAMP.into(),
            self.last_modified_timestamp.to_string(),
        );
        m.insert(
            SQS_MANAGED_SSE_ENABLED.into(),
            self.sqs_managed_sse_enabled.to_string(),
        );
        if let Some(ref policy) = self.policy {
            m.insert(POLICY.into(), policy.clone());
        }
        if let Some(ref rp) = self.redrive_policy {
            m.insert(REDRIVE_POLICY.into(), rp.to_json());
        }
        if let Some(ref rap) = self.redrive_allow_policy {
            m.insert(REDRIVE_ALLOW_POLICY.into(), rap.to_json());
        }
        if let Some(ref key) = self.kms_master_key_id {
            m.insert(KMS_MASTER_KEY_ID.into(), key.clone());
        }
        if let Some(period) = self.kms_data_key_reuse_period_seconds {
            m.insert(KMS_DATA_KEY_REUSE_PERIOD_SECONDS.into(), period.to_string());
        }
        if self.is_fifo() {
            m.insert(FIFO_QUEUE.into(), "true".into());
            m.insert(
                CONTENT_BASED_DEDUPLICATION.into(),
                self.content_based_deduplication.to_string(),
            );
            m.insert(DEDUPLICATION_SCOPE.into(), self.deduplication_scope.clone());
            m.insert(
                FIFO_THROUGHPUT_LIMIT.into(),
                self.fifo_throughput_limit.clone(),
            );
        }
        m
    }

    /// The first attribute in `attrs` whose value would differ from the current one.
    pub fn first_mismatch<'a>(&self, attrs: &'a HashMap<String, String>) -> Result<Option<&'a str>> {
        let mut candidate = self.clone();
        candidate.apply(attrs)?;
        let current = self.to_map();
        let updated = candidate.to_map();
        let mut keys: Vec<&String> = attrs.keys().collect();
        keys.sort();
        Ok(keys
            .into_iter()
            .find(|key| current.get(key.as_str()) != updated.get(key.as_str()))
            .map(String::as_str))
    }
}

fn parse_in_range(key: &str, value: &str, min: u32, max: u32) -> Result<u32> {
    value
        .parse::<u32>()
        .ok()
        .filter(|v| (min..=max).contains(v))
        .ok_or_else(|| {
            SqsError::InvalidAttributeValue(format!(
                "Invalid value for the parameter {key}. Reason: must be between {min} and {max}."
            ))
        })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(SqsError::InvalidAttributeValue(format!(
            "Invalid value for the parameter {key}."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_sqs() {
        let m = QueueAttributes::new(QueueKind::Standard, 0).to_map();
        assert_eq!(m[VISIBILITY_TIMEOUT], "30");
        assert_eq!(m[MESSAGE_RETENTION_PERIOD], "345600");
        assert_eq!(m[MAXIMUM_MESSAGE_SIZE], "262144");
        assert_eq!(m[SQS_MANAGED_SSE_ENABLED], "true");
        assert!(!m.contains_key(FIFO_QUEUE));

        let m = QueueAttributes::new(QueueKind::Fifo, 0).to_map();
        assert_eq!(m[FIFO_QUEUE], "true");
        assert_eq!(m[DEDUPLICATION_SCOPE], "queue");
        assert_eq!(m[FIFO_THROUGHPUT_LIMIT], "perQueue");
        assert_eq!(m[CONTENT_BASED_DEDUPLICATION], "false");
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut qa = QueueAttributes::new(QueueKind::Standard, 0);
        for (key, value) in [
            (VISIBILITY_TIMEOUT, "43201"),
            (MESSAGE_RETENTION_PERIOD, "59"),
            (DELAY_SECONDS, "901"),
            (MAXIMUM_MESSAGE_SIZE, "1023"),
            (RECEIVE_MESSAGE_WAIT_TIME_SECONDS, "21"),
            (VISIBILITY_TIMEOUT, "abc"),
        ] {
            let err = qa.apply(&attrs(&[(key, value)])).unwrap_err();
            assert_eq!(err.code(), "InvalidAttributeValue", "{key}={value}");
        }
        qa.apply(&attrs(&[(VISIBILITY_TIMEOUT, "0")])).unwrap();
        assert_eq!(qa.visibility_timeout, 0);
    }

    #[test]
    fn redrive_policy_accepts_string_count() {
        let rp = RedrivePolicy::from_json(
            r#"{"deadLetterTargetArn":"arn:aws:sqs:us-east-1:000000000000:dlq","maxReceiveCount":"3"}"#,
        )
        .unwrap();
        assert_eq!(rp.max_receive_count, 3);
        assert!(rp.to_json().contains("\"maxReceiveCount\":3"));
    }

    #[test]
    fn redrive_policy_bounds() {
        for count in ["0", "1001", "\"x\""] {
            let doc = format!(r#"{{"deadLetterTargetArn":"arn","maxReceiveCount":{count}}}"#);
            let err = RedrivePolicy::from_json(&doc).unwrap_err();
            assert_eq!(err.code(), "InvalidParameterValue");
        }
        let err = RedrivePolicy::from_json(r#"{"maxReceiveCount":1}"#).unwrap_err();
        assert!(err.message().contains("deadLetterTargetArn"));
    }

    #[test]
    fn empty_policies_remove_the_attribute() {
        let mut qa = QueueAttributes::new(QueueKind::Standard, 0);
        qa.apply(&attrs(&[
            (POLICY, "{}"),
            (
                REDRIVE_POLICY,
                r#"{"deadLetterTargetArn":"arn:aws:sqs:us-east-1:1:dlq","maxReceiveCount":2}"#,
            ),
        ]))
        .unwrap();
        assert!(qa.policy.is_some() && qa.redrive_policy.is_some());
        qa.apply(&attrs(&[(POLICY, ""), (REDRIVE_POLICY, "")])).unwrap();
        assert!(qa.policy.is_none());
        assert!(qa.redrive_policy.is_none());
    }

    #[test]
    fn standard_queue_rejects_fifo_attributes() {
        let err = QueueAttributes::validate_names(
            QueueKind::Standard,
            &attrs(&[(DEDUPLICATION_SCOPE, "queue")]),
        )
        .unwrap_err();
        assert!(err.message().contains("only when FifoQueue is set to true"));
        let err = QueueAttributes::validate_names(
            QueueKind::Standard,
            &attrs(&[(CONTENT_BASED_DEDUPLICATION, "true")]),
        )
        .unwrap_err();
        assert_eq!(err.code(), "InvalidAttributeName");
    }

    #[test]
    fn fifo_queue_type_cannot_change() {
        let err =
            QueueAttributes::validate_names(QueueKind::Fifo, &attrs(&[(FIFO_QUEUE, "false")]))
                .unwrap_err();
        assert_eq!(err.code(), "InvalidAttributeValue");
        QueueAttributes::validate_names(QueueKind::Fifo, &attrs(&[(FIFO_QUEUE, "true")])).unwrap();
    }

    #[test]
    fn read_only_attributes_cannot_be_set() {
        let err = QueueAttributes::validate_names(
            QueueKind::Standard,
            &attrs(&[(APPROXIMATE_NUMBER_OF_MESSAGES, "4")]),
        )
        .unwrap_err();
        assert_eq!(err.code(), "InvalidAttributeName");
    }

    #[test]
    fn mismatch_detection_normalizes_values() {
        let mut qa = QueueAttributes::new(QueueKind::Standard, 0);
        qa.apply(&attrs(&[(VISIBILITY_TIMEOUT, "45")])).unwrap();
        assert_eq!(qa.first_mismatch(&attrs(&[(VISIBILITY_TIMEOUT, "45")])).unwrap(), None);
        assert_eq!(
            qa.first_mismatch(&attrs(&[(VISIBILITY_TIMEOUT, "46")])).unwrap(),
            Some(VISIBILITY_TIMEOUT)
        );
    }
}
