use std::collections::HashMap;

use super::attributes::QueueKind;
use super::constants::{
    FIFO_SUFFIX, MAX_ATTRIBUTE_NAME_LENGTH, MAX_DELAY_SECONDS, MAX_FIFO_ID_LENGTH,
    MAX_QUEUE_NAME_LENGTH,
};
use super::error::{Result, SqsError};
use super::types::MessageAttributeValue;

const INVALID_QUEUE_NAME: &str =
    "Can only include alphanumeric characters, hyphens, or underscores. 1 to 80 in length";

const INVALID_CHARACTERS: &str = "Invalid characters found. Valid unicode characters are #x9 | \
                                  #xA | #xD | #x20 to #xD7FF | #xE000 to #xFFFD | #x10000 to \
                                  #x10FFFF";

/// Queue names are 1 to 80 of `[A-Za-z0-9_-]`. The `.fifo` suffix is reserved for FIFO queues
/// and counts towards the length.
pub fn validate_queue_name(name: &str, kind: QueueKind) -> Result<()> {
    let stem = match (name.strip_suffix(FIFO_SUFFIX), kind) {
        (Some(stem), QueueKind::Fifo) => format!("{stem}_fifo"),
        (None, QueueKind::Fifo) => {
            return Err(SqsError::InvalidParameterValue(
                "The name of a FIFO queue can only include alphanumeric characters, hyphens, or \
                 underscores, must end with .fifo suffix and be 1 to 80 in length"
                    .into(),
            ))
        }
        (Some(_), QueueKind::Standard) => {
            return Err(SqsError::InvalidParameterValue(INVALID_QUEUE_NAME.into()))
        }
        (None, QueueKind::Standard) => name.to_string(),
    };
    let valid = !stem.is_empty()
        && stem.len() <= MAX_QUEUE_NAME_LENGTH
        && stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(SqsError::InvalidParameterValue(INVALID_QUEUE_NAME.into()));
    }
    Ok(())
}

fn is_valid_message_char(c: char) -> bool {
    matches!(c,
        '\u{9}' | '\u{A}' | '\u{D}'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

pub fn check_message_content(body: &str) -> Result<()> {
    if body.chars().all(is_valid_message_char) {
        Ok(())
    } else {
        Err(SqsError::InvalidMessageContents(INVALID_CHARACTERS.into()))
    }
}

pub fn check_message_min_size(body: &str) -> Result<()> {
    if body.is_empty() {
        return Err(SqsError::MissingParameter(
            "The request must contain the parameter MessageBody.".into(),
        ));
    }
    Ok(())
}

fn attributes_size(attributes: &HashMap<String, MessageAttributeValue>) -> usize {
    attributes
        .iter()
        .map(|(name, value)| {
            name.len()
                + value.data_type.len()
                + value.string_value.as_ref().map_or(0, String::len)
                + value.binary_value.as_ref().map_or(0, String::len)
        })
        .sum()
}

/// Body and attribute bytes together must fit in `max_size`.
pub fn check_message_max_size(
    body: &str,
    attributes: Option<&HashMap<String, MessageAttributeValue>>,
    max_size: u32,
) -> Result<()> {
    let size = body.len() + attributes.map_or(0, attributes_size);
    if size > max_size as usize {
        return Err(SqsError::InvalidParameterValue(format!(
            "One or more parameters are invalid. Reason: Message must be shorter than {max_size} \
             bytes."
        )));
    }
    Ok(())
}

pub fn check_attributes(attributes: &HashMap<String, MessageAttributeValue>) -> Result<()> {
    for (name, attribute) in attributes {
        if name.len() >= MAX_ATTRIBUTE_NAME_LENGTH {
            return Err(SqsError::InvalidParameterValue(
                "Message (user) attribute names must be shorter than 256 Bytes".into(),
            ));
        }
        let lower = name.to_ascii_lowercase();
        let charset_ok = lower
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
        if !charset_ok {
            return Err(SqsError::InvalidParameterValue(
                "Message (user) attributes name can only contain upper and lower score \
                 characters, digits, periods, hyphens and underscores. "
                    .into(),
            ));
        }
        if lower.starts_with("aws.")
            || lower.starts_with("amazon.")
            || lower.starts_with('.')
            || lower.ends_with('.')
        {
            return Err(SqsError::InvalidParameterValue(
                "You can't use message attribute names beginning with 'AWS.' or 'Amazon.'. These \
                 strings are reserved for internal use. Additionally, they cannot start or end \
                 with '.'."
                    .into(),
            ));
        }

        let data_type = attribute.data_type.as_str();
        if data_type.is_empty() {
            return Err(SqsError::InvalidParameterValue(
                "Missing required parameter DataType".into(),
            ));
        }
        if !["String", "Number", "Binary"]
            .iter()
            .any(|prefix| data_type.starts_with(prefix))
        {
            return Err(SqsError::InvalidParameterValue(format!(
                "Type for parameter MessageAttributes.Attribute_name.DataType must be \
                 prefixedwith \"String\", \"Binary\", or \"Number\", but was: {data_type}"
            )));
        }
        if data_type.len() >= MAX_ATTRIBUTE_NAME_LENGTH {
            return Err(SqsError::InvalidParameterValue(
                "Message (user) attribute types must be shorter than 256 Bytes".into(),
            ));
        }
        if data_type == "String" {
            let value = attribute
                .string_value
                .as_deref()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    SqsError::InvalidParameterValue(format!(
                        "Message (user) attribute '{name}' must contain a non-empty value of \
                         type 'String'."
                    ))
                })?;
            check_message_content(value)
                .map_err(|e| SqsError::InvalidParameterValue(e.message().to_string()))?;
        }
    }
    Ok(())
}

/// `MessageGroupId`/`MessageDeduplicationId`: 1 to 128 alphanumeric or punctuation characters.
pub fn check_fifo_id(id: Option<&str>, parameter: &str) -> Result<()> {
    let Some(id) = id else {
        return Ok(());
    };
    let valid = !id.is_empty()
        && id.chars().count() <= MAX_FIFO_ID_LENGTH
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c.is_ascii_punctuation());
    if !valid {
        return Err(SqsError::InvalidParameterValue(format!(
            "Value {id} for parameter {parameter} is invalid. Reason: {parameter} can only \
             include alphanumeric and punctuation characters. 1 to 128 in length."
        )));
    }
    Ok(())
}

pub fn check_delay_seconds(delay_seconds: Option<u32>) -> Result<()> {
    match delay_seconds {
        Some(delay) if delay > MAX_DELAY_SECONDS => Err(SqsError::InvalidParameterValue(format!(
            "Value {delay} for parameter DelaySeconds is invalid. Reason: DelaySeconds must be \
             >= 0 and <= {MAX_DELAY_SECONDS}."
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_names() {
        assert!(validate_queue_name("orders", QueueKind::Standard).is_ok());
        assert!(validate_queue_name("orders-1_a", QueueKind::Standard).is_ok());
        assert!(validate_queue_name("team/orders", QueueKind::Standard).is_err());
        assert!(validate_queue_name("team/orders.fifo", QueueKind::Fifo).is_err());
        assert!(validate_queue_name("orders.fifo", QueueKind::Standard).is_err());
        assert!(validate_queue_name("orders.fifo", QueueKind::Fifo).is_ok());
        assert!(validate_queue_name("orders", QueueKind::Fifo).is_err());
        assert!(validate_queue_name("", QueueKind::Standard).is_err());
        assert!(validate_queue_name("has space", QueueKind::Standard).is_err());
        assert!(validate_queue_name(&"a".repeat(80), QueueKind::Standard).is_ok());
        assert!(validate_queue_name(&"a".repeat(81), QueueKind::Standard).is_err());
        // the suffix counts towards the limit
        assert!(validate_queue_name(&format!("{}.fifo", "a".repeat(75)), QueueKind::Fifo).is_ok());
        assert!(validate_queue_name(&format!("{}.fifo", "a".repeat(76)), QueueKind::Fifo).is_err());
    }

    #[test]
    fn message_characters() {
        assert!(check_message_content("tab\tnewline\n ok \u{E000} \u{1F600}").is_ok());
        let err = check_message_content("bad\u{1}").unwrap_err();
        assert_eq!(err.code(), "InvalidMessageContents");
        assert!(check_message_content("\u{FFFE}").is_err());
    }

    #[test]
    fn size_counts_attributes() {
        let attrs = HashMap::from([("ab".to_string(), MessageAttributeValue::string("cd"))]);
        // 4 body + 2 name + 6 "String" + 2 value
        assert!(check_message_max_size("body", Some(&attrs), 14).is_ok());
        assert!(check_message_max_size("body", Some(&attrs), 13).is_err());
        assert!(check_message_min_size("").is_err());
    }

    #[test]
    fn attribute_rules() {
        let ok = HashMap::from([("my.attr-1".to_string(), MessageAttributeValue::number(3))]);
        assert!(check_attributes(&ok).is_ok());

        for name in ["AWS.thing", "amazon.x", ".lead", "trail.", "sp ace"] {
            let attrs = HashMap::from([(name.to_string(), MessageAttributeValue::string("v"))]);
            assert!(check_attributes(&attrs).is_err(), "{name} accepted");
        }

        let empty = HashMap::from([("a".to_string(), MessageAttributeValue::string(""))]);
        assert!(check_attributes(&empty).is_err());

        let bad_type = HashMap::from([(
            "a".to_string(),
            MessageAttributeValue {
                data_type: "Blob".into(),
                string_value: Some("v".into()),
                binary_value: None,
            },
        )]);
        assert!(check_attributes(&bad_type).is_err());

        let custom = HashMap::from([(
            "a".to_string(),
            MessageAttributeValue {
                data_type: "String.custom".into(),
                string_value: Some("v".into()),
                binary_value: None,
            },
        )]);
        assert!(check_attributes(&custom).is_ok());
    }

    #[test]
    fn fifo_ids() {
        assert!(check_fifo_id(None, "MessageGroupId").is_ok());
        assert!(check_fifo_id(Some("group-1!"), "MessageGroupId").is_ok());
        assert!(check_fifo_id(Some(""), "MessageGroupId").is_err());
        assert!(check_fifo_id(Some("with space"), "MessageGroupId").is_err());
        assert!(check_fifo_id(Some(&"x".repeat(129)), "MessageDeduplicationId").is_err());
    }

    #[test]
    fn delay_bounds() {
        assert!(check_delay_seconds(None).is_ok());
        assert!(check_delay_seconds(Some(900)).is_ok());
        assert!(check_delay_seconds(Some(901)).is_err());
    }
}
