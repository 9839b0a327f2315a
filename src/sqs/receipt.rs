use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use uuid::Uuid;

use super::error::{Result, SqsError};

/// What a receipt handle records about the delivery it was minted for.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptHandleInfo {
    pub identifier: String,
    pub queue_arn: String,
    pub message_id: String,
    pub last_received: f64,
}

pub fn encode_receipt_handle(queue_arn: &str, message_id: &str, last_received: f64) -> String {
    let raw = format!(
        "{} {} {} {}",
        Uuid::new_v4(),
        queue_arn,
        message_id,
        last_received
    );
    STANDARD.encode(raw)
}

pub fn decode_receipt_handle(handle: &str) -> Result<ReceiptHandleInfo> {
    let invalid = || {
        SqsError::ReceiptHandleIsInvalid(format!(
            "The input receipt handle \"{handle}\" is not a valid receipt handle."
        ))
    };
    let decoded = STANDARD.decode(handle).map_err(|_| invalid())?;
    let text = String::from_utf8(decoded).map_err(|_| invalid())?;
    let parts: Vec<&str> = text.split(' ').collect();
    if parts.len() != 4 {
        return Err(invalid());
    }
    let last_received: f64 = parts[3].parse().map_err(|_| invalid())?;
    Ok(ReceiptHandleInfo {
        identifier: parts[0].to_string(),
        queue_arn: parts[1].to_string(),
        message_id: parts[2].to_string(),
        last_received,
    })
}

pub fn encode_move_task_handle(task_id: &str, source_arn: &str) -> String {
    STANDARD.encode(format!("{task_id}&{source_arn}"))
}

/// Returns `(task_id, source_arn)`.
pub fn decode_move_task_handle(handle: &str) -> Result<(String, String)> {
    let invalid = || SqsError::ResourceNotFound("Task does not exist.".into());
    let decoded = STANDARD.decode(handle).map_err(|_| invalid())?;
    let text = String::from_utf8(decoded).map_err(|_| invalid())?;
    let (task_id, source_arn) = text.split_once('&').ok_or_else(invalid)?;
    if task_id.is_empty() || source_arn.is_empty() {
        return Err(invalid());
    }
    Ok((task_id.to_string(), source_arn.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARN: &str = "arn:aws:sqs:us-east-1:000000000000:orders";

    #[test]
    fn receipt_handle_carries_arn_and_time() {
        let handle = encode_receipt_handle(ARN, "m-1", 1700000000.25);
        let info = decode_receipt_handle(&handle).unwrap();
        assert_eq!(info.queue_arn, ARN);
        assert_eq!(info.message_id, "m-1");
        assert_eq!(info.last_received, 1700000000.25);
    }

    #[test]
    fn two_handles_for_same_delivery_differ() {
        let a = encode_receipt_handle(ARN, "m-1", 1.0);
        let b = encode_receipt_handle(ARN, "m-1", 1.0);
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_handle_is_invalid() {
        let err = decode_receipt_handle("not base64!").unwrap_err();
        assert_eq!(err.code(), "ReceiptHandleIsInvalid");
        let err = decode_receipt_handle(&STANDARD.encode("only two")).unwrap_err();
        assert_eq!(err.code(), "ReceiptHandleIsInvalid");
    }

    #[test]
    fn move_task_handle_splits_on_ampersand() {
        let handle = encode_move_task_handle("task-1", ARN);
        let (id, arn) = decode_move_task_handle(&handle).unwrap();
        assert_eq!(id, "task-1");
        assert_eq!(arn, ARN);
        assert!(decode_move_task_handle(&STANDARD.encode("no-separator")).is_err());
    }
}
