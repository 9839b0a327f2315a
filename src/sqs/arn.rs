use super::error::{Result, SqsError};

pub fn partition_for_region(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "aws-cn"
    } else if region.starts_with("us-gov") {
        "aws-us-gov"
    } else {
        "aws"
    }
}

pub fn queue_arn(name: &str, account_id: &str, region: &str) -> String {
    format!(
        "arn:{}:sqs:{}:{}:{}",
        partition_for_region(region),
        region,
        account_id,
        name
    )
}

pub fn queue_url(host: &str, account_id: &str, name: &str) -> String {
    format!("http://{}/{}/{}", host, account_id, name)
}

/// The pieces of a queue ARN the engine routes on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueArn {
    pub region: String,
    pub account_id: String,
    pub name: String,
}

impl QueueArn {
    pub fn parse(arn: &str) -> Result<Self> {
        let parts: Vec<&str> = arn.splitn(6, ':').collect();
        if parts.len() != 6 || parts[0] != "arn" || parts[2] != "sqs" || parts[5].is_empty() {
            return Err(SqsError::InvalidParameterValue(format!(
                "Value {arn} for parameter QueueArn is invalid."
            )));
        }
        Ok(QueueArn {
            region: parts[3].to_string(),
            account_id: parts[4].to_string(),
            name: parts[5].to_string(),
        })
    }
}
