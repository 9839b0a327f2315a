use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqsError {
    #[error("QueueAlreadyExists: {0}")]
    QueueAlreadyExists(String),
    #[error("QueueDoesNotExist: {0}")]
    QueueDoesNotExist(String),
    #[error("QueueDeletedRecently: {0}")]
    QueueDeletedRecently(String),
    #[error("InvalidAttributeName: {0}")]
    InvalidAttributeName(String),
    #[error("InvalidAttributeValue: {0}")]
    InvalidAttributeValue(String),
    #[error("InvalidParameterValue: {0}")]
    InvalidParameterValue(String),
    #[error("MissingParameter: {0}")]
    MissingParameter(String),
    #[error("InvalidMessageContents: {0}")]
    InvalidMessageContents(String),
    #[error("ReceiptHandleIsInvalid: {0}")]
    ReceiptHandleIsInvalid(String),
    #[error("MessageNotInflight: {0}")]
    MessageNotInflight(String),
    #[error("PurgeQueueInProgress: {0}")]
    PurgeQueueInProgress(String),
    #[error("ResourceNotFoundException: {0}")]
    ResourceNotFound(String),
    #[error("UnsupportedOperation: {0}")]
    UnsupportedOperation(String),
}

pub type Result<T> = std::result::Result<T, SqsError>;

impl SqsError {
    /// The AWS error code a protocol layer reports for this error.
    pub fn code(&self) -> &'static str {
        match self {
            SqsError::QueueAlreadyExists(_) => "QueueAlreadyExists",
            SqsError::QueueDoesNotExist(_) => "AWS.SimpleQueueService.NonExistentQueue",
            SqsError::QueueDeletedRecently(_) => "AWS.SimpleQueueService.QueueDeletedRecently",
            SqsError::InvalidAttributeName(_) => "InvalidAttributeName",
            SqsError::InvalidAttributeValue(_) => "InvalidAttributeValue",
            SqsError::InvalidParameterValue(_) => "InvalidParameterValue",
            SqsError::MissingParameter(_) => "MissingParameter",
            SqsError::InvalidMessageContents(_) => "InvalidMessageContents",
            SqsError::ReceiptHandleIsInvalid(_) => "ReceiptHandleIsInvalid",
            SqsError::MessageNotInflight(_) => "AWS.SimpleQueueService.MessageNotInflight",
            SqsError::PurgeQueueInProgress(_) => "AWS.SimpleQueueService.PurgeQueueInProgress",
            SqsError::ResourceNotFound(_) => "ResourceNotFoundException",
            SqsError::UnsupportedOperation(_) => "AWS.SimpleQueueService.UnsupportedOperation",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            SqsError::QueueAlreadyExists(m)
            | SqsError::QueueDoesNotExist(m)
            | SqsError::QueueDeletedRecently(m)
            | SqsError::InvalidAttributeName(m)
            | SqsError::InvalidAttributeValue(m)
            | SqsError::InvalidParameterValue(m)
            | SqsError::MissingParameter(m)
            | SqsError::InvalidMessageContents(m)
            | SqsError::ReceiptHandleIsInvalid(m)
            | SqsError::MessageNotInflight(m)
            | SqsError::PurgeQueueInProgress(m)
            | SqsError::ResourceNotFound(m)
            | SqsError::UnsupportedOperation(m) => m,
        }
    }

    /// Whether the caller, rather than the engine, caused the failure.
    pub fn sender_fault(&self) -> bool {
        !matches!(self, SqsError::UnsupportedOperation(_))
    }

    pub(crate) fn queue_does_not_exist() -> Self {
        SqsError::QueueDoesNotExist("The specified queue does not exist.".into())
    }
}
