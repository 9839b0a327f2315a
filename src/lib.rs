//! A local, in-memory engine with Amazon SQS queue semantics: standard and FIFO queues,
//! visibility timeouts, delayed delivery, dead-letter redrive and message move tasks.

pub mod config;
pub mod sqs;

pub use config::EngineConfig;
pub use sqs::{SqsEngine, SqsError};
