//! In-memory SQS queue engine.

pub mod arn;
pub mod attributes;
pub mod blocking;
pub mod clock;
pub mod constants;
pub mod engine;
pub mod error;
pub mod message;
pub mod move_task;
pub mod queue;
pub mod receipt;
pub mod sequence;
pub mod store;
pub mod types;
pub mod validation;
pub mod worker;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use engine::SqsEngine;
pub use error::{Result, SqsError};
pub use message::{Message, MessageContent, MessageRef, ReceiveResult};
pub use move_task::{MoveTask, MoveTaskManager, MoveTaskStatus};
pub use queue::{FifoQueue, Queue, QueueContext, StandardQueue};
pub use sequence::MessageSequence;
pub use store::{SqsStore, SqsStores};
pub use worker::QueueUpdateWorker;
