use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, info};
use uuid::Uuid;

use super::clock::SharedClock;
use super::error::{Result, SqsError};
use super::receipt::encode_move_task_handle;
use super::store::SqsStores;
use super::types::MessageMoveTaskEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveTaskStatus {
    /// Registered but not yet handed to a worker.
    Created,
    Running,
    Completed,
    Cancelling,
    Cancelled,
    Failed,
}

impl MoveTaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveTaskStatus::Created => "CREATED",
            MoveTaskStatus::Running => "RUNNING",
            MoveTaskStatus::Completed => "COMPLETED",
            MoveTaskStatus::Cancelling => "CANCELLING",
            MoveTaskStatus::Cancelled => "CANCELLED",
            MoveTaskStatus::Failed => "FAILED",
        }
    }

    /// Whether a task in this state blocks another task on the same source.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            MoveTaskStatus::Created | MoveTaskStatus::Running | MoveTaskStatus::Cancelling
        )
    }
}

impl fmt::Display for MoveTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cooperative cancellation flag whose waits wake as soon as it is set.
#[derive(Debug, Default)]
pub struct CancelSignal {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleeps up to `timeout`, returning early once the signal is set. Returns the flag.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_set() {
            return true;
        }
        let _ = tokio::time::timeout(timeout, notified).await;
        self.is_set()
    }
}

#[derive(Debug)]
struct Progress {
    status: MoveTaskStatus,
    started: Option<DateTime<Utc>>,
    to_move: Option<i64>,
    moved: Option<i64>,
    failure_reason: Option<String>,
}

/// Redrive of a dead-letter queue back to a destination or to each message's original source.
#[derive(Debug)]
pub struct MoveTask {
    task_id: String,
    source_arn: String,
    destination_arn: Option<String>,
    max_number_of_messages_per_second: Option<u32>,
    progress: Mutex<Progress>,
    cancel: CancelSignal,
}

impl MoveTask {
    pub fn new(
        source_arn: impl Into<String>,
        destination_arn: Option<String>,
        max_number_of_messages_per_second: Option<u32>,
    ) -> Self {
        MoveTask {
            task_id: Uuid::new_v4().to_string(),
            source_arn: source_arn.into(),
            destination_arn,
            max_number_of_messages_per_second,
            progress: Mutex::new(Progress {
                status: MoveTaskStatus::Created,
                started: None,
                to_move: None,
                moved: None,
                failure_reason: None,
            }),
            cancel: CancelSignal::default(),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn task_handle(&self) -> String {
        encode_move_task_handle(&self.task_id, &self.source_arn)
    }

    pub fn source_arn(&self) -> &str {
        &self.source_arn
    }

    pub fn destination_arn(&self) -> Option<&str> {
        self.destination_arn.as_deref()
    }

    pub fn status(&self) -> MoveTaskStatus {
        self.progress.lock().status
    }

    pub fn approximate_number_of_messages_moved(&self) -> i64 {
        self.progress.lock().moved.unwrap_or(0)
    }

    pub fn approximate_number_of_messages_to_move(&self) -> Option<i64> {
        self.progress.lock().to_move
    }

    pub fn failure_reason(&self) -> Option<String> {
        self.progress.lock().failure_reason.clone()
    }

    pub fn started(&self) -> Option<DateTime<Utc>> {
        self.progress.lock().started
    }

    fn mark_started(&self, started: DateTime<Utc>, to_move: i64) {
        let mut progress = self.progress.lock();
        progress.started = Some(started);
        progress.status = MoveTaskStatus::Running;
        progress.to_move = Some(to_move);
        progress.moved = Some(0);
        self.cancel.clear();
    }

    fn record_moved(&self) {
        let mut progress = self.progress.lock();
        progress.moved = Some(progress.moved.unwrap_or(0) + 1);
    }

    fn finish(&self, status: MoveTaskStatus) {
        self.progress.lock().status = status;
    }

    fn fail(&self, error: &SqsError) {
        info!(task_id = %self.task_id, error = %error, "exception occurred during move task");
        let mut progress = self.progress.lock();
        progress.status = MoveTaskStatus::Failed;
        progress.failure_reason = Some(error.code().to_string());
    }

    pub fn to_entry(&self) -> MessageMoveTaskEntry {
        let progress = self.progress.lock();
        MessageMoveTaskEntry {
            task_handle: (progress.status == MoveTaskStatus::Running)
                .then(|| self.task_handle()),
            status: progress.status.to_string(),
            source_arn: self.source_arn.clone(),
            destination_arn: self.destination_arn.clone(),
            approximate_number_of_messages_moved: progress.moved,
            approximate_number_of_messages_to_move: progress.to_move,
            max_number_of_messages_per_second: self.max_number_of_messages_per_second,
            started_timestamp: progress.started.map(|t| t.timestamp_millis()),
            failure_reason: progress.failure_reason.clone(),
        }
    }
}

/// Runs move tasks on the tokio runtime, one active task per source queue.
pub struct MoveTaskManager {
    stores: Arc<SqsStores>,
    clock: SharedClock,
    tasks: Mutex<HashMap<String, Arc<MoveTask>>>,
}

impl MoveTaskManager {
    pub fn new(stores: Arc<SqsStores>, clock: SharedClock) -> Self {
        MoveTaskManager {
            stores,
            clock,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Registers the task, snapshots the source depth and spawns the worker.
    pub fn submit(&self, task: MoveTask) -> Result<Arc<MoveTask>> {
        let task = Arc::new(task);
        let mut tasks = self.tasks.lock();
        if tasks
            .values()
            .any(|t| t.source_arn == task.source_arn && t.status().is_active())
        {
            return Err(SqsError::InvalidParameterValue(
                "There is already a task running. Only one active task is allowed for a source \
                 queue arn at a given time."
                    .into(),
            ));
        }

        let source = match self.stores.require_queue_by_arn(&task.source_arn) {
            Ok(source) => source,
            Err(e) => {
                task.fail(&e);
                return Err(e);
            }
        };
        let started =
            DateTime::<Utc>::from_timestamp_millis(self.clock.now_millis()).unwrap_or_else(Utc::now);
        task.mark_started(started, source.approx_number_of_messages() as i64);
        tasks.insert(task.task_id.clone(), task.clone());
        drop(tasks);

        tokio::spawn(Self::run(self.stores.clone(), task.clone()));
        Ok(task)
    }

    async fn run(stores: Arc<SqsStores>, task: Arc<MoveTask>) {
        match task.destination_arn() {
            Some(destination) => info!(
                task_id = %task.task_id,
                source = %task.source_arn,
                destination = %destination,
                "move task started"
            ),
            None => info!(
                task_id = %task.task_id,
                source = %task.source_arn,
                "move task started towards original sources"
            ),
        }

        match Self::move_messages(&stores, &task).await {
            Err(e) => task.fail(&e),
            Ok(()) if task.cancel.is_set() => {
                info!(task_id = %task.task_id, "move task cancelled");
                task.finish(MoveTaskStatus::Cancelled);
            }
            Ok(()) => {
                info!(task_id = %task.task_id, "move task completed successfully");
                task.finish(MoveTaskStatus::Completed);
            }
        }
    }

    async fn move_messages(stores: &SqsStores, task: &MoveTask) -> Result<()> {
        while !task.cancel.is_set() {
            // queues are looked up per message since they may be deleted underneath us
            let source = stores.require_queue_by_arn(&task.source_arn)?;
            let mut received = source.receive(1, Some(0), Some(1), false).await;
            if !received.dead_letter_messages.is_empty() {
                for message in received.dead_letter_messages.drain(..) {
                    source.restore(message);
                }
                return Err(SqsError::UnsupportedOperation(
                    "Cannot deal with DLQ chains in move tasks".into(),
                ));
            }
            let (Some(message), Some(receipt_handle)) =
                (received.successful.first(), received.receipt_handles.first())
            else {
                break;
            };

            let target_arn = match task.destination_arn() {
                Some(destination) => destination,
                None => message.dead_letter_queue_source_arn().ok_or_else(|| {
                    SqsError::ResourceNotFound(
                        "The message does not record its dead-letter source queue.".into(),
                    )
                })?,
            };
            let target = stores.require_queue_by_arn(target_arn)?;
            target.put(
                message.to_content(),
                None,
                message.dedup_id().map(String::from),
                message.group_id().map(String::from),
                None,
            )?;
            source.remove(receipt_handle)?;
            task.record_moved();
            debug!(task_id = %task.task_id, message_id = %message.id(), target = %target_arn, "moved message");

            if let Some(rate) = task.max_number_of_messages_per_second.filter(|r| *r > 0) {
                task.cancel
                    .wait_timeout(Duration::from_secs_f64(1.0 / rate as f64))
                    .await;
            }
        }
        Ok(())
    }

    /// Asks the worker to stop and returns the number of messages moved so far.
    pub fn cancel(&self, task_id: &str) -> Result<i64> {
        let tasks = self.tasks.lock();
        let task = tasks
            .get(task_id)
            .ok_or_else(|| SqsError::ResourceNotFound("Task does not exist.".into()))?;
        {
            let mut progress = task.progress.lock();
            if progress.status == MoveTaskStatus::Running {
                progress.status = MoveTaskStatus::Cancelling;
            }
        }
        task.cancel.set();
        Ok(task.approximate_number_of_messages_moved())
    }

    pub fn get(&self, task_id: &str) -> Option<Arc<MoveTask>> {
        self.tasks.lock().get(task_id).cloned()
    }

    /// Started tasks for `source_arn`, most recent first, at most `max_results` (default 1).
    pub fn list(&self, source_arn: &str, max_results: Option<usize>) -> Vec<MessageMoveTaskEntry> {
        let mut tasks: Vec<Arc<MoveTask>> = self
            .tasks
            .lock()
            .values()
            .filter(|t| t.source_arn == source_arn && t.status() != MoveTaskStatus::Created)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| std::cmp::Reverse(t.started()));
        tasks
            .iter()
            .take(max_results.unwrap_or(1))
            .map(|t| t.to_entry())
            .collect()
    }

    /// Signals every task to stop.
    pub fn close(&self) {
        for task in self.tasks.lock().values() {
            task.cancel.set();
        }
    }
}
