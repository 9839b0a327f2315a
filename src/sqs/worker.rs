use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info};

use super::queue::Queue;
use super::store::SqsStores;

/// Periodically re-queues expired in-flight and delayed messages on every queue, and drops
/// messages past their retention period when enabled.
pub struct QueueUpdateWorker {
    stores: Arc<SqsStores>,
    interval: Duration,
    enable_retention: bool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl QueueUpdateWorker {
    pub fn new(stores: Arc<SqsStores>, interval: Duration, enable_retention: bool) -> Self {
        QueueUpdateWorker {
            stores,
            interval,
            enable_retention,
            handle: Mutex::new(None),
        }
    }

    /// Spawns the sweep loop. Calling it again while running is a no-op.
    pub fn start(&self) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return;
        }
        info!(
            interval_ms = self.interval.as_millis() as u64,
            retention = self.enable_retention,
            "starting queue update worker"
        );
        let stores = self.stores.clone();
        let period = self.interval;
        let enable_retention = self.enable_retention;
        *handle = Some(tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                update_all_queues(&stores, enable_retention);
            }
        }));
    }

    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
            info!("stopped queue update worker");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// One sweep over every queue.
    pub fn do_update_all_queues(&self) {
        update_all_queues(&self.stores, self.enable_retention);
    }
}

impl Drop for QueueUpdateWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().take() {
            handle.abort();
        }
    }
}

fn update_all_queues(stores: &SqsStores, enable_retention: bool) {
    for queue in stores.all_queues() {
        sweep(&queue, "re-queueing inflight messages", |q| {
            q.requeue_inflight_messages()
        });
        sweep(&queue, "enqueueing delayed messages", |q| {
            q.enqueue_delayed_messages()
        });
        if enable_retention {
            sweep(&queue, "removing expired messages", |q| {
                q.remove_expired_messages()
            });
        }
    }
}

/// Runs one maintenance step, keeping a panic inside it from ending the sweep.
fn sweep(queue: &Queue, action: &str, step: impl FnOnce(&Queue) -> usize) {
    match catch_unwind(AssertUnwindSafe(|| step(queue))) {
        Ok(0) => {}
        Ok(count) => debug!(queue = %queue.arn(), count, "{action}"),
        Err(_) => error!(queue = %queue.arn(), "error {action}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqs::clock::ManualClock;
    use crate::sqs::message::MessageContent;
    use crate::sqs::queue::QueueContext;
    use crate::sqs::sequence::MessageSequence;

    #[tokio::test]
    async fn sweep_requeues_across_stores() {
        let clock = Arc::new(ManualClock::default());
        let ctx = QueueContext {
            clock: clock.clone(),
            sequence: Arc::new(MessageSequence::new()),
        };
        let stores = Arc::new(SqsStores::new());
        for region in ["us-east-1", "eu-west-1"] {
            let queue = Arc::new(
                Queue::create("q", region, "000000000000", None, None, &ctx).unwrap(),
            );
            queue
                .put(MessageContent::new("m"), None, None, None, None)
                .unwrap();
            queue.receive(1, Some(0), Some(5), false).await;
            stores.with_store("000000000000", region, |s| {
                s.queues.insert("q".into(), queue);
            });
        }

        let worker = QueueUpdateWorker::new(stores.clone(), Duration::from_secs(1), false);
        worker.do_update_all_queues();
        for queue in stores.all_queues() {
            assert_eq!(queue.approx_number_of_messages(), 0);
        }

        clock.advance(5.0);
        worker.do_update_all_queues();
        for queue in stores.all_queues() {
            assert_eq!(queue.approx_number_of_messages(), 1);
            assert_eq!(queue.approx_number_of_messages_not_visible(), 0);
        }
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_clears() {
        let worker =
            QueueUpdateWorker::new(Arc::new(SqsStores::new()), Duration::from_millis(10), true);
        worker.start();
        worker.start();
        assert!(worker.is_running());
        worker.stop();
        assert!(!worker.is_running());
    }
}
