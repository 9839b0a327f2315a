use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::arn::QueueArn;
use super::constants::RECENTLY_DELETED_TIMEOUT;
use super::error::{Result, SqsError};
use super::queue::Queue;

/// Queues of one account in one region.
#[derive(Default)]
pub struct SqsStore {
    pub queues: HashMap<String, Arc<Queue>>,
    /// Queue name to deletion time.
    pub deleted: HashMap<String, f64>,
}

impl SqsStore {
    /// Forgets tombstones older than the re-creation block window.
    pub fn expire_deleted(&mut self, now: f64) {
        self.deleted
            .retain(|_, deleted_at| *deleted_at + RECENTLY_DELETED_TIMEOUT > now);
    }

    pub fn is_recently_deleted(&self, name: &str, now: f64) -> bool {
        self.deleted
            .get(name)
            .is_some_and(|deleted_at| *deleted_at + RECENTLY_DELETED_TIMEOUT > now)
    }
}

/// Every store, keyed by `(account_id, region)` and created on first access.
#[derive(Default)]
pub struct SqsStores {
    stores: Mutex<HashMap<(String, String), SqsStore>>,
}

impl SqsStores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store<R>(
        &self,
        account_id: &str,
        region: &str,
        f: impl FnOnce(&mut SqsStore) -> R,
    ) -> R {
        let mut stores = self.stores.lock();
        let store = stores
            .entry((account_id.to_string(), region.to_string()))
            .or_default();
        f(store)
    }

    pub fn get_queue(&self, account_id: &str, region: &str, name: &str) -> Option<Arc<Queue>> {
        let stores = self.stores.lock();
        stores
            .get(&(account_id.to_string(), region.to_string()))
            .and_then(|store| store.queues.get(name).cloned())
    }

    pub fn require_queue(&self, account_id: &str, region: &str, name: &str) -> Result<Arc<Queue>> {
        self.get_queue(account_id, region, name)
            .ok_or_else(SqsError::queue_does_not_exist)
    }

    pub fn require_queue_by_arn(&self, arn: &str) -> Result<Arc<Queue>> {
        let arn = QueueArn::parse(arn)?;
        self.require_queue(&arn.account_id, &arn.region, &arn.name)
    }

    /// Snapshot of every queue across all accounts and regions.
    pub fn all_queues(&self) -> Vec<Arc<Queue>> {
        self.stores
            .lock()
            .values()
            .flat_map(|store| store.queues.values().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqs::clock::ManualClock;
    use crate::sqs::queue::QueueContext;
    use crate::sqs::sequence::MessageSequence;

    fn queue(name: &str, region: &str) -> Arc<Queue> {
        let ctx = QueueContext {
            clock: Arc::new(ManualClock::default()),
            sequence: Arc::new(MessageSequence::new()),
        };
        Arc::new(Queue::create(name, region, "111111111111", None, None, &ctx).unwrap())
    }

    #[test]
    fn stores_are_isolated_per_region() {
        let stores = SqsStores::new();
        stores.with_store("111111111111", "us-east-1", |s| {
            s.queues.insert("a".into(), queue("a", "us-east-1"));
        });
        stores.with_store("111111111111", "eu-west-1", |s| {
            s.queues.insert("b".into(), queue("b", "eu-west-1"));
        });

        assert!(stores.get_queue("111111111111", "us-east-1", "a").is_some());
        assert!(stores.get_queue("111111111111", "eu-west-1", "a").is_none());
        assert_eq!(stores.all_queues().len(), 2);

        let by_arn = stores
            .require_queue_by_arn("arn:aws:sqs:eu-west-1:111111111111:b")
            .unwrap();
        assert_eq!(by_arn.name(), "b");
        assert_eq!(
            stores
                .require_queue_by_arn("arn:aws:sqs:eu-west-1:111111111111:a")
                .unwrap_err()
                .code(),
            "AWS.SimpleQueueService.NonExistentQueue"
        );
    }

    #[test]
    fn tombstones_expire() {
        let mut store = SqsStore::default();
        store.deleted.insert("q".into(), 100.0);
        assert!(store.is_recently_deleted("q", 159.0));
        assert!(!store.is_recently_deleted("q", 160.0));
        store.expire_deleted(160.0);
        assert!(store.deleted.is_empty());
    }
}
