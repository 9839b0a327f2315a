//! FIFO queue behavior: per-group ordering, group exclusivity and deduplication.

use std::collections::HashMap;
use std::sync::Arc;

use sqs_local_engine::sqs::{
    ManualClock, MessageContent, MessageRef, MessageSequence, Queue, QueueContext,
};

fn fifo_queue(clock: &Arc<ManualClock>, attrs: &[(&str, &str)]) -> Queue {
    let mut attributes: HashMap<String, String> =
        HashMap::from([("FifoQueue".to_string(), "true".to_string())]);
    for (k, v) in attrs {
        attributes.insert(k.to_string(), v.to_string());
    }
    let ctx = QueueContext {
        clock: clock.clone(),
        sequence: Arc::new(MessageSequence::new()),
    };
    Queue::create("jobs.fifo", "us-east-1", "000000000000", Some(&attributes), None, &ctx).unwrap()
}

fn send(queue: &Queue, body: &str, group: &str) -> MessageRef {
    queue
        .put(
            MessageContent::new(body),
            None,
            Some(format!("dedup-{body}")),
            Some(group.to_string()),
            None,
        )
        .unwrap()
}

fn bodies(messages: &[MessageRef]) -> Vec<&str> {
    messages.iter().map(|m| m.body()).collect()
}

#[tokio::test]
async fn content_based_duplicate_returns_the_first_message_id() {
    let clock = Arc::new(ManualClock::default());
    let queue = fifo_queue(&clock, &[("ContentBasedDeduplication", "true")]);

    let first = queue
        .put(MessageContent::new("same body"), None, None, Some("g1".into()), None)
        .unwrap();
    clock.advance(10.0);
    let second = queue
        .put(MessageContent::new("same body"), None, None, Some("g1".into()), None)
        .unwrap();

    assert_eq!(second.id(), first.id());
    assert_eq!(queue.approx_number_of_messages(), 1);

    let result = queue.receive(10, Some(0), None, false).await;
    assert_eq!(result.successful.len(), 1);
}

#[tokio::test]
async fn deduplication_window_lasts_five_minutes() {
    let clock = Arc::new(ManualClock::default());
    let queue = fifo_queue(&clock, &[]);

    let first = send(&queue, "a", "g1");
    clock.advance(301.0);
    let second = send(&queue, "a", "g1");

    assert_ne!(second.id(), first.id());
    assert_eq!(queue.approx_number_of_messages(), 2);
}

#[tokio::test]
async fn group_is_exclusive_until_its_messages_are_deleted() {
    let clock = Arc::new(ManualClock::default());
    let queue = fifo_queue(&clock, &[]);
    send(&queue, "g1-1", "g1");
    send(&queue, "g1-2", "g1");
    send(&queue, "g2-1", "g2");

    let first = queue.receive(1, Some(0), Some(30), false).await;
    assert_eq!(bodies(&first.successful), vec!["g1-1"]);

    // g1 is held by the first consumer, so only g2 is available
    let second = queue.receive(10, Some(0), Some(30), false).await;
    assert_eq!(bodies(&second.successful), vec!["g2-1"]);

    assert!(queue.receive(10, Some(0), None, false).await.successful.is_empty());

    queue.remove(&first.receipt_handles[0]).unwrap();
    let third = queue.receive(10, Some(0), None, false).await;
    assert_eq!(bodies(&third.successful), vec!["g1-2"]);
}

#[tokio::test]
async fn new_arrivals_do_not_release_a_held_group() {
    let clock = Arc::new(ManualClock::default());
    let queue = fifo_queue(&clock, &[]);
    send(&queue, "one", "g1");

    let held = queue.receive(1, Some(0), Some(30), false).await;
    assert_eq!(held.successful.len(), 1);

    send(&queue, "two", "g1");
    assert!(queue.receive(1, Some(0), None, false).await.successful.is_empty());

    queue.remove(&held.receipt_handles[0]).unwrap();
    let next = queue.receive(1, Some(0), None, false).await;
    assert_eq!(bodies(&next.successful), vec!["two"]);
}

#[tokio::test]
async fn expired_visibility_redelivers_the_group_in_order() {
    let clock = Arc::new(ManualClock::default());
    let queue = fifo_queue(&clock, &[]);
    send(&queue, "a", "g1");
    send(&queue, "b", "g1");

    let first = queue.receive(10, Some(0), Some(5), false).await;
    assert_eq!(bodies(&first.successful), vec!["a", "b"]);

    clock.advance(6.0);
    assert_eq!(queue.requeue_inflight_messages(), 2);

    let again = queue.receive(10, Some(0), Some(5), false).await;
    assert_eq!(bodies(&again.successful), vec!["a", "b"]);
}

#[tokio::test]
async fn zero_visibility_releases_the_group_at_once() {
    let clock = Arc::new(ManualClock::default());
    let queue = fifo_queue(&clock, &[]);
    send(&queue, "a", "g1");

    let first = queue.receive(1, Some(0), Some(30), false).await;
    assert_eq!(bodies(&first.successful), vec!["a"]);
    assert!(queue.receive(1, Some(0), None, false).await.successful.is_empty());

    queue
        .update_visibility_timeout(&first.receipt_handles[0], 0)
        .unwrap();
    let again = queue.receive(1, Some(0), Some(30), false).await;
    assert_eq!(bodies(&again.successful), vec!["a"]);
    assert_ne!(again.receipt_handles[0], first.receipt_handles[0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_receivers_never_share_a_group() {
    let clock = Arc::new(ManualClock::default());
    let queue = Arc::new(fifo_queue(&clock, &[]));
    let groups = ["g1", "g2", "g3", "g4"];
    for group in groups {
        for i in 0..3 {
            send(&queue, &format!("{group}-{i}"), group);
        }
    }

    let receivers: Vec<_> = (0..8)
        .map(|_| {
            let queue = queue.clone();
            tokio::spawn(async move { queue.receive(2, Some(0), Some(30), false).await })
        })
        .collect();
    let mut owners: HashMap<String, usize> = HashMap::new();
    let mut delivered = 0;
    for (receiver, handle) in receivers.into_iter().enumerate() {
        let result = handle.await.unwrap();
        delivered += result.successful.len();
        let mut seen: HashMap<String, usize> = HashMap::new();
        for message in &result.successful {
            let group = message.group_id().unwrap().to_string();
            let owner = *owners.entry(group.clone()).or_insert(receiver);
            assert_eq!(owner, receiver, "{group} went to receivers {owner} and {receiver}");
            // each group is handed out from its head, in order
            let position = seen.entry(group.clone()).or_default();
            assert_eq!(message.body(), format!("{group}-{position}"));
            *position += 1;
        }
    }
    // a batch of two fills up inside the first group it claims
    assert_eq!(owners.len(), groups.len());
    assert_eq!(delivered, 2 * groups.len());
}

#[tokio::test]
async fn fills_a_batch_across_groups() {
    let clock = Arc::new(ManualClock::default());
    let queue = fifo_queue(&clock, &[]);
    send(&queue, "g1-1", "g1");
    send(&queue, "g2-1", "g2");
    send(&queue, "g1-2", "g1");

    let result = queue.receive(10, Some(0), None, false).await;
    assert_eq!(bodies(&result.successful), vec!["g1-1", "g1-2", "g2-1"]);
    assert_eq!(result.receipt_handles.len(), 3);
}

#[tokio::test]
async fn fifo_metadata_survives_the_round_trip() {
    let clock = Arc::new(ManualClock::default());
    let queue = fifo_queue(&clock, &[]);
    let first = send(&queue, "x", "group-7");
    let second = send(&queue, "y", "group-7");

    let attrs = first.attributes();
    assert_eq!(attrs["MessageGroupId"], "group-7");
    assert_eq!(attrs["MessageDeduplicationId"], "dedup-x");
    let first_seq: u128 = attrs["SequenceNumber"].parse().unwrap();
    let second_seq: u128 = second.sequence_number().unwrap().parse().unwrap();
    assert!(second_seq > first_seq);

    let received = queue.receive(1, Some(0), None, false).await;
    assert_eq!(received.successful[0].attributes()["SequenceNumber"], attrs["SequenceNumber"]);
}

#[tokio::test]
async fn purge_forgets_groups_and_deduplication() {
    let clock = Arc::new(ManualClock::default());
    let queue = fifo_queue(&clock, &[]);
    send(&queue, "a", "g1");
    let held = queue.receive(1, Some(0), Some(30), false).await;
    assert_eq!(held.successful.len(), 1);

    queue.purge(false).unwrap();
    assert_eq!(queue.approx_number_of_messages(), 0);
    assert_eq!(queue.approx_number_of_messages_not_visible(), 0);

    let again = send(&queue, "a", "g1");
    assert_ne!(again.id(), held.successful[0].id());
    let result = queue.receive(1, Some(0), None, false).await;
    assert_eq!(bodies(&result.successful), vec!["a"]);
}
