//! The periodic queue sweep driven through the engine.

use std::sync::Arc;
use std::time::Duration;

use sqs_local_engine::sqs::types::{CreateQueueInput, ReceiveMessageInput, SendMessageInput};
use sqs_local_engine::sqs::ManualClock;
use sqs_local_engine::{EngineConfig, SqsEngine};

fn counts(engine: &SqsEngine, url: &str) -> (String, String, String) {
    let attrs = engine
        .get_queue_attributes(url, &["All".to_string()])
        .unwrap();
    (
        attrs["ApproximateNumberOfMessages"].clone(),
        attrs["ApproximateNumberOfMessagesNotVisible"].clone(),
        attrs["ApproximateNumberOfMessagesDelayed"].clone(),
    )
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        queue_update_interval_ms: 20,
        ..EngineConfig::default()
    }
}

#[tokio::test]
async fn running_worker_releases_expired_and_delayed_messages() {
    let engine = SqsEngine::new(fast_config());
    engine.start();
    let url = engine.create_queue(CreateQueueInput::new("orders")).unwrap();

    engine.send_message(&url, SendMessageInput::new("now")).unwrap();
    engine
        .send_message(&url, SendMessageInput::new("later").with_delay(1))
        .unwrap();
    let received = engine
        .receive_message(&url, ReceiveMessageInput::new(10).with_visibility_timeout(1))
        .await
        .unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(counts(&engine, &url), ("0".into(), "1".into(), "1".into()));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(counts(&engine, &url), ("2".into(), "0".into(), "0".into()));

    engine.shutdown();
}

#[tokio::test]
async fn retention_applies_only_when_enabled() {
    for enabled in [false, true] {
        let clock = Arc::new(ManualClock::default());
        let engine = SqsEngine::with_clock(
            EngineConfig {
                enable_message_retention_period: enabled,
                ..EngineConfig::default()
            },
            clock.clone(),
        );
        let url = engine
            .create_queue(
                CreateQueueInput::new("orders").with_attribute("MessageRetentionPeriod", "60"),
            )
            .unwrap();
        engine.send_message(&url, SendMessageInput::new("old")).unwrap();

        clock.advance(61.0);
        engine.update_all_queues();

        let expected = if enabled { "0" } else { "1" };
        assert_eq!(counts(&engine, &url).0, expected);
    }
}
