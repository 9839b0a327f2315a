use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;

use super::arn::QueueArn;
use super::attributes::{ALL, FIFO_QUEUE, POLICY};
use super::clock::{SharedClock, SystemClock};
use super::constants::{MAX_NUMBER_OF_MESSAGES, MAX_VISIBILITY_TIMEOUT, MAX_WAIT_TIME_SECONDS};
use super::error::{Result, SqsError};
use super::message::{
    compute_md5_of_attributes, Message, MessageContent, MessageRef,
    DEAD_LETTER_QUEUE_SOURCE_ARN, SENDER_ID, SENT_TIMESTAMP,
};
use super::move_task::{MoveTask, MoveTaskManager};
use super::queue::{Queue, QueueContext};
use super::receipt::decode_move_task_handle;
use super::sequence::MessageSequence;
use super::store::SqsStores;
use super::types::{
    CreateQueueInput, ListQueuesOutput, MessageAttributeValue, MessageMoveTaskEntry,
    ReceiveMessageInput, ReceivedMessage, SendMessageInput, SendMessageOutput,
    StartMessageMoveTaskInput,
};
use super::validation::{
    check_attributes, check_delay_seconds, check_fifo_id, check_message_content,
    check_message_max_size, check_message_min_size,
};
use super::worker::QueueUpdateWorker;

const MAX_RESULT_LIMIT: usize = 1000;

/// The call surface a protocol layer drives: queue lifecycle, messaging, permissions, tags and
/// dead-letter redrive. Queues are addressed by URL, or by bare name within the configured
/// account.
pub struct SqsEngine {
    config: EngineConfig,
    clock: SharedClock,
    sequence: Arc<MessageSequence>,
    stores: Arc<SqsStores>,
    move_tasks: MoveTaskManager,
    worker: QueueUpdateWorker,
}

impl SqsEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: EngineConfig, clock: SharedClock) -> Self {
        let stores = Arc::new(SqsStores::new());
        let worker = QueueUpdateWorker::new(
            stores.clone(),
            config.queue_update_interval(),
            config.enable_message_retention_period,
        );
        let move_tasks = MoveTaskManager::new(stores.clone(), clock.clone());
        SqsEngine {
            config,
            clock,
            sequence: Arc::new(MessageSequence::new()),
            stores,
            move_tasks,
            worker,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stores(&self) -> &Arc<SqsStores> {
        &self.stores
    }

    /// Starts the periodic queue sweep.
    pub fn start(&self) {
        self.worker.start();
        info!(
            account_id = %self.config.account_id,
            region = %self.config.region,
            "sqs engine started"
        );
    }

    /// Stops the sweep, cancels move tasks and wakes every blocked receive.
    pub fn shutdown(&self) {
        self.worker.stop();
        self.move_tasks.close();
        for queue in self.stores.all_queues() {
            queue.shutdown();
        }
        info!("sqs engine stopped");
    }

    /// Runs one sweep immediately instead of waiting for the next tick.
    pub fn update_all_queues(&self) {
        self.worker.do_update_all_queues();
    }

    fn queue_context(&self) -> QueueContext {
        QueueContext {
            clock: self.clock.clone(),
            sequence: self.sequence.clone(),
        }
    }

    /// `(account_id, name)` of `http://<host>/<account_id>/<name>`, or of a bare queue name.
    fn resolve_queue_location<'a>(&'a self, queue_url: &'a str) -> Result<(&'a str, &'a str)> {
        let Some((_, rest)) = queue_url.split_once("://") else {
            if queue_url.is_empty() {
                return Err(SqsError::queue_does_not_exist());
            }
            return Ok((self.config.account_id.as_str(), queue_url));
        };
        let mut parts = rest.splitn(3, '/');
        let _host = parts.next();
        match (parts.next(), parts.next()) {
            (Some(account_id), Some(name)) if !account_id.is_empty() && !name.is_empty() => {
                Ok((account_id, name.trim_end_matches('/')))
            }
            _ => Err(SqsError::queue_does_not_exist()),
        }
    }

    fn resolve_queue(&self, queue_url: &str) -> Result<Arc<Queue>> {
        let (account_id, name) = self.resolve_queue_location(queue_url)?;
        self.stores
            .require_queue(account_id, &self.config.region, name)
    }

    // --- queues ---

    /// Creates the queue, or returns the URL of an existing one whose attributes agree.
    pub fn create_queue(&self, input: CreateQueueInput) -> Result<String> {
        let CreateQueueInput {
            queue_name,
            attributes,
            tags,
        } = input;
        let mut attributes = attributes.unwrap_or_default();
        if attributes.get(POLICY).is_some_and(|p| p.is_empty()) {
            attributes.remove(POLICY);
        }

        let account_id = self.config.account_id.as_str();
        let region = self.config.region.as_str();
        let host = self.config.host.as_str();
        let now = self.clock.now();
        let ctx = self.queue_context();

        self.stores.with_store(account_id, region, |store| {
            if let Some(queue) = store.queues.get(&queue_name) {
                let kind_differs = attributes
                    .get(FIFO_QUEUE)
                    .is_some_and(|v| v.eq_ignore_ascii_case("true") != queue.is_fifo());
                if kind_differs {
                    debug!(queue = %queue.arn(), "queue exists with the other queue type");
                    return Err(SqsError::QueueAlreadyExists(format!(
                        "A queue already exists with the same name and a different value for \
                         attribute {FIFO_QUEUE}"
                    )));
                }
                if !attributes.is_empty() {
                    if let Some(key) = queue.attribute_mismatch(&attributes)? {
                        debug!(queue = %queue.arn(), attribute = %key, "queue attribute values do not match");
                        return Err(SqsError::QueueAlreadyExists(format!(
                            "A queue already exists with the same name and a different value for \
                             attribute {key}"
                        )));
                    }
                }
                return Ok(queue.url(host));
            }

            if self.config.delay_recently_deleted && store.is_recently_deleted(&queue_name, now) {
                return Err(SqsError::QueueDeletedRecently(
                    "You must wait 60 seconds after deleting a queue before you can create \
                     another with the same name."
                        .into(),
                ));
            }
            store.expire_deleted(now);

            let queue = Queue::create(&queue_name, region, account_id, Some(&attributes), tags, &ctx)?;
            info!(queue = %queue.arn(), fifo = queue.is_fifo(), "created queue");
            let url = queue.url(host);
            store.queues.insert(queue_name, Arc::new(queue));
            Ok(url)
        })
    }

    pub fn get_queue_url(&self, queue_name: &str, owner_account_id: Option<&str>) -> Result<String> {
        let account_id = owner_account_id.unwrap_or(&self.config.account_id);
        let queue = self
            .stores
            .require_queue(account_id, &self.config.region, queue_name)?;
        Ok(queue.url(&self.config.host))
    }

    /// Queue URLs ordered by name. `next_token` is the last name of the previous page.
    pub fn list_queues(
        &self,
        prefix: Option<&str>,
        max_results: Option<usize>,
        next_token: Option<&str>,
    ) -> ListQueuesOutput {
        let host = self.config.host.as_str();
        let mut queues: Vec<(String, String)> = self.stores.with_store(
            &self.config.account_id,
            &self.config.region,
            |store| {
                store
                    .queues
                    .values()
                    .filter(|q| prefix.map_or(true, |p| q.name().starts_with(p)))
                    .map(|q| (q.name().to_string(), q.url(host)))
                    .collect()
            },
        );
        queues.sort();

        let max = max_results.unwrap_or(MAX_RESULT_LIMIT).clamp(1, MAX_RESULT_LIMIT);
        let start = next_token.map_or(0, |token| {
            queues
                .iter()
                .position(|(name, _)| name.as_str() > token)
                .unwrap_or(queues.len())
        });
        let page: Vec<&(String, String)> = queues[start..].iter().take(max).collect();
        let next_token = if start + max < queues.len() {
            page.last().map(|(name, _)| name.clone())
        } else {
            None
        };

        ListQueuesOutput {
            queue_urls: page.into_iter().map(|(_, url)| url.clone()).collect(),
            next_token,
        }
    }

    /// Removes the queue, wakes its blocked receivers and remembers the deletion time.
    pub fn delete_queue(&self, queue_url: &str) -> Result<()> {
        let (account_id, name) = self.resolve_queue_location(queue_url)?;
        if account_id != self.config.account_id {
            warn!(
                context_account = %self.config.account_id,
                queue_account = %account_id,
                "cross-account DeleteQueue operation"
            );
        }
        let now = self.clock.now();
        self.stores
            .with_store(account_id, &self.config.region, |store| {
                let queue = store
                    .queues
                    .remove(name)
                    .ok_or_else(SqsError::queue_does_not_exist)?;
                queue.shutdown();
                store.deleted.insert(name.to_string(), now);
                info!(queue = %queue.arn(), "deleted queue");
                Ok(())
            })
    }

    pub fn get_queue_attributes(
        &self,
        queue_url: &str,
        attribute_names: &[String],
    ) -> Result<BTreeMap<String, String>> {
        self.resolve_queue(queue_url)?
            .get_queue_attributes(attribute_names)
    }

    pub fn set_queue_attributes(
        &self,
        queue_url: &str,
        attributes: &HashMap<String, String>,
    ) -> Result<()> {
        let queue = self.resolve_queue(queue_url)?;
        queue.set_queue_attributes(attributes)?;
        debug!(queue = %queue.arn(), count = attributes.len(), "updated queue attributes");
        Ok(())
    }

    pub fn purge_queue(&self, queue_url: &str) -> Result<()> {
        self.resolve_queue(queue_url)?
            .purge(self.config.delay_purge_retry)
    }

    /// URLs of the queues whose redrive policy targets this queue.
    pub fn list_dead_letter_source_queues(&self, queue_url: &str) -> Result<Vec<String>> {
        let dead_letter_queue = self.resolve_queue(queue_url)?;
        let host = self.config.host.as_str();
        let mut urls: Vec<String> = self.stores.with_store(
            dead_letter_queue.account_id(),
            dead_letter_queue.region(),
            |store| {
                store
                    .queues
                    .values()
                    .filter(|q| {
                        q.redrive_policy()
                            .is_some_and(|rp| rp.dead_letter_target_arn == dead_letter_queue.arn())
                    })
                    .map(|q| q.url(host))
                    .collect()
            },
        );
        urls.sort();
        Ok(urls)
    }

    // --- messages ---

    pub fn send_message(&self, queue_url: &str, input: SendMessageInput) -> Result<SendMessageOutput> {
        let queue = self.resolve_queue(queue_url)?;
        let SendMessageInput {
            message_body,
            delay_seconds,
            message_attributes,
            message_system_attributes,
            message_deduplication_id,
            message_group_id,
        } = input;

        check_message_min_size(&message_body)?;
        check_message_max_size(
            &message_body,
            message_attributes.as_ref(),
            queue.maximum_message_size(),
        )?;
        check_message_content(&message_body)?;
        if let Some(ref attrs) = message_attributes {
            check_attributes(attrs)?;
        }
        if let Some(ref attrs) = message_system_attributes {
            check_attributes(attrs)?;
        }
        check_fifo_id(message_deduplication_id.as_deref(), "MessageDeduplicationId")?;
        check_fifo_id(message_group_id.as_deref(), "MessageGroupId")?;
        check_delay_seconds(delay_seconds)?;

        let content = self.build_content(
            message_body,
            message_attributes.unwrap_or_default(),
            message_system_attributes.as_ref(),
        );
        let md5_of_message_system_attributes = message_system_attributes
            .as_ref()
            .and_then(compute_md5_of_attributes);

        let message = queue.put(
            content,
            None,
            message_deduplication_id,
            message_group_id,
            delay_seconds,
        )?;
        debug!(queue = %queue.arn(), message_id = %message.id(), "sent message");

        let content = message.content();
        Ok(SendMessageOutput {
            message_id: message.id().to_string(),
            md5_of_message_body: content.md5_of_body.clone(),
            md5_of_message_attributes: content.md5_of_message_attributes.clone(),
            md5_of_message_system_attributes,
            sequence_number: message.sequence_number().map(String::from),
        })
    }

    fn build_content(
        &self,
        body: String,
        message_attributes: HashMap<String, MessageAttributeValue>,
        system_attributes: Option<&HashMap<String, MessageAttributeValue>>,
    ) -> MessageContent {
        let mut content = MessageContent::new(body)
            .with_message_attributes(message_attributes)
            .with_attribute(SENDER_ID, self.config.account_id.as_str())
            .with_attribute(SENT_TIMESTAMP, self.clock.now_millis().to_string());
        for (name, value) in system_attributes.into_iter().flatten() {
            if let Some(ref string_value) = value.string_value {
                content.attributes.insert(name.clone(), string_value.clone());
            }
        }
        content
    }

    /// Receives up to `MaxNumberOfMessages`, waiting up to `WaitTimeSeconds` (default: the
    /// queue's `ReceiveMessageWaitTimeSeconds`). Messages past the redrive policy's receive
    /// count are moved to the dead-letter queue instead of being returned.
    pub async fn receive_message(
        &self,
        queue_url: &str,
        input: ReceiveMessageInput,
    ) -> Result<Vec<ReceivedMessage>> {
        let queue = self.resolve_queue(queue_url)?;

        let wait_time_seconds = match input.wait_time_seconds {
            None => queue.wait_time_seconds(),
            Some(wait) if (0..=MAX_WAIT_TIME_SECONDS as i32).contains(&wait) => wait as u32,
            Some(wait) => {
                return Err(SqsError::InvalidParameterValue(format!(
                    "Value {wait} for parameter WaitTimeSeconds is invalid. Reason: Must be >= 0 \
                     and <= {MAX_WAIT_TIME_SECONDS}, if provided."
                )))
            }
        };
        let num_messages = match input.max_number_of_messages {
            None => 1,
            Some(num)
                if num >= 1
                    && (num <= MAX_NUMBER_OF_MESSAGES as i32
                        || self.config.disable_max_number_of_message_limit) =>
            {
                num as usize
            }
            Some(num) => {
                return Err(SqsError::InvalidParameterValue(format!(
                    "Value {num} for parameter MaxNumberOfMessages is invalid. Reason: Must be \
                     between 1 and {MAX_NUMBER_OF_MESSAGES}, if provided."
                )))
            }
        };
        let visibility_timeout = match input.visibility_timeout {
            None => None,
            Some(timeout) if (0..=MAX_VISIBILITY_TIMEOUT as i32).contains(&timeout) => {
                Some(timeout as u32)
            }
            Some(timeout) => {
                return Err(SqsError::InvalidParameterValue(format!(
                    "Value {timeout} for parameter VisibilityTimeout is invalid. Reason: Must be \
                     >= 0 and <= {MAX_VISIBILITY_TIMEOUT}, if provided."
                )))
            }
        };

        // resolved up front so a missing target leaves every message in the source
        let dead_letter_target = queue
            .redrive_policy()
            .map(|policy| self.stores.require_queue_by_arn(&policy.dead_letter_target_arn))
            .transpose()?;

        let result = queue
            .receive(
                num_messages,
                Some(wait_time_seconds),
                visibility_timeout,
                input.poll_empty_queue,
            )
            .await;

        match dead_letter_target {
            Some(target) => {
                redrive_to_dead_letter_queue(&queue, &target, result.dead_letter_messages)
            }
            // the policy appeared after the lookup
            None => result
                .dead_letter_messages
                .into_iter()
                .for_each(|message| queue.restore(message)),
        }

        let attribute_names = input
            .message_system_attribute_names
            .as_deref()
            .or(input.attribute_names.as_deref());
        let message_attribute_names = input.message_attribute_names.as_deref();
        Ok(result
            .successful
            .iter()
            .zip(result.receipt_handles)
            .map(|(message, receipt_handle)| {
                to_received_message(message, receipt_handle, attribute_names, message_attribute_names)
            })
            .collect())
    }

    pub fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<()> {
        self.resolve_queue(queue_url)?.remove(receipt_handle)
    }

    pub fn change_message_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        visibility_timeout: i32,
    ) -> Result<()> {
        let queue = self.resolve_queue(queue_url)?;
        if !(0..=MAX_VISIBILITY_TIMEOUT as i32).contains(&visibility_timeout) {
            return Err(SqsError::InvalidParameterValue(format!(
                "Value {visibility_timeout} for parameter VisibilityTimeout is invalid. Reason: \
                 Must be >= 0 and <= {MAX_VISIBILITY_TIMEOUT}, if provided."
            )));
        }
        queue.update_visibility_timeout(receipt_handle, visibility_timeout as u32)
    }

    // --- permissions and tags ---

    pub fn add_permission(
        &self,
        queue_url: &str,
        label: &str,
        account_ids: &[String],
        actions: &[String],
    ) -> Result<()> {
        self.resolve_queue(queue_url)?
            .add_permission(label, actions, account_ids)
    }

    pub fn remove_permission(&self, queue_url: &str, label: &str) -> Result<()> {
        self.resolve_queue(queue_url)?.remove_permission(label)
    }

    pub fn tag_queue(&self, queue_url: &str, tags: HashMap<String, String>) -> Result<()> {
        let queue = self.resolve_queue(queue_url)?;
        if !tags.is_empty() {
            queue.tag(tags);
        }
        Ok(())
    }

    pub fn untag_queue(&self, queue_url: &str, tag_keys: &[String]) -> Result<()> {
        self.resolve_queue(queue_url)?.untag(tag_keys);
        Ok(())
    }

    pub fn list_queue_tags(&self, queue_url: &str) -> Result<HashMap<String, String>> {
        Ok(self.resolve_queue(queue_url)?.tags())
    }

    // --- message move tasks ---

    /// Starts draining a dead-letter queue back to `DestinationArn`, or to each message's
    /// original source queue. Returns the task handle.
    pub fn start_message_move_task(&self, input: StartMessageMoveTaskInput) -> Result<String> {
        let StartMessageMoveTaskInput {
            source_arn,
            destination_arn,
            max_number_of_messages_per_second,
        } = input;

        self.require_move_source(&source_arn)?;
        let is_dead_letter_queue = self.stores.all_queues().iter().any(|q| {
            q.redrive_policy()
                .is_some_and(|rp| rp.dead_letter_target_arn == source_arn)
        });
        if !is_dead_letter_queue {
            return Err(SqsError::InvalidParameterValue(
                "Source queue must be configured as a Dead Letter Queue.".into(),
            ));
        }
        if let Some(ref destination) = destination_arn {
            match self.stores.require_queue_by_arn(destination) {
                Err(SqsError::QueueDoesNotExist(_)) => {
                    return Err(SqsError::ResourceNotFound(
                        "The resource that you specified for the DestinationArn parameter \
                         doesn't exist."
                            .into(),
                    ))
                }
                Err(e) => return Err(e),
                Ok(_) => {}
            }
        }

        let task = self.move_tasks.submit(MoveTask::new(
            source_arn,
            destination_arn,
            max_number_of_messages_per_second,
        ))?;
        Ok(task.task_handle())
    }

    /// Cancels a running task and returns how many messages it moved so far.
    pub fn cancel_message_move_task(&self, task_handle: &str) -> Result<i64> {
        let (task_id, source_arn) = decode_move_task_handle(task_handle).map_err(|_| {
            SqsError::InvalidParameterValue("Value for parameter TaskHandle is invalid.".into())
        })?;
        self.require_move_source(&source_arn)?;
        self.move_tasks.cancel(&task_id)
    }

    /// Started tasks for `source_arn`, most recent first; one result unless `max_results` says
    /// otherwise.
    pub fn list_message_move_tasks(
        &self,
        source_arn: &str,
        max_results: Option<usize>,
    ) -> Result<Vec<MessageMoveTaskEntry>> {
        if QueueArn::parse(source_arn).is_err() {
            return Err(SqsError::InvalidParameterValue(
                "You must use this format to specify the SourceArn: \
                 arn:<partition>:<service>:<region>:<account-id>:<resource-id>"
                    .into(),
            ));
        }
        self.require_move_source(source_arn)?;
        Ok(self.move_tasks.list(source_arn, max_results))
    }

    fn require_move_source(&self, source_arn: &str) -> Result<Arc<Queue>> {
        self.stores
            .require_queue_by_arn(source_arn)
            .map_err(|e| match e {
                SqsError::QueueDoesNotExist(_) => SqsError::ResourceNotFound(
                    "The resource that you specified for the SourceArn parameter doesn't exist."
                        .into(),
                ),
                other => other,
            })
    }
}

impl Drop for SqsEngine {
    fn drop(&mut self) {
        self.move_tasks.close();
    }
}

/// Moves messages past the receive limit into `target`; one that cannot be moved goes back
/// to the source.
fn redrive_to_dead_letter_queue(queue: &Queue, target: &Queue, messages: Vec<MessageRef>) {
    for message in messages {
        let content = message
            .to_content()
            .with_attribute(DEAD_LETTER_QUEUE_SOURCE_ARN, queue.arn());
        match target.put(
            content,
            None,
            message.dedup_id().map(String::from),
            message.group_id().map(String::from),
            None,
        ) {
            Ok(_) => {
                debug!(
                    queue = %queue.arn(),
                    target = %target.arn(),
                    message_id = %message.id(),
                    "moved message to dead-letter queue"
                );
                if let Some(group_id) = message.group_id() {
                    queue.update_message_group_visibility(group_id);
                }
            }
            Err(e) => {
                warn!(
                    queue = %queue.arn(),
                    target = %target.arn(),
                    message_id = %message.id(),
                    error = %e,
                    "could not move message to dead-letter queue, keeping it in the source"
                );
                queue.restore(message);
            }
        }
    }
}

fn to_received_message(
    message: &Message,
    receipt_handle: String,
    attribute_names: Option<&[String]>,
    message_attribute_names: Option<&[String]>,
) -> ReceivedMessage {
    let attributes = match attribute_names {
        None => HashMap::new(),
        Some(names) if names.iter().any(|n| n == ALL) => message.attributes().into_iter().collect(),
        Some(names) => message
            .attributes()
            .into_iter()
            .filter(|(k, _)| names.contains(k))
            .collect(),
    };
    let message_attributes =
        filter_message_attributes(&message.content().message_attributes, message_attribute_names);
    let content = message.content();

    ReceivedMessage {
        message_id: message.id().to_string(),
        receipt_handle,
        body: content.body.clone(),
        md5_of_body: content.md5_of_body.clone(),
        md5_of_message_attributes: compute_md5_of_attributes(&message_attributes),
        attributes,
        message_attributes,
    }
}

/// Supports exact names, `All`, `.*`/`*` and `prefix.*` filters.
fn filter_message_attributes(
    attributes: &HashMap<String, MessageAttributeValue>,
    names: Option<&[String]>,
) -> HashMap<String, MessageAttributeValue> {
    let Some(names) = names else {
        return HashMap::new();
    };
    if names.iter().any(|n| n == ALL || n == ".*" || n == "*") {
        return attributes.clone();
    }
    attributes
        .iter()
        .filter(|(key, _)| {
            names.iter().any(|name| match name.strip_suffix(".*") {
                Some(prefix) => key.starts_with(prefix),
                None => name == *key,
            })
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> HashMap<String, MessageAttributeValue> {
        HashMap::from([
            ("order.id".to_string(), MessageAttributeValue::number(7)),
            ("order.kind".to_string(), MessageAttributeValue::string("x")),
            ("trace".to_string(), MessageAttributeValue::string("t")),
        ])
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn message_attribute_filters() {
        assert!(filter_message_attributes(&attrs(), None).is_empty());
        let all = names(&["All"]);
        assert_eq!(filter_message_attributes(&attrs(), Some(&all)).len(), 3);
        let wildcard = names(&[".*"]);
        assert_eq!(filter_message_attributes(&attrs(), Some(&wildcard)).len(), 3);

        let prefix = names(&["order.*"]);
        let prefixed = filter_message_attributes(&attrs(), Some(&prefix));
        assert_eq!(prefixed.len(), 2);
        assert!(!prefixed.contains_key("trace"));

        let exact = names(&["trace", "missing"]);
        let exact = filter_message_attributes(&attrs(), Some(&exact));
        assert_eq!(exact.len(), 1);
        assert!(exact.contains_key("trace"));
    }

    #[test]
    fn queue_urls_resolve_to_account_and_name() {
        let engine = SqsEngine::new(EngineConfig::default());
        assert_eq!(
            engine
                .resolve_queue_location("http://localhost:4566/111111111111/orders")
                .unwrap(),
            ("111111111111", "orders")
        );
        assert_eq!(
            engine.resolve_queue_location("orders").unwrap(),
            ("000000000000", "orders")
        );
        assert!(engine.resolve_queue_location("http://localhost:4566/").is_err());
        assert!(engine.resolve_queue_location("").is_err());
    }
}
