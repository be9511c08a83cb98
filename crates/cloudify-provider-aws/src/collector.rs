use std::sync::Arc;

use aws_sdk_sqs::types::{MessageAttributeValue, QueueAttributeName};
use cloudify_core::{CallId, FunctionReturn};

use crate::error::ProviderError;
use crate::state::{PendingMap, TaskSlot};

pub const STOP_ATTRIBUTE_NAME: &str = "cloudify";
pub const STOP_ATTRIBUTE_VALUE: &str = "stop";
const CALL_ID_ATTRIBUTE: &str = "call_id";

const LONG_POLL_WAIT_SECS: i32 = 20;
const MAX_MESSAGES: i32 = 10;
/// Backoff before retrying a failed long-poll, so a persistent SQS error
/// doesn't spin the task hot.
const ERROR_BACKOFF: std::time::Duration = std::time::Duration::from_secs(1);

/// Publish a stop sentinel to `queue_url` — the long-poll loop reading that
/// queue treats it as a signal to drain its pending work and exit.
pub async fn send_stop_sentinel(sqs: &aws_sdk_sqs::Client, queue_url: &str) {
    let result = sqs
        .send_message()
        .queue_url(queue_url)
        .message_body("empty")
        .message_attributes(
            STOP_ATTRIBUTE_NAME,
            MessageAttributeValue::builder()
                .data_type("String")
                .string_value(STOP_ATTRIBUTE_VALUE)
                .build()
                .expect("stop sentinel attribute is always well-formed"),
        )
        .send()
        .await;

    if let Err(e) = result {
        tracing::warn!(queue_url, error = %e, "failed to send stop sentinel");
    }
}

fn is_stop_sentinel(message: &aws_sdk_sqs::types::Message) -> bool {
    message
        .message_attributes()
        .and_then(|attrs| attrs.get(STOP_ATTRIBUTE_NAME))
        .and_then(|v| v.string_value())
        == Some(STOP_ATTRIBUTE_VALUE)
}

fn call_id_of(message: &aws_sdk_sqs::types::Message) -> Option<CallId> {
    let raw = message
        .message_attributes()
        .and_then(|attrs| attrs.get(CALL_ID_ATTRIBUTE))
        .and_then(|v| v.string_value())?;
    uuid::Uuid::parse_str(raw).ok().map(CallId)
}

/// Exit only if `pending` is still empty once the `TaskSlot` lock is held.
/// `ensure_collector_running` (`dispatch.rs`) checks the same lock before
/// deciding whether to spawn a replacement, so doing the emptiness check
/// and the handle-clear under that one lock makes the handoff atomic: a
/// caller that registers and then checks this slot either lands entirely
/// before this recheck (seen here, loop continues) or entirely after the
/// handle has already been cleared (seen there, a new collector is
/// spawned) — never in the gap where neither side would act.
async fn try_exit(pending: &PendingMap, slot: &TaskSlot) -> bool {
    let mut guard = slot.lock().await;
    if pending.is_empty().await {
        *guard = None;
        true
    } else {
        false
    }
}

/// Spawn the single response-collector task for `queue_url`, fanning reply
/// messages out to `pending` by `call_id`. Exits (and clears `slot`) once
/// the pending map empties or a stop sentinel arrives.
///
/// Invariant this task helps maintain: exactly one collector runs while
/// `pending` is non-empty. `dispatch.rs` is responsible for starting it
/// when absent; this task is responsible for clearing its own handle in
/// the same locked turn it observes the map going empty, so a caller that
/// enqueues in between always sees either a running collector or an
/// absent handle it can restart — never a collector that's about to exit
/// without having seen the new entry.
pub fn spawn_collector(
    sqs: aws_sdk_sqs::Client,
    queue_url: String,
    pending: Arc<PendingMap>,
    slot: Arc<TaskSlot>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let resp = sqs
                .receive_message()
                .queue_url(&queue_url)
                .wait_time_seconds(LONG_POLL_WAIT_SECS)
                .max_number_of_messages(MAX_MESSAGES)
                .message_attribute_names("All")
                .send()
                .await;

            let messages = match resp {
                Ok(r) => r.messages().to_vec(),
                Err(e) => {
                    tracing::warn!(queue_url, error = %e, "response queue long-poll failed");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                    Vec::new()
                }
            };

            if messages.is_empty() {
                // Nothing arrived this round. Only exit if the map is
                // still empty once we hold the slot lock; otherwise keep
                // polling for calls still in flight.
                if try_exit(&pending, &slot).await {
                    return;
                }
                continue;
            }

            delete_batch(&sqs, &queue_url, &messages).await;

            let mut stopped = false;
            let mut resolved = Vec::new();
            for message in &messages {
                if is_stop_sentinel(message) {
                    stopped = true;
                    continue;
                }
                let Some(call_id) = call_id_of(message) else {
                    tracing::warn!(queue_url, "reply message missing call_id attribute, dropping");
                    continue;
                };
                let Some(sender) = pending.take(&call_id).await else {
                    tracing::warn!(%call_id, "reply for unknown call_id, dropping");
                    continue;
                };
                resolved.push((sender, message.body().unwrap_or_default().to_string()));
            }

            for (sender, body) in resolved {
                let parsed: Result<FunctionReturn, _> = serde_json::from_str(&body);
                let outcome = parsed.map_err(|e| {
                    ProviderError::RemoteInvocationFailure(format!(
                        "malformed FunctionReturn: {e}"
                    ))
                });
                let _ = sender.send(outcome);
            }

            if stopped {
                pending.cancel_all().await;
                *slot.lock().await = None;
                return;
            }

            if try_exit(&pending, &slot).await {
                return;
            }
        }
    })
}

async fn delete_batch(
    sqs: &aws_sdk_sqs::Client,
    queue_url: &str,
    messages: &[aws_sdk_sqs::types::Message],
) {
    for message in messages {
        let Some(receipt_handle) = message.receipt_handle() else {
            continue;
        };
        if let Err(e) = sqs
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
        {
            tracing::debug!(queue_url, error = %e, "best-effort delete failed");
        }
    }
}

/// Build the queue attributes used when creating the response queue:
/// visibility timeout matching the function timeout, and a redrive policy
/// pointing failed messages at the DLQ.
pub fn response_queue_attributes(
    visibility_timeout_secs: u32,
    dlq_arn: &str,
    max_receive_count: u32,
) -> std::collections::HashMap<QueueAttributeName, String> {
    let redrive_policy = serde_json::json!({
        "deadLetterTargetArn": dlq_arn,
        "maxReceiveCount": max_receive_count,
    })
    .to_string();

    std::collections::HashMap::from([
        (
            QueueAttributeName::VisibilityTimeout,
            visibility_timeout_secs.to_string(),
        ),
        (QueueAttributeName::RedrivePolicy, redrive_policy),
    ])
}
