use crate::collector::STOP_ATTRIBUTE_NAME;
use crate::collector::STOP_ATTRIBUTE_VALUE;

const LONG_POLL_WAIT_SECS: i32 = 20;
const MAX_MESSAGES: i32 = 10;
/// Backoff before retrying a failed long-poll, so a persistent SQS error
/// doesn't spin the task hot.
const ERROR_BACKOFF: std::time::Duration = std::time::Duration::from_secs(1);

fn is_stop_sentinel(message: &aws_sdk_sqs::types::Message) -> bool {
    message
        .message_attributes()
        .and_then(|attrs| attrs.get(STOP_ATTRIBUTE_NAME))
        .and_then(|v| v.string_value())
        == Some(STOP_ATTRIBUTE_VALUE)
}

/// Fire-and-forget companion loop over the dead-letter queue. Invocations
/// that never reached the trampoline (e.g. topic-to-function delivery
/// failures) land here; their content is logged, never surfaced to a
/// caller, because nothing downstream is waiting on them by `call_id`.
pub fn spawn_dlq_drain(
    sqs: aws_sdk_sqs::Client,
    queue_url: String,
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
                    tracing::warn!(queue_url, error = %e, "DLQ long-poll failed");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                    continue;
                }
            };

            if messages.is_empty() {
                continue;
            }

            for message in &messages {
                if let Some(receipt_handle) = message.receipt_handle() {
                    let _ = sqs
                        .delete_message()
                        .queue_url(&queue_url)
                        .receipt_handle(receipt_handle)
                        .send()
                        .await;
                }
            }

            let mut stopped = false;
            for message in &messages {
                if is_stop_sentinel(message) {
                    stopped = true;
                    continue;
                }
                tracing::warn!(
                    body = message.body().unwrap_or_default(),
                    "message landed in dead-letter queue"
                );
            }

            if stopped {
                break;
            }
        }
    })
}
