use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{InvocationType, LogType};
use aws_sdk_sns::types::MessageAttributeValue as SnsMessageAttributeValue;
use cloudify_core::{CallId, FunctionCall, FunctionReturn, InvokeResult, RemoteError};
use tokio::sync::oneshot;

use crate::collector;
use crate::error::ProviderError;
use crate::state::AwsState;

/// Dispatch one call through direct (synchronous Lambda invoke) or queue
/// (SNS publish + response-queue correlation) mode, matching whichever
/// shape `initialize` provisioned for this instance.
pub async fn invoke(
    state: &AwsState,
    function_name: &str,
    args: serde_json::Value,
) -> Result<InvokeResult, ProviderError> {
    let call = FunctionCall {
        name: function_name.to_string(),
        args,
        call_id: CallId::new(),
        response_queue_url: state.manifest.response_queue_url.clone(),
    };

    if state.manifest.queue_mode() {
        invoke_via_queue(state, call).await
    } else {
        invoke_direct(state, call).await
    }
}

async fn invoke_direct(
    state: &AwsState,
    call: FunctionCall,
) -> Result<InvokeResult, ProviderError> {
    let payload = serde_json::to_vec(&call)
        .map_err(|e| ProviderError::RemoteInvocationFailure(format!("encoding call: {e}")))?;

    let resp = state
        .clients
        .lambda
        .invoke()
        .function_name(&state.manifest.function_name)
        .invocation_type(InvocationType::RequestResponse)
        .log_type(LogType::Tail)
        .payload(Blob::new(payload))
        .send()
        .await
        .map_err(|e| ProviderError::RemoteInvocationFailure(format!("lambda:Invoke: {e}")))?;

    if let Some(log_tail) = resp.log_result() {
        if let Ok(decoded) = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, log_tail) {
            tracing::debug!(
                function_name = %state.manifest.function_name,
                log_tail = %String::from_utf8_lossy(&decoded),
                "invocation log tail"
            );
        }
    }

    let raw_response = serde_json::json!({
        "status_code": resp.status_code(),
        "executed_version": resp.executed_version(),
    });

    if resp.function_error().is_some() {
        let message = resp
            .payload()
            .map(|blob| String::from_utf8_lossy(blob.as_ref()).to_string())
            .unwrap_or_default();
        return Ok(InvokeResult {
            value: None,
            error: Some(RemoteError {
                name: resp.function_error().unwrap_or_default().to_string(),
                message,
                stack: None,
            }),
            raw_response,
        });
    }

    let body = resp
        .payload()
        .ok_or_else(|| ProviderError::RemoteInvocationFailure("invoke returned no payload".into()))?;
    let ret: FunctionReturn = serde_json::from_slice(body.as_ref()).map_err(|e| {
        ProviderError::RemoteInvocationFailure(format!("malformed FunctionReturn: {e}"))
    })?;

    Ok(InvokeResult::from_return(ret, raw_response))
}

async fn invoke_via_queue(
    state: &AwsState,
    call: FunctionCall,
) -> Result<InvokeResult, ProviderError> {
    let (tx, rx) = oneshot::channel();

    // Registered before publishing, per the invariant `collector.rs`
    // documents: a reply that arrives immediately after publish must
    // always find a waiting slot.
    state.pending.register(call.call_id, tx).await;
    ensure_collector_running(state).await;

    if let Err(e) = publish_request(state, &call).await {
        state.pending.take(&call.call_id).await;
        return Err(e);
    }

    let outcome = rx.await.map_err(|_| ProviderError::Cancelled)?;
    let ret = outcome?;

    Ok(InvokeResult::from_return(
        ret,
        serde_json::json!({ "call_id": call.call_id.to_string() }),
    ))
}

/// Start the response collector if it is not already running. Locks the
/// slot for the whole check-then-spawn so two concurrent calls racing to
/// start it can never both succeed.
async fn ensure_collector_running(state: &AwsState) {
    let mut guard = state.collector.lock().await;
    if guard.is_some() {
        return;
    }
    let Some(response_queue_url) = state.manifest.response_queue_url.clone() else {
        return;
    };
    let handle = collector::spawn_collector(
        state.clients.sqs.clone(),
        response_queue_url,
        state.pending.clone(),
        state.collector.clone(),
    );
    *guard = Some(handle);
}

async fn publish_request(state: &AwsState, call: &FunctionCall) -> Result<(), ProviderError> {
    let topic_arn = state
        .manifest
        .request_topic_arn
        .as_deref()
        .ok_or_else(|| ProviderError::ProvisioningError("queue mode with no request topic".into()))?;

    let body = serde_json::to_string(call)
        .map_err(|e| ProviderError::RemoteInvocationFailure(format!("encoding call: {e}")))?;

    state
        .clients
        .sns
        .publish()
        .topic_arn(topic_arn)
        .message(body)
        .message_attributes(
            "call_id",
            SnsMessageAttributeValue::builder()
                .data_type("String")
                .string_value(call.call_id.to_string())
                .build()
                .expect("call_id attribute is always well-formed"),
        )
        .send()
        .await
        .map_err(|e| ProviderError::RemoteInvocationFailure(format!("sns:Publish: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_mode_call_carries_no_response_queue() {
        let call = FunctionCall {
            name: "add".into(),
            args: serde_json::json!([1, 2]),
            call_id: CallId::new(),
            response_queue_url: None,
        };
        assert!(call.response_queue_url.is_none());
    }
}
