use crate::collector;
use crate::iam;
use crate::manifest::ResourcesManifest;
use crate::state::{AwsState, Clients};

/// Stop every background task, then delete every resource named in the
/// manifest, in the reverse of creation order. Called both from a live
/// `AwsState` (the common case) and from `cleanup_resources` with a
/// manifest reconstructed from JSON and no live tasks to stop.
pub async fn cleanup(state: AwsState) {
    // Publish the sentinel, then wait for the task to actually reach its
    // own stop-sentinel exit path (which rejects whatever is still in
    // `pending` as it goes) rather than cutting it off mid-poll — a task
    // aborted while parked in `receive_message` never gets to run that
    // path at all.
    if state.collector.is_running().await {
        if let Some(response_queue_url) = &state.manifest.response_queue_url {
            collector::send_stop_sentinel(&state.clients.sqs, response_queue_url).await;
        }
    }
    state.collector.take_and_join().await;

    // Covers the cases the sentinel can't: no collector was ever started
    // (direct mode, or no call made it to queue mode), or a call slipped
    // in and registered after the collector had already observed the
    // sentinel and rejected everything it saw.
    state.pending.cancel_all().await;

    if state.dlq_drain.is_running().await {
        if let Some(dlq_url) = &state.manifest.dead_letter_queue_url {
            collector::send_stop_sentinel(&state.clients.sqs, dlq_url).await;
        }
    }
    state.dlq_drain.take_and_join().await;

    teardown_resources(&state.clients, &state.manifest).await;
}

/// Delete every resource a manifest names, swallowing individual failures —
/// a resource the caller already deleted, or one AWS is still settling the
/// deletion of, should never block the rest of teardown. This is the part
/// of teardown that `cleanup` and `cleanup_resources` share: the former
/// additionally stops live background tasks first, the latter has none to
/// stop because it starts from nothing but a manifest.
pub async fn teardown_resources(clients: &Clients, manifest: &ResourcesManifest) {
    if let Some(subscription_arn) = &manifest.subscription_arn {
        if let Err(e) = clients
            .sns
            .unsubscribe()
            .subscription_arn(subscription_arn)
            .send()
            .await
        {
            tracing::debug!(subscription_arn, error = %e, "unsubscribe failed, assuming already gone");
        }
    }

    // Deleting the function also removes its event-source mappings and
    // permissions — no separate RemovePermission call needed.
    if let Err(e) = clients
        .lambda
        .delete_function()
        .function_name(&manifest.function_name)
        .send()
        .await
    {
        tracing::debug!(function_name = %manifest.function_name, error = %e, "function delete failed, assuming already gone");
    }

    if let Err(e) = clients
        .logs
        .delete_log_group()
        .log_group_name(&manifest.log_group_name)
        .send()
        .await
    {
        tracing::debug!(log_group = %manifest.log_group_name, error = %e, "log group delete failed, assuming already gone");
    }

    // The SNS feedback role is modeled as always-cached (a fixed, shared
    // name — see DESIGN.md), so only an ephemeral execution role is this
    // instance's to delete.
    if manifest.role_policy == crate::manifest::RolePolicy::Ephemeral {
        iam::delete_ephemeral_role(&clients.iam, &manifest.role_name).await;
    }

    if let Some(topic_arn) = &manifest.request_topic_arn {
        if let Err(e) = clients.sns.delete_topic().topic_arn(topic_arn).send().await {
            tracing::debug!(topic_arn, error = %e, "topic delete failed, assuming already gone");
        }
    }

    if let Some(response_queue_url) = &manifest.response_queue_url {
        if let Err(e) = clients
            .sqs
            .delete_queue()
            .queue_url(response_queue_url)
            .send()
            .await
        {
            tracing::debug!(response_queue_url, error = %e, "response queue delete failed, assuming already gone");
        }
    }

    if let Some(dlq_url) = &manifest.dead_letter_queue_url {
        if let Err(e) = clients.sqs.delete_queue().queue_url(dlq_url).send().await {
            tracing::debug!(dlq_url, error = %e, "dlq delete failed, assuming already gone");
        }
    }

    // SNS creates a delivery-status log group alongside the feedback role
    // when failure feedback is enabled; there is no API to look it up by
    // the role or topic, so it is left behind. Documented leak, not a bug.

    tracing::info!(function_name = %manifest.function_name, "teardown complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::RolePolicy;

    fn direct_mode_manifest() -> ResourcesManifest {
        ResourcesManifest {
            function_name: "cloudify-abc".into(),
            role_name: "cloudify-abc-role".into(),
            role_policy: RolePolicy::Ephemeral,
            log_group_name: "/aws/lambda/cloudify-abc".into(),
            region: "us-east-1".into(),
            request_topic_arn: None,
            response_queue_url: None,
            dead_letter_queue_url: None,
            subscription_arn: None,
            feedback_role_name: None,
        }
    }

    #[test]
    fn direct_mode_manifest_has_no_queue_resources_to_unwind() {
        let manifest = direct_mode_manifest();
        assert!(manifest.subscription_arn.is_none());
        assert!(manifest.request_topic_arn.is_none());
        assert!(!manifest.queue_mode());
    }
}
