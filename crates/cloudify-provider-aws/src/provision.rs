use std::path::Path;
use std::sync::Arc;

use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{DeadLetterConfig, FunctionCode, Runtime, State as LambdaState};
use cloudify_core::Packager;
use uuid::Uuid;

use crate::error::ProviderError;
use crate::iam::{self, LAMBDA_TRUST_SERVICE, SNS_TRUST_SERVICE};
use crate::manifest::ResourcesManifest;
use crate::options::AwsOptions;
use crate::poll::poll_until_success;
use crate::state::{AwsState, Clients, PendingMap, TaskSlot};
use crate::teardown;
use crate::{collector, dlq};

const FEEDBACK_ROLE_NAME: &str = "cloudify-sns-feedback";
const LOG_RETENTION_DAYS: i32 = 1;
const DLQ_MAX_RECEIVE_COUNT: u32 = 5;

fn fresh_nonce() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_string()
}

/// Stand up a single instance's worth of cloud resources, in the dependency
/// order documented in SPEC_FULL.md §4.2: IAM role → log group → (queue
/// mode only: DLQ → DLQ drain) → function → (queue mode only: feedback
/// role → request topic → response queue) → (queue mode only: SNS invoke
/// permission → subscription).
///
/// On any failure partway through, tears down everything created so far
/// before returning `Err` — callers never have to know how far
/// provisioning got.
pub async fn initialize(
    config: &aws_config::SdkConfig,
    function_module: &Path,
    packager: &dyn Packager,
    options: AwsOptions,
) -> Result<AwsState, ProviderError> {
    let region = options
        .region
        .clone()
        .or_else(|| config.region().map(|r| r.to_string()))
        .unwrap_or_else(|| "us-east-1".to_string());

    let nonce = fresh_nonce();
    let function_name = format!("cloudify-{nonce}");
    let log_group_name = format!("/aws/lambda/{function_name}");
    let role_name = options.effective_role_name(&nonce);

    let clients = Clients::new(config);

    // Name-collision check — fatal, nothing has been created yet so there
    // is nothing to tear down.
    if clients
        .lambda
        .get_function()
        .function_name(&function_name)
        .send()
        .await
        .is_ok()
    {
        return Err(ProviderError::NameCollision(function_name));
    }

    let mut manifest = ResourcesManifest {
        function_name: function_name.clone(),
        role_name: role_name.clone(),
        role_policy: options.role_policy,
        log_group_name: log_group_name.clone(),
        region: region.clone(),
        request_topic_arn: None,
        response_queue_url: None,
        dead_letter_queue_url: None,
        subscription_arn: None,
        feedback_role_name: None,
    };

    match run_provisioning(&clients, &mut manifest, function_module, packager, &options).await {
        Ok(dlq_drain_handle) => {
            let dlq_drain = Arc::new(TaskSlot::default());
            if let Some(handle) = dlq_drain_handle {
                dlq_drain.set(handle).await;
            }
            Ok(AwsState {
                clients,
                manifest,
                pending: Arc::new(PendingMap::default()),
                collector: Arc::new(TaskSlot::default()),
                dlq_drain,
            })
        }
        Err(e) => {
            tracing::warn!(error = %e, "provisioning failed, tearing down partial state");
            teardown::teardown_resources(&clients, &manifest).await;
            Err(e)
        }
    }
}

/// Runs every provisioning step, populating `manifest` as each resource is
/// created. Returns the DLQ drain task handle (queue mode only) so the
/// caller can stash it once the whole instance is known to be healthy.
async fn run_provisioning(
    clients: &Clients,
    manifest: &mut ResourcesManifest,
    function_module: &Path,
    packager: &dyn Packager,
    options: &AwsOptions,
) -> Result<Option<tokio::task::JoinHandle<()>>, ProviderError> {
    // ── IAM role ─────────────────────────────────────────────────────────
    iam::ensure_role(
        &clients.iam,
        &manifest.role_name,
        LAMBDA_TRUST_SERVICE,
        options.policy_arn.as_deref(),
    )
    .await?;
    iam::deny_create_log_group(&clients.iam, &manifest.role_name).await?;

    // ── log group (created up front so the function can't auto-create one
    // without our retention policy) ─────────────────────────────────────
    clients
        .logs
        .create_log_group()
        .log_group_name(&manifest.log_group_name)
        .send()
        .await
        .map_err(|e| ProviderError::ProvisioningError(format!("logs:CreateLogGroup: {e}")))?;
    clients
        .logs
        .put_retention_policy()
        .log_group_name(&manifest.log_group_name)
        .retention_in_days(LOG_RETENTION_DAYS)
        .send()
        .await
        .map_err(|e| ProviderError::ProvisioningError(format!("logs:PutRetentionPolicy: {e}")))?;

    let mut dlq_drain_handle = None;
    let mut dlq_arn = None;

    if options.use_queue {
        // ── dead-letter queue + drain ────────────────────────────────────
        let dlq_url = clients
            .sqs
            .create_queue()
            .queue_name(format!("{}-dlq", manifest.function_name))
            .send()
            .await
            .map_err(|e| ProviderError::ProvisioningError(format!("sqs:CreateQueue (dlq): {e}")))?
            .queue_url()
            .ok_or_else(|| ProviderError::ProvisioningError("DLQ creation returned no URL".into()))?
            .to_string();
        manifest.dead_letter_queue_url = Some(dlq_url.clone());

        dlq_arn = Some(queue_arn(&clients.sqs, &dlq_url).await?);
        dlq_drain_handle = Some(dlq::spawn_dlq_drain(clients.sqs.clone(), dlq_url));
    }

    // ── function (role propagation delay means CreateFunction itself may
    // need retrying, not just a later readiness check) ───────────────────
    let role_arn = get_role_arn(&clients.iam, &manifest.role_name).await?;
    let archive = packager
        .pack(function_module)
        .map_err(|e| ProviderError::ProvisioningError(format!("packaging failed: {e}")))?;

    let function_arn = poll_until_success("lambda:CreateFunction", || {
        create_function_request(clients, manifest, options, &role_arn, &archive.archive, dlq_arn.as_deref())
    })
    .await?;
    let _ = function_arn; // recorded implicitly via manifest.function_name; ARN not persisted

    if options.use_queue {
        provision_queue_mode(clients, manifest, options, dlq_arn.as_deref().expect("dlq created above")).await?;
    }

    await_function_active(&clients.lambda, &manifest.function_name).await?;

    if options.use_queue {
        grant_sns_invoke_permission(
            &clients.lambda,
            &manifest.function_name,
            manifest.request_topic_arn.as_deref().expect("topic created above"),
        )
        .await?;
        subscribe_function_to_topic(clients, manifest).await?;
    }

    Ok(dlq_drain_handle)
}

async fn create_function_request(
    clients: &Clients,
    manifest: &ResourcesManifest,
    options: &AwsOptions,
    role_arn: &str,
    archive: &[u8],
    dlq_arn: Option<&str>,
) -> Result<String, aws_sdk_lambda::error::SdkError<aws_sdk_lambda::operation::create_function::CreateFunctionError>>
{
    let mut request = clients
        .lambda
        .create_function()
        .function_name(&manifest.function_name)
        .runtime(Runtime::ProvidedAl2023)
        .role(role_arn)
        .handler("bootstrap")
        .timeout(options.timeout_secs as i32)
        .memory_size(options.memory_size_mb as i32)
        .code(
            FunctionCode::builder()
                .zip_file(Blob::new(archive.to_vec()))
                .build(),
        );

    if let Some(dlq_arn) = dlq_arn {
        request = request.dead_letter_config(
            DeadLetterConfig::builder().target_arn(dlq_arn).build(),
        );
    }

    if let Some(environment) = environment_from(&options.provider_specific) {
        request = request.environment(environment);
    }
    for (key, value) in tags_from(&options.provider_specific) {
        request = request.tags(key, value);
    }

    let resp = request.send().await?;
    Ok(resp.function_arn().unwrap_or_default().to_string())
}

/// Pull `{"environment": {"VAR": "value", ...}}` out of the passthrough bag,
/// the one structured override this planner understands without having to
/// model the rest of the CreateFunction request shape.
fn environment_from(provider_specific: &serde_json::Value) -> Option<aws_sdk_lambda::types::Environment> {
    let vars = provider_specific.get("environment")?.as_object()?;
    let variables = vars
        .iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect();
    Some(
        aws_sdk_lambda::types::Environment::builder()
            .set_variables(Some(variables))
            .build(),
    )
}

/// Pull `{"tags": {"Key": "Value", ...}}` out of the passthrough bag.
fn tags_from(provider_specific: &serde_json::Value) -> Vec<(String, String)> {
    provider_specific
        .get("tags")
        .and_then(|v| v.as_object())
        .map(|tags| {
            tags.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

async fn provision_queue_mode(
    clients: &Clients,
    manifest: &mut ResourcesManifest,
    options: &AwsOptions,
    dlq_arn: &str,
) -> Result<(), ProviderError> {
    // ── SNS feedback role (always cached — shared across instances) ──────
    iam::ensure_role(&clients.iam, FEEDBACK_ROLE_NAME, SNS_TRUST_SERVICE, None).await?;
    manifest.feedback_role_name = Some(FEEDBACK_ROLE_NAME.to_string());
    let feedback_role_arn = get_role_arn(&clients.iam, FEEDBACK_ROLE_NAME).await?;

    // ── request topic ─────────────────────────────────────────────────────
    let topic_arn = clients
        .sns
        .create_topic()
        .name(&manifest.function_name)
        .send()
        .await
        .map_err(|e| ProviderError::ProvisioningError(format!("sns:CreateTopic: {e}")))?
        .topic_arn()
        .ok_or_else(|| ProviderError::ProvisioningError("CreateTopic returned no ARN".into()))?
        .to_string();
    manifest.request_topic_arn = Some(topic_arn.clone());

    // Wiring a just-created role ARN onto a just-created topic is eventually
    // consistent — retry until SNS accepts it.
    poll_until_success("sns:SetTopicAttributes(FailureFeedbackRoleArn)", || {
        clients
            .sns
            .set_topic_attributes()
            .topic_arn(&topic_arn)
            .attribute_name("LambdaFailureFeedbackRoleArn")
            .attribute_value(&feedback_role_arn)
            .send()
    })
    .await?;

    // ── response queue, redrive policy pointing at the DLQ ────────────────
    let response_attrs = collector::response_queue_attributes(
        options.timeout_secs,
        dlq_arn,
        DLQ_MAX_RECEIVE_COUNT,
    );
    let response_url = clients
        .sqs
        .create_queue()
        .queue_name(format!("{}-response", manifest.function_name))
        .set_attributes(Some(response_attrs))
        .send()
        .await
        .map_err(|e| ProviderError::ProvisioningError(format!("sqs:CreateQueue (response): {e}")))?
        .queue_url()
        .ok_or_else(|| ProviderError::ProvisioningError("response queue creation returned no URL".into()))?
        .to_string();
    manifest.response_queue_url = Some(response_url);

    Ok(())
}

async fn grant_sns_invoke_permission(
    lambda: &aws_sdk_lambda::Client,
    function_name: &str,
    topic_arn: &str,
) -> Result<(), ProviderError> {
    lambda
        .add_permission()
        .function_name(function_name)
        .statement_id("cloudify-sns-invoke")
        .action("lambda:InvokeFunction")
        .principal("sns.amazonaws.com")
        .source_arn(topic_arn)
        .send()
        .await
        .map_err(|e| ProviderError::ProvisioningError(format!("lambda:AddPermission: {e}")))?;
    Ok(())
}

async fn subscribe_function_to_topic(
    clients: &Clients,
    manifest: &mut ResourcesManifest,
) -> Result<(), ProviderError> {
    let function_arn = clients
        .lambda
        .get_function()
        .function_name(&manifest.function_name)
        .send()
        .await
        .map_err(|e| ProviderError::ProvisioningError(format!("lambda:GetFunction: {e}")))?
        .configuration()
        .and_then(|c| c.function_arn())
        .ok_or_else(|| ProviderError::ProvisioningError("function has no ARN".into()))?
        .to_string();

    let subscription_arn = clients
        .sns
        .subscribe()
        .topic_arn(manifest.request_topic_arn.as_ref().unwrap())
        .protocol("lambda")
        .endpoint(&function_arn)
        .send()
        .await
        .map_err(|e| ProviderError::ProvisioningError(format!("sns:Subscribe: {e}")))?
        .subscription_arn()
        .unwrap_or_default()
        .to_string();
    manifest.subscription_arn = Some(subscription_arn);
    Ok(())
}

async fn get_role_arn(iam: &aws_sdk_iam::Client, role_name: &str) -> Result<String, ProviderError> {
    iam.get_role()
        .role_name(role_name)
        .send()
        .await
        .ok()
        .and_then(|resp| resp.role().map(|r| r.arn().to_string()))
        .ok_or_else(|| ProviderError::ProvisioningError(format!("role {role_name} not found after creation")))
}

async fn queue_arn(sqs: &aws_sdk_sqs::Client, queue_url: &str) -> Result<String, ProviderError> {
    use aws_sdk_sqs::types::QueueAttributeName;
    sqs.get_queue_attributes()
        .queue_url(queue_url)
        .attribute_names(QueueAttributeName::QueueArn)
        .send()
        .await
        .map_err(|e| ProviderError::ProvisioningError(format!("sqs:GetQueueAttributes: {e}")))?
        .attributes()
        .and_then(|attrs| attrs.get(&QueueAttributeName::QueueArn))
        .cloned()
        .ok_or_else(|| ProviderError::ProvisioningError("queue has no ARN".into()))
}

async fn await_function_active(
    lambda: &aws_sdk_lambda::Client,
    function_name: &str,
) -> Result<(), ProviderError> {
    poll_until_success("lambda function becoming Active", || async {
        let resp = lambda
            .get_function()
            .function_name(function_name)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        match resp.configuration().and_then(|c| c.state()) {
            Some(LambdaState::Active) => Ok(()),
            other => Err(format!("function not yet active (state: {other:?})")),
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_nonce_is_reasonably_unique() {
        let a = fresh_nonce();
        let b = fresh_nonce();
        assert_ne!(a, b);
        assert_eq!(a.len(), 10);
    }

    #[test]
    fn environment_from_reads_the_passthrough_bag() {
        let value = serde_json::json!({"environment": {"LOG_LEVEL": "debug"}});
        let env = environment_from(&value).unwrap();
        assert_eq!(
            env.variables().unwrap().get("LOG_LEVEL").map(String::as_str),
            Some("debug")
        );
    }

    #[test]
    fn environment_from_is_none_when_absent() {
        assert!(environment_from(&serde_json::Value::Null).is_none());
    }

    #[test]
    fn tags_from_reads_the_passthrough_bag() {
        let value = serde_json::json!({"tags": {"Owner": "cloudify"}});
        let tags = tags_from(&value);
        assert_eq!(tags, vec![("Owner".to_string(), "cloudify".to_string())]);
    }
}
