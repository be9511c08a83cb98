use aws_sdk_iam::Client as IamClient;

use crate::error::ProviderError;

/// Trust-policy principals the two role kinds this provider creates are
/// assumed by.
pub const LAMBDA_TRUST_SERVICE: &str = "lambda.amazonaws.com";
pub const SNS_TRUST_SERVICE: &str = "sns.amazonaws.com";

fn assume_role_policy(service: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": {"Service": service},
            "Action": "sts:AssumeRole",
        }],
    })
    .to_string()
}

/// Look up a role by name. `Ok(None)` covers both "doesn't exist" and any
/// other lookup failure — the two are not distinguished because creation
/// will itself fail loudly if something deeper is wrong, and nothing
/// downstream needs to tell them apart.
async fn find_role(client: &IamClient, role_name: &str) -> Option<String> {
    match client.get_role().role_name(role_name).send().await {
        Ok(resp) => resp.role().map(|r| r.arn().to_string()),
        Err(_) => None,
    }
}

/// Create-or-reuse: return the role's ARN, creating it with the given
/// trust policy and attaching `policy_arn` if it didn't already exist.
///
/// Shared by both the execution-role path (ephemeral or cached) and the
/// SNS feedback-role path (always cached) — they differ only in trust
/// service, name, and the managed policy attached.
pub async fn ensure_role(
    client: &IamClient,
    role_name: &str,
    trust_service: &str,
    policy_arn: Option<&str>,
) -> Result<String, ProviderError> {
    let arn = if let Some(arn) = find_role(client, role_name).await {
        tracing::debug!(role_name, "reusing existing IAM role");
        arn
    } else {
        let resp = client
            .create_role()
            .role_name(role_name)
            .assume_role_policy_document(assume_role_policy(trust_service))
            .send()
            .await
            .map_err(|e| ProviderError::ProvisioningError(format!("iam:CreateRole: {e}")))?;

        let arn = resp
            .role()
            .map(|r| r.arn().to_string())
            .ok_or_else(|| ProviderError::ProvisioningError("CreateRole returned no role".into()))?;
        tracing::info!(role_name, role_arn = %arn, "IAM role created");
        arn
    };

    // AttachRolePolicy is idempotent, so this runs whether the role was
    // just created or already existed — a cached role missing the policy
    // (e.g. from a prior run with different options) still ends up correct.
    if let Some(policy_arn) = policy_arn {
        client
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| ProviderError::ProvisioningError(format!("iam:AttachRolePolicy: {e}")))?;
    }

    Ok(arn)
}

/// Attach an inline policy denying `logs:CreateLogGroup` on this role, so
/// the function cannot silently re-create its own log group without the
/// retention policy the planner set when it created the group itself.
pub async fn deny_create_log_group(
    client: &IamClient,
    role_name: &str,
) -> Result<(), ProviderError> {
    let policy = serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Deny",
            "Action": "logs:CreateLogGroup",
            "Resource": "*",
        }],
    })
    .to_string();

    client
        .put_role_policy()
        .role_name(role_name)
        .policy_name("cloudify-deny-create-log-group")
        .policy_document(policy)
        .send()
        .await
        .map_err(|e| ProviderError::ProvisioningError(format!("iam:PutRolePolicy: {e}")))?;

    Ok(())
}

/// Tear down an ephemeral role: detach every attached managed policy,
/// delete every inline policy, then delete the role. Each step is
/// best-effort — a role already gone, or a policy already detached, is not
/// an error.
pub async fn delete_ephemeral_role(client: &IamClient, role_name: &str) {
    if let Ok(resp) = client
        .list_attached_role_policies()
        .role_name(role_name)
        .send()
        .await
    {
        for policy in resp.attached_policies() {
            if let Some(arn) = policy.policy_arn() {
                let _ = client
                    .detach_role_policy()
                    .role_name(role_name)
                    .policy_arn(arn)
                    .send()
                    .await;
            }
        }
    }

    if let Ok(resp) = client.list_role_policies().role_name(role_name).send().await {
        for policy_name in resp.policy_names() {
            let _ = client
                .delete_role_policy()
                .role_name(role_name)
                .policy_name(policy_name.as_str())
                .send()
                .await;
        }
    }

    match client.delete_role().role_name(role_name).send().await {
        Ok(_) => tracing::info!(role_name, "IAM role deleted"),
        Err(e) => tracing::debug!(role_name, error = %e, "role delete failed, assuming already gone"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assume_role_policy_names_the_right_principal() {
        let policy = assume_role_policy(LAMBDA_TRUST_SERVICE);
        let parsed: serde_json::Value = serde_json::from_str(&policy).unwrap();
        assert_eq!(
            parsed["Statement"][0]["Principal"]["Service"],
            "lambda.amazonaws.com"
        );
        assert_eq!(parsed["Statement"][0]["Action"], "sts:AssumeRole");
    }
}
