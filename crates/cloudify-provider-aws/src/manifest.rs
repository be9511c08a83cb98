use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// How the execution role's lifetime is tied to the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolePolicy {
    /// Name derived from the instance's nonce; deleted at teardown.
    Ephemeral,
    /// Fixed, well-known name; created on first use, never deleted.
    Cached,
}

/// Every cloud object a single cloudify-provider-aws instance owns.
///
/// This is a *superset* of what currently exists in AWS — teardown walks
/// every field and tolerates any of them naming an already-absent resource.
/// Queue-mode fields are `None` exactly when the instance runs in direct
/// mode and never created them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesManifest {
    pub function_name: String,
    pub role_name: String,
    pub role_policy: RolePolicy,
    pub log_group_name: String,
    pub region: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub request_topic_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response_queue_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dead_letter_queue_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub subscription_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub feedback_role_name: Option<String>,
}

impl ResourcesManifest {
    pub fn to_json(&self) -> String {
        // Infallible: every field is a plain String/Option/enum.
        serde_json::to_string(self).expect("manifest is always serializable")
    }

    pub fn from_json(json: &str) -> Result<Self, ProviderError> {
        let manifest: Self = serde_json::from_str(json)
            .map_err(|e| ProviderError::MalformedManifest(e.to_string()))?;
        if manifest.region.is_empty() {
            return Err(ProviderError::MalformedManifest(
                "manifest is missing `region`".into(),
            ));
        }
        Ok(manifest)
    }

    pub fn queue_mode(&self) -> bool {
        self.request_topic_arn.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResourcesManifest {
        ResourcesManifest {
            function_name: "cloudify-abc123".into(),
            role_name: "cloudify-abc123-role".into(),
            role_policy: RolePolicy::Ephemeral,
            log_group_name: "/aws/lambda/cloudify-abc123".into(),
            region: "us-east-1".into(),
            request_topic_arn: Some("arn:aws:sns:us-east-1:1:cloudify-abc123".into()),
            response_queue_url: Some("https://sqs.us-east-1/1/cloudify-abc123-resp".into()),
            dead_letter_queue_url: Some("https://sqs.us-east-1/1/cloudify-abc123-dlq".into()),
            subscription_arn: Some("arn:aws:sns:us-east-1:1:cloudify-abc123:sub".into()),
            feedback_role_name: Some("cloudify-sns-feedback".into()),
        }
    }

    #[test]
    fn roundtrips_through_json() {
        let manifest = sample();
        let json = manifest.to_json();
        let back = ResourcesManifest::from_json(&json).unwrap();
        assert_eq!(back.function_name, manifest.function_name);
        assert_eq!(back.request_topic_arn, manifest.request_topic_arn);
        assert!(back.queue_mode());
    }

    #[test]
    fn direct_mode_omits_queue_fields_from_json() {
        let mut manifest = sample();
        manifest.request_topic_arn = None;
        manifest.response_queue_url = None;
        manifest.dead_letter_queue_url = None;
        manifest.subscription_arn = None;
        let json = manifest.to_json();
        assert!(!json.contains("request_topic_arn"));
        let back = ResourcesManifest::from_json(&json).unwrap();
        assert!(!back.queue_mode());
    }

    #[test]
    fn missing_region_is_malformed_manifest() {
        let json = r#"{"function_name":"f","role_name":"r","role_policy":"ephemeral","log_group_name":"g","region":""}"#;
        let err = ResourcesManifest::from_json(json).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedManifest(_)));
    }

    #[test]
    fn absent_region_field_is_malformed_manifest() {
        let json = r#"{"function_name":"f"}"#;
        let err = ResourcesManifest::from_json(json).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedManifest(_)));
    }
}
