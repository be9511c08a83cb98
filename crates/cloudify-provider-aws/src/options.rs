use crate::manifest::RolePolicy;

/// Recognized creation options, plus an open passthrough bag for anything
/// this core doesn't model explicitly. Mirrors the shape of the AWS SDK
/// request builders it eventually feeds — region/role/timeout/memory are
/// named fields, everything else rides along in `provider_specific` and is
/// merged in last (see `provision.rs`).
#[derive(Debug, Clone)]
pub struct AwsOptions {
    pub region: Option<String>,
    pub policy_arn: Option<String>,
    pub role_policy: RolePolicy,
    /// Ignored when `role_policy == Ephemeral` — the role name there is
    /// always derived from the instance nonce.
    pub role_name: Option<String>,
    /// Function execution timeout and queue visibility timeout, in
    /// seconds. Calls that run longer than this will be redelivered by SQS
    /// in queue mode — see the open question recorded in DESIGN.md.
    pub timeout_secs: u32,
    pub memory_size_mb: u32,
    pub use_queue: bool,
    /// Merged into the function-creation request last, after every named
    /// field above has been applied.
    pub provider_specific: serde_json::Value,
}

impl Default for AwsOptions {
    fn default() -> Self {
        Self {
            region: None,
            policy_arn: None,
            role_policy: RolePolicy::Ephemeral,
            role_name: None,
            timeout_secs: 60,
            memory_size_mb: 128,
            use_queue: false,
            provider_specific: serde_json::Value::Null,
        }
    }
}

impl AwsOptions {
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn policy_arn(mut self, arn: impl Into<String>) -> Self {
        self.policy_arn = Some(arn.into());
        self
    }

    pub fn role_policy(mut self, policy: RolePolicy) -> Self {
        self.role_policy = policy;
        self
    }

    pub fn role_name(mut self, name: impl Into<String>) -> Self {
        self.role_name = Some(name.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u32) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn memory_size_mb(mut self, mb: u32) -> Self {
        self.memory_size_mb = mb;
        self
    }

    pub fn use_queue(mut self, use_queue: bool) -> Self {
        self.use_queue = use_queue;
        self
    }

    pub fn provider_specific(mut self, value: serde_json::Value) -> Self {
        self.provider_specific = value;
        self
    }

    /// The role name actually used for execution, accounting for
    /// `role_policy`: ephemeral instances always derive their own name and
    /// ignore any explicit override.
    pub fn effective_role_name(&self, nonce: &str) -> String {
        match self.role_policy {
            RolePolicy::Ephemeral => format!("cloudify-{nonce}-role"),
            RolePolicy::Cached => self
                .role_name
                .clone()
                .unwrap_or_else(|| "cloudify-shared-role".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ephemeral_role_name_is_derived_from_nonce_regardless_of_override() {
        let opts = AwsOptions::default()
            .role_policy(RolePolicy::Ephemeral)
            .role_name("ignored");
        assert_eq!(opts.effective_role_name("abc123"), "cloudify-abc123-role");
    }

    #[test]
    fn cached_role_name_uses_override_when_given() {
        let opts = AwsOptions::default()
            .role_policy(RolePolicy::Cached)
            .role_name("my-shared-role");
        assert_eq!(opts.effective_role_name("abc123"), "my-shared-role");
    }

    #[test]
    fn cached_role_name_falls_back_to_default_when_unset() {
        let opts = AwsOptions::default().role_policy(RolePolicy::Cached);
        assert_eq!(opts.effective_role_name("abc123"), "cloudify-shared-role");
    }
}
