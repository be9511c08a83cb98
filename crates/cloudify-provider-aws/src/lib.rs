//! cloudify-provider-aws
//!
//! AWS Lambda backend for the `cloudify_core::Provider` contract: packages
//! and provisions a Lambda function (plus, in queue mode, the SNS/SQS
//! plumbing around it), dispatches calls either synchronously or through
//! that plumbing, and tears everything back down.

mod collector;
mod dispatch;
mod dlq;
mod error;
mod iam;
mod manifest;
mod options;
mod poll;
mod provision;
mod state;
mod teardown;

pub use error::ProviderError;
pub use manifest::{ResourcesManifest, RolePolicy};
pub use options::AwsOptions;
pub use state::AwsState;

use std::path::Path;

use async_trait::async_trait;
use cloudify_core::{InvokeResult, Packager, Provider};

/// The AWS Lambda provider. Holds only the SDK config needed to construct
/// clients in `initialize`/`cleanup_resources` — everything else lives in
/// the `AwsState` each call threads through.
pub struct AwsProvider {
    config: aws_config::SdkConfig,
    packager: Box<dyn Packager>,
}

impl AwsProvider {
    pub fn new(config: aws_config::SdkConfig, packager: Box<dyn Packager>) -> Self {
        Self { config, packager }
    }
}

#[async_trait]
impl Provider for AwsProvider {
    type State = AwsState;
    type Options = AwsOptions;
    type Err = ProviderError;

    async fn initialize(
        &self,
        function_module: &Path,
        options: Self::Options,
    ) -> Result<Self::State, Self::Err> {
        provision::initialize(&self.config, function_module, self.packager.as_ref(), options).await
    }

    async fn invoke(
        &self,
        state: &Self::State,
        function_name: &str,
        args: serde_json::Value,
    ) -> Result<InvokeResult, Self::Err> {
        dispatch::invoke(state, function_name, args).await
    }

    async fn cleanup(&self, state: Self::State) -> Result<(), Self::Err> {
        teardown::cleanup(state).await;
        Ok(())
    }

    fn get_resource_list(&self, state: &Self::State) -> String {
        state.manifest.to_json()
    }

    async fn cleanup_resources(&self, manifest_json: &str) -> Result<(), Self::Err> {
        let manifest = ResourcesManifest::from_json(manifest_json)?;
        let clients = state::Clients::new(&self.config);
        teardown::teardown_resources(&clients, &manifest).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_display_never_panics() {
        let err = ProviderError::NameCollision("cloudify-abc".into());
        assert!(err.to_string().contains("cloudify-abc"));
    }
}
