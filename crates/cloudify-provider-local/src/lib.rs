//! cloudify-provider-local
//!
//! A local, in-process `Provider` implementation. It exists only to fix the
//! shape of the provider interface against a second backend — it does no
//! provisioning, has no network hop, and never errors on teardown. Treat it
//! as a fixture, not a peer of the AWS provider.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use cloudify_core::{InvokeResult, Provider, RemoteError};
use thiserror::Error;

pub type LocalFn = Arc<dyn Fn(serde_json::Value) -> Result<serde_json::Value, RemoteError> + Send + Sync>;

#[derive(Default, Clone)]
pub struct LocalOptions {
    pub functions: HashMap<String, LocalFn>,
}

pub struct LocalState {
    functions: HashMap<String, LocalFn>,
}

#[derive(Debug, Error)]
pub enum LocalError {
    #[error("no such function registered: {0}")]
    NoSuchFunction(String),
}

pub struct LocalProvider;

#[async_trait]
impl Provider for LocalProvider {
    type State = LocalState;
    type Options = LocalOptions;
    type Err = LocalError;

    async fn initialize(
        &self,
        _function_module: &Path,
        options: Self::Options,
    ) -> Result<Self::State, Self::Err> {
        Ok(LocalState {
            functions: options.functions,
        })
    }

    async fn invoke(
        &self,
        state: &Self::State,
        function_name: &str,
        args: serde_json::Value,
    ) -> Result<InvokeResult, Self::Err> {
        let f = state
            .functions
            .get(function_name)
            .ok_or_else(|| LocalError::NoSuchFunction(function_name.to_string()))?;

        let raw_response = serde_json::json!({ "local": true });
        Ok(match f(args) {
            Ok(value) => InvokeResult {
                value: Some(value),
                error: None,
                raw_response,
            },
            Err(error) => InvokeResult {
                value: None,
                error: Some(error),
                raw_response,
            },
        })
    }

    async fn cleanup(&self, _state: Self::State) -> Result<(), Self::Err> {
        Ok(())
    }

    fn get_resource_list(&self, _state: &Self::State) -> String {
        "{}".to_string()
    }

    async fn cleanup_resources(&self, _manifest_json: &str) -> Result<(), Self::Err> {
        Ok(())
    }
}
