use std::error::Error;
use std::path::Path;

use async_trait::async_trait;

use crate::wire::InvokeResult;

/// The abstract provider contract every backend binds.
///
/// `State` is opaque to the caller — it is whatever the backend needs to
/// carry between `initialize` and `cleanup` (SDK client handles, the
/// resources manifest, background task handles, ...).
#[async_trait]
pub trait Provider: Send + Sync {
    type State: Send + Sync;
    type Options: Send + Sync;
    type Err: Error + Send + Sync + 'static;

    /// Stand up everything a subsequent `invoke` needs. Must leave no
    /// partial state behind on failure — an implementation that fails
    /// partway through is responsible for tearing down what it already
    /// created before returning `Err`.
    async fn initialize(
        &self,
        function_module: &Path,
        options: Self::Options,
    ) -> Result<Self::State, Self::Err>;

    /// Perform one call. Never returns `Err` for a call-level failure
    /// reported by the remote function — that surfaces through
    /// `InvokeResult::error`. Returns `Err` only for transport-level or
    /// cancellation failures.
    async fn invoke(
        &self,
        state: &Self::State,
        function_name: &str,
        args: serde_json::Value,
    ) -> Result<InvokeResult, Self::Err>;

    /// Stop background loops and reclaim every resource `initialize`
    /// created. Must be idempotent and must tolerate partially-populated
    /// state (some resources never having been created).
    async fn cleanup(&self, state: Self::State) -> Result<(), Self::Err>;

    /// Serialize whatever is needed to later reconstruct and tear down the
    /// resources this instance owns, with no other live state.
    fn get_resource_list(&self, state: &Self::State) -> String;

    /// Reconstruct enough of a backend's state from a serialized resource
    /// list to run `cleanup` against it, without ever having called
    /// `initialize` in this process.
    async fn cleanup_resources(&self, manifest_json: &str) -> Result<(), Self::Err>;
}
