use thiserror::Error;

/// All failure kinds the AWS provider can surface at the façade boundary.
///
/// `Transient` never escapes this crate — individual cleanup/lookup
/// failures are logged and swallowed (see `iam.rs`, `teardown.rs`). It
/// exists only so internal helpers have somewhere to put an error before
/// deciding to swallow it.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provisioning failed: {0}")]
    ProvisioningError(String),

    #[error("provisioning timed out after {attempts} attempts: {context}")]
    ProvisioningTimeout { attempts: u32, context: String },

    #[error("a function named '{0}' already exists")]
    NameCollision(String),

    #[error("remote invocation failed: {0}")]
    RemoteInvocationFailure(String),

    #[error("call cancelled by teardown")]
    Cancelled,

    #[error("malformed resource manifest: {0}")]
    MalformedManifest(String),

    #[error("transient error (swallowed): {0}")]
    Transient(String),
}
