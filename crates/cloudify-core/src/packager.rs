use std::path::Path;

use thiserror::Error;

/// Out of scope for the core: the real packager inspects a function module,
/// bundles it with its dependencies, and externalizes the provider SDK
/// (the cloud runtime supplies it). This trait fixes the shape a provider
/// depends on; a minimal in-memory stub satisfies it for tests.
pub trait Packager: Send + Sync {
    fn pack(&self, function_module: &Path) -> Result<PackagedCode, PackageError>;
}

pub struct PackagedCode {
    pub archive: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("failed to package {path}: {reason}")]
    Failed { path: String, reason: String },
}
