use std::path::Path;

use cloudify_core::{PackageError, PackagedCode, Packager};

/// A packager that ignores `function_module` and always returns a fixed
/// archive. Stands in for the real packager (out of scope — see
/// `cloudify_core::Packager`) so integration tests can exercise
/// provisioning without depending on a real build pipeline.
pub struct FixedArchivePackager {
    pub archive: Vec<u8>,
}

impl Packager for FixedArchivePackager {
    fn pack(&self, _function_module: &Path) -> Result<PackagedCode, PackageError> {
        Ok(PackagedCode {
            archive: self.archive.clone(),
        })
    }
}

pub async fn build_config() -> aws_config::SdkConfig {
    aws_config::defaults(aws_config::BehaviorVersion::latest())
        .load()
        .await
}
