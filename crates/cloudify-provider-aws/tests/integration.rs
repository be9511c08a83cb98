//! End-to-end tests against real AWS resources.
//!
//! These call real AWS APIs and require valid credentials in the
//! environment (e.g. `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`) plus a
//! region with Lambda/IAM/SQS/SNS/CloudWatchLogs access.
//!
//! Run with: `cargo test -p cloudify-provider-aws --test integration -- --ignored`
//!
//! The packager here produces an empty archive, which is enough to exercise
//! provisioning and teardown mechanics (S5, S6) but not a working trampoline
//! — scenarios that depend on an actual reply (S1-S4) are out of scope for
//! this crate (the trampoline and packager are external collaborators) and
//! are left as documentation of what a full harness would additionally
//! cover once those pieces exist.

mod support;

use std::path::Path;

use cloudify_core::Provider;
use cloudify_provider_aws::{AwsOptions, AwsProvider, ProviderError};
use support::{build_config, FixedArchivePackager};

async fn provider() -> AwsProvider {
    AwsProvider::new(
        build_config().await,
        Box::new(FixedArchivePackager {
            archive: Vec::new(),
        }),
    )
}

/// S5: a manifest captured via `get_resource_list` tears down the same
/// resources `cleanup` would, with no live state.
#[tokio::test]
#[ignore]
async fn manifest_roundtrip_tears_down_every_created_resource() {
    let provider = provider().await;
    let state = provider
        .initialize(Path::new("unused"), AwsOptions::default())
        .await
        .expect("provisioning should succeed against a real account");

    let manifest_json = provider.get_resource_list(&state);

    // Deliberately drop `state` instead of calling `cleanup` on it, to
    // prove `cleanup_resources` alone is sufficient.
    drop(state);

    provider
        .cleanup_resources(&manifest_json)
        .await
        .expect("cleanup_resources should tear down every resource the manifest names");
}

/// S6: a pre-existing function with the derived name is a name collision,
/// and whatever had been created before the collision was caught is torn
/// back down.
#[tokio::test]
#[ignore]
async fn name_collision_is_rejected_and_leaves_nothing_behind() {
    // The nonce is generated internally, so reliably forcing a collision
    // from outside the crate isn't possible without a hook into the
    // generator. This test documents the scenario; exercising it precisely
    // requires that hook, which is why it stays `#[ignore]`d rather than
    // asserting a specific error here.
    let provider = provider().await;
    let result = provider
        .initialize(Path::new("unused"), AwsOptions::default())
        .await;
    assert!(!matches!(result, Err(ProviderError::NameCollision(_))));
    if let Ok(state) = result {
        provider.cleanup(state).await.unwrap();
    }
}
