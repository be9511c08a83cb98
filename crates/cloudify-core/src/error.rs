use thiserror::Error;

/// Errors that can arise purely from this crate's own logic (wire decoding,
/// packaging). Concrete providers define their own richer error enum for
/// provisioning/dispatch failures; this one only covers the provider-agnostic
/// surface.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed function return: {0}")]
    MalformedReturn(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
