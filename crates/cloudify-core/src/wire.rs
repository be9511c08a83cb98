use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-call correlation identifier. Fresh, 128-bit, random per call —
/// request and reply are matched on this alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wire request sent to the cloud function, either as a synchronous
/// invocation payload (direct mode) or published to the request topic
/// (queue mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub args: serde_json::Value,
    pub call_id: CallId,
    /// Only set in queue mode — tells the trampoline where to publish the
    /// reply. Absent in direct mode, where the reply is the invoke response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_queue_url: Option<String>,
}

/// Wire response produced by the trampoline, either as the synchronous
/// invoke payload or as the body of a response-queue message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FunctionReturn {
    Value { value: serde_json::Value },
    Error { value: RemoteError },
}

/// The shape of a remote function's thrown/returned error, carried verbatim
/// so the caller can reconstruct something resembling the original.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteError {
    pub name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// What `Provider::invoke` hands back to the caller. Never represents a
/// call-level failure as `Err` — that failure lives in `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,
    /// The underlying SDK envelope, serialized, passed through for
    /// observability. Shape is provider-specific.
    pub raw_response: serde_json::Value,
}

impl InvokeResult {
    pub fn from_return(ret: FunctionReturn, raw_response: serde_json::Value) -> Self {
        match ret {
            FunctionReturn::Value { value } => Self {
                value: Some(value),
                error: None,
                raw_response,
            },
            FunctionReturn::Error { value } => Self {
                value: None,
                error: Some(value),
                raw_response,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_id_is_unique_per_call() {
        assert_ne!(CallId::new(), CallId::new());
    }

    #[test]
    fn function_call_roundtrips_through_json() {
        let call = FunctionCall {
            name: "add".into(),
            args: serde_json::json!([1, 2]),
            call_id: CallId::new(),
            response_queue_url: Some("https://sqs.example/queue".into()),
        };
        let json = serde_json::to_string(&call).unwrap();
        let back: FunctionCall = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "add");
        assert_eq!(back.call_id, call.call_id);
    }

    #[test]
    fn function_return_value_decodes_by_tag() {
        let json = r#"{"type":"value","value":5}"#;
        let ret: FunctionReturn = serde_json::from_str(json).unwrap();
        match ret {
            FunctionReturn::Value { value } => assert_eq!(value, serde_json::json!(5)),
            _ => panic!("expected Value variant"),
        }
    }

    #[test]
    fn function_return_error_decodes_by_tag() {
        let json = r#"{"type":"error","value":{"name":"TypeError","message":"x"}}"#;
        let ret: FunctionReturn = serde_json::from_str(json).unwrap();
        match ret {
            FunctionReturn::Error { value } => {
                assert_eq!(value.name, "TypeError");
                assert_eq!(value.message, "x");
                assert!(value.stack.is_none());
            }
            _ => panic!("expected Error variant"),
        }
    }
}
