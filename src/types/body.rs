use crate::types::form::FormData;
use bytes::Bytes;
use serde_json::Value;

/// Request payload before wire serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// A JSON-able value; serialized according to the `Content-Type` header.
    Json(Value),
    /// An already-built form container.
    Form(FormData),
    Text(String),
    Bytes(Bytes),
}

impl From<Value> for RequestBody {
    fn from(v: Value) -> Self {
        RequestBody::Json(v)
    }
}

impl From<FormData> for RequestBody {
    fn from(f: FormData) -> Self {
        RequestBody::Form(f)
    }
}

impl From<String> for RequestBody {
    fn from(s: String) -> Self {
        RequestBody::Text(s)
    }
}

impl From<&str> for RequestBody {
    fn from(s: &str) -> Self {
        RequestBody::Text(s.to_string())
    }
}

impl From<Bytes> for RequestBody {
    fn from(b: Bytes) -> Self {
        RequestBody::Bytes(b)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(b: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(b))
    }
}
