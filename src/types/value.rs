//! Materialized response values threaded through `after_response` hooks.

use crate::types::form::FormData;
use crate::{Error, ErrorContext, Result};
use bytes::Bytes;
use serde_json::Value;
use std::fmt;

/// Decode target chosen by a materializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseType {
    Json,
    Text,
    Blob,
    ArrayBuffer,
    FormData,
    Bytes,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Json => "json",
            ResponseType::Text => "text",
            ResponseType::Blob => "blob",
            ResponseType::ArrayBuffer => "arrayBuffer",
            ResponseType::FormData => "formData",
            ResponseType::Bytes => "bytes",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw body plus its declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Bytes,
    pub content_type: Option<String>,
}

impl Blob {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The `result` slot of an after-response context.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseValue {
    Json(Value),
    Text(String),
    Blob(Blob),
    ArrayBuffer(Bytes),
    FormData(FormData),
    Bytes(Vec<u8>),
}

impl ResponseValue {
    pub fn response_type(&self) -> ResponseType {
        match self {
            ResponseValue::Json(_) => ResponseType::Json,
            ResponseValue::Text(_) => ResponseType::Text,
            ResponseValue::Blob(_) => ResponseType::Blob,
            ResponseValue::ArrayBuffer(_) => ResponseType::ArrayBuffer,
            ResponseValue::FormData(_) => ResponseType::FormData,
            ResponseValue::Bytes(_) => ResponseType::Bytes,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseValue::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_json_mut(&mut self) -> Option<&mut Value> {
        match self {
            ResponseValue::Json(v) => Some(v),
            _ => None,
        }
    }
}

/// Extraction of a materializer's output from the final `result` slot.
///
/// Plugins may replace `result` with a different variant; conversions that make
/// sense are applied, anything else is a decode failure.
pub trait FromResponseValue: Sized {
    fn from_response_value(value: ResponseValue) -> Result<Self>;
}

fn mismatch(expected: &str, got: &ResponseValue) -> Error {
    Error::decode_with_context(
        format!(
            "after_response result is {}, expected {}",
            got.response_type(),
            expected
        ),
        ErrorContext::new().with_field_path("context.result"),
    )
}

impl FromResponseValue for Value {
    fn from_response_value(value: ResponseValue) -> Result<Self> {
        match value {
            ResponseValue::Json(v) => Ok(v),
            ResponseValue::Text(s) => Ok(Value::String(s)),
            other => Err(mismatch("json", &other)),
        }
    }
}

impl FromResponseValue for String {
    fn from_response_value(value: ResponseValue) -> Result<Self> {
        match value {
            ResponseValue::Text(s) => Ok(s),
            ResponseValue::Json(Value::String(s)) => Ok(s),
            ResponseValue::Json(v) => Ok(v.to_string()),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl FromResponseValue for Blob {
    fn from_response_value(value: ResponseValue) -> Result<Self> {
        match value {
            ResponseValue::Blob(b) => Ok(b),
            ResponseValue::ArrayBuffer(data) => Ok(Blob {
                data,
                content_type: None,
            }),
            ResponseValue::Bytes(v) => Ok(Blob {
                data: Bytes::from(v),
                content_type: None,
            }),
            other => Err(mismatch("blob", &other)),
        }
    }
}

impl FromResponseValue for Bytes {
    fn from_response_value(value: ResponseValue) -> Result<Self> {
        match value {
            ResponseValue::ArrayBuffer(b) => Ok(b),
            ResponseValue::Blob(b) => Ok(b.data),
            ResponseValue::Bytes(v) => Ok(Bytes::from(v)),
            other => Err(mismatch("arrayBuffer", &other)),
        }
    }
}

impl FromResponseValue for Vec<u8> {
    fn from_response_value(value: ResponseValue) -> Result<Self> {
        match value {
            ResponseValue::Bytes(v) => Ok(v),
            ResponseValue::ArrayBuffer(b) => Ok(b.to_vec()),
            ResponseValue::Blob(b) => Ok(b.data.to_vec()),
            other => Err(mismatch("bytes", &other)),
        }
    }
}

impl FromResponseValue for FormData {
    fn from_response_value(value: ResponseValue) -> Result<Self> {
        match value {
            ResponseValue::FormData(f) => Ok(f),
            other => Err(mismatch("formData", &other)),
        }
    }
}
