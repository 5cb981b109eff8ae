//! Wire body serialization, branching on the `Content-Type` header.

use crate::types::{FilePart, FormData, Method, QueryOptions, RequestBody};
use crate::utils::query::serialize_query;
use crate::Result;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::Value;

const JSON: &str = "application/json";
const URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART: &str = "multipart/form-data";

/// Serialize `data` for the wire.
///
/// GET/HEAD never carry a body. For other methods:
/// - no content type, or a JSON one: JSON-stringify (and default the header to JSON)
/// - urlencoded: form-encode using the query options
/// - multipart with a [`FormData`]: encode as-is
/// - `text/*`: raw text
/// - anything else: a fresh multipart container from the value's key/value pairs
///
/// Multipart bodies always get a generated boundary written into `Content-Type`.
pub fn build_body(
    data: Option<&RequestBody>,
    method: Method,
    headers: &mut HeaderMap,
    opts: &QueryOptions,
) -> Result<Option<Bytes>> {
    let Some(data) = data else {
        return Ok(None);
    };
    if !method.carries_body() {
        return Ok(None);
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();

    let body = match data {
        RequestBody::Bytes(b) => b.clone(),
        RequestBody::Text(s) => {
            if content_type.is_empty() {
                headers.insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/plain;charset=UTF-8"),
                );
            }
            Bytes::from(s.clone())
        }
        RequestBody::Form(form) => {
            if content_type.starts_with(URLENCODED) {
                Bytes::from(form.to_urlencoded())
            } else {
                encode_multipart(form, headers)
            }
        }
        RequestBody::Json(value) => {
            if content_type.is_empty() || is_json(&content_type) {
                if content_type.is_empty() {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
                }
                Bytes::from(serde_json::to_vec(value)?)
            } else if content_type.starts_with(URLENCODED) {
                match value {
                    Value::String(s) => Bytes::from(s.clone()),
                    other => Bytes::from(serialize_query(other, opts)?),
                }
            } else if content_type.starts_with("text/") {
                match value {
                    Value::String(s) => Bytes::from(s.clone()),
                    other => Bytes::from(other.to_string()),
                }
            } else {
                match value {
                    Value::Object(_) => {
                        let form = upload_form(object_fields(value));
                        encode_multipart(&form, headers)
                    }
                    other => Bytes::from(serde_json::to_vec(other)?),
                }
            }
        }
    };
    Ok(Some(body))
}

fn is_json(content_type: &str) -> bool {
    content_type.starts_with(JSON) || content_type.contains("+json")
}

fn encode_multipart(form: &FormData, headers: &mut HeaderMap) -> Bytes {
    let boundary = format!("----plugfetch{}", uuid::Uuid::new_v4().simple());
    let value = format!("{}; boundary={}", MULTIPART, boundary);
    match HeaderValue::from_str(&value) {
        Ok(v) => {
            headers.insert(CONTENT_TYPE, v);
        }
        Err(e) => tracing::warn!(error = %e, "could not set multipart content type"),
    }
    form.encode_multipart(&boundary)
}

fn object_fields(value: &Value) -> Vec<(String, UploadValue)> {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), UploadValue::Value(v.clone())))
            .collect(),
        _ => Vec::new(),
    }
}

/// A value in an upload bag: files are appended as-is, anything else is stringified.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadValue {
    File(FilePart),
    Value(Value),
}

impl From<FilePart> for UploadValue {
    fn from(f: FilePart) -> Self {
        UploadValue::File(f)
    }
}

impl From<Value> for UploadValue {
    fn from(v: Value) -> Self {
        UploadValue::Value(v)
    }
}

impl From<&str> for UploadValue {
    fn from(s: &str) -> Self {
        UploadValue::Value(Value::String(s.to_string()))
    }
}

impl From<String> for UploadValue {
    fn from(s: String) -> Self {
        UploadValue::Value(Value::String(s))
    }
}

/// Build a multipart container from a key/value bag.
pub fn upload_form<K, V, I>(fields: I) -> FormData
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<UploadValue>,
{
    let mut form = FormData::new();
    for (k, v) in fields {
        match v.into() {
            UploadValue::File(f) => form.append_file(k, f),
            UploadValue::Value(Value::String(s)) => form.append(k, s),
            UploadValue::Value(Value::Null) => form.append(k, ""),
            UploadValue::Value(other) => form.append(k, other.to_string()),
        }
    }
    form
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FormValue;
    use serde_json::json;

    fn headers_with(ct: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_str(ct).unwrap());
        h
    }

    #[test]
    fn get_and_head_never_carry_a_body() {
        let data = RequestBody::Json(json!({"a": 1}));
        let mut h = HeaderMap::new();
        let opts = QueryOptions::default();
        assert!(build_body(Some(&data), Method::Get, &mut h, &opts).unwrap().is_none());
        assert!(build_body(Some(&data), Method::Head, &mut h, &opts).unwrap().is_none());
        assert!(h.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn json_is_the_default() {
        let mut h = HeaderMap::new();
        let body = build_body(
            Some(&RequestBody::Json(json!({"a": 1}))),
            Method::Post,
            &mut h,
            &QueryOptions::default(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(body, Bytes::from(r#"{"a":1}"#));
        assert_eq!(h.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn urlencoded_uses_query_serialization() {
        let mut h = headers_with(URLENCODED);
        let body = build_body(
            Some(&RequestBody::Json(json!({"a": "x y", "b": 2}))),
            Method::Put,
            &mut h,
            &QueryOptions::default(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(body, Bytes::from("a=x+y&b=2"));
    }

    #[test]
    fn multipart_form_gets_a_boundary() {
        let mut h = headers_with(MULTIPART);
        let form = FormData::new().text("k", "v");
        let body = build_body(
            Some(&RequestBody::Form(form.clone())),
            Method::Post,
            &mut h,
            &QueryOptions::default(),
        )
        .unwrap()
        .unwrap();
        let ct = h.get(CONTENT_TYPE).unwrap().to_str().unwrap().to_string();
        let boundary = crate::types::form::boundary_of(&ct).unwrap();
        assert_eq!(FormData::parse_multipart(&body, &boundary).unwrap(), form);
    }

    #[test]
    fn text_content_types_pass_through() {
        let mut h = headers_with("text/csv");
        let body = build_body(
            Some(&RequestBody::Json(json!("a,b"))),
            Method::Post,
            &mut h,
            &QueryOptions::default(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(body, Bytes::from("a,b"));
    }

    #[test]
    fn other_content_types_build_fresh_multipart() {
        let mut h = headers_with("application/octet-stream");
        build_body(
            Some(&RequestBody::Json(json!({"n": 1}))),
            Method::Patch,
            &mut h,
            &QueryOptions::default(),
        )
        .unwrap();
        assert!(h
            .get(CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with(MULTIPART));
    }

    #[test]
    fn upload_stringifies_non_files() {
        let file = FilePart::new(Bytes::from_static(b"abc")).with_filename("a.txt");
        let form = upload_form(vec![
            ("file", UploadValue::from(file.clone())),
            ("count", UploadValue::from(json!(3))),
            ("name", UploadValue::from("x")),
        ]);
        assert_eq!(form.get("file"), Some(&FormValue::File(file)));
        assert_eq!(form.get("count").and_then(FormValue::as_text), Some("3"));
        assert_eq!(form.get("name").and_then(FormValue::as_text), Some("x"));
    }
}
