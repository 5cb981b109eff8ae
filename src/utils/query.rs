//! URL building: base + path + serialized query.

use crate::types::{ArrayFormat, QueryOptions};
use crate::{Error, ErrorContext, Result};
use serde_json::Value;

/// Join `base_url` and `path`, then append the serialized `params`.
///
/// An absolute `path` (one carrying a scheme) ignores `base_url`. An empty or
/// null params value contributes nothing.
pub fn build_url(
    base_url: &str,
    path: &str,
    params: Option<&Value>,
    opts: &QueryOptions,
) -> Result<String> {
    let mut url = if path.contains("://") || base_url.is_empty() {
        path.to_string()
    } else if path.is_empty() {
        base_url.to_string()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    };

    let query = match params {
        Some(p) => serialize_query(p, opts)?,
        None => String::new(),
    };
    if !query.is_empty() {
        if url.contains('?') {
            if !url.ends_with('?') && !url.ends_with('&') {
                url.push('&');
            }
        } else {
            url.push('?');
        }
        url.push_str(&query);
    }
    Ok(url)
}

/// Serialize a params object into a query string (no leading `?`).
///
/// Nested objects use bracket notation (`a[b]=1`); arrays follow
/// [`QueryOptions::array_format`]. Key order follows the object's declaration order.
pub fn serialize_query(params: &Value, opts: &QueryOptions) -> Result<String> {
    let map = match params {
        Value::Null => return Ok(String::new()),
        Value::Object(m) => m,
        other => {
            return Err(Error::configuration_with_context(
                "query params must be an object",
                ErrorContext::new()
                    .with_field_path("config.params")
                    .with_details(format!("got {}", type_name(other))),
            ))
        }
    };

    let mut pairs = Vec::new();
    for (k, v) in map {
        push_pairs(k.clone(), v, opts, &mut pairs);
    }

    Ok(pairs
        .into_iter()
        .map(|(k, v)| {
            if opts.encode {
                format!("{}={}", encode(&k), encode(&v))
            } else {
                format!("{}={}", k, v)
            }
        })
        .collect::<Vec<_>>()
        .join("&"))
}

fn push_pairs(prefix: String, value: &Value, opts: &QueryOptions, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {
            if !opts.skip_nulls {
                out.push((prefix, String::new()));
            }
        }
        Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            out.push((prefix, scalar(value)));
        }
        Value::Array(items) => match opts.array_format {
            ArrayFormat::Comma if items.iter().all(is_scalar) => {
                let joined = items.iter().map(scalar).collect::<Vec<_>>().join(",");
                out.push((prefix, joined));
            }
            ArrayFormat::Repeat if items.iter().all(is_scalar) => {
                for item in items {
                    push_pairs(prefix.clone(), item, opts, out);
                }
            }
            ArrayFormat::Brackets => {
                for item in items {
                    push_pairs(format!("{}[]", prefix), item, opts, out);
                }
            }
            _ => {
                for (i, item) in items.iter().enumerate() {
                    push_pairs(format!("{}[{}]", prefix, i), item, opts, out);
                }
            }
        },
        Value::Object(map) => {
            for (k, v) in map {
                push_pairs(format!("{}[{}]", prefix, k), v, opts, out);
            }
        }
    }
}

fn is_scalar(v: &Value) -> bool {
    !matches!(v, Value::Array(_) | Value::Object(_))
}

fn scalar(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
