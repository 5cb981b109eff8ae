//! Cache key generation.

use crate::types::{FormValue, RequestBody, RequestConfig};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub hash: String,
}

impl CacheKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// SHA-256 over a canonical rendering of (method, url, params, data).
#[derive(Debug, Clone, Default)]
pub struct CacheKeyGenerator {
    include_body: bool,
    salt: Option<String>,
}

impl CacheKeyGenerator {
    pub fn new() -> Self {
        Self {
            include_body: true,
            salt: None,
        }
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    /// Leave the request body out of the key.
    pub fn without_body(mut self) -> Self {
        self.include_body = false;
        self
    }

    pub fn generate(&self, config: &RequestConfig) -> CacheKey {
        let mut parts: BTreeMap<&str, String> = BTreeMap::new();
        parts.insert("method", config.method.as_str().to_string());
        parts.insert("base_url", config.base_url.clone());
        parts.insert("url", config.url.clone());
        if let Some(params) = &config.params {
            parts.insert("params", params.to_string());
        }
        if self.include_body {
            if let Some(data) = &config.data {
                parts.insert("data", body_fingerprint(data));
            }
        }
        if let Some(ref s) = self.salt {
            parts.insert("salt", s.clone());
        }

        let mut hasher = Sha256::new();
        for (k, v) in &parts {
            hasher.update(k.as_bytes());
            hasher.update([0u8]);
            hasher.update(v.as_bytes());
            hasher.update([0u8]);
        }
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        CacheKey::new(hash)
    }
}

fn body_fingerprint(data: &RequestBody) -> String {
    match data {
        RequestBody::Json(v) => format!("json:{}", v),
        RequestBody::Text(s) => format!("text:{}", s),
        RequestBody::Bytes(b) => {
            let digest = Sha256::digest(b);
            format!("bytes:{:x}", digest)
        }
        RequestBody::Form(form) => {
            let mut out = String::from("form:");
            for (name, value) in form.iter() {
                out.push_str(name);
                out.push('=');
                match value {
                    FormValue::Text(t) => out.push_str(t),
                    FormValue::File(f) => {
                        out.push_str(&format!("{:x}", Sha256::digest(&f.data)));
                    }
                }
                out.push('&');
            }
            out
        }
    }
}
