//! Ordered form container used for multipart / url-encoded bodies in both directions.

use crate::{Error, ErrorContext, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// A file-like form value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FilePart {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            filename: None,
            content_type: None,
            data: data.into(),
        }
    }

    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        self.filename = Some(name.into());
        self
    }

    pub fn with_content_type(mut self, ct: impl Into<String>) -> Self {
        self.content_type = Some(ct.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File(FilePart),
}

impl FormValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormValue::Text(s) => Some(s),
            FormValue::File(_) => None,
        }
    }
}

/// Ordered multimap of form fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    entries: Vec<(String, FormValue)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries
            .push((name.into(), FormValue::Text(value.into())));
    }

    pub fn append_file(&mut self, name: impl Into<String>, file: FilePart) {
        self.entries.push((name.into(), FormValue::File(file)));
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(name, value);
        self
    }

    pub fn file(mut self, name: impl Into<String>, file: FilePart) -> Self {
        self.append_file(name, file);
        self
    }

    /// First value under `name`.
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FormValue> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode text fields as `application/x-www-form-urlencoded`. File parts are skipped.
    pub fn to_urlencoded(&self) -> String {
        let mut ser = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.entries {
            if let FormValue::Text(s) = v {
                ser.append_pair(k, s);
            }
        }
        ser.finish()
    }

    pub fn from_urlencoded(input: &[u8]) -> Self {
        let mut form = FormData::new();
        for (k, v) in url::form_urlencoded::parse(input) {
            form.append(k.into_owned(), v.into_owned());
        }
        form
    }

    /// Encode as `multipart/form-data` using `boundary`.
    pub fn encode_multipart(&self, boundary: &str) -> Bytes {
        let mut buf = BytesMut::new();
        for (name, value) in &self.entries {
            buf.put_slice(format!("--{}\r\n", boundary).as_bytes());
            match value {
                FormValue::Text(s) => {
                    buf.put_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    buf.put_slice(s.as_bytes());
                }
                FormValue::File(f) => {
                    let filename = f.filename.as_deref().unwrap_or("blob");
                    buf.put_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                            name, filename
                        )
                        .as_bytes(),
                    );
                    let ct = f
                        .content_type
                        .as_deref()
                        .unwrap_or("application/octet-stream");
                    buf.put_slice(format!("Content-Type: {}\r\n\r\n", ct).as_bytes());
                    buf.put_slice(&f.data);
                }
            }
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(format!("--{}--\r\n", boundary).as_bytes());
        buf.freeze()
    }

    /// Parse a `multipart/form-data` body.
    pub fn parse_multipart(body: &[u8], boundary: &str) -> Result<Self> {
        let delimiter = format!("--{}", boundary);
        let delimiter = delimiter.as_bytes();
        let mut form = FormData::new();

        let mut rest = match find(body, delimiter) {
            Some(idx) => &body[idx + delimiter.len()..],
            None => return Err(multipart_error("opening boundary not found")),
        };

        loop {
            if rest.starts_with(b"--") {
                return Ok(form);
            }
            rest = rest.strip_prefix(b"\r\n").unwrap_or(rest);
            let end = find(rest, delimiter).ok_or_else(|| multipart_error("unterminated part"))?;
            let part = &rest[..end];
            let part = part.strip_suffix(b"\r\n").unwrap_or(part);
            let header_end =
                find(part, b"\r\n\r\n").ok_or_else(|| multipart_error("part without headers"))?;
            let headers = String::from_utf8_lossy(&part[..header_end]);
            let data = Bytes::copy_from_slice(&part[header_end + 4..]);

            let mut name = None;
            let mut filename = None;
            let mut content_type = None;
            for line in headers.split("\r\n") {
                let Some((key, value)) = line.split_once(':') else {
                    continue;
                };
                if key.trim().eq_ignore_ascii_case("content-disposition") {
                    name = disposition_param(value, "name");
                    filename = disposition_param(value, "filename");
                } else if key.trim().eq_ignore_ascii_case("content-type") {
                    content_type = Some(value.trim().to_string());
                }
            }

            let name = name.ok_or_else(|| multipart_error("part without a name"))?;
            if filename.is_some() || content_type.is_some() {
                form.append_file(
                    name,
                    FilePart {
                        filename,
                        content_type,
                        data,
                    },
                );
            } else {
                form.append(name, String::from_utf8_lossy(&data).into_owned());
            }
            rest = &rest[end + delimiter.len()..];
        }
    }
}

fn multipart_error(details: &str) -> Error {
    Error::decode_with_context(
        "malformed multipart body",
        ErrorContext::new()
            .with_details(details)
            .with_source("form_data"),
    )
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn disposition_param(value: &str, param: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|p| {
        let (k, v) = p.split_once('=')?;
        (k.trim() == param).then(|| v.trim().trim_matches('"').to_string())
    })
}

/// Extract the `boundary` parameter from a multipart content type.
pub(crate) fn boundary_of(content_type: &str) -> Option<String> {
    content_type.split(';').map(str::trim).find_map(|p| {
        let (k, v) = p.split_once('=')?;
        k.trim()
            .eq_ignore_ascii_case("boundary")
            .then(|| v.trim().trim_matches('"').to_string())
    })
}
