//! URL and body builders used by the request workflow before calling the transport.

pub mod body;
pub mod query;

pub use body::{build_body, upload_form, UploadValue};
pub use query::{build_url, serialize_query};
