//! Client and request objects.
//!
//! Keep the public surface small and predictable: [`Client`] shapes requests
//! from shared defaults, [`Request`] is the in-flight request itself.
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod core;
pub(crate) mod error_classification;
mod execution;
pub mod init;
pub mod request;
pub mod signals;

pub use builder::{ClientBuilder, ClientOptions};
pub use self::core::Client;
pub use init::RequestInit;
pub use request::Request;
pub use signals::InflightSnapshot;
