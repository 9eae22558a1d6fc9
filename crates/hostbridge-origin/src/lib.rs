//! Origin allow-list resolution and validation.
//!
//! Decide whether a message origin is trusted before a session binds it as
//! parent or child. The allow-list is fetched once from a well-known endpoint
//! (bounded by a timeout), falls back to a built-in list on any failure, and
//! is complemented by origins the embedding application supplies itself.

pub mod config;
pub mod document;
pub mod error;
pub mod fallback;
pub mod pattern;
pub mod source;
pub mod validator;

pub use config::{ValidatorConfig, DEFAULT_FETCH_TIMEOUT, DEFAULT_ORIGINS_ENDPOINT};
pub use document::parse_allow_list;
pub use error::{OriginError, Result};
pub use fallback::FALLBACK_VALID_ORIGINS;
pub use pattern::{host_of, matches_host_pattern, normalize_additional_origin};
#[cfg(feature = "fetch")]
pub use source::HttpOriginSource;
pub use source::{OriginListSource, StaticOriginSource};
pub use validator::OriginValidator;
