//! Content normalizer infrastructure adapters.
//!
//! Implements the [`pipeline::ContentNormalizer`] trait twice:
//!
//! - [`HttpNormalizer`]: posts text blocks to the isolated normalizer
//!   container (`POST {base_url}/normalize`), which does the heavy lifting
//!   (boilerplate removal, readability extraction) away from the host.
//! - [`LocalNormalizer`]: an in-process fallback that strips markup, decodes
//!   the common HTML entities and collapses whitespace. Used when no container
//!   is configured.
//!
//! Both keep input order and drop blocks that normalize to nothing.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** The [`pipeline`] crate sees only
//! [`pipeline::ContentNormalizer`] and [`pipeline::NormalizerError`].

pub mod config;
pub mod http;
pub mod local;

pub use config::NormalizerConfig;
pub use http::{HttpNormalizer, NormalizerSetupError};
pub use local::LocalNormalizer;
