//! Web-search infrastructure adapter.
//!
//! Implements the [`pipeline::SourceCollector`] trait against a self-hosted
//! [SearxNG](https://docs.searxng.org/) instance using its JSON search API.
//! SearxNG fans each query out to the configured upstream engines, so this
//! crate only ever talks to one local endpoint.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Query-string construction, paging, result decoding and
//! de-duplication live here. The [`pipeline`] crate sees only
//! [`pipeline::SourceCollector`], [`pipeline::SourceRecord`] and
//! [`pipeline::CollectorError`].

pub mod client;
pub mod config;
pub mod results;

pub use client::{SearchSetupError, SearxngCollector};
pub use config::SearchConfig;
