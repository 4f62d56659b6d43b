//! LLM gateway infrastructure adapter.
//!
//! Implements the [`pipeline::LlmGateway`] trait for any server exposing the
//! OpenAI-compatible `POST /chat/completions` endpoint (llama.cpp server,
//! Ollama, vLLM, LM Studio). Other wire protocols are added as new types in
//! this crate without any changes to the `pipeline` crate.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, request formatting, response parsing,
//! `Retry-After` handling and exponential back-off live here. The
//! [`pipeline`] crate sees only [`pipeline::LlmGateway`] and
//! [`pipeline::GatewayError`].
//!
//! ## Module Organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | [`LlmConfig`] (the `[llm]` configuration section) |
//! | [`client`] | [`OpenAiCompatibleClient`] and its retry loop |
//! | [`wire`] | Request/response bodies and error classification |

pub mod client;
pub mod config;
pub mod wire;

pub use client::{LlmSetupError, OpenAiCompatibleClient};
pub use config::LlmConfig;
