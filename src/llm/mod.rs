//! Language model backends
//!
//! This module provides:
//! - A trait for chat completion backends
//! - An OpenAI-compatible HTTP backend
//! - The (model, budget) attempt ladder shared by every stage that calls a
//!   model

mod http_backend;
mod ladder;

pub use http_backend::*;
pub use ladder::*;

use async_trait::async_trait;
use serde::Serialize;

/// One chat completion request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Why a completion attempt produced nothing usable
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompletionFailure {
    /// Backend has no instance to serve this model right now
    #[error("no capacity: {0}")]
    NoCapacity(String),

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("empty completion")]
    Empty,
}

/// Trait for chat completion providers
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Run one completion and return its non-empty text
    async fn complete(&self, request: &ChatRequest) -> Result<String, CompletionFailure>;
}
