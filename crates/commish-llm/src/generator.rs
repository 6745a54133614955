// The `Generator` seam between prompt building and the chat service.
//
// `ChatClient` is the real implementation; tests swap in fakes that return
// canned text or errors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default chat model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Sampling parameters for one chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
}

impl GenerationParams {
    /// Short quotes and closers, returned as JSON.
    pub fn quotes(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.9,
            max_tokens: 900,
            presence_penalty: 0.2,
            frequency_penalty: 0.1,
        }
    }

    /// A whole preview document in markdown.
    pub fn preview(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.95,
            max_tokens: 2200,
            presence_penalty: 0.2,
            frequency_penalty: 0.1,
        }
    }

    /// A single matchup recap.
    pub fn recap(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.8,
            max_tokens: 600,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        if let Some(t) = temperature {
            self.temperature = t;
        }
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        if let Some(n) = max_tokens {
            self.max_tokens = n;
        }
        self
    }
}

/// A complete chat request: fixed instructions, the data payload, sampling.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
    pub params: GenerationParams,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation service not configured (set OPENAI_API_KEY or ANTHROPIC_API_KEY)")]
    NotConfigured,

    #[error("network error: {0}")]
    Transport(String),

    #[error("generation service returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("generation service returned no content")]
    Empty,
}

// ---------------------------------------------------------------------------
// Generator trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Generator: Send + Sync {
    /// Run one request to completion and return the full reply text.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}
