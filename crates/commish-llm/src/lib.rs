pub mod client;
pub mod event;
pub mod generator;
pub mod prompt;
pub mod quotes;
pub mod seed;

pub use client::{ChatClient, LlmClient, Provider};
pub use event::LlmEvent;
pub use generator::{
    GenerationError, GenerationParams, GenerationRequest, Generator, DEFAULT_MODEL,
};
pub use quotes::{generate_fragments, FragmentOutcome};
