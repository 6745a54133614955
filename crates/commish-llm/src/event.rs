/// Progress events emitted while a chat reply streams in.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmEvent {
    /// A text delta.
    Token { text: String },
    /// The reply finished.
    Complete {
        full_text: String,
        input_tokens: u32,
        output_tokens: u32,
    },
    /// The request failed.
    Error { message: String },
}
