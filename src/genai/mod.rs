//! Typed wrapper over the generative-text provider.

mod client;
mod types;

pub use client::{ChatClient, ChatTransport, HttpChatTransport};
pub use types::{
    ChatCompletionResponse, ChatChoice, ChatChoiceMessage, ChatMessage, ChatOutcome, ChatParams,
    ChatRequest, ResponseFormat, TokenUsage,
};
