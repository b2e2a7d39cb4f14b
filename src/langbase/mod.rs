//! Langbase Pipes HTTP client and wire types.

mod client;
mod types;

pub use client::{LangbaseClient, PipeDefinition};
pub use types::{
    CreatePipeRequest, CreatePipeResponse, Message, MessageRole, PipeRequest, PipeResponse,
    PipeStatus, RawResponse, Usage,
};
