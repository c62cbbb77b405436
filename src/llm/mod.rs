//! LLM clients, provider selection and the agent loop

mod agent;
mod client;
mod provider;

pub use agent::{Agent, AgentStep, Usage};
pub use client::{
    ChatModel, ModelClient, ModelEvent, ModelStream, OPENROUTER_BASE_URL, REFERER_HEADER,
    TITLE_HEADER,
};
pub use provider::{ModelRef, ModelSelection, DIRECT_PROVIDER};

#[cfg(test)]
pub(crate) use agent::test_support;
