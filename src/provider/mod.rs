//! LLM Provider layer
//!
//! The workflow engine talks to models only through the [`ChatClient`] trait.
//! [`ProviderClient`] implements it for any server that speaks the OpenAI chat
//! completions API.

mod client;
mod config;

pub use client::*;
pub use config::*;
