//! Wire format types
//!
//! These types exactly match the JSON shapes of the Chat Completions API as
//! spoken by OpenAI-compatible servers.

pub mod openai;
