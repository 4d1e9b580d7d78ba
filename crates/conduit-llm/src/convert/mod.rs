//! Conversions at the crate boundaries
//!
//! `host` turns caller-side messages into the internal model once; `openai`
//! maps the internal model onto the wire format.

pub mod host;
pub mod openai;
