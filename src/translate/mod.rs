//! Translation between the client chat format and the `OpenAI` streaming format.
//!
//! Everything here is pure (no I/O): building the upstream request and turning
//! upstream chunks into client events. The network side lives in `relay`.

pub mod chat_types;
pub mod openai_types;
pub mod request;
pub mod streaming;
