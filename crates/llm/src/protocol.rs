//! Wire-format types for the two sides of the gateway: the inbound Anthropic
//! Messages surface and the two outbound OpenAI shapes (Responses, Chat
//! Completions). Translation between them lives in [`crate::adapter`]; this
//! module only models the JSON each side actually speaks.

pub mod anthropic;
pub mod openai;
pub mod unknown_fields;
