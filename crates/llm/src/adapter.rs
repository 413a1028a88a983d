//! C4 (request, Anthropic → OpenAI) and C5/C9 (response, OpenAI → Anthropic) translation.

pub mod from_openai;
pub mod stream;
pub mod to_openai;
