//! The Anthropic-to-OpenAI translation gateway: one inbound surface (`POST /v1/messages`,
//! shaped exactly like the Anthropic Messages API) routed to one of three downstream adapters
//! per request, per a hot-reloadable set of provider and override rules.
//!
//! - [`filters`] strips restricted tools and system-prompt clauses before anything else sees
//!   the request.
//! - [`routing`] decides which provider and adapter handle the (filtered) request, and what
//!   config patch — if any — applies.
//! - [`adapter`] translates between the Anthropic wire shape and the two OpenAI ones
//!   (Responses, Chat Completions), non-streaming and streaming alike.
//! - [`client_cache`] memoizes the `reqwest::Client` built per distinct provider/model pair.
//! - [`dispatch`] wires all of the above into the axum [`Router`](axum::Router) this crate
//!   exposes via [`router`].

pub mod adapter;
pub mod client_cache;
mod dispatch;
pub mod error;
pub mod filters;
mod headers;
pub mod protocol;
pub mod reasoning;
pub mod routing;

mod http_client;

pub use dispatch::router;
pub use error::LlmError;
