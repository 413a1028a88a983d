mod content;
mod request;
mod response;
mod sse;

pub use content::{AnthropicContentBlock, ImageSource, ToolResultBlock, ToolResultContent};
pub use request::{AnthropicMessage, AnthropicRequest, AnthropicTool, MessageContent, Role, SystemBlock, SystemPrompt, ThinkingConfig};
pub use response::{AnthropicResponse, StopReason, Usage};
pub use sse::{ContentDelta, MessageDeltaPayload, MessageStartEnvelope, StreamEvent};
