//! Remote dialogue backend clients
//!
//! Two transports carry the same contract: the HTTP endpoints
//! (`/text-chat`, `/voice-chat`) and the realtime WebSocket channel. Both
//! collapse every failure into `DialogueError`; the coordinator never
//! distinguishes between them.

pub mod client;
pub mod messages;
pub mod stream;

pub use client::{Dialogue, DialogueError, DialogueReply, HttpDialogue};
pub use messages::{ChatResponse, ClientEvent, ServerEvent, TextChatRequest};
pub use stream::StreamDialogue;
