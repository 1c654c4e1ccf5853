//! Media-Stream WebSocket
//!
//! `transport` speaks Twilio's media-stream wire protocol; `pipeline` is the
//! transport-agnostic audio orchestrator that sits between the telephone leg
//! and the dialogue controller.

pub mod pipeline;
pub mod transport;

pub use transport::media_stream_handler;
