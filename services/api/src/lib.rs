//! Aldea API Service Library
//!
//! The outward-facing service for the Aldea phone-interview agent: REST
//! endpoints to launch calls, Twilio webhook handlers, and the media-stream
//! WebSocket that carries call audio. The dialogue logic itself lives in
//! `aldea-core`; this crate wires it to Twilio, Deepgram, and Cartesia.

pub mod audio;
pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod store;
pub mod stt;
pub mod telephony;
pub mod tts;
pub mod ws;
