//! Aldea Core Library
//!
//! This crate holds the pure dialogue domain for the Aldea phone-interview
//! agent: the call session model, the session-store contract, the input
//! parsers, the finite-state dialogue controller, and the text-generation
//! collaborator contract. It performs no telephony or audio I/O of its own;
//! the `aldea-api` service wires it to the outside world.

pub mod dialogue;
pub mod llm;
pub mod parse;
pub mod session;
pub mod store;
