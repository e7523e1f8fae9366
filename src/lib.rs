//! CYOA — choose-your-own-adventure option generator for chat frontends.
//!
//! A sidecar process that listens for a host's "character message rendered"
//! events, assembles recent conversation context, asks an OpenAI-compatible
//! completions API for a handful of next-action options, and hands them
//! back to the host to render beneath the message.

pub mod api;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod macros;
pub mod options;
pub mod postprocess;
pub mod preset;
pub mod sanitize;
pub mod types;
