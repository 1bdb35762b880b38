//! Chat application module for interactive conversations.
//!
//! This module provides a streaming REPL chat interface built on top of the
//! completion client and the record store. It supports:
//!
//! - Streaming responses with real-time token display
//! - Persisting every completed exchange for the active user
//! - Slash commands for model selection, token budget and past chats
//!
//! # Architecture
//!
//! The module is organized into several components:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`state`]: The conversation and its allowed transitions
//! - [`session`]: Running exchanges against the API and the store
//! - [`commands`]: Slash command parsing

mod commands;
mod config;
mod session;
mod state;

pub use crate::render::{BufferRenderer, PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, DEFAULT_DB_PATH, DEFAULT_USER_ID};
pub use session::{ChatSession, ExchangeOutcome, SessionStats};
pub use state::SessionState;
