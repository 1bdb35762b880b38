//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::path::PathBuf;

use arrrg_derive::CommandLine;

use crate::types::{DEFAULT_MODEL, ModelDescriptor};
use crate::{Error, Result};

/// User identifier conversations are stored under by default.
pub const DEFAULT_USER_ID: &str = "user_123";

/// Database file used by default.
pub const DEFAULT_DB_PATH: &str = "chat_history.db";

/// Command-line arguments for the parley-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: llama3-8b-8192)", "MODEL")]
    pub model: Option<String>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Max tokens per response (default: min(32768, model capacity))", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// User identifier that scopes stored conversations.
    #[arrrg(optional, "User id for stored chats (default: user_123)", "USER")]
    pub user: Option<String>,

    /// Path of the conversation database.
    #[arrrg(optional, "Chat history database (default: chat_history.db)", "PATH")]
    pub db: Option<String>,

    /// Completion API base URL.
    #[arrrg(optional, "API base URL (default: https://api.groq.com/openai/v1/)", "URL")]
    pub base_url: Option<String>,

    /// Request whole responses instead of streams.
    #[arrrg(flag, "Wait for whole responses instead of streaming")]
    pub no_stream: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// The model to use for generating responses.
    pub model: &'static ModelDescriptor,

    /// Maximum tokens per response; `None` uses the model's default.
    pub max_tokens: Option<u32>,

    /// User identifier for stored conversations.
    pub user_id: String,

    /// Conversation database location.
    pub db_path: PathBuf,

    /// Completion API base URL; `None` uses the client default.
    pub base_url: Option<String>,

    /// Whether to request streamed responses.
    pub stream: bool,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: llama3-8b-8192
    /// - Max tokens: the model's default
    /// - User: user_123
    /// - Database: chat_history.db
    /// - Streaming and color: enabled
    pub fn new() -> Self {
        Self {
            model: ModelDescriptor::default_model(),
            max_tokens: None,
            user_id: DEFAULT_USER_ID.to_string(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            base_url: None,
            stream: true,
            use_color: true,
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: &'static ModelDescriptor) -> Self {
        self.model = model;
        self
    }

    /// Sets the maximum tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the user identifier.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Sets the database path.
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Sets the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Requests whole responses instead of streams.
    pub fn without_streaming(mut self) -> Self {
        self.stream = false;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// The token budget the session starts with, clamped to the model's range.
    pub fn effective_max_tokens(&self) -> u32 {
        match self.max_tokens {
            Some(requested) => self.model.clamp_max_tokens(requested),
            None => self.model.default_max_tokens(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = Error;

    fn try_from(args: ChatArgs) -> Result<Self> {
        let model = match args.model.as_deref() {
            Some(id) => ModelDescriptor::lookup(id)?,
            None => ModelDescriptor::lookup(DEFAULT_MODEL)?,
        };
        let defaults = ChatConfig::new();
        Ok(ChatConfig {
            model,
            max_tokens: args.max_tokens,
            user_id: args.user.unwrap_or(defaults.user_id),
            db_path: args.db.map(PathBuf::from).unwrap_or(defaults.db_path),
            base_url: args.base_url,
            stream: !args.no_stream,
            use_color: !args.no_color,
        })
    }
}
