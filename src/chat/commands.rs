//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the chat session without sending messages
//! to the API.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the API.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Clear the conversation history.
    Clear,

    /// List the model catalog.
    Models,

    /// Change the model.
    Model(String),

    /// Set the maximum tokens per response.
    MaxTokens(u32),

    /// List past conversations, newest first.
    History,

    /// Load a past conversation by identifier.
    Load(i64),

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Display session statistics (turn count, current model, etc.).
    Stats,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use parley::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/model gemma2-9b-it").is_some());
/// assert!(parse_command("Hello there!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "clear" => ChatCommand::Clear,
        "models" => ChatCommand::Models,
        "model" => match argument {
            Some(model) => ChatCommand::Model(model.to_string()),
            None => ChatCommand::Invalid("/model requires a model id (see /models)".to_string()),
        },
        "tokens" | "max_tokens" => match argument {
            Some(arg) => match arg.parse::<u32>() {
                Ok(value) => ChatCommand::MaxTokens(value),
                Err(_) => ChatCommand::Invalid("/tokens expects a positive integer".to_string()),
            },
            None => ChatCommand::Invalid("/tokens requires a value".to_string()),
        },
        "history" | "chats" => ChatCommand::History,
        "load" => match argument {
            Some(arg) => match arg.parse::<i64>() {
                Ok(id) => ChatCommand::Load(id),
                Err(_) => ChatCommand::Invalid("/load expects a chat id (see /history)".to_string()),
            },
            None => ChatCommand::Invalid("/load requires a chat id".to_string()),
        },
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "stats" | "status" => ChatCommand::Stats,
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /models                List available models
  /model <id>            Change the model (clears the conversation)
  /tokens <n>            Set maximum response tokens (512 up to the model's capacity)
  /history               List past chats, newest first
  /load <id>             Continue a past chat
  /clear                 Clear conversation history
  /stats                 Show session statistics
  /help                  Show this help message
  /quit                  Exit the chat"#
}
