//! Output rendering for the chat front-end.
//!
//! The [`Renderer`] trait is everything the chat session needs from a display:
//! role-tagged turns, streamed response text, error annotations, and the list
//! of past conversations. [`PlainTextRenderer`] draws to a terminal and
//! [`BufferRenderer`] records events in memory.

use std::io::{self, Stdout, Write};

use serde_json::Value;

use crate::store::ConversationRecord;
use crate::types::{ModelDescriptor, Role, Turn};

/// ANSI escape code for bold text (used for speaker headers).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for dim text (used for informational lines).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for past chat labels).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Avatar shown next to user turns.
pub const USER_AVATAR: &str = "👨‍💻";

/// Avatar shown next to assistant turns.
pub const ASSISTANT_AVATAR: &str = "🤖";

/// Icon prefixed to error annotations.
pub const ERROR_ICON: &str = "🚨";

/// The avatar for a role.
pub fn avatar(role: Role) -> &'static str {
    match role {
        Role::User => USER_AVATAR,
        Role::Assistant => ASSISTANT_AVATAR,
    }
}

/// The label a past conversation is listed under.
pub fn past_chat_label(record: &ConversationRecord) -> String {
    format!("{} - {}", record.chat_name, record.timestamp)
}

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - In-memory capture for embedding and tests
pub trait Renderer: Send {
    /// Render a complete turn, e.g. the user's prompt or a reloaded history entry.
    fn print_turn(&mut self, turn: &Turn);

    /// Called before the first fragment of an assistant response.
    fn start_response(&mut self);

    /// Print a chunk of response text.
    ///
    /// This is called incrementally as tokens are streamed from the API.
    fn print_text(&mut self, text: &str);

    /// Print a structured, non-text fragment.
    fn print_item(&mut self, item: &Value) {
        self.print_text(&item.to_string());
    }

    /// Called when a response is complete or has failed.
    ///
    /// Used to ensure proper newlines and cleanup after streaming.
    fn finish_response(&mut self);

    /// Print an error annotation.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print one entry of the past conversation list.
    fn print_past_chat(&mut self, record: &ConversationRecord);

    /// Print one entry of the model list.
    fn print_model(&mut self, model: &ModelDescriptor, selected: bool);
}

/// Plain text renderer with optional ANSI styling.
///
/// This renderer outputs text directly to stdout; errors go to stderr.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    line_start: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            line_start: true,
        }
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        print!("{text}");
        self.line_start = text.ends_with('\n');
        self.flush();
    }

    fn ensure_line_start(&mut self) {
        if !self.line_start {
            self.write("\n");
        }
    }

    fn header(&mut self, role: Role) {
        self.ensure_line_start();
        let header = if self.use_color {
            format!("{ANSI_BOLD}{} {role}:{ANSI_RESET}\n", avatar(role))
        } else {
            format!("{} {role}:\n", avatar(role))
        };
        self.write(&header);
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_turn(&mut self, turn: &Turn) {
        self.header(turn.role);
        self.write(&turn.content);
        self.ensure_line_start();
    }

    fn start_response(&mut self) {
        self.header(Role::Assistant);
    }

    fn print_text(&mut self, text: &str) {
        self.write(text);
    }

    fn finish_response(&mut self) {
        self.ensure_line_start();
    }

    fn print_error(&mut self, error: &str) {
        self.ensure_line_start();
        if self.use_color {
            eprintln!("{ANSI_RED}{ERROR_ICON} {error}{ANSI_RESET}");
        } else {
            eprintln!("{ERROR_ICON} {error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        self.ensure_line_start();
        if self.use_color {
            self.write(&format!("{ANSI_DIM}{info}{ANSI_RESET}\n"));
        } else {
            self.write(&format!("{info}\n"));
        }
    }

    fn print_past_chat(&mut self, record: &ConversationRecord) {
        self.ensure_line_start();
        let label = past_chat_label(record);
        if self.use_color {
            self.write(&format!("  [{}] {ANSI_CYAN}{label}{ANSI_RESET}\n", record.id));
        } else {
            self.write(&format!("  [{}] {label}\n", record.id));
        }
    }

    fn print_model(&mut self, model: &ModelDescriptor, selected: bool) {
        self.ensure_line_start();
        let marker = if selected { "*" } else { " " };
        self.write(&format!("  {marker} {model}\n"));
    }
}

/// One event captured by a [`BufferRenderer`].
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    /// A complete turn.
    Turn(Turn),
    /// Start of an assistant response.
    StartResponse,
    /// A streamed text fragment.
    Text(String),
    /// A streamed structured fragment.
    Item(Value),
    /// End of an assistant response.
    FinishResponse,
    /// An error annotation.
    Error(String),
    /// An informational line.
    Info(String),
    /// A past conversation entry, with its label.
    PastChat(i64, String),
    /// A model list entry.
    Model(String, bool),
}

/// Renderer that records every call instead of drawing.
#[derive(Debug, Default, Clone)]
pub struct BufferRenderer {
    events: Vec<RenderEvent>,
}

impl BufferRenderer {
    /// Creates an empty renderer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything rendered so far, in order.
    pub fn events(&self) -> &[RenderEvent] {
        &self.events
    }

    /// The streamed text fragments, in order.
    pub fn fragments(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RenderEvent::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The rendered error annotations, in order.
    pub fn errors(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RenderEvent::Error(error) => Some(error.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Renderer for BufferRenderer {
    fn print_turn(&mut self, turn: &Turn) {
        self.events.push(RenderEvent::Turn(turn.clone()));
    }

    fn start_response(&mut self) {
        self.events.push(RenderEvent::StartResponse);
    }

    fn print_text(&mut self, text: &str) {
        self.events.push(RenderEvent::Text(text.to_string()));
    }

    fn print_item(&mut self, item: &Value) {
        self.events.push(RenderEvent::Item(item.clone()));
    }

    fn finish_response(&mut self) {
        self.events.push(RenderEvent::FinishResponse);
    }

    fn print_error(&mut self, error: &str) {
        self.events.push(RenderEvent::Error(error.to_string()));
    }

    fn print_info(&mut self, info: &str) {
        self.events.push(RenderEvent::Info(info.to_string()));
    }

    fn print_past_chat(&mut self, record: &ConversationRecord) {
        self.events
            .push(RenderEvent::PastChat(record.id, past_chat_label(record)));
    }

    fn print_model(&mut self, model: &ModelDescriptor, selected: bool) {
        self.events
            .push(RenderEvent::Model(model.id.to_string(), selected));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color);
    }

    #[test]
    fn avatars_differ_by_role() {
        assert_eq!(avatar(Role::User), USER_AVATAR);
        assert_eq!(avatar(Role::Assistant), ASSISTANT_AVATAR);
        assert_ne!(USER_AVATAR, ASSISTANT_AVATAR);
    }

    #[test]
    fn past_chat_label_format() {
        let record = ConversationRecord {
            id: 3,
            timestamp: "2024-05-01 09:30:00".to_string(),
            user_id: "user_123".to_string(),
            chat_name: "Explain borrowck".to_string(),
            turns: vec![Turn::user("Explain borrowck")],
        };
        assert_eq!(
            past_chat_label(&record),
            "Explain borrowck - 2024-05-01 09:30:00"
        );
    }

    #[test]
    fn buffer_renderer_records_in_order() {
        let mut renderer = BufferRenderer::new();
        renderer.start_response();
        renderer.print_text("a");
        renderer.print_item(&serde_json::json!({"k": 1}));
        renderer.print_text("b");
        renderer.finish_response();
        renderer.print_error("boom");

        assert_eq!(renderer.fragments(), vec!["a", "b"]);
        assert_eq!(renderer.errors(), vec!["boom"]);
        assert_eq!(renderer.events().len(), 6);
    }
}
