//! The in-memory conversation and the transitions allowed on it.

use crate::types::Turn;
use crate::{Error, Result};

/// The ordered turns of the current conversation plus the selected model.
///
/// An exchange is in flight between [`SessionState::submit_prompt`] and either
/// [`SessionState::receive_response`] or [`SessionState::abandon_exchange`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    turns: Vec<Turn>,
    model: Option<String>,
    in_flight: bool,
}

impl SessionState {
    /// An empty conversation with `model` selected.
    pub fn new(model: Option<String>) -> Self {
        Self {
            turns: Vec::new(),
            model,
            in_flight: false,
        }
    }

    /// The conversation so far.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The selected model, if any.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// True between a submitted prompt and its response or abandonment.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Append the user's prompt and start an exchange.
    pub fn submit_prompt(&mut self, text: impl Into<String>) -> Result<()> {
        if self.model.is_none() {
            return Err(Error::validation(
                "select a model before sending a prompt",
                Some("model".to_string()),
            ));
        }
        if self.in_flight {
            return Err(Error::validation(
                "a response is still pending",
                None,
            ));
        }
        self.turns.push(Turn::user(text));
        self.in_flight = true;
        Ok(())
    }

    /// Append the assistant's response and finish the exchange.
    ///
    /// Returns the prompt that triggered it.
    pub fn receive_response(&mut self, text: impl Into<String>) -> Result<String> {
        if !self.in_flight {
            return Err(Error::validation("no prompt is awaiting a response", None));
        }
        let prompt = self
            .turns
            .last()
            .map(|turn| turn.content.clone())
            .unwrap_or_default();
        self.turns.push(Turn::assistant(text));
        self.in_flight = false;
        Ok(prompt)
    }

    /// End the exchange without a response. The user's turn stays.
    pub fn abandon_exchange(&mut self) -> Result<()> {
        if !self.in_flight {
            return Err(Error::validation("no prompt is awaiting a response", None));
        }
        self.in_flight = false;
        Ok(())
    }

    /// Select `id`, clearing the conversation if it differs from the current model.
    ///
    /// Returns true when the conversation was cleared.
    pub fn select_model(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.model.as_deref() == Some(id.as_str()) {
            return false;
        }
        self.clear();
        self.model = Some(id);
        true
    }

    /// Replace the conversation with `turns`, keeping the selected model.
    pub fn load_history(&mut self, turns: Vec<Turn>) {
        self.turns = turns;
        self.in_flight = false;
    }

    /// Forget the conversation, keeping the selected model.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.in_flight = false;
    }
}
