//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the conversation
//! state and runs one exchange at a time: prompt, completion, rendering and
//! persistence.

use std::time::Instant;

use crate::aggregator::aggregate;
use crate::chat::config::ChatConfig;
use crate::chat::state::SessionState;
use crate::client::Completions;
use crate::observability::{EXCHANGE_DURATION, EXCHANGES, EXCHANGES_ABANDONED};
use crate::render::Renderer;
use crate::store::{ConversationRecord, RecordStore, chat_name};
use crate::types::{CompletionRequest, ModelDescriptor, Turn};
use crate::{Error, Result};

/// How one exchange ended.
#[derive(Debug)]
pub enum ExchangeOutcome {
    /// The response was received and saved as record `record_id`.
    Completed {
        /// Identifier of the stored snapshot.
        record_id: i64,
    },

    /// The response was received but could not be saved.
    ///
    /// The in-memory conversation includes the response.
    Unsaved {
        /// Why the write failed.
        error: Error,
    },

    /// The completion failed; only the prompt was kept and nothing was saved.
    Abandoned {
        /// Why the completion failed.
        error: Error,
    },
}

impl ExchangeOutcome {
    /// True when the response made it into the conversation.
    pub fn is_answered(&self) -> bool {
        !matches!(self, ExchangeOutcome::Abandoned { .. })
    }
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    /// The selected model, if any.
    pub model: Option<String>,
    /// The number of turns in the conversation.
    pub turn_count: usize,
    /// The maximum tokens per response.
    pub max_tokens: u32,
    /// The user conversations are stored under.
    pub user_id: String,
    /// Whether responses are streamed.
    pub stream: bool,
    /// Exchanges that produced a response.
    pub exchanges: u64,
    /// Exchanges abandoned after a completion failure.
    pub abandoned: u64,
    /// Responses that could not be saved.
    pub unsaved: u64,
}

/// A chat session that manages conversation state and API interactions.
pub struct ChatSession<C: Completions> {
    client: C,
    store: RecordStore,
    state: SessionState,
    user_id: String,
    max_tokens: u32,
    stream: bool,
    exchanges: u64,
    abandoned: u64,
    unsaved: u64,
}

impl<C: Completions> ChatSession<C> {
    /// Creates a new chat session with the given client, store and configuration.
    pub fn new(client: C, store: RecordStore, config: &ChatConfig) -> Self {
        Self {
            client,
            store,
            state: SessionState::new(Some(config.model.id.to_string())),
            user_id: config.user_id.clone(),
            max_tokens: config.effective_max_tokens(),
            stream: config.stream,
            exchanges: 0,
            abandoned: 0,
            unsaved: 0,
        }
    }

    /// Sends a user prompt and renders the response as it arrives.
    ///
    /// This method:
    /// 1. Adds the user turn to the conversation
    /// 2. Sends the whole conversation to the completion API
    /// 3. Renders response fragments as they arrive
    /// 4. Adds the assistant turn and saves a snapshot to the store
    ///
    /// Completion and storage failures are rendered and reported in the
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns a validation error when no model is selected or an exchange
    /// is already in flight. Nothing is sent in that case.
    pub async fn submit(
        &mut self,
        prompt: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<ExchangeOutcome> {
        self.state.submit_prompt(prompt)?;
        let model = self.state.model().unwrap_or_default().to_string();
        let start = Instant::now();
        tracing::info!(
            model = %model,
            turns = self.state.turns().len(),
            max_tokens = self.max_tokens,
            "starting exchange"
        );

        renderer.print_turn(&Turn::user(prompt));
        let mut request =
            CompletionRequest::streaming(model, self.state.turns().to_vec(), self.max_tokens);
        request.stream = self.stream;

        renderer.start_response();
        let result = match self.client.complete(request).await {
            Ok(output) => aggregate(output, renderer).await,
            Err(err) => Err(err),
        };
        renderer.finish_response();
        EXCHANGE_DURATION.add(start.elapsed().as_secs_f64());

        let content = match result {
            Ok(aggregate) => aggregate.into_content(),
            Err(error) => {
                self.state.abandon_exchange()?;
                EXCHANGES_ABANDONED.click();
                self.abandoned += 1;
                tracing::warn!(error = %error, "completion failed; exchange abandoned");
                renderer.print_error(&format!("An error occurred: {error}"));
                return Ok(ExchangeOutcome::Abandoned { error });
            }
        };

        let prompt = self.state.receive_response(content)?;
        EXCHANGES.click();
        self.exchanges += 1;

        match self
            .store
            .append(&self.user_id, &chat_name(&prompt), self.state.turns())
            .await
        {
            Ok(record_id) => {
                tracing::info!(record_id, "exchange saved");
                Ok(ExchangeOutcome::Completed { record_id })
            }
            Err(error) => {
                self.unsaved += 1;
                tracing::error!(error = %error, "could not save exchange");
                renderer.print_error(&format!("Could not save chat: {error}"));
                Ok(ExchangeOutcome::Unsaved { error })
            }
        }
    }

    /// Changes the model used for responses.
    ///
    /// Choosing a different model clears the conversation and resets the
    /// token budget to that model's default. Returns true when it did.
    pub fn select_model(&mut self, id: &str) -> Result<bool> {
        let model = ModelDescriptor::lookup(id)?;
        let changed = self.state.select_model(model.id);
        if changed {
            self.max_tokens = model.default_max_tokens();
        }
        Ok(changed)
    }

    /// Returns the selected model, if any.
    pub fn model(&self) -> Option<&'static ModelDescriptor> {
        self.state.model().and_then(ModelDescriptor::find)
    }

    /// Sets the maximum tokens per response, clamped to the model's range.
    ///
    /// Returns the value actually used.
    pub fn set_max_tokens(&mut self, requested: u32) -> u32 {
        self.max_tokens = match self.model() {
            Some(model) => model.clamp_max_tokens(requested),
            None => requested,
        };
        self.max_tokens
    }

    /// Returns the maximum tokens per response.
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Returns the user conversations are stored under.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns the conversation so far.
    pub fn turns(&self) -> &[Turn] {
        self.state.turns()
    }

    /// Clears the conversation history.
    pub fn clear(&mut self) {
        self.state.clear();
    }

    /// Returns this user's past conversations, newest first.
    pub async fn past_chats(&self) -> Result<Vec<ConversationRecord>> {
        self.store.list_for_user(&self.user_id).await
    }

    /// Replaces the conversation with a stored one.
    pub async fn load_chat(&mut self, id: i64) -> Result<&[Turn]> {
        let record = self.store.get(&self.user_id, id).await?;
        tracing::debug!(id, turns = record.turns.len(), "loaded chat");
        self.state.load_history(record.turns);
        Ok(self.state.turns())
    }

    /// Returns the record store.
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            model: self.state.model().map(str::to_string),
            turn_count: self.state.turns().len(),
            max_tokens: self.max_tokens,
            user_id: self.user_id.clone(),
            stream: self.stream,
            exchanges: self.exchanges,
            abandoned: self.abandoned,
            unsaved: self.unsaved,
        }
    }
}
