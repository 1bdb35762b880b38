use std::fmt;

use crate::{Error, Result};

/// Smallest token budget a request may carry.
pub const MIN_MAX_TOKENS: u32 = 512;

/// Granularity of the token budget control.
pub const MAX_TOKENS_STEP: u32 = 512;

/// Upper bound on the default token budget, whatever the model's capacity.
pub const DEFAULT_MAX_TOKENS_CAP: u32 = 32768;

/// Identifier of the model selected when nothing else is configured.
pub const DEFAULT_MODEL: &str = "llama3-8b-8192";

/// Static description of a hosted model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDescriptor {
    /// The identifier sent to the completion API.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Maximum token capacity.
    pub tokens: u32,
    /// Who published the model.
    pub developer: &'static str,
}

/// Every model the chat front-end offers.
pub const MODELS: &[ModelDescriptor] = &[
    ModelDescriptor {
        id: "gemma2-9b-it",
        name: "Gemma2-9b-it",
        tokens: 8192,
        developer: "Google",
    },
    ModelDescriptor {
        id: "llama-3.3-70b-versatile",
        name: "LLaMA3.3-70b-versatile",
        tokens: 128000,
        developer: "Meta",
    },
    ModelDescriptor {
        id: "llama-3.1-8b-instant",
        name: "LLaMA3.1-8b-instant",
        tokens: 128000,
        developer: "Meta",
    },
    ModelDescriptor {
        id: "llama3-70b-8192",
        name: "LLaMA3-70b-8192",
        tokens: 8192,
        developer: "Meta",
    },
    ModelDescriptor {
        id: "llama3-8b-8192",
        name: "LLaMA3-8b-8192",
        tokens: 8192,
        developer: "Meta",
    },
    ModelDescriptor {
        id: "mixtral-8x7b-32768",
        name: "Mixtral-8x7b-Instruct-v0.1",
        tokens: 32768,
        developer: "Mistral",
    },
];

impl ModelDescriptor {
    /// Looks up a model by identifier.
    pub fn find(id: &str) -> Option<&'static ModelDescriptor> {
        MODELS.iter().find(|m| m.id == id)
    }

    /// Looks up a model by identifier, failing for models outside the catalog.
    pub fn lookup(id: &str) -> Result<&'static ModelDescriptor> {
        Self::find(id.trim()).ok_or_else(|| {
            Error::validation(format!("unknown model: {id}"), Some("model".to_string()))
        })
    }

    /// The default model.
    pub fn default_model() -> &'static ModelDescriptor {
        Self::find(DEFAULT_MODEL).unwrap_or(&MODELS[0])
    }

    /// The token budget used when the user has not chosen one.
    pub fn default_max_tokens(&self) -> u32 {
        DEFAULT_MAX_TOKENS_CAP.min(self.tokens)
    }

    /// Brings a requested budget into `[MIN_MAX_TOKENS, capacity]` on the step grid.
    ///
    /// ```
    /// # use parley::ModelDescriptor;
    /// let model = ModelDescriptor::find("llama3-8b-8192").unwrap();
    /// assert_eq!(model.clamp_max_tokens(100), 512);
    /// assert_eq!(model.clamp_max_tokens(1500), 1024);
    /// assert_eq!(model.clamp_max_tokens(1_000_000), 8192);
    /// ```
    pub fn clamp_max_tokens(&self, requested: u32) -> u32 {
        let stepped = requested - requested % MAX_TOKENS_STEP;
        stepped.clamp(MIN_MAX_TOKENS, self.tokens.max(MIN_MAX_TOKENS))
    }
}

impl fmt::Display for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {} tokens, {})",
            self.id, self.name, self.tokens, self.developer
        )
    }
}
