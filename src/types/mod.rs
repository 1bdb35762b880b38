pub mod chat_completion;
pub mod fragment;
pub mod model;
pub mod turn;

pub use chat_completion::{
    ChatCompletion, ChatCompletionChunk, ChunkChoice, ChunkDelta, CompletionChoice,
    CompletionMessage, CompletionRequest,
};
pub use fragment::{CompletionOutput, Fragment, FragmentStream};
pub use model::{
    DEFAULT_MAX_TOKENS_CAP, DEFAULT_MODEL, MAX_TOKENS_STEP, MIN_MAX_TOKENS, MODELS,
    ModelDescriptor,
};
pub use turn::{Role, Turn};
