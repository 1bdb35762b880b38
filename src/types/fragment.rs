use std::fmt;
use std::pin::Pin;

use futures::Stream;
use serde_json::Value;

use crate::Result;

/// A lazy, finite, non-restartable sequence of fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment>> + Send>>;

/// An incremental piece of a streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// A text delta. May be shorter than a word.
    Text(String),

    /// A structured, non-string delta.
    Item(Value),
}

/// The result shape of one completion call.
pub enum CompletionOutput {
    /// Fragments arriving incrementally.
    Fragments(FragmentStream),

    /// A single, already-complete response.
    Complete(String),
}

impl CompletionOutput {
    /// Wraps any fragment stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Fragment>> + Send + 'static,
    {
        CompletionOutput::Fragments(Box::pin(stream))
    }
}

impl fmt::Debug for CompletionOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionOutput::Fragments(_) => f.write_str("CompletionOutput::Fragments(..)"),
            CompletionOutput::Complete(text) => {
                f.debug_tuple("CompletionOutput::Complete").field(text).finish()
            }
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fragment::Text(text) => f.write_str(text),
            Fragment::Item(value) => write!(f, "{value}"),
        }
    }
}
