//! Turns a completion's fragments into displayed output and one final text.
//!
//! Fragments are forwarded to the [`Renderer`] as they arrive while an
//! [`Aggregator`] accumulates them. Plain text fragments concatenate with no
//! separator. A response that carried structured items is kept as a list of
//! items whose content form is newline-joined instead.

use std::fmt;

use futures::StreamExt;
use serde_json::Value;

use crate::Result;
use crate::render::Renderer;
use crate::types::{CompletionOutput, Fragment};

/// One entry of a structured response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// A run of consecutive text fragments.
    Text(String),

    /// A structured value.
    Value(Value),
}

impl fmt::Display for StreamItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamItem::Text(text) => f.write_str(text),
            StreamItem::Value(value) => write!(f, "{value}"),
        }
    }
}

/// The accumulated result of one completion.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    /// Every fragment was text; holds their concatenation.
    PlainText(String),

    /// At least one structured item arrived.
    FragmentItems(Vec<StreamItem>),
}

impl Aggregate {
    /// The text to store as the assistant turn.
    ///
    /// Structured responses join the string form of each item with `"\n"`,
    /// unlike plain text which is never separated.
    pub fn into_content(self) -> String {
        match self {
            Aggregate::PlainText(text) => text,
            Aggregate::FragmentItems(items) => items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Accumulates fragments in arrival order.
#[derive(Debug, Default)]
pub struct Aggregator {
    items: Vec<StreamItem>,
    structured: bool,
}

impl Aggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulates one fragment and forwards it to `renderer`.
    ///
    /// Empty text fragments are neither forwarded nor stored.
    pub fn forward(&mut self, fragment: Fragment, renderer: &mut dyn Renderer) {
        match fragment {
            Fragment::Text(text) => {
                if text.is_empty() {
                    return;
                }
                renderer.print_text(&text);
                match self.items.last_mut() {
                    Some(StreamItem::Text(run)) => run.push_str(&text),
                    _ => self.items.push(StreamItem::Text(text)),
                }
            }
            Fragment::Item(value) => {
                renderer.print_item(&value);
                self.items.push(StreamItem::Value(value));
                self.structured = true;
            }
        }
    }

    /// Finishes accumulation.
    pub fn finish(self) -> Aggregate {
        if self.structured {
            return Aggregate::FragmentItems(self.items);
        }
        let mut text = String::new();
        for item in self.items {
            if let StreamItem::Text(run) = item {
                text.push_str(&run);
            }
        }
        Aggregate::PlainText(text)
    }
}

/// Drains a completion into `renderer`, returning the accumulated result.
///
/// A [`CompletionOutput::Complete`] response is rendered once as a whole and
/// returned as-is. If the fragment stream fails, whatever was already
/// rendered stays rendered and the error is returned; nothing partial is.
pub async fn aggregate(output: CompletionOutput, renderer: &mut dyn Renderer) -> Result<Aggregate> {
    match output {
        CompletionOutput::Complete(text) => {
            if !text.is_empty() {
                renderer.print_text(&text);
            }
            Ok(Aggregate::PlainText(text))
        }
        CompletionOutput::Fragments(mut fragments) => {
            let mut aggregator = Aggregator::new();
            while let Some(fragment) = fragments.next().await {
                aggregator.forward(fragment?, renderer);
            }
            Ok(aggregator.finish())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::render::{BufferRenderer, RenderEvent};
    use futures::stream;
    use serde_json::json;

    fn text(s: &str) -> Result<Fragment> {
        Ok(Fragment::Text(s.to_string()))
    }

    #[tokio::test]
    async fn plain_fragments_concatenate_without_separator() {
        let output = CompletionOutput::from_stream(stream::iter(vec![
            text("Hel"),
            text("lo"),
            text(", wor"),
            text("ld"),
        ]));
        let mut renderer = BufferRenderer::new();
        let result = aggregate(output, &mut renderer).await.unwrap();

        assert_eq!(result, Aggregate::PlainText("Hello, world".to_string()));
        assert_eq!(renderer.fragments(), vec!["Hel", "lo", ", wor", "ld"]);
    }

    #[tokio::test]
    async fn empty_fragments_are_not_forwarded() {
        let output = CompletionOutput::from_stream(stream::iter(vec![
            text(""),
            text("a"),
            text(""),
            text("b"),
        ]));
        let mut renderer = BufferRenderer::new();
        let result = aggregate(output, &mut renderer).await.unwrap();

        assert_eq!(result.into_content(), "ab");
        assert_eq!(renderer.fragments(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn empty_stream_is_empty_text() {
        let output = CompletionOutput::from_stream(stream::iter(Vec::<Result<Fragment>>::new()));
        let mut renderer = BufferRenderer::new();
        let result = aggregate(output, &mut renderer).await.unwrap();
        assert_eq!(result, Aggregate::PlainText(String::new()));
        assert!(renderer.events().is_empty());
    }

    #[tokio::test]
    async fn complete_response_is_returned_directly() {
        let output = CompletionOutput::Complete("All at once.".to_string());
        let mut renderer = BufferRenderer::new();
        let result = aggregate(output, &mut renderer).await.unwrap();

        assert_eq!(result, Aggregate::PlainText("All at once.".to_string()));
        assert_eq!(renderer.fragments(), vec!["All at once."]);
    }

    #[tokio::test]
    async fn structured_items_join_with_newlines() {
        let a = json!({"type": "text", "text": "one"});
        let b = json!(2);
        let c = json!(["three"]);
        let output = CompletionOutput::from_stream(stream::iter(vec![
            Ok(Fragment::Item(a.clone())),
            Ok(Fragment::Item(b.clone())),
            Ok(Fragment::Item(c.clone())),
        ]));
        let mut renderer = BufferRenderer::new();
        let result = aggregate(output, &mut renderer).await.unwrap();

        assert_eq!(
            result,
            Aggregate::FragmentItems(vec![
                StreamItem::Value(a.clone()),
                StreamItem::Value(b.clone()),
                StreamItem::Value(c.clone()),
            ])
        );
        assert_eq!(
            result.into_content(),
            format!("{a}\n{b}\n{c}")
        );
        assert_eq!(
            renderer.events(),
            &[RenderEvent::Item(a), RenderEvent::Item(b), RenderEvent::Item(c)]
        );
    }

    #[tokio::test]
    async fn text_runs_merge_between_items() {
        let output = CompletionOutput::from_stream(stream::iter(vec![
            text("foo"),
            text("bar"),
            Ok(Fragment::Item(json!(1))),
            text("baz"),
        ]));
        let mut renderer = BufferRenderer::new();
        let result = aggregate(output, &mut renderer).await.unwrap();
        assert_eq!(result.into_content(), "foobar\n1\nbaz");
    }

    #[tokio::test]
    async fn failure_mid_stream_propagates() {
        let output = CompletionOutput::from_stream(stream::iter(vec![
            text("partial "),
            text("answer"),
            Err(Error::streaming("connection reset", None)),
            text("never seen"),
        ]));
        let mut renderer = BufferRenderer::new();
        let err = aggregate(output, &mut renderer).await.unwrap_err();

        assert!(err.is_transport());
        assert_eq!(renderer.fragments(), vec!["partial ", "answer"]);
    }
}
