//! Finite-state reduction of provider stream events.
//!
//! The accumulator is a pure function of the event sequence: no I/O, no
//! callbacks. The one ordering subtlety lives here: when reasoning deltas
//! arrive for a new `summary_index`, the previous summary's accumulated text
//! is flushed before the new one starts accumulating.

use super::provider::{AiError, AiStream, StreamEvent, TokenUsage};
use async_trait::async_trait;
use tokio_stream::StreamExt;

/// A flushed reasoning summary, ready for narration.
#[derive(Debug, Clone, PartialEq)]
pub struct Narration {
    pub summary_index: u32,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct StreamAccumulator {
    pending_reasoning: String,
    pending_index: Option<u32>,
    output: String,
    usage: Option<TokenUsage>,
    completed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutput {
    pub output: String,
    pub usage: Option<TokenUsage>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event. Returns a `Narration` when a complete reasoning
    /// summary flushed (index change or explicit done).
    pub fn apply(&mut self, event: StreamEvent) -> Option<Narration> {
        match event {
            StreamEvent::ReasoningDelta { summary_index, text } => {
                let flushed = match self.pending_index {
                    Some(prev) if prev != summary_index => self.take_pending(),
                    _ => None,
                };
                self.pending_index = Some(summary_index);
                self.pending_reasoning.push_str(&text);
                flushed
            }
            StreamEvent::ReasoningDone { summary_index } => {
                if self.pending_index == Some(summary_index) {
                    self.take_pending()
                } else {
                    None
                }
            }
            StreamEvent::OutputDelta(text) => {
                self.output.push_str(&text);
                None
            }
            StreamEvent::OutputDone => None,
            StreamEvent::Usage(usage) => {
                self.usage = Some(usage);
                None
            }
            StreamEvent::Completed => {
                self.completed = true;
                None
            }
        }
    }

    fn take_pending(&mut self) -> Option<Narration> {
        let index = self.pending_index.take()?;
        if self.pending_reasoning.is_empty() {
            return None;
        }
        let text = std::mem::take(&mut self.pending_reasoning);
        Some(Narration {
            summary_index: index,
            text,
        })
    }

    /// Reasoning text accumulated for the current, unflushed summary.
    pub fn pending_reasoning(&self) -> &str {
        &self.pending_reasoning
    }

    pub fn finish(self) -> Result<StreamOutput, AiError> {
        if !self.completed {
            return Err(AiError::Incomplete);
        }
        Ok(StreamOutput {
            output: self.output,
            usage: self.usage,
        })
    }
}

/// Receives reasoning narration as it streams. `complete_summary` is true
/// when a full summary flushed and must reach the store before the next
/// summary accumulates.
#[async_trait]
pub trait NarrationSink: Send {
    async fn narrate(&mut self, text: String, complete_summary: bool);
}

/// A sink that drops narration; for callers that do not surface it.
pub struct NullSink;

#[async_trait]
impl NarrationSink for NullSink {
    async fn narrate(&mut self, _text: String, _complete_summary: bool) {}
}

/// Drain a provider stream through the accumulator, forwarding narration,
/// and return the concatenated output and usage once the stream completes.
pub async fn drive_stream(
    mut stream: AiStream,
    sink: &mut dyn NarrationSink,
) -> Result<StreamOutput, AiError> {
    let mut acc = StreamAccumulator::new();

    while let Some(event) = stream.next().await {
        let event = event?;
        let is_reasoning_delta = matches!(event, StreamEvent::ReasoningDelta { .. });

        if let Some(narration) = acc.apply(event) {
            sink.narrate(narration.text, true).await;
        } else if is_reasoning_delta {
            sink.narrate(acc.pending_reasoning().to_string(), false).await;
        }
    }

    acc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(index: u32, text: &str) -> StreamEvent {
        StreamEvent::ReasoningDelta {
            summary_index: index,
            text: text.to_string(),
        }
    }

    #[test]
    fn output_deltas_concatenate_in_arrival_order() {
        let mut acc = StreamAccumulator::new();
        acc.apply(StreamEvent::OutputDelta("{\"a\":".to_string()));
        acc.apply(StreamEvent::OutputDelta(" 1}".to_string()));
        acc.apply(StreamEvent::OutputDone);
        acc.apply(StreamEvent::Completed);

        let out = acc.finish().unwrap();
        assert_eq!(out.output, "{\"a\": 1}");
    }

    #[test]
    fn index_change_flushes_previous_summary_first() {
        let mut acc = StreamAccumulator::new();
        assert_eq!(acc.apply(delta(0, "first ")), None);
        assert_eq!(acc.apply(delta(0, "summary")), None);

        // Switching to index 1 must flush summary 0 before accumulating.
        let flushed = acc.apply(delta(1, "second")).unwrap();
        assert_eq!(flushed.summary_index, 0);
        assert_eq!(flushed.text, "first summary");
        assert_eq!(acc.pending_reasoning(), "second");
    }

    #[test]
    fn reasoning_done_flushes_current_summary() {
        let mut acc = StreamAccumulator::new();
        acc.apply(delta(0, "thinking"));
        let flushed = acc
            .apply(StreamEvent::ReasoningDone { summary_index: 0 })
            .unwrap();
        assert_eq!(flushed.text, "thinking");
        assert_eq!(acc.pending_reasoning(), "");
    }

    #[test]
    fn usage_is_captured() {
        let mut acc = StreamAccumulator::new();
        acc.apply(StreamEvent::Usage(TokenUsage {
            input_tokens: 100,
            output_tokens: 42,
        }));
        acc.apply(StreamEvent::Completed);
        let out = acc.finish().unwrap();
        assert_eq!(out.usage.unwrap().output_tokens, 42);
    }

    #[test]
    fn missing_completed_is_incomplete() {
        let mut acc = StreamAccumulator::new();
        acc.apply(StreamEvent::OutputDelta("{}".to_string()));
        assert!(matches!(acc.finish(), Err(AiError::Incomplete)));
    }

    #[tokio::test]
    async fn drive_stream_equivalent_to_final_text() {
        // Stream-vs-final equivalence: concatenated deltas parse to the
        // same object as a single final payload would.
        let events: Vec<Result<StreamEvent, AiError>> = vec![
            Ok(delta(0, "looking at markers")),
            Ok(StreamEvent::ReasoningDone { summary_index: 0 }),
            Ok(StreamEvent::OutputDelta("{\"biomarkers\"".to_string())),
            Ok(StreamEvent::OutputDelta(": []}".to_string())),
            Ok(StreamEvent::OutputDone),
            Ok(StreamEvent::Usage(TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            })),
            Ok(StreamEvent::Completed),
        ];
        let stream: AiStream = Box::pin(tokio_stream::iter(events));

        let out = drive_stream(stream, &mut NullSink).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out.output).unwrap();
        assert!(parsed["biomarkers"].as_array().unwrap().is_empty());
    }

    struct RecordingSink(Vec<(String, bool)>);

    #[async_trait]
    impl NarrationSink for RecordingSink {
        async fn narrate(&mut self, text: String, complete_summary: bool) {
            self.0.push((text, complete_summary));
        }
    }

    #[tokio::test]
    async fn two_summaries_flush_in_order() {
        let events: Vec<Result<StreamEvent, AiError>> = vec![
            Ok(delta(0, "summary zero")),
            Ok(delta(1, "summary one")),
            Ok(StreamEvent::ReasoningDone { summary_index: 1 }),
            Ok(StreamEvent::OutputDelta("{}".to_string())),
            Ok(StreamEvent::Completed),
        ];
        let stream: AiStream = Box::pin(tokio_stream::iter(events));

        let mut sink = RecordingSink(Vec::new());
        drive_stream(stream, &mut sink).await.unwrap();

        let completes: Vec<&(String, bool)> = sink.0.iter().filter(|(_, c)| *c).collect();
        assert_eq!(completes.len(), 2);
        assert_eq!(completes[0].0, "summary zero");
        assert_eq!(completes[1].0, "summary one");
    }
}
