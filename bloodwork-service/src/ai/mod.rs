//! AI provider abstraction and the streaming pipeline built on it.
//!
//! Providers expose one operation: a streaming structured-output request
//! whose response arrives as discrete events (reasoning deltas, output
//! deltas, usage). The accumulator in `stream` reduces those events into a
//! final JSON payload while surfacing reasoning text for live narration.

pub mod analysis;
pub mod extraction;
pub mod mock;
pub mod openai;
pub mod prompts;
pub mod provider;
pub mod stream;

pub use analysis::{AnalysisOrchestrator, CategoryRecommendations};
pub use extraction::{BiomarkerExtractionClient, ExtractedBiomarker, ExtractionResult};
pub use mock::MockAiProvider;
pub use openai::OpenAiProvider;
pub use provider::{AiError, AiProvider, AiStream, StreamEvent, StructuredRequest, TokenUsage};
pub use stream::{drive_stream, NarrationSink, StreamAccumulator, StreamOutput};
