//! In-request processing runs. Neither pipeline is queued or retried: the
//! triggering HTTP request drives the run to completion and carries its
//! outcome back to the caller.

pub mod analysis;
pub mod document;

pub use analysis::AnalysisPipeline;
pub use document::{DocumentPipeline, ProcessingOutcome, ProgressSink};
