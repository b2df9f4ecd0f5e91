pub mod analysis_store;
pub mod database;
pub mod document_store;
pub mod matcher;
pub mod metrics;
pub mod progress;
pub mod status;
pub mod storage;
pub mod usage;

pub use analysis_store::{AnalysisStore, MemoryAnalysisStore, MongoAnalysisStore};
pub use database::MongoDb;
pub use document_store::{DocumentStore, MemoryDocumentStore, MongoDocumentStore};
pub use matcher::{classify_severity, match_reading};
pub use metrics::{get_metrics, init_metrics};
pub use progress::{
    MemoryProgressStore, MongoProgressStore, ProgressError, ProgressRecorder, ProgressStore,
    ThrottledProgress,
};
pub use status::{aggregate_status, StatusSummary};
pub use storage::{LocalStorage, Storage};
pub use usage::UsageTracker;
