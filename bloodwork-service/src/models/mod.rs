pub mod analysis;
pub mod biomarker;
pub mod document;
pub mod progress;
pub mod usage;

pub use analysis::{
    AnalysisPhase, AnalysisStatus, ComprehensiveAnalysis, CoreAnalysis, HealthAnalysis,
    PhaseStatus, UserProfile, overall_done,
};
pub use biomarker::{Biomarker, BiomarkerReading, Severity};
pub use document::{Document, DocumentStatus};
pub use progress::{Phase, ProcessingUpdate};
pub use usage::UsageRecord;
