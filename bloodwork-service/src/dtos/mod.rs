pub mod analysis;
pub mod document;

pub use analysis::{AnalysisResponse, AnalysisStatusResponse, AnalyzeRequest};
pub use document::{
    DocumentResponse, DocumentStatusResponse, ListDocumentsParams, ListDocumentsResponse,
    ProcessResponse,
};
