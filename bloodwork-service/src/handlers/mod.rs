pub mod analyses;
pub mod documents;
pub mod health;

pub use analyses::{analyze_document, get_analysis_status};
pub use documents::{
    delete_document, get_document, get_document_status, list_documents, process_document,
    upload_document,
};
pub use health::{health_check, metrics_endpoint, readiness_check};
