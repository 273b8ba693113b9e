pub mod fetch;
pub mod paginator;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod scorer;
pub mod validator;

pub use fetch::{
    ApiSettings, FetchError, ReqwestTransport, RetryPolicy, RetryingFetcher, Transport,
    TransportResponse,
};
pub use paginator::{PageFailure, Paginator, Traversal};
pub use pipeline::{
    assess, PatientSource, PipelineOutcome, RiskAssessmentResult, RiskPipeline, ScoredRecord,
};
pub use record::{Measurement, Pagination, PatientRecord, PatientsPage, Reported};
pub use report::{render_report, OutputFormat};
pub use scorer::RiskScore;
pub use validator::QualityIssue;
