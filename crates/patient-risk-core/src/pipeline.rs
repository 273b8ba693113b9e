use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::fetch::Transport;
use crate::paginator::{PageFailure, Paginator, Traversal};
use crate::record::PatientRecord;
use crate::scorer::{self, RiskScore};
use crate::validator::{self, QualityIssue};

/// Page size used when the caller does not supply one.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Patient identifiers per alert category. Categories overlap and duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessmentResult {
    pub high_risk_patients: Vec<String>,
    pub fever_patients: Vec<String>,
    pub data_quality_issues: Vec<String>,
}

/// A record paired with its score and validation findings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    pub record: PatientRecord,
    pub score: RiskScore,
    pub issues: Vec<QualityIssue>,
}

impl ScoredRecord {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Result of one pipeline run, with the per-record detail behind it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineOutcome {
    pub result: RiskAssessmentResult,
    pub scored: Vec<ScoredRecord>,
    pub pages_fetched: u32,
    pub page_failures: Vec<PageFailure>,
    pub complete: bool,
}

/// Anything that can produce the full list of patient records.
#[async_trait]
pub trait PatientSource: Send + Sync {
    async fn fetch_patients(&self, limit: u32) -> Traversal;
}

#[async_trait]
impl<T: Transport> PatientSource for Paginator<T> {
    async fn fetch_patients(&self, limit: u32) -> Traversal {
        self.fetch_all(limit).await
    }
}

/// Validate and score each record exactly once, in input order.
pub fn assess(records: Vec<PatientRecord>) -> (RiskAssessmentResult, Vec<ScoredRecord>) {
    let mut result = RiskAssessmentResult::default();
    let mut scored = Vec::with_capacity(records.len());

    for record in records {
        let issues = validator::quality_issues(&record);
        let score = scorer::score(&record);
        let id = &record.patient_id;

        if !issues.is_empty() {
            result.data_quality_issues.push(id.clone());
        }
        if score.fever {
            result.fever_patients.push(id.clone());
        }
        if score.is_high_risk() {
            result.high_risk_patients.push(id.clone());
        }
        scored.push(ScoredRecord {
            record,
            score,
            issues,
        });
    }

    (result, scored)
}

/// Fetches every patient from a [`PatientSource`] and classifies them.
pub struct RiskPipeline<S> {
    source: S,
}

impl<S: PatientSource> RiskPipeline<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run once; `limit` falls back to [`DEFAULT_PAGE_LIMIT`].
    #[instrument(name = "assess_patients", skip(self))]
    pub async fn run(&self, limit: Option<u32>) -> PipelineOutcome {
        let limit = limit.filter(|l| *l > 0).unwrap_or(DEFAULT_PAGE_LIMIT);
        let traversal = self.source.fetch_patients(limit).await;
        let (result, scored) = assess(traversal.records);
        info!(
            records = scored.len(),
            high_risk = result.high_risk_patients.len(),
            fever = result.fever_patients.len(),
            data_quality = result.data_quality_issues.len(),
            "assessment complete"
        );
        PipelineOutcome {
            result,
            scored,
            pages_fetched: traversal.pages_fetched,
            page_failures: traversal.failures,
            complete: traversal.complete,
        }
    }
}
