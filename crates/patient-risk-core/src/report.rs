use std::fmt::Write;

use serde::Serialize;

use crate::paginator::PageFailure;
use crate::pipeline::{PipelineOutcome, RiskAssessmentResult, ScoredRecord};

/// Format styles supported by [`render_report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

/// Produce a report string for a pipeline run.
///
/// Machine formats emit only the three category lists unless `details` is set.
pub fn render_report(
    outcome: &PipelineOutcome,
    format: OutputFormat,
    details: bool,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_human(outcome, details),
        OutputFormat::Json if details => {
            Ok(serde_json::to_string_pretty(&DetailedReport::from(outcome))?)
        }
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&outcome.result)?),
        OutputFormat::Yaml if details => {
            Ok(serde_yaml::to_string(&DetailedReport::from(outcome))?)
        }
        OutputFormat::Yaml => Ok(serde_yaml::to_string(&outcome.result)?),
    }
}

fn render_human(outcome: &PipelineOutcome, details: bool) -> anyhow::Result<String> {
    let RiskAssessmentResult {
        high_risk_patients,
        fever_patients,
        data_quality_issues,
    } = &outcome.result;

    let mut out = String::new();
    write!(out, "Assessed {} patient record(s)", outcome.scored.len())?;
    if outcome.pages_fetched > 0 {
        write!(out, " across {} page(s)", outcome.pages_fetched)?;
    }
    if !outcome.complete {
        write!(out, " (incomplete)")?;
    }
    writeln!(out)?;
    writeln!(out)?;
    write_category(&mut out, "High risk", high_risk_patients)?;
    write_category(&mut out, "Fever", fever_patients)?;
    write_category(&mut out, "Data quality issues", data_quality_issues)?;

    if !outcome.page_failures.is_empty() {
        writeln!(out)?;
        writeln!(out, "Page failures:")?;
        for PageFailure { page, error } in &outcome.page_failures {
            writeln!(out, "  - page {page}: {error}")?;
        }
    }

    if details && !outcome.scored.is_empty() {
        writeln!(out)?;
        writeln!(out, "Scores:")?;
        for scored in &outcome.scored {
            write_score_line(&mut out, scored)?;
        }
    }

    Ok(out)
}

fn write_category(out: &mut String, label: &str, ids: &[String]) -> std::fmt::Result {
    if ids.is_empty() {
        return writeln!(out, "{label} (0): none");
    }
    writeln!(out, "{label} ({}): {}", ids.len(), ids.join(", "))
}

fn write_score_line(out: &mut String, scored: &ScoredRecord) -> std::fmt::Result {
    let score = &scored.score;
    writeln!(
        out,
        "  - {id:<12} total {total} (age {age}, temp {temp}, bp {bp}){flag}",
        id = scored.record.patient_id,
        total = score.total(),
        age = score.age,
        temp = score.temperature,
        bp = score.blood_pressure,
        flag = if scored.is_valid() { "" } else { " [data quality]" }
    )
}

#[derive(Debug, Serialize)]
struct DetailedReport<'a> {
    #[serde(flatten)]
    result: &'a RiskAssessmentResult,
    pages_fetched: u32,
    complete: bool,
    page_failures: &'a [PageFailure],
    scores: Vec<ScoreEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct ScoreEntry<'a> {
    patient_id: &'a str,
    risk_score: u32,
    breakdown: &'a crate::scorer::RiskScore,
    issues: &'a [crate::validator::QualityIssue],
}

impl<'a> From<&'a PipelineOutcome> for DetailedReport<'a> {
    fn from(outcome: &'a PipelineOutcome) -> Self {
        Self {
            result: &outcome.result,
            pages_fetched: outcome.pages_fetched,
            complete: outcome.complete,
            page_failures: &outcome.page_failures,
            scores: outcome
                .scored
                .iter()
                .map(|scored| ScoreEntry {
                    patient_id: &scored.record.patient_id,
                    risk_score: scored.score.total(),
                    breakdown: &scored.score,
                    issues: &scored.issues,
                })
                .collect(),
        }
    }
}
