use serde::{Deserialize, Serialize};

use crate::record::{PatientRecord, Reported};

/// Field whose content prevents a record from being used clinically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityIssue {
    MissingAge,
    MalformedAge,
    MissingTemperature,
    MalformedTemperature,
    MissingBloodPressure,
    MalformedBloodPressure,
}

/// `true` when age, temperature and blood pressure are all well formed.
pub fn is_valid(record: &PatientRecord) -> bool {
    quality_issues(record).is_empty()
}

/// Every validation rule the record breaks, in field order.
pub fn quality_issues(record: &PatientRecord) -> Vec<QualityIssue> {
    let mut issues = Vec::new();

    match &record.age {
        None => issues.push(QualityIssue::MissingAge),
        Some(age) if !is_number(age) => issues.push(QualityIssue::MalformedAge),
        Some(_) => {}
    }
    match &record.temperature {
        None => issues.push(QualityIssue::MissingTemperature),
        Some(temperature) if !is_number(temperature) => {
            issues.push(QualityIssue::MalformedTemperature)
        }
        Some(_) => {}
    }
    match &record.blood_pressure {
        None => issues.push(QualityIssue::MissingBloodPressure),
        Some(Reported::Value(reading)) if is_well_formed_reading(reading) => {}
        Some(_) => issues.push(QualityIssue::MalformedBloodPressure),
    }

    issues
}

fn is_number(value: &Reported<f64>) -> bool {
    matches!(value, Reported::Value(n) if !n.is_nan())
}

/// Exactly one `/` with a parseable number on each side.
fn is_well_formed_reading(reading: &str) -> bool {
    let mut parts = reading.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(systolic), Some(diastolic), None) => {
            !systolic.is_empty()
                && !diastolic.is_empty()
                && parse_number(systolic).is_some()
                && parse_number(diastolic).is_some()
        }
        _ => false,
    }
}

/// Numeric parse of one side of a reading; surrounding whitespace is ignored and
/// infinities are rejected.
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}
