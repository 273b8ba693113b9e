use serde::{Deserialize, Serialize};

use crate::record::PatientRecord;
use crate::validator::parse_number;

/// Total score at or above which a patient is high risk.
pub const HIGH_RISK_THRESHOLD: u32 = 4;
/// Temperatures strictly above this are fever cases.
pub const FEVER_THRESHOLD: f64 = 99.5;
/// Temperatures at or above this are high fever.
pub const HIGH_FEVER_THRESHOLD: f64 = 101.0;

/// Per-factor points for a single record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskScore {
    pub age: u32,
    pub temperature: u32,
    pub blood_pressure: u32,
    pub fever: bool,
}

impl RiskScore {
    pub fn total(&self) -> u32 {
        self.age + self.temperature + self.blood_pressure
    }

    pub fn is_high_risk(&self) -> bool {
        self.total() >= HIGH_RISK_THRESHOLD
    }
}

/// Score a record from whichever fields carry usable values; never fails.
pub fn score(record: &PatientRecord) -> RiskScore {
    let (temperature, fever) = record
        .numeric_temperature()
        .map(temperature_points)
        .unwrap_or((0, false));
    RiskScore {
        age: record.numeric_age().map(age_points).unwrap_or(0),
        temperature,
        blood_pressure: record
            .blood_pressure_text()
            .map(blood_pressure_points)
            .unwrap_or(0),
        fever,
    }
}

/// Over 65 scores 2, 40 through 65 scores 1.
pub fn age_points(age: f64) -> u32 {
    if age > 65.0 {
        2
    } else if age >= 40.0 {
        1
    } else {
        0
    }
}

/// Points and fever flag for a temperature reading.
pub fn temperature_points(temperature: f64) -> (u32, bool) {
    if temperature >= HIGH_FEVER_THRESHOLD {
        (2, true)
    } else if temperature > FEVER_THRESHOLD {
        (1, true)
    } else {
        (0, false)
    }
}

/// Points for a `SYSTOLIC/DIASTOLIC` reading; first matching tier wins.
///
/// Only the first two segments are read, and both must be positive numbers.
pub fn blood_pressure_points(reading: &str) -> u32 {
    let mut parts = reading.split('/');
    let systolic = parts.next().and_then(parse_number);
    let diastolic = parts.next().and_then(parse_number);
    let (Some(systolic), Some(diastolic)) = (systolic, diastolic) else {
        return 0;
    };
    if systolic <= 0.0 || diastolic <= 0.0 {
        return 0;
    }

    if systolic >= 140.0 || diastolic >= 90.0 {
        3
    } else if systolic >= 130.0 || diastolic >= 80.0 {
        2
    } else if systolic >= 120.0 && diastolic < 80.0 {
        1
    } else {
        0
    }
}
