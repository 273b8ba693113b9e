use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// A field as reported by the upstream API: either the expected type or whatever raw
/// JSON arrived in its place.
#[derive(Debug, Clone, PartialEq)]
pub enum Reported<T> {
    Value(T),
    Malformed(Value),
}

impl<T> Reported<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(value) => Some(value),
            Self::Malformed(_) => None,
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Reported<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        match serde_json::from_value::<T>(raw.clone()) {
            Ok(value) => Ok(Self::Value(value)),
            Err(_) => Ok(Self::Malformed(raw)),
        }
    }
}

impl<T: Serialize> Serialize for Reported<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(value) => value.serialize(serializer),
            Self::Malformed(raw) => raw.serialize(serializer),
        }
    }
}

/// Numeric vital or demographic value (age, temperature).
pub type Measurement = Reported<f64>;

/// Decode into `T`, or fall back to `T::default()` when the JSON has the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}

/// Display text: strings pass through, other scalars keep their JSON text, `null` is absent.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    lenient_text(deserializer).map(Option::unwrap_or_default)
}

/// One patient visit as returned by `/api/patients`.
///
/// Only `age`, `temperature` and `blood_pressure` take part in validation and scoring;
/// a missing or `null` field deserializes to `None`. No field value can make a record
/// fail to decode: display fields of the wrong type keep their JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(default, deserialize_with = "lenient_id")]
    pub patient_id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<Measurement>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub gender: Option<String>,
    #[serde(default)]
    pub blood_pressure: Option<Reported<String>>,
    #[serde(default)]
    pub temperature: Option<Measurement>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub visit_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub diagnosis: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub medications: Option<String>,
}

impl PatientRecord {
    pub fn new(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            name: None,
            age: None,
            gender: None,
            blood_pressure: None,
            temperature: None,
            visit_date: None,
            diagnosis: None,
            medications: None,
        }
    }

    pub fn with_age(mut self, age: f64) -> Self {
        self.age = Some(Reported::Value(age));
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(Reported::Value(temperature));
        self
    }

    pub fn with_blood_pressure(mut self, reading: impl Into<String>) -> Self {
        self.blood_pressure = Some(Reported::Value(reading.into()));
        self
    }

    /// Age if the API supplied a number.
    pub fn numeric_age(&self) -> Option<f64> {
        self.age.as_ref().and_then(Reported::value).copied()
    }

    /// Temperature if the API supplied a number.
    pub fn numeric_temperature(&self) -> Option<f64> {
        self.temperature.as_ref().and_then(Reported::value).copied()
    }

    /// Blood pressure if the API supplied a string, whatever its shape.
    pub fn blood_pressure_text(&self) -> Option<&str> {
        self.blood_pressure
            .as_ref()
            .and_then(Reported::value)
            .map(String::as_str)
    }
}

/// Pagination block attached to every page.
///
/// Only `page` and `hasNext` drive traversal; the rest is informational and falls back to
/// zero/`false` when absent or mistyped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub limit: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub total: u64,
    #[serde(default, deserialize_with = "lenient")]
    pub total_pages: u32,
    pub has_next: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub has_previous: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    #[serde(default, deserialize_with = "lenient_text")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub request_id: Option<String>,
}

/// A single page of the patient collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientsPage {
    pub data: Vec<PatientRecord>,
    pub pagination: Pagination,
    #[serde(default, deserialize_with = "lenient")]
    pub metadata: ResponseMetadata,
}
