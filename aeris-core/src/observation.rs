use chrono::{DateTime, Utc};

/// One normalized air-quality observation, matching the column order of
/// the `airquality.measurements` hypertable.
///
/// `time`, `sampling_point_id`, and `pollutant_code` are required; rows
/// missing any of them never leave the parser. Everything else is carried
/// through as-is and may be null in the database.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Observation start instant, UTC-normalized.
    pub time: DateTime<Utc>,
    /// Reference to a pre-loaded sampling point (`CC/SPO-...` identifier).
    pub sampling_point_id: String,
    /// Reference to a pre-loaded pollutant.
    pub pollutant_code: i32,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub aggregation_type: Option<String>,
    pub validity: Option<i32>,
    pub verification: Option<i32>,
    pub data_capture: Option<f32>,
    pub result_time: Option<DateTime<Utc>>,
    pub observation_id: Option<String>,
}
