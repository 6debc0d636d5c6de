use arrow::datatypes::Schema;

use crate::error::{IngestError, Result};

/// Accepted source spellings for each canonical measurement column.
///
/// EEA files come in two naming generations; both are accepted without
/// configuration. First match wins.
const TIME: &[&str] = &["DatetimeBegin", "Start"];
const SAMPLING_POINT: &[&str] = &["SamplingPoint", "Samplingpoint"];
const POLLUTANT: &[&str] = &["AirPollutantCode", "Pollutant"];
const VALUE: &[&str] = &["Concentration", "Value"];
const UNIT: &[&str] = &["UnitOfMeasurement", "Unit"];
const AGGREGATION: &[&str] = &["AggregationType", "AggType"];
const VALIDITY: &[&str] = &["Validity"];
const VERIFICATION: &[&str] = &["Verification"];
const DATA_CAPTURE: &[&str] = &["DataCapture"];
const RESULT_TIME: &[&str] = &["ResultTime"];
const OBSERVATION_ID: &[&str] = &["ObservationId", "FkObservationLog"];

/// Source-column indices for one file, resolved once from the Parquet
/// schema before any row is read.
#[derive(Debug, Clone)]
pub(crate) struct ColumnMap {
    pub time: usize,
    pub sampling_point: usize,
    pub pollutant: usize,
    pub value: Option<usize>,
    pub unit: Option<usize>,
    pub aggregation_type: Option<usize>,
    pub validity: Option<usize>,
    pub verification: Option<usize>,
    pub data_capture: Option<usize>,
    pub result_time: Option<usize>,
    pub observation_id: Option<usize>,
}

impl ColumnMap {
    pub fn resolve(schema: &Schema) -> Result<Self> {
        let find = |variants: &[&str]| {
            variants
                .iter()
                .find_map(|name| schema.fields().iter().position(|f| f.name() == name))
        };

        let (Some(time), Some(sampling_point), Some(pollutant)) =
            (find(TIME), find(SAMPLING_POINT), find(POLLUTANT))
        else {
            let mut missing = Vec::new();
            if find(TIME).is_none() {
                missing.push("time (DatetimeBegin/Start)");
            }
            if find(SAMPLING_POINT).is_none() {
                missing.push("sampling_point_id (SamplingPoint/Samplingpoint)");
            }
            if find(POLLUTANT).is_none() {
                missing.push("pollutant_code (AirPollutantCode/Pollutant)");
            }
            return Err(IngestError::Parse(format!(
                "required columns not found: {}",
                missing.join(", ")
            )));
        };

        Ok(Self {
            time,
            sampling_point,
            pollutant,
            value: find(VALUE),
            unit: find(UNIT),
            aggregation_type: find(AGGREGATION),
            validity: find(VALIDITY),
            verification: find(VERIFICATION),
            data_capture: find(DATA_CAPTURE),
            result_time: find(RESULT_TIME),
            observation_id: find(OBSERVATION_ID),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{DataType, Field, TimeUnit};

    fn schema(names: &[&str]) -> Schema {
        Schema::new(
            names
                .iter()
                .map(|n| {
                    let data_type = match *n {
                        "DatetimeBegin" | "Start" | "ResultTime" => {
                            DataType::Timestamp(TimeUnit::Microsecond, None)
                        }
                        "AirPollutantCode" | "Pollutant" | "Validity" | "Verification" => {
                            DataType::Int32
                        }
                        "Concentration" | "Value" | "DataCapture" => DataType::Float64,
                        _ => DataType::Utf8,
                    };
                    Field::new(*n, data_type, true)
                })
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn resolves_the_verified_dataset_spelling() {
        let map = ColumnMap::resolve(&schema(&[
            "DatetimeBegin",
            "SamplingPoint",
            "AirPollutantCode",
            "Concentration",
            "UnitOfMeasurement",
            "AggregationType",
            "Validity",
            "Verification",
            "DataCapture",
            "ResultTime",
            "ObservationId",
        ]))
        .unwrap();

        assert_eq!(map.time, 0);
        assert_eq!(map.sampling_point, 1);
        assert_eq!(map.pollutant, 2);
        assert_eq!(map.value, Some(3));
        assert_eq!(map.observation_id, Some(10));
    }

    #[test]
    fn resolves_the_up_to_date_dataset_spelling() {
        let map = ColumnMap::resolve(&schema(&[
            "Start",
            "Samplingpoint",
            "Pollutant",
            "Value",
            "Unit",
            "AggType",
            "FkObservationLog",
        ]))
        .unwrap();

        assert_eq!(map.time, 0);
        assert_eq!(map.sampling_point, 1);
        assert_eq!(map.pollutant, 2);
        assert_eq!(map.value, Some(3));
        assert_eq!(map.unit, Some(4));
        assert_eq!(map.aggregation_type, Some(5));
        assert_eq!(map.observation_id, Some(6));
        assert_eq!(map.validity, None);
    }

    #[test]
    fn first_variant_wins_when_both_spellings_exist() {
        let map = ColumnMap::resolve(&schema(&[
            "Start",
            "DatetimeBegin",
            "SamplingPoint",
            "Pollutant",
        ]))
        .unwrap();

        // "DatetimeBegin" is the preferred spelling even though "Start"
        // appears first in the file.
        assert_eq!(map.time, 1);
    }

    #[test]
    fn missing_required_columns_name_every_gap() {
        let err = ColumnMap::resolve(&schema(&["Concentration", "Unit"])).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("time"));
        assert!(message.contains("sampling_point_id"));
        assert!(message.contains("pollutant_code"));
    }
}
