mod support;

use std::fs::File;
use std::sync::Arc;

use arrow::array::{Float64Array, StringArray, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{TimeZone, Utc};
use parquet::arrow::ArrowWriter;
use tempfile::TempDir;

use aeris_core::{IngestError, Observation, ObservationReader};
use support::FixtureRow;

fn collect(reader: ObservationReader) -> (Vec<Observation>, u64) {
    let mut reader = reader;
    let mut rows = Vec::new();
    for item in reader.by_ref() {
        rows.push(item.expect("row"));
    }
    let skipped = reader.skipped_rows();
    (rows, skipped)
}

#[test]
fn verified_dataset_naming_parses_to_canonical_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("verified.parquet");

    support::write_fixture(
        &path,
        &[
            FixtureRow::valid(1_700_000_000_000, "PT/SPO-PT02022_00008_100", 8),
            FixtureRow {
                value: None,
                unit: None,
                ..FixtureRow::valid(1_700_000_060_000, "PT/SPO-PT02022_00008_100", 8)
            },
        ],
    );

    let (rows, skipped) = collect(ObservationReader::open(&path).unwrap());

    assert_eq!(rows.len(), 2);
    assert_eq!(skipped, 0);

    let first = &rows[0];
    assert_eq!(
        first.time,
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    );
    assert_eq!(first.sampling_point_id, "PT/SPO-PT02022_00008_100");
    assert_eq!(first.pollutant_code, 8);
    assert_eq!(first.value, Some(12.5));
    assert_eq!(first.unit.as_deref(), Some("ug.m-3"));

    // Optional fields without a source column stay null.
    assert_eq!(first.validity, None);
    assert_eq!(first.result_time, None);

    let second = &rows[1];
    assert_eq!(second.value, None);
    assert_eq!(second.unit, None);
}

#[test]
fn rows_missing_required_fields_are_dropped_and_counted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gaps.parquet");

    support::write_fixture(
        &path,
        &[
            FixtureRow::valid(1_700_000_000_000, "DE/SPO-DEBB021_5_1", 5),
            FixtureRow {
                time_millis: None,
                ..FixtureRow::valid(0, "DE/SPO-DEBB021_5_1", 5)
            },
            FixtureRow {
                sampling_point: None,
                ..FixtureRow::valid(1_700_000_120_000, "", 5)
            },
            FixtureRow {
                pollutant: None,
                ..FixtureRow::valid(1_700_000_180_000, "DE/SPO-DEBB021_5_1", 0)
            },
        ],
    );

    let (rows, skipped) = collect(ObservationReader::open(&path).unwrap());

    assert_eq!(rows.len(), 1);
    assert_eq!(skipped, 3);
}

#[test]
fn parsing_the_same_file_twice_is_stable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stable.parquet");

    let rows: Vec<FixtureRow> = (0..500)
        .map(|i| FixtureRow::valid(1_700_000_000_000 + i * 60_000, "ES/SPO-ES1438A_1_1", 1))
        .collect();
    support::write_fixture(&path, &rows);

    let (first, _) = collect(ObservationReader::open(&path).unwrap());
    let (second, _) = collect(ObservationReader::open(&path).unwrap());

    assert_eq!(first.len(), 500);
    assert_eq!(first, second);
    // In-file ordering is preserved.
    assert!(first.windows(2).all(|w| w[0].time <= w[1].time));
}

#[test]
fn missing_required_columns_fail_at_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("headless.parquet");

    let schema = Arc::new(Schema::new(vec![Field::new(
        "Concentration",
        DataType::Float64,
        true,
    )]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(Float64Array::from(vec![Some(1.0)]))],
    )
    .unwrap();

    let file = File::create(&path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let err = ObservationReader::open(&path).unwrap_err();
    assert!(matches!(err, IngestError::Parse(_)));
    assert!(err.to_string().contains("required columns"));
}

#[test]
fn up_to_date_naming_with_string_columns_normalizes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("utd.parquet");

    let schema = Arc::new(Schema::new(vec![
        Field::new("Start", DataType::Utf8, true),
        Field::new("Samplingpoint", DataType::Utf8, true),
        Field::new("Pollutant", DataType::Utf8, true),
        Field::new("Value", DataType::Float64, true),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(vec![
                Some("2024-01-15T08:00:00Z"),
                Some("2024-01-15 09:00:00"),
                Some("not a timestamp"),
            ])),
            Arc::new(StringArray::from(vec![
                Some("IT/SPO.IT1234A_7_8"),
                Some("IT/SPO.IT1234A_7_8"),
                Some("IT/SPO.IT1234A_7_8"),
            ])),
            Arc::new(StringArray::from(vec![
                Some("7"),
                Some("http://dd.eionet.europa.eu/vocabulary/aq/pollutant/7"),
                Some("7"),
            ])),
            Arc::new(Float64Array::from(vec![Some(33.0), Some(34.0), Some(35.0)])),
        ],
    )
    .unwrap();

    let file = File::create(&path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let (rows, skipped) = collect(ObservationReader::open(&path).unwrap());

    // The unparseable timestamp drops its row.
    assert_eq!(rows.len(), 2);
    assert_eq!(skipped, 1);

    assert_eq!(rows[0].time, Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap());
    // Naive strings are assumed UTC.
    assert_eq!(rows[1].time, Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap());
    // Vocabulary URLs resolve to their trailing code.
    assert_eq!(rows[0].pollutant_code, 7);
    assert_eq!(rows[1].pollutant_code, 7);
}

#[test]
fn zoned_timestamps_convert_to_utc() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("zoned.parquet");

    // 2024-01-01T00:00:00+01:00 == 2023-12-31T23:00:00Z
    let instant_millis = 1_704_063_600_000_i64;

    let schema = Arc::new(Schema::new(vec![
        Field::new(
            "DatetimeBegin",
            DataType::Timestamp(TimeUnit::Millisecond, Some("+01:00".into())),
            true,
        ),
        Field::new("SamplingPoint", DataType::Utf8, true),
        Field::new("AirPollutantCode", DataType::Utf8, true),
    ]));

    let time_array =
        TimestampMillisecondArray::from(vec![Some(instant_millis)]).with_timezone("+01:00");
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(time_array),
            Arc::new(StringArray::from(vec![Some("FR/SPO-FR02_1_1")])),
            Arc::new(StringArray::from(vec![Some("5")])),
        ],
    )
    .unwrap();

    let file = File::create(&path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let (rows, _) = collect(ObservationReader::open(&path).unwrap());

    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].time,
        Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap()
    );
}
