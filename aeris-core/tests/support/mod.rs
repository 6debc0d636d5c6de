//! Shared helpers for the integration tests: Parquet fixture generation
//! and an in-process HTTP server to download from.

#![allow(dead_code)]

use std::fs::File;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, StringArray, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use axum::Router;
use parquet::arrow::ArrowWriter;

/// One fixture row in the verified-dataset column naming.
#[derive(Debug, Clone)]
pub struct FixtureRow {
    pub time_millis: Option<i64>,
    pub sampling_point: Option<&'static str>,
    pub pollutant: Option<i64>,
    pub value: Option<f64>,
    pub unit: Option<&'static str>,
}

impl FixtureRow {
    pub fn valid(time_millis: i64, sampling_point: &'static str, pollutant: i64) -> Self {
        Self {
            time_millis: Some(time_millis),
            sampling_point: Some(sampling_point),
            pollutant: Some(pollutant),
            value: Some(12.5),
            unit: Some("ug.m-3"),
        }
    }
}

/// Write a Parquet file using the `DatetimeBegin`/`SamplingPoint`/
/// `AirPollutantCode` naming generation.
pub fn write_fixture(path: &Path, rows: &[FixtureRow]) {
    let schema = Arc::new(Schema::new(vec![
        Field::new(
            "DatetimeBegin",
            DataType::Timestamp(TimeUnit::Millisecond, None),
            true,
        ),
        Field::new("SamplingPoint", DataType::Utf8, true),
        Field::new("AirPollutantCode", DataType::Int64, true),
        Field::new("Concentration", DataType::Float64, true),
        Field::new("UnitOfMeasurement", DataType::Utf8, true),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(TimestampMillisecondArray::from_iter(
                rows.iter().map(|r| r.time_millis),
            )),
            Arc::new(StringArray::from_iter(
                rows.iter().map(|r| r.sampling_point),
            )),
            Arc::new(Int64Array::from_iter(rows.iter().map(|r| r.pollutant))),
            Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.value))),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| r.unit))),
        ],
    )
    .expect("fixture batch");

    let file = File::create(path).expect("fixture file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("fixture writer");
    writer.write(&batch).expect("fixture write");
    writer.close().expect("fixture close");
}

/// Serve a router on an ephemeral local port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}
