//! Columnar parser: projects EEA Parquet files onto the normalized
//! measurement schema.
//!
//! Column resolution happens once per file against the variant table in
//! [`columns`]; row production is vectorized per Arrow record batch, with
//! the cast kernels doing type and timezone normalization column-wise
//! before any row is assembled.

mod columns;
mod projections;

pub use projections::{ReferenceProjection, SamplingPointRecord, StationRecord};

use std::fs::File;
use std::path::Path;

use arrow::array::{
    Array, ArrayRef, Float32Array, Float64Array, Int32Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::compute::{CastOptions, cast_with_options};
use arrow::datatypes::{DataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};

use crate::error::{IngestError, Result};
use crate::observation::Observation;
use columns::ColumnMap;

const BATCH_ROWS: usize = 8192;

/// Lazy row sequence over one locally-available Parquet file.
///
/// Iteration order is the file's row order; rows missing a required
/// field are dropped and counted in [`ObservationReader::skipped_rows`].
pub struct ObservationReader {
    reader: ParquetRecordBatchReader,
    columns: ColumnMap,
    pending: std::vec::IntoIter<Observation>,
    skipped: u64,
}

impl std::fmt::Debug for ObservationReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationReader")
            .field("columns", &self.columns)
            .field("skipped", &self.skipped)
            .finish()
    }
}

impl ObservationReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| IngestError::Parse(format!("{}: {e}", path.display())))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| IngestError::Parse(format!("{}: {e}", path.display())))?;

        let columns = ColumnMap::resolve(builder.schema())?;
        let reader = builder
            .with_batch_size(BATCH_ROWS)
            .build()
            .map_err(|e| IngestError::Parse(format!("{}: {e}", path.display())))?;

        Ok(Self {
            reader,
            columns,
            pending: Vec::new().into_iter(),
            skipped: 0,
        })
    }

    /// Rows dropped so far because a required field was null or
    /// unparseable.
    pub fn skipped_rows(&self) -> u64 {
        self.skipped
    }

    fn refill(&mut self) -> Result<bool> {
        match self.reader.next() {
            Some(Ok(batch)) => {
                let rows = self.decode(&batch)?;
                self.pending = rows.into_iter();
                Ok(true)
            }
            Some(Err(e)) => Err(IngestError::Parse(format!("record batch read failed: {e}"))),
            None => Ok(false),
        }
    }

    fn decode(&mut self, batch: &RecordBatch) -> Result<Vec<Observation>> {
        let map = &self.columns;

        let time = utc_timestamps(batch.column(map.time))?;
        let sampling_point = strings(batch.column(map.sampling_point))?;
        let pollutant = pollutant_codes(batch.column(map.pollutant))?;

        let value = map.value.map(|i| doubles(batch.column(i))).transpose()?;
        let unit = map.unit.map(|i| strings(batch.column(i))).transpose()?;
        let aggregation_type = map
            .aggregation_type
            .map(|i| strings(batch.column(i)))
            .transpose()?;
        let validity = map.validity.map(|i| ints(batch.column(i))).transpose()?;
        let verification = map
            .verification
            .map(|i| ints(batch.column(i)))
            .transpose()?;
        let data_capture = map
            .data_capture
            .map(|i| floats(batch.column(i)))
            .transpose()?;
        let result_time = map
            .result_time
            .map(|i| utc_timestamps(batch.column(i)))
            .transpose()?;
        let observation_id = map
            .observation_id
            .map(|i| strings(batch.column(i)))
            .transpose()?;

        let mut rows = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            if time.is_null(i) || sampling_point.is_null(i) || pollutant.is_null(i) {
                self.skipped += 1;
                continue;
            }

            let Some(time) = DateTime::from_timestamp_micros(time.value(i)) else {
                self.skipped += 1;
                continue;
            };

            rows.push(Observation {
                time,
                sampling_point_id: sampling_point.value(i).to_string(),
                pollutant_code: pollutant.value(i),
                value: opt_double(&value, i),
                unit: opt_string(&unit, i),
                aggregation_type: opt_string(&aggregation_type, i),
                validity: opt_int(&validity, i),
                verification: opt_int(&verification, i),
                data_capture: opt_float(&data_capture, i),
                result_time: result_time
                    .as_ref()
                    .filter(|col| !col.is_null(i))
                    .and_then(|col| DateTime::from_timestamp_micros(col.value(i))),
                observation_id: opt_string(&observation_id, i),
            });
        }

        Ok(rows)
    }
}

impl Iterator for ObservationReader {
    type Item = Result<Observation>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.next() {
                return Some(Ok(row));
            }
            match self.refill() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

fn utc_micros() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

/// Normalize a column to microsecond timestamps in UTC. Naive source
/// timestamps are re-tagged as UTC without shifting; zoned ones convert
/// to UTC; string columns are parsed, unparseable entries becoming null.
fn utc_timestamps(col: &ArrayRef) -> Result<TimestampMicrosecondArray> {
    downcast(normalize(col, &utc_micros())?)
}

fn strings(col: &ArrayRef) -> Result<StringArray> {
    downcast(normalize(col, &DataType::Utf8)?)
}

fn ints(col: &ArrayRef) -> Result<Int32Array> {
    downcast(normalize(col, &DataType::Int32)?)
}

fn doubles(col: &ArrayRef) -> Result<Float64Array> {
    downcast(normalize(col, &DataType::Float64)?)
}

fn floats(col: &ArrayRef) -> Result<Float32Array> {
    downcast(normalize(col, &DataType::Float32)?)
}

/// Pollutant columns are integer codes in the verified datasets but may
/// be vocabulary strings (or stringified codes) in the up-to-date feed;
/// for string columns the trailing path segment carries the code.
fn pollutant_codes(col: &ArrayRef) -> Result<Int32Array> {
    match col.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View | DataType::Dictionary(_, _) => {
            let raw = strings(col)?;
            Ok(raw.iter().map(|v| v.and_then(parse_pollutant)).collect())
        }
        _ => ints(col),
    }
}

fn parse_pollutant(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    raw.parse()
        .ok()
        .or_else(|| raw.rsplit('/').next()?.trim().parse().ok())
}

fn normalize(col: &ArrayRef, to: &DataType) -> Result<ArrayRef> {
    if col.data_type() == to {
        return Ok(col.clone());
    }
    cast_with_options(col.as_ref(), to, &CastOptions::default())
        .map_err(|e| IngestError::Parse(format!("column cast to {to} failed: {e}")))
}

fn downcast<T: Array + Clone + 'static>(col: ArrayRef) -> Result<T> {
    col.as_any()
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| IngestError::Parse("unexpected column layout after cast".to_string()))
}

fn opt_string(col: &Option<StringArray>, i: usize) -> Option<String> {
    col.as_ref()
        .filter(|c| !c.is_null(i))
        .map(|c| c.value(i).to_string())
}

fn opt_int(col: &Option<Int32Array>, i: usize) -> Option<i32> {
    col.as_ref().filter(|c| !c.is_null(i)).map(|c| c.value(i))
}

fn opt_double(col: &Option<Float64Array>, i: usize) -> Option<f64> {
    col.as_ref().filter(|c| !c.is_null(i)).map(|c| c.value(i))
}

fn opt_float(col: &Option<Float32Array>, i: usize) -> Option<f32> {
    col.as_ref().filter(|c| !c.is_null(i)).map(|c| c.value(i))
}
