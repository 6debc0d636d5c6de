use chrono::{DateTime, Utc};

use crate::observation::Observation;

/// Column order of `airquality.measurements`, shared by every COPY
/// statement and by the tuple encoder below. The binary frames must
/// match this order exactly.
pub(crate) const MEASUREMENT_COLUMNS: &str = "time, sampling_point_id, pollutant_code, value, \
     unit, aggregation_type, validity, verification, \
     data_capture, result_time, observation_id";

const FIELD_COUNT: i16 = 11;

/// Microseconds between the Unix epoch and the Postgres timestamp epoch
/// (2000-01-01T00:00:00Z).
const PG_EPOCH_MICROS: i64 = 946_684_800_000_000;

/// Encoder for the PGCOPY binary format (`COPY ... WITH (FORMAT binary)`).
///
/// One buffer frames one copy batch: signature header, one
/// length-prefixed tuple per row, and the end-of-data trailer. Nulls use
/// the protocol's -1 length sentinel; timestamps are transmitted as
/// microseconds since the Postgres epoch, which the server reads back as
/// `timestamptz` in UTC.
#[derive(Debug)]
pub struct CopyBuffer {
    buf: Vec<u8>,
    rows: usize,
}

impl CopyBuffer {
    pub fn new() -> Self {
        let mut buf = Vec::with_capacity(64 * 1024);
        // Signature, flags, header-extension length.
        buf.extend_from_slice(b"PGCOPY\n\xFF\r\n\0");
        buf.extend_from_slice(&0_i32.to_be_bytes());
        buf.extend_from_slice(&0_i32.to_be_bytes());
        Self { buf, rows: 0 }
    }

    pub fn with_capacity_rows(rows: usize) -> Self {
        let mut out = Self::new();
        // ~64 bytes per encoded row for typical EEA data.
        out.buf.reserve(rows.saturating_mul(64));
        out
    }

    pub fn push(&mut self, row: &Observation) {
        self.put_i16(FIELD_COUNT);

        self.put_timestamptz(row.time);
        self.put_text(&row.sampling_point_id);
        self.put_int4(row.pollutant_code);
        self.put_opt_float8(row.value);
        self.put_opt_text(row.unit.as_deref());
        self.put_opt_text(row.aggregation_type.as_deref());
        self.put_opt_int4(row.validity);
        self.put_opt_int4(row.verification);
        self.put_opt_float4(row.data_capture);
        self.put_opt_timestamptz(row.result_time);
        self.put_opt_text(row.observation_id.as_deref());

        self.rows += 1;
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.put_i16(-1);
        self.buf
    }

    fn put_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn put_null(&mut self) {
        self.put_i32(-1);
    }

    fn put_timestamptz(&mut self, t: DateTime<Utc>) {
        self.put_i32(8);
        self.buf
            .extend_from_slice(&(t.timestamp_micros() - PG_EPOCH_MICROS).to_be_bytes());
    }

    fn put_opt_timestamptz(&mut self, t: Option<DateTime<Utc>>) {
        match t {
            Some(t) => self.put_timestamptz(t),
            None => self.put_null(),
        }
    }

    fn put_text(&mut self, s: &str) {
        self.put_i32(s.len() as i32);
        self.buf.extend_from_slice(s.as_bytes());
    }

    fn put_opt_text(&mut self, s: Option<&str>) {
        match s {
            Some(s) => self.put_text(s),
            None => self.put_null(),
        }
    }

    fn put_int4(&mut self, v: i32) {
        self.put_i32(4);
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn put_opt_int4(&mut self, v: Option<i32>) {
        match v {
            Some(v) => self.put_int4(v),
            None => self.put_null(),
        }
    }

    fn put_opt_float8(&mut self, v: Option<f64>) {
        match v {
            Some(v) => {
                self.put_i32(8);
                self.buf.extend_from_slice(&v.to_be_bytes());
            }
            None => self.put_null(),
        }
    }

    fn put_opt_float4(&mut self, v: Option<f32>) {
        match v {
            Some(v) => {
                self.put_i32(4);
                self.buf.extend_from_slice(&v.to_be_bytes());
            }
            None => self.put_null(),
        }
    }
}

impl Default for CopyBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const HEADER_LEN: usize = 11 + 4 + 4;

    fn sample_row() -> Observation {
        Observation {
            time: Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
            sampling_point_id: "PT/SPO-PT02022_00008_100".to_string(),
            pollutant_code: 8,
            value: Some(41.5),
            unit: Some("ug.m-3".to_string()),
            aggregation_type: Some("hour".to_string()),
            validity: Some(1),
            verification: Some(2),
            data_capture: None,
            result_time: None,
            observation_id: None,
        }
    }

    #[test]
    fn header_matches_the_pgcopy_signature() {
        let bytes = CopyBuffer::new().finish();
        assert_eq!(&bytes[..11], b"PGCOPY\n\xFF\r\n\0");
        assert_eq!(&bytes[11..15], &0_i32.to_be_bytes());
        assert_eq!(&bytes[15..19], &0_i32.to_be_bytes());
        // Empty buffer is header plus the -1 trailer.
        assert_eq!(&bytes[HEADER_LEN..], &(-1_i16).to_be_bytes());
    }

    #[test]
    fn postgres_epoch_encodes_as_zero_microseconds() {
        let mut buf = CopyBuffer::new();
        buf.push(&sample_row());
        let bytes = buf.finish();

        // field count, then the first field: length 8, value 0.
        let tuple = &bytes[HEADER_LEN..];
        assert_eq!(&tuple[..2], &11_i16.to_be_bytes());
        assert_eq!(&tuple[2..6], &8_i32.to_be_bytes());
        assert_eq!(&tuple[6..14], &0_i64.to_be_bytes());
    }

    #[test]
    fn text_fields_carry_their_exact_byte_length() {
        let mut buf = CopyBuffer::new();
        buf.push(&sample_row());
        let bytes = buf.finish();

        let id = "PT/SPO-PT02022_00008_100";
        let tuple = &bytes[HEADER_LEN..];
        // Skip field count and the timestamp field.
        let sp = &tuple[14..];
        assert_eq!(&sp[..4], &(id.len() as i32).to_be_bytes());
        assert_eq!(&sp[4..4 + id.len()], id.as_bytes());
    }

    #[test]
    fn nulls_use_the_minus_one_sentinel() {
        let mut buf = CopyBuffer::new();
        let mut row = sample_row();
        row.value = None;
        row.unit = None;
        row.aggregation_type = None;
        row.validity = None;
        row.verification = None;
        buf.push(&row);
        let bytes = buf.finish();

        let null_count = bytes
            .windows(4)
            .filter(|w| *w == (-1_i32).to_be_bytes())
            .count();
        // value, unit, aggregation_type, validity, verification,
        // data_capture, result_time, observation_id are null; the
        // trailing -1_i16 is not a full 4-byte match on its own but the
        // final null field's sentinel is adjacent to it.
        assert!(null_count >= 8);
    }

    #[test]
    fn each_row_adds_exactly_one_tuple() {
        let mut buf = CopyBuffer::new();
        buf.push(&sample_row());
        buf.push(&sample_row());
        assert_eq!(buf.rows(), 2);

        let bytes = buf.finish();
        let tuple_starts = bytes[HEADER_LEN..]
            .windows(2)
            .filter(|w| *w == 11_i16.to_be_bytes())
            .count();
        assert!(tuple_starts >= 2);
    }

    #[test]
    fn arbitrary_timestamps_round_trip_through_the_epoch_shift() {
        let t = Utc.with_ymd_and_hms(2023, 6, 15, 12, 30, 45).unwrap();
        let micros = t.timestamp_micros() - PG_EPOCH_MICROS;
        let back = chrono::DateTime::from_timestamp_micros(micros + PG_EPOCH_MICROS).unwrap();
        assert_eq!(back, t);
    }
}
