//! Partition key derivation and Hive-style partition grouping
//!
//! Output layout: `{base}/year={year}/month={month}/part-{hash}.{ext}`

use crate::error::{ExportError, Result};
use crate::record::{Record, Value};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

pub const YEAR_COLUMN: &str = "year";
pub const MONTH_COLUMN: &str = "month";

/// Directory value used for null or empty partition values
pub const DEFAULT_PARTITION_VALUE: &str = "__HIVE_DEFAULT_PARTITION__";

/// Partition columns added by [`with_partition`], in path order
pub fn default_partition_fields() -> Vec<String> {
    vec![YEAR_COLUMN.to_string(), MONTH_COLUMN.to_string()]
}

/// Calendar partition of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub year: i32,
    /// 1-based month (January = 1)
    pub month: u32,
}

impl PartitionKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

/// Derive `(year, month)` from the timestamp column of a record.
///
/// The calendar fields are read in the timestamp's stored zone: naive
/// timestamps as-is, zoned timestamps in their own offset. No conversion to
/// the host zone or to UTC takes place.
pub fn derive_partition(record: &Record, timestamp_field: &str) -> Result<PartitionKey> {
    match record.get(timestamp_field) {
        None => Err(ExportError::schema_mismatch(
            timestamp_field,
            "timestamp column not present in record",
        )),
        Some(Value::Null) => Err(ExportError::null_timestamp(timestamp_field)),
        Some(Value::Timestamp(ts)) => Ok(PartitionKey::from_date(ts.date())),
        Some(Value::TimestampTz(ts)) => Ok(PartitionKey::from_date(ts.date_naive())),
        Some(Value::Date(date)) => Ok(PartitionKey::from_date(*date)),
        Some(Value::Text(text)) => parse_timestamp_text(text)
            .map(PartitionKey::from_date)
            .ok_or_else(|| {
                ExportError::schema_mismatch(
                    timestamp_field,
                    format!("'{}' is not a recognizable timestamp", text),
                )
            }),
        Some(other) => Err(ExportError::schema_mismatch(
            timestamp_field,
            format!("expected a timestamp, found {}", other.type_name()),
        )),
    }
}

fn parse_timestamp_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.date_naive());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Some(ts.date());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

/// Return the record with `year` and `month` integer columns set from `key`.
pub fn with_partition(record: Record, key: PartitionKey) -> Record {
    record
        .with_value(YEAR_COLUMN, Value::Int(i64::from(key.year)))
        .with_value(MONTH_COLUMN, Value::Int(i64::from(key.month)))
}

/// Ordered partition field values of one output directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionValues(Vec<(String, String)>);

impl PartitionValues {
    /// Read the partition fields of `record` in order.
    pub fn from_record(record: &Record, fields: &[String]) -> Result<Self> {
        let mut values = Vec::with_capacity(fields.len());
        for field in fields {
            let rendered = match record.get(field) {
                None => {
                    return Err(ExportError::schema_mismatch(
                        field.as_str(),
                        "partition column not present in record",
                    ))
                }
                Some(Value::Null) => DEFAULT_PARTITION_VALUE.to_string(),
                Some(value) => {
                    let text = value.to_string();
                    if text.is_empty() {
                        DEFAULT_PARTITION_VALUE.to_string()
                    } else {
                        text
                    }
                }
            };
            values.push((field.clone(), rendered));
        }
        Ok(Self(values))
    }

    pub fn values(&self) -> &[(String, String)] {
        &self.0
    }

    /// Relative directory path, e.g. `year=2025/month=1`
    pub fn path(&self) -> String {
        self.0
            .iter()
            .map(|(name, value)| format!("{}={}", escape_path_name(name), escape_path_name(value)))
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for PartitionValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl From<PartitionKey> for PartitionValues {
    fn from(key: PartitionKey) -> Self {
        Self(vec![
            (YEAR_COLUMN.to_string(), key.year.to_string()),
            (MONTH_COLUMN.to_string(), key.month.to_string()),
        ])
    }
}

/// Percent-encode characters that are unsafe inside a partition directory name
pub fn escape_path_name(name: &str) -> Cow<'_, str> {
    fn needs_escape(c: char) -> bool {
        matches!(
            c,
            '\u{01}'..='\u{1F}'
                | '"'
                | '#'
                | '%'
                | '\''
                | '*'
                | '/'
                | ':'
                | '='
                | '?'
                | '\\'
                | '\u{7F}'
                | '{'
                | '['
                | ']'
                | '^'
        )
    }

    if !name.chars().any(needs_escape) {
        return Cow::Borrowed(name);
    }

    let mut escaped = String::with_capacity(name.len() + 8);
    for c in name.chars() {
        if needs_escape(c) {
            escaped.push_str(&format!("%{:02X}", c as u32));
        } else {
            escaped.push(c);
        }
    }
    Cow::Owned(escaped)
}

/// Group records by their ordered partition field values.
///
/// Grouping is complete when this returns; record order within a group
/// follows input order.
pub fn group_by_partition<I>(
    records: I,
    fields: &[String],
) -> Result<BTreeMap<PartitionValues, Vec<Record>>>
where
    I: IntoIterator<Item = Record>,
{
    let mut groups: BTreeMap<PartitionValues, Vec<Record>> = BTreeMap::new();
    for record in records {
        let key = PartitionValues::from_record(&record, fields)?;
        groups.entry(key).or_default().push(record);
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn ts(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn derives_year_and_month_from_naive_timestamp() {
        let record = Record::new().with("start_date_time", ts(2025, 2, 5, 9));
        let key = derive_partition(&record, "start_date_time").unwrap();
        assert_eq!(key, PartitionKey { year: 2025, month: 2 });
    }

    #[test]
    fn zoned_timestamp_uses_its_own_offset() {
        // 2025-01-01 00:30 at +05:00 is still December in UTC.
        let offset = FixedOffset::east_opt(5 * 3600).unwrap();
        let value = offset.with_ymd_and_hms(2025, 1, 1, 0, 30, 0).unwrap();
        let record = Record::new().with("ts", value);

        let key = derive_partition(&record, "ts").unwrap();
        assert_eq!(key, PartitionKey { year: 2025, month: 1 });
    }

    #[test]
    fn text_timestamps_are_parsed() {
        for text in [
            "2025-03-04 10:11:12",
            "2025-03-04T10:11:12.123",
            "2025-03-04T10:11:12Z",
            "2025-03-04",
        ] {
            let record = Record::new().with("ts", text);
            let key = derive_partition(&record, "ts").unwrap();
            assert_eq!(key, PartitionKey { year: 2025, month: 3 }, "{}", text);
        }
    }

    #[test]
    fn null_timestamp_is_an_error() {
        let record = Record::new().with("ts", Value::Null);
        let err = derive_partition(&record, "ts").unwrap_err();
        assert!(matches!(err, ExportError::NullTimestamp { .. }));
    }

    #[test]
    fn missing_or_wrong_typed_column_is_schema_mismatch() {
        let record = Record::new().with("other", 1);
        assert!(matches!(
            derive_partition(&record, "ts").unwrap_err(),
            ExportError::SchemaMismatch { .. }
        ));

        let record = Record::new().with("ts", 42);
        assert!(matches!(
            derive_partition(&record, "ts").unwrap_err(),
            ExportError::SchemaMismatch { .. }
        ));
    }

    #[test]
    fn with_partition_appends_integer_columns() {
        let record = with_partition(Record::new().with("id", 1), PartitionKey::new(2025, 1).unwrap());
        assert_eq!(record.get("year"), Some(&Value::Int(2025)));
        assert_eq!(record.get("month"), Some(&Value::Int(1)));
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn partition_key_rejects_invalid_month() {
        assert!(PartitionKey::new(2025, 0).is_none());
        assert!(PartitionKey::new(2025, 13).is_none());
    }

    #[test]
    fn partition_path_is_unpadded_hive_layout() {
        let values = PartitionValues::from(PartitionKey::new(2025, 1).unwrap());
        assert_eq!(values.path(), "year=2025/month=1");
    }

    #[test]
    fn partition_values_escape_and_default() {
        let record = Record::new()
            .with("region", "eu/west")
            .with("tier", Value::Null);
        let fields = vec!["region".to_string(), "tier".to_string()];
        let values = PartitionValues::from_record(&record, &fields).unwrap();
        assert_eq!(
            values.path(),
            "region=eu%2Fwest/tier=__HIVE_DEFAULT_PARTITION__"
        );
    }

    #[test]
    fn grouping_is_complete_and_ordered() {
        let records = vec![
            Record::new().with("id", 1).with("year", 2025).with("month", 1),
            Record::new().with("id", 2).with("year", 2025).with("month", 2),
            Record::new().with("id", 3).with("year", 2025).with("month", 1),
        ];
        let groups = group_by_partition(records, &default_partition_fields()).unwrap();

        assert_eq!(groups.len(), 2);
        let jan = &groups[&PartitionValues::from(PartitionKey::new(2025, 1).unwrap())];
        let ids: Vec<_> = jan.iter().map(|r| r.get("id").cloned()).collect();
        assert_eq!(ids, vec![Some(Value::Int(1)), Some(Value::Int(3))]);
    }

    #[test]
    fn grouping_requires_partition_columns() {
        let records = vec![Record::new().with("id", 1)];
        let err = group_by_partition(records, &default_partition_fields()).unwrap_err();
        assert!(matches!(err, ExportError::SchemaMismatch { .. }));
    }
}
