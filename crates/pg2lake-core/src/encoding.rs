//! Arrow conversion and file encoding for partition output.

use crate::error::{ExportError, Result};
use crate::record::{Record, Value};
use arrow::array::{
    ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, RecordBatch,
    RecordBatchOptions, StringArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use chrono::Datelike;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// Days between 0001-01-01 (CE day 1) and 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Zoned timestamps are stored as UTC instants
const UTC_OFFSET: &str = "+00:00";

/// File format of partition output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "parquet" => Ok(OutputFormat::Parquet),
            _ => Err(ExportError::invalid_config(format!(
                "Unsupported output format: {}. Supported: csv, parquet",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Int,
    Float,
    Text,
    Date,
    Timestamp,
    TimestampTz,
}

impl ColumnKind {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Self::Bool),
            Value::Int(_) => Some(Self::Int),
            Value::Float(_) => Some(Self::Float),
            Value::Text(_) | Value::List(_) => Some(Self::Text),
            Value::Date(_) => Some(Self::Date),
            Value::Timestamp(_) => Some(Self::Timestamp),
            Value::TimestampTz(_) => Some(Self::TimestampTz),
        }
    }

    /// Widen two observed kinds to one column type
    fn unify(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => Self::Float,
            _ => Self::Text,
        }
    }

    fn data_type(self) -> DataType {
        match self {
            Self::Bool => DataType::Boolean,
            Self::Int => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Text => DataType::Utf8,
            Self::Date => DataType::Date32,
            Self::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
            Self::TimestampTz => {
                DataType::Timestamp(TimeUnit::Microsecond, Some(UTC_OFFSET.into()))
            }
        }
    }

    fn from_data_type(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::Boolean => Some(Self::Bool),
            DataType::Int64 => Some(Self::Int),
            DataType::Float64 => Some(Self::Float),
            DataType::Utf8 => Some(Self::Text),
            DataType::Date32 => Some(Self::Date),
            DataType::Timestamp(TimeUnit::Microsecond, None) => Some(Self::Timestamp),
            DataType::Timestamp(TimeUnit::Microsecond, Some(_)) => Some(Self::TimestampTz),
            _ => None,
        }
    }
}

/// Infer one Arrow schema over `records`, leaving out `excluded` columns.
///
/// Columns appear in first-seen order. Each column takes the type of its
/// non-null values; mixed integer/float columns widen to float and any other
/// mix falls back to text. All-null columns are text.
pub fn infer_schema(records: &[Record], excluded: &[String]) -> SchemaRef {
    let mut columns: Vec<(&str, Option<ColumnKind>)> = Vec::new();
    for record in records {
        for (name, value) in record.iter() {
            if excluded.iter().any(|e| e == name) {
                continue;
            }
            let kind = ColumnKind::of(value);
            match columns.iter_mut().find(|(seen, _)| *seen == name) {
                Some((_, current)) => {
                    *current = match (*current, kind) {
                        (Some(a), Some(b)) => Some(a.unify(b)),
                        (a, b) => a.or(b),
                    }
                }
                None => columns.push((name, kind)),
            }
        }
    }

    let fields: Vec<Field> = columns
        .into_iter()
        .map(|(name, kind)| Field::new(name, kind.unwrap_or(ColumnKind::Text).data_type(), true))
        .collect();
    Arc::new(Schema::new(fields))
}

/// Build an Arrow batch with [`infer_schema`] over these records alone.
pub fn records_to_batch(records: &[Record], excluded: &[String]) -> Result<RecordBatch> {
    records_to_batch_with_schema(records, &infer_schema(records, excluded))
}

/// Build an Arrow batch shaped by `schema`.
///
/// Columns absent from a record are null. Every file of one write shares the
/// schema it was given, whatever values its own rows hold.
pub fn records_to_batch_with_schema(records: &[Record], schema: &SchemaRef) -> Result<RecordBatch> {
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let kind = ColumnKind::from_data_type(field.data_type()).ok_or_else(|| {
            ExportError::schema_mismatch(
                field.name().as_str(),
                format!("unsupported column type {}", field.data_type()),
            )
        })?;
        let cells: Vec<&Value> = records
            .iter()
            .map(|r| r.get(field.name()).unwrap_or(&Value::Null))
            .collect();
        columns.push(build_column(kind, &cells));
    }

    let options = RecordBatchOptions::new().with_row_count(Some(records.len()));
    RecordBatch::try_new_with_options(schema.clone(), columns, &options)
        .map_err(|e| ExportError::write(None, format!("Failed to build Arrow batch: {}", e)))
}

fn build_column(kind: ColumnKind, cells: &[&Value]) -> ArrayRef {
    match kind {
        ColumnKind::Bool => Arc::new(BooleanArray::from(
            cells
                .iter()
                .map(|v| match v {
                    Value::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        ColumnKind::Int => Arc::new(Int64Array::from(
            cells
                .iter()
                .map(|v| match v {
                    Value::Int(n) => Some(*n),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        ColumnKind::Float => Arc::new(Float64Array::from(
            cells
                .iter()
                .map(|v| match v {
                    Value::Float(n) => Some(*n),
                    Value::Int(n) => Some(*n as f64),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        ColumnKind::Date => Arc::new(Date32Array::from(
            cells
                .iter()
                .map(|v| match v {
                    Value::Date(d) => Some(d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        ColumnKind::Timestamp => Arc::new(TimestampMicrosecondArray::from(
            cells
                .iter()
                .map(|v| match v {
                    Value::Timestamp(ts) => Some(ts.and_utc().timestamp_micros()),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        ColumnKind::TimestampTz => Arc::new(
            TimestampMicrosecondArray::from(
                cells
                    .iter()
                    .map(|v| match v {
                        Value::TimestampTz(ts) => Some(ts.timestamp_micros()),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )
            .with_timezone(UTC_OFFSET),
        ),
        ColumnKind::Text => Arc::new(StringArray::from(
            cells
                .iter()
                .map(|v| match v {
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect::<Vec<_>>(),
        )),
    }
}

/// Encode a batch in the given format. `header` applies to CSV only.
pub fn encode_batch(batch: &RecordBatch, format: OutputFormat, header: bool) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Csv => encode_csv(batch, header),
        OutputFormat::Parquet => encode_parquet(batch),
    }
}

fn encode_csv(batch: &RecordBatch, header: bool) -> Result<Vec<u8>> {
    let mut writer = arrow::csv::WriterBuilder::new()
        .with_header(header)
        .build(Vec::new());
    writer
        .write(batch)
        .map_err(|e| ExportError::write(None, format!("Failed to encode CSV: {}", e)))?;
    Ok(writer.into_inner())
}

fn encode_parquet(batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(writer_properties().clone()))
        .map_err(|e| ExportError::write(None, format!("Failed to create Parquet writer: {}", e)))?;
    writer
        .write(batch)
        .map_err(|e| ExportError::write(None, format!("Failed to encode Parquet: {}", e)))?;
    writer
        .close()
        .map_err(|e| ExportError::write(None, format!("Failed to finish Parquet file: {}", e)))?;
    Ok(buffer)
}

/// Get shared writer properties (cached)
///
/// - Snappy compression
/// - Dictionary encoding enabled
/// - 32k rows per group
/// - pg2lake version metadata embedded in file
pub(crate) fn writer_properties() -> &'static WriterProperties {
    static PROPERTIES: OnceLock<WriterProperties> = OnceLock::new();
    PROPERTIES.get_or_init(|| {
        let metadata = vec![KeyValue {
            key: "pg2lake.version".to_string(),
            value: Some(env!("CARGO_PKG_VERSION").to_string()),
        }];

        WriterProperties::builder()
            .set_dictionary_enabled(true)
            .set_statistics_enabled(EnabledStatistics::Page)
            .set_compression(Compression::SNAPPY)
            .set_data_page_size_limit(256 * 1024)
            .set_write_batch_size(32 * 1024)
            .set_max_row_group_size(32 * 1024)
            .set_dictionary_page_size_limit(128 * 1024)
            .set_key_value_metadata(Some(metadata))
            .build()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> Vec<Record> {
        let ts = NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        vec![
            Record::new()
                .with("id", 1)
                .with("score", 1.5)
                .with("start_date_time", ts)
                .with("questions_list", "x,y")
                .with("year", 2025)
                .with("month", 1),
            Record::new()
                .with("id", 2)
                .with("score", 3)
                .with("start_date_time", Value::Null)
                .with("questions_list", Value::Null)
                .with("year", 2025)
                .with("month", 1),
        ]
    }

    #[test]
    fn batch_excludes_partition_columns_and_infers_types() {
        let excluded = vec!["year".to_string(), "month".to_string()];
        let batch = records_to_batch(&sample(), &excluded).unwrap();

        assert_eq!(batch.num_rows(), 2);
        let schema = batch.schema();
        let names: Vec<_> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["id", "score", "start_date_time", "questions_list"]);
        assert_eq!(schema.field(0).data_type(), &DataType::Int64);
        assert_eq!(schema.field(1).data_type(), &DataType::Float64);
        assert_eq!(
            schema.field(2).data_type(),
            &DataType::Timestamp(TimeUnit::Microsecond, None)
        );
        assert_eq!(schema.field(3).data_type(), &DataType::Utf8);
    }

    #[test]
    fn csv_has_single_header_row() {
        let batch = records_to_batch(&sample(), &[]).unwrap();
        let bytes = encode_batch(&batch, OutputFormat::Csv, true).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,score,start_date_time,questions_list"));
        assert!(lines[1].contains("\"x,y\""));
    }

    #[test]
    fn csv_without_header() {
        let batch = records_to_batch(&sample(), &[]).unwrap();
        let bytes = encode_batch(&batch, OutputFormat::Csv, false).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap().lines().count(), 2);
    }

    #[test]
    fn parquet_output_has_magic_bytes() {
        let batch = records_to_batch(&sample(), &[]).unwrap();
        let bytes = encode_batch(&batch, OutputFormat::Parquet, true).unwrap();
        assert_eq!(&bytes[0..4], b"PAR1");
    }

    #[test]
    fn mixed_types_fall_back_to_text() {
        let records = vec![
            Record::new().with("v", true),
            Record::new().with("v", "maybe"),
        ];
        let batch = records_to_batch(&records, &[]).unwrap();
        assert_eq!(batch.schema().field(0).data_type(), &DataType::Utf8);
    }

    #[test]
    fn shared_schema_keeps_column_types_across_groups() {
        let january = vec![Record::new().with("id", 1).with_value("score", Value::Null)];
        let february = vec![Record::new().with("id", 2).with("score", 7)];
        let march = vec![Record::new().with("id", 3).with("score", 1.5)];
        let all: Vec<Record> = january
            .iter()
            .chain(&february)
            .chain(&march)
            .cloned()
            .collect();

        let schema = infer_schema(&all, &[]);
        assert_eq!(schema.field(1).data_type(), &DataType::Float64);

        for group in [&january, &february, &march] {
            let batch = records_to_batch_with_schema(group, &schema).unwrap();
            assert_eq!(batch.schema(), schema);
        }
    }

    #[test]
    fn missing_columns_are_null_under_shared_schema() {
        let schema = infer_schema(
            &[Record::new().with("id", 1).with("note", "late")],
            &[],
        );
        let batch = records_to_batch_with_schema(&[Record::new().with("id", 2)], &schema).unwrap();
        assert_eq!(batch.num_columns(), 2);
        assert_eq!(batch.column(1).null_count(), 1);
    }

    #[test]
    fn format_from_str() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("parquet".parse::<OutputFormat>().unwrap(), OutputFormat::Parquet);
        assert!("avro".parse::<OutputFormat>().is_err());
    }
}
