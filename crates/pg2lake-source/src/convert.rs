// Row to Record conversion.
//
// Supported column types: bool, int2/4/8, float4/8, text/varchar/bpchar/name,
// date, timestamp, timestamptz, json/jsonb and uuid (as text), and 1-D arrays
// of bool, integer, float and text types. Anything else is selected as
// `::text` before it reaches this module.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use pg2lake_core::{ExportError, Record, Result, Value};
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::Row;

pub(crate) fn row_to_record(row: &Row) -> Result<Record> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let value = cell(row, idx, column.type_()).map_err(|message| {
                ExportError::query(format!("column '{}': {}", column.name(), message))
            })?;
            Ok((column.name().to_string(), value))
        })
        .collect()
}

fn cell(row: &Row, idx: usize, ty: &Type) -> std::result::Result<Value, String> {
    match *ty {
        Type::BOOL => scalar::<bool>(row, idx),
        Type::INT2 => Ok(get::<i16>(row, idx)?.map(i64::from).into()),
        Type::INT4 => Ok(get::<i32>(row, idx)?.map(i64::from).into()),
        Type::INT8 => scalar::<i64>(row, idx),
        Type::FLOAT4 => Ok(get::<f32>(row, idx)?.map(f64::from).into()),
        Type::FLOAT8 => scalar::<f64>(row, idx),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => scalar::<String>(row, idx),
        Type::DATE => scalar::<NaiveDate>(row, idx),
        Type::TIMESTAMP => scalar::<NaiveDateTime>(row, idx),
        Type::TIMESTAMPTZ => scalar::<DateTime<FixedOffset>>(row, idx),
        Type::JSON | Type::JSONB => {
            Ok(get::<serde_json::Value>(row, idx)?.map(|v| v.to_string()).into())
        }
        Type::UUID => Ok(get::<uuid::Uuid>(row, idx)?.map(|v| v.to_string()).into()),
        Type::BOOL_ARRAY => array::<bool>(row, idx),
        Type::INT2_ARRAY => Ok(map_array(get::<Vec<Option<i16>>>(row, idx)?, i64::from)),
        Type::INT4_ARRAY => Ok(map_array(get::<Vec<Option<i32>>>(row, idx)?, i64::from)),
        Type::INT8_ARRAY => array::<i64>(row, idx),
        Type::FLOAT4_ARRAY => Ok(map_array(get::<Vec<Option<f32>>>(row, idx)?, f64::from)),
        Type::FLOAT8_ARRAY => array::<f64>(row, idx),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::BPCHAR_ARRAY => array::<String>(row, idx),
        _ => Err(format!("unsupported column type '{}'", ty.name())),
    }
}

/// Whether `cell` decodes this type without a text cast
pub(crate) fn decodes_natively(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::BOOL
            | Type::INT2
            | Type::INT4
            | Type::INT8
            | Type::FLOAT4
            | Type::FLOAT8
            | Type::TEXT
            | Type::VARCHAR
            | Type::BPCHAR
            | Type::NAME
            | Type::DATE
            | Type::TIMESTAMP
            | Type::TIMESTAMPTZ
            | Type::JSON
            | Type::JSONB
            | Type::UUID
            | Type::BOOL_ARRAY
            | Type::INT2_ARRAY
            | Type::INT4_ARRAY
            | Type::INT8_ARRAY
            | Type::FLOAT4_ARRAY
            | Type::FLOAT8_ARRAY
            | Type::TEXT_ARRAY
            | Type::VARCHAR_ARRAY
            | Type::BPCHAR_ARRAY
    )
}

fn get<'a, T>(row: &'a Row, idx: usize) -> std::result::Result<Option<T>, String>
where
    T: FromSql<'a>,
{
    row.try_get::<_, Option<T>>(idx).map_err(|e| e.to_string())
}

fn scalar<'a, T>(row: &'a Row, idx: usize) -> std::result::Result<Value, String>
where
    T: FromSql<'a> + Into<Value>,
{
    Ok(get::<T>(row, idx)?.into())
}

fn array<'a, T>(row: &'a Row, idx: usize) -> std::result::Result<Value, String>
where
    T: FromSql<'a> + Into<Value>,
{
    Ok(map_array(get::<Vec<Option<T>>>(row, idx)?, |v| v))
}

fn map_array<T, U, F>(items: Option<Vec<Option<T>>>, f: F) -> Value
where
    U: Into<Value>,
    F: Fn(T) -> U,
{
    match items {
        None => Value::Null,
        Some(items) => Value::List(
            items
                .into_iter()
                .map(|item| item.map(&f).into())
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrays_keep_null_elements_in_place() {
        let value = map_array(Some(vec![Some(1i32), None, Some(3)]), i64::from);
        assert_eq!(
            value,
            Value::List(vec![Value::Int(1), Value::Null, Value::Int(3)])
        );
        assert_eq!(map_array::<i32, i64, _>(None, i64::from), Value::Null);
    }

    #[test]
    fn exotic_types_need_a_text_cast() {
        for ty in [Type::INT8, Type::TIMESTAMPTZ, Type::JSONB, Type::TEXT_ARRAY] {
            assert!(decodes_natively(&ty), "{}", ty.name());
        }
        for ty in [
            Type::NUMERIC,
            Type::TIME,
            Type::INTERVAL,
            Type::BYTEA,
            Type::INET,
            Type::TIMESTAMP_ARRAY,
            Type::NUMERIC_ARRAY,
        ] {
            assert!(!decodes_natively(&ty), "{}", ty.name());
        }
    }
}
