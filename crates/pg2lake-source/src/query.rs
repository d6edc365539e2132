use pg2lake_core::{ExportError, Result};
use pg_escape::quote_identifier;
use std::fmt;

/// What to extract
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceQuery {
    /// A table, optionally schema-qualified (`public.mockrecord`)
    Table(String),
    /// Raw SQL, passed through unchanged
    Sql(String),
}

impl SourceQuery {
    /// SQL statement for this reference. Table name parts are identifier-quoted.
    pub fn to_sql(&self) -> Result<String> {
        match self {
            SourceQuery::Table(name) => {
                let parts: Vec<&str> = name.trim().split('.').collect();
                if parts.len() > 2 || parts.iter().any(|p| p.trim().is_empty()) {
                    return Err(ExportError::query(format!(
                        "malformed table reference '{}': expected 'table' or 'schema.table'",
                        name
                    )));
                }
                let quoted: Vec<String> = parts
                    .iter()
                    .map(|p| quote_identifier(p.trim()).into_owned())
                    .collect();
                Ok(format!("SELECT * FROM {}", quoted.join(".")))
            }
            SourceQuery::Sql(sql) => {
                let sql = sql.trim();
                if sql.is_empty() {
                    return Err(ExportError::query("query must not be empty"));
                }
                Ok(sql.to_string())
            }
        }
    }
}

/// Wrap `inner_sql` so every column flagged `true` is selected as text.
///
/// Columns keep their names and order.
pub(crate) fn text_cast_projection(inner_sql: &str, columns: &[(String, bool)]) -> String {
    let projection: Vec<String> = columns
        .iter()
        .map(|(name, cast)| {
            let ident = quote_identifier(name);
            if *cast {
                format!("{ident}::text AS {ident}")
            } else {
                ident.into_owned()
            }
        })
        .collect();
    format!(
        "SELECT {} FROM ({}) AS pg2lake_src",
        projection.join(", "),
        inner_sql.trim().trim_end_matches(';')
    )
}

impl fmt::Display for SourceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceQuery::Table(name) => write!(f, "table {}", name),
            SourceQuery::Sql(_) => f.write_str("custom query"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_schema_qualified_tables() {
        let sql = SourceQuery::Table("public.mockrecord".into()).to_sql().unwrap();
        assert_eq!(sql, "SELECT * FROM public.mockrecord");

        let sql = SourceQuery::Table("Sales.Order Items".into()).to_sql().unwrap();
        assert_eq!(sql, "SELECT * FROM \"Sales\".\"Order Items\"");
    }

    #[test]
    fn malformed_references_are_query_errors() {
        for name in ["", "public.", ".t", "a.b.c"] {
            let err = SourceQuery::Table(name.into()).to_sql().unwrap_err();
            assert!(matches!(err, ExportError::Query { .. }), "{}", name);
        }
        assert!(SourceQuery::Sql("   ".into()).to_sql().is_err());
    }

    #[test]
    fn raw_sql_passes_through() {
        let sql = SourceQuery::Sql(" select id from t where id > 3 ".into())
            .to_sql()
            .unwrap();
        assert_eq!(sql, "select id from t where id > 3");
    }

    #[test]
    fn text_cast_wraps_only_flagged_columns() {
        let columns = vec![
            ("id".to_string(), false),
            ("amount".to_string(), true),
            ("Opened At".to_string(), true),
        ];
        let sql = text_cast_projection("SELECT * FROM public.ledger;", &columns);
        assert_eq!(
            sql,
            "SELECT id, amount::text AS amount, \"Opened At\"::text AS \"Opened At\" \
             FROM (SELECT * FROM public.ledger) AS pg2lake_src"
        );
    }
}
