use crate::connection::ConnectionSpec;
use crate::convert::{decodes_natively, row_to_record};
use crate::query::{text_cast_projection, SourceQuery};
use crate::{RecordSource, RecordStream};
use async_trait::async_trait;
use futures::StreamExt;
use pg2lake_core::{ExportError, Result};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config as PgConfig, NoTls};
use tracing::{debug, info, warn};

/// Session settings for [`PostgresSource::connect`]
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    pub connect_timeout: Duration,
    pub application_name: String,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            application_name: "pg2lake".to_string(),
        }
    }
}

/// PostgreSQL record source
///
/// Owns the client and the background connection task. Dropping the source
/// aborts the task and closes the connection.
pub struct PostgresSource {
    client: Client,
    target: String,
    connection: JoinHandle<()>,
}

impl PostgresSource {
    /// Open a session; fails with `Connection` on network or auth errors.
    pub async fn connect(spec: &ConnectionSpec, options: &PostgresOptions) -> Result<Self> {
        let target = spec.url();

        let mut pg = PgConfig::new();
        pg.host(&spec.host);
        pg.port(spec.port);
        pg.user(&spec.user);
        if !spec.password.is_empty() {
            pg.password(&spec.password);
        }
        pg.dbname(&spec.database);
        pg.connect_timeout(options.connect_timeout);
        pg.application_name(&options.application_name);

        let (client, connection) = pg
            .connect(NoTls)
            .await
            .map_err(|e| ExportError::connection(target.as_str(), e.to_string()))?;

        let log_target = target.clone();
        let connection = tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(target = %log_target, error = %e, "PostgreSQL connection error");
            }
        });

        info!(target = %target, "Connected to PostgreSQL");
        Ok(Self {
            client,
            target,
            connection,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn map_error(&self, e: tokio_postgres::Error) -> ExportError {
        if e.as_db_error().is_some() {
            ExportError::query(e.to_string())
        } else {
            ExportError::connection(self.target.as_str(), e.to_string())
        }
    }
}

#[async_trait]
impl RecordSource for PostgresSource {
    async fn extract(&self, query: &SourceQuery) -> Result<RecordStream> {
        let sql = query.to_sql()?;
        debug!(target = %self.target, source = %query, "Starting extract");

        let mut statement = self
            .client
            .prepare(&sql)
            .await
            .map_err(|e| self.map_error(e))?;

        let columns: Vec<(String, bool)> = statement
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), !decodes_natively(c.type_())))
            .collect();
        if columns.iter().any(|(_, cast)| *cast) {
            let cast: Vec<&str> = columns
                .iter()
                .filter(|(_, cast)| *cast)
                .map(|(name, _)| name.as_str())
                .collect();
            debug!(target = %self.target, columns = ?cast, "Selecting columns as text");
            statement = self
                .client
                .prepare(&text_cast_projection(&sql, &columns))
                .await
                .map_err(|e| self.map_error(e))?;
        }

        let rows = self
            .client
            .query_raw(&statement, std::iter::empty::<&(dyn ToSql + Sync)>())
            .await
            .map_err(|e| self.map_error(e))?;

        let target = self.target.clone();
        let stream = rows.map(move |row| match row {
            Ok(row) => row_to_record(&row),
            Err(e) if e.as_db_error().is_some() => Err(ExportError::query(e.to_string())),
            Err(e) => Err(ExportError::connection(target.as_str(), e.to_string())),
        });
        Ok(stream.boxed())
    }
}

impl Drop for PostgresSource {
    fn drop(&mut self) {
        self.connection.abort();
        debug!(target = %self.target, "Released PostgreSQL connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_server_is_connection_error() {
        let spec = ConnectionSpec {
            host: "127.0.0.1".to_string(),
            port: 1,
            user: "etl".to_string(),
            password: "wrong".to_string(),
            database: "app".to_string(),
        };
        let options = PostgresOptions {
            connect_timeout: Duration::from_secs(2),
            ..PostgresOptions::default()
        };

        let err = match PostgresSource::connect(&spec, &options).await {
            Ok(_) => panic!("connection to a closed port succeeded"),
            Err(e) => e,
        };
        match err {
            ExportError::Connection { target, .. } => {
                assert_eq!(target, "postgresql://127.0.0.1:1/app");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
