use pg2lake_core::{ExportError, Result};
use pg2lake_secrets::{BundleKind, CredentialBundle};
use std::fmt;

/// Connection parameters derived from a resolved PostgreSQL bundle
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSpec {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl ConnectionSpec {
    pub fn from_bundle(bundle: &CredentialBundle) -> Result<Self> {
        if bundle.kind() != BundleKind::Postgres {
            return Err(ExportError::invalid_config(format!(
                "credential bundle '{}' is a {} bundle, expected postgres",
                bundle.id(),
                bundle.kind()
            )));
        }

        let raw_port = bundle.require("POSTGRES_PORT")?;
        let port = raw_port.trim().parse::<u16>().map_err(|_| {
            ExportError::missing_credential(
                bundle.id(),
                "POSTGRES_PORT",
                format!("'{}' is not a valid port number", raw_port),
            )
        })?;

        Ok(Self {
            host: bundle.require("POSTGRES_HOST")?.to_string(),
            port,
            user: bundle.require("POSTGRES_USER")?.to_string(),
            password: bundle.require("POSTGRES_PASSWORD")?.to_string(),
            database: bundle.require("POSTGRES_DB")?.to_string(),
        })
    }

    /// Connection URL without credentials, e.g. `postgresql://db:5432/app`
    pub fn url(&self) -> String {
        format!("postgresql://{}:{}/{}", self.host, self.port, self.database)
    }
}

impl fmt::Display for ConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

impl fmt::Debug for ConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSpec")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}
