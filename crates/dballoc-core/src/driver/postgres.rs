//! PostgreSQL driver for the heartbeat probe
//!
//! Answers `jdbc:postgresql://host[:port]/database` URLs through
//! tokio-postgres. Drivers are called from the blocking pool, so every call
//! runs its future to completion on the ambient tokio runtime.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio_postgres::{Client, Config, NoTls};

use super::{Driver, DriverConnection};
use crate::{Error, Result};

/// Class name the PostgreSQL driver is registered under
pub const POSTGRES_DRIVER_CLASS: &str = "org.postgresql.Driver";

/// URL prefix accepted by the PostgreSQL driver
pub const POSTGRES_URL_PREFIX: &str = "jdbc:postgresql://";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// PostgreSQL driver backed by tokio-postgres
#[derive(Debug, Default)]
pub struct PostgresDriver;

impl PostgresDriver {
    /// Create the driver
    pub fn new() -> Self {
        Self
    }
}

/// Connection config for a JDBC URL, `None` if it is not a PostgreSQL URL
fn connect_config(url: &str) -> Option<Config> {
    if !url.starts_with(POSTGRES_URL_PREFIX) {
        return None;
    }
    url.strip_prefix("jdbc:")?.parse().ok()
}

fn runtime() -> Result<Handle> {
    Handle::try_current().map_err(|e| {
        Error::config(format!("the PostgreSQL driver needs a tokio runtime: {}", e))
    })
}

fn sql_error(e: tokio_postgres::Error) -> Error {
    Error::sql(e.to_string())
}

impl Driver for PostgresDriver {
    fn name(&self) -> &str {
        POSTGRES_DRIVER_CLASS
    }

    fn accepts_url(&self, url: &str) -> bool {
        connect_config(url).is_some()
    }

    fn connect(
        &self,
        url: &str,
        user: Option<&str>,
        password: Option<&str>,
    ) -> Result<Box<dyn DriverConnection>> {
        let mut config =
            connect_config(url).ok_or_else(|| Error::MalformedUrl(url.to_string()))?;
        if let Some(user) = user {
            config.user(user);
        }
        if let Some(password) = password {
            config.password(password);
        }
        config.connect_timeout(CONNECT_TIMEOUT);

        let handle = runtime()?;
        let (client, connection) = handle
            .block_on(config.connect(NoTls))
            .map_err(sql_error)?;
        // The connection task ends once the client is dropped
        handle.spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!("PostgreSQL connection closed: {}", e);
            }
        });

        Ok(Box::new(PostgresConnection { handle, client }))
    }
}

struct PostgresConnection {
    handle: Handle,
    client: Client,
}

impl DriverConnection for PostgresConnection {
    fn query(&mut self, statement: &str) -> Result<bool> {
        let rows = self
            .handle
            .block_on(self.client.query(statement, &[]))
            .map_err(sql_error)?;
        Ok(!rows.is_empty())
    }
}
