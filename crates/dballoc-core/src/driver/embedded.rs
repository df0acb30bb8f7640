//! In-memory driver for the embedded mode
//!
//! Answers H2-style `jdbc:h2:mem:<name>` URLs with an in-memory SQLite
//! database. Connections using the same name share one database for as
//! long as at least one of them is open.

use rusqlite::{Connection, OpenFlags};

use super::{Driver, DriverConnection};
use crate::{Error, Result};

/// Class name the embedded driver is registered under
pub const EMBEDDED_DRIVER_CLASS: &str = "org.h2.Driver";

/// URL prefix accepted by the embedded driver
pub const EMBEDDED_URL_PREFIX: &str = "jdbc:h2:mem:";

/// In-memory SQL driver
#[derive(Debug, Default)]
pub struct EmbeddedDriver;

impl EmbeddedDriver {
    /// Create the driver
    pub fn new() -> Self {
        Self
    }
}

/// Database name in `jdbc:h2:mem:<name>;OPTION=...`; empty for a private database
fn database_name(url: &str) -> Option<&str> {
    let rest = url.strip_prefix(EMBEDDED_URL_PREFIX)?;
    Some(rest.split(';').next().unwrap_or_default())
}

fn sql_error(e: rusqlite::Error) -> Error {
    Error::sql(e.to_string())
}

impl Driver for EmbeddedDriver {
    fn name(&self) -> &str {
        EMBEDDED_DRIVER_CLASS
    }

    fn accepts_url(&self, url: &str) -> bool {
        database_name(url).is_some_and(|name| {
            name.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
    }

    fn connect(
        &self,
        url: &str,
        _user: Option<&str>,
        _password: Option<&str>,
    ) -> Result<Box<dyn DriverConnection>> {
        let name = database_name(url).ok_or_else(|| Error::MalformedUrl(url.to_string()))?;
        let conn = if name.is_empty() {
            Connection::open_in_memory()
        } else {
            Connection::open_with_flags(
                format!("file:{}?mode=memory&cache=shared", name),
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI,
            )
        }
        .map_err(sql_error)?;

        Ok(Box::new(EmbeddedConnection { conn }))
    }
}

struct EmbeddedConnection {
    conn: Connection,
}

impl DriverConnection for EmbeddedConnection {
    fn query(&mut self, statement: &str) -> Result<bool> {
        let mut stmt = self.conn.prepare(statement).map_err(sql_error)?;
        let mut rows = stmt.query([]).map_err(sql_error)?;
        let found = rows.next().map_err(sql_error)?.is_some();
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_name_parsing() {
        assert_eq!(
            database_name("jdbc:h2:mem:testdb;TRACE_LEVEL_FILE=3"),
            Some("testdb")
        );
        assert_eq!(database_name("jdbc:h2:mem:"), Some(""));
        assert_eq!(database_name("jdbc:postgresql://localhost/x"), None);
    }

    #[test]
    fn test_accepts_only_h2_memory_urls() {
        let driver = EmbeddedDriver::new();
        assert!(driver.accepts_url("jdbc:h2:mem:testdb;TRACE_LEVEL_SYSTEM_OUT=3"));
        assert!(!driver.accepts_url("jdbc:h2:file:/tmp/db"));
        assert!(!driver.accepts_url("jdbc:h2:mem:bad/name"));
    }

    #[test]
    fn test_select_one_returns_row() {
        let driver = EmbeddedDriver::new();
        let mut conn = driver
            .connect("jdbc:h2:mem:selectone", Some("sa"), Some("sa"))
            .unwrap();
        assert!(conn.query("SELECT 1").unwrap());
    }

    #[test]
    fn test_empty_result_is_no_row() {
        let driver = EmbeddedDriver::new();
        let mut conn = driver.connect("jdbc:h2:mem:", None, None).unwrap();
        assert!(!conn.query("SELECT 1 WHERE 1 = 0").unwrap());
    }

    #[test]
    fn test_bad_statement_is_sql_error() {
        let driver = EmbeddedDriver::new();
        let mut conn = driver.connect("jdbc:h2:mem:broken", None, None).unwrap();
        let err = conn.query("SELEKT nothing").unwrap_err();
        assert!(matches!(err, Error::Sql(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_named_database_accepts_repeated_connections() {
        let driver = EmbeddedDriver::new();
        let mut first = driver.connect("jdbc:h2:mem:shared_db", None, None).unwrap();
        let mut second = driver.connect("jdbc:h2:mem:shared_db", None, None).unwrap();
        assert!(first.query("SELECT 1").unwrap());
        assert!(second.query("SELECT 1").unwrap());
    }
}
