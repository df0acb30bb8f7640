//! Flat property configuration
//!
//! Every allocator reads its connection facts from a single snapshot of
//! `key = value` string properties. The snapshot is assembled once, from a
//! TOML file, the process environment and explicit overrides, and is never
//! re-read afterwards.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

/// Property keys understood by the allocators and probes
pub mod keys {
    /// Allocator mode selector
    pub const MODE: &str = "test.db.type";
    /// Overall heartbeat probe timeout in milliseconds
    pub const HEARTBEAT_TIMEOUT: &str = "db.timeout.waiting.for.heartbeat.statement";

    /// H2 driver version for the embedded mode
    pub const H2_VERSION: &str = "version.com.h2database";
    /// PostgreSQL driver version (ci-fixed-remote and container modes)
    pub const POSTGRESQL_VERSION: &str = "version.postgresql";

    /// CI-provided PostgreSQL user
    pub const PGSQL_USER: &str = "pgsql.user";
    /// CI-provided PostgreSQL password
    pub const PGSQL_PASSWORD: &str = "pgsql.password";
    /// CI-provided PostgreSQL host
    pub const PGSQL_SERVER: &str = "pgsql.servername";
    /// CI-provided PostgreSQL port
    pub const PGSQL_PORT: &str = "pgsql.portnumber";
    /// CI-provided PostgreSQL database name
    pub const PGSQL_DATABASE: &str = "pgsql.databasename";

    /// Container runtime binary
    pub const CONTAINER_RUNTIME: &str = "container.runtime";
    /// Container image
    pub const CONTAINER_IMAGE: &str = "container.image";
    /// Database user created inside the container
    pub const CONTAINER_USER: &str = "container.db.user";
    /// Database password inside the container
    pub const CONTAINER_PASSWORD: &str = "container.db.password";
    /// Database name inside the container
    pub const CONTAINER_DATABASE: &str = "container.db.name";
    /// How long to wait for the published port, in milliseconds
    pub const CONTAINER_STARTUP_TIMEOUT: &str = "container.startup.timeout.ms";
    /// Heartbeat statement set on container descriptors
    pub const CONTAINER_HEARTBEAT: &str = "container.heartbeat.statement";

    /// Allocation service endpoint
    pub const DBALLOCATOR_URL: &str = "dballocator.url";
    /// Database flavour requested from the allocation service
    pub const DBALLOCATOR_LABEL: &str = "dballocator.label";
    /// Who is asking, recorded by the allocation service
    pub const DBALLOCATOR_REQUESTEE: &str = "dballocator.requestee";
    /// Lease length used when the caller passes no expiry
    pub const DBALLOCATOR_EXPIRY: &str = "dballocator.expiry.minutes";
    /// Local driver jar matching the leased database
    pub const DBALLOCATOR_DRIVER_JAR: &str = "dballocator.driver.jar";

    /// Static external data source class
    pub const STATIC_DATASOURCE_CLASS: &str = "datasource.classname";
    /// Static external JDBC URL
    pub const STATIC_URL: &str = "jdbc.url";
    /// Static external user
    pub const STATIC_USERNAME: &str = "jdbc.username";
    /// Static external password
    pub const STATIC_PASSWORD: &str = "jdbc.password";
    /// Static external driver class
    pub const STATIC_DRIVER_CLASS: &str = "jdbc.driver.class";
    /// Static external local driver jar
    pub const STATIC_DRIVER_JAR: &str = "jdbc.driver.jar";
    /// Static external database name
    pub const STATIC_DB_NAME: &str = "jdbc.db.name";
    /// Static external port
    pub const STATIC_DB_PORT: &str = "jdbc.db.port";
    /// Static external host
    pub const STATIC_DB_SERVER: &str = "jdbc.db.server";
    /// Static external schema
    pub const STATIC_SCHEMA: &str = "jdbc.schema";

    /// Maven-layout local repository used to resolve driver coordinates
    pub const MAVEN_REPO_LOCAL: &str = "maven.repo.local";
}

/// Environment variables with this prefix are folded into the properties.
pub const ENV_PREFIX: &str = "DBALLOC_";

/// Accepted heartbeat timeout range, inclusive
pub const HEARTBEAT_TIMEOUT_MIN: Duration = Duration::from_millis(100);
/// Upper bound of the heartbeat timeout range
pub const HEARTBEAT_TIMEOUT_MAX: Duration = Duration::from_secs(5 * 60);

/// Immutable-by-convention snapshot of string properties
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    values: BTreeMap<String, String>,
}

impl Properties {
    /// Create an empty property set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(key, value)` pairs
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Add or replace one property
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Load the configuration snapshot.
    ///
    /// The optional TOML file is read first, then `DBALLOC_*` environment
    /// variables are laid over it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut props = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::new(),
        };
        props.merge(Self::from_env());
        Ok(props)
    }

    /// Parse a TOML document, flattening nested tables with `.`
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(content)?;
        let mut values = BTreeMap::new();
        flatten_table(None, &table, &mut values);
        Ok(Self { values })
    }

    /// Read and parse a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        let props = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded {} properties from {:?}", props.len(), path);
        Ok(props)
    }

    /// Collect `DBALLOC_*` environment variables.
    ///
    /// `DBALLOC_PGSQL_PORTNUMBER` becomes `pgsql.portnumber`.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let values = vars
            .into_iter()
            .filter_map(|(name, value)| {
                name.strip_prefix(ENV_PREFIX)
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (rest.to_ascii_lowercase().replace('_', "."), value))
            })
            .collect();
        Self { values }
    }

    /// Lay `other` over `self`; keys present in both take `other`'s value
    pub fn merge(&mut self, other: Properties) {
        self.values.extend(other.values);
    }

    /// Non-empty value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Value of `key`, or `default` when absent or empty
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /// Value of `key`; a configuration error when absent or empty
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| Error::config(format!("{} must not be empty.", key)))
    }

    /// Parse the required value of `key`
    pub fn require_parsed<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.require(key)?;
        raw.trim()
            .parse()
            .map_err(|e| Error::config(format!("{} has invalid value {:?}: {}", key, raw, e)))
    }

    /// Parse the value of `key`, falling back to `default` when absent
    pub fn parsed_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            Some(_) => self.require_parsed(key),
            None => Ok(default),
        }
    }

    /// Overall heartbeat probe timeout, validated to `[100ms, 5min]`
    pub fn heartbeat_timeout(&self) -> Result<Duration> {
        let millis: u64 = self.require_parsed(keys::HEARTBEAT_TIMEOUT)?;
        let timeout = Duration::from_millis(millis);
        if timeout < HEARTBEAT_TIMEOUT_MIN || timeout > HEARTBEAT_TIMEOUT_MAX {
            return Err(Error::config(format!(
                "{} out of expected range [{}, {}] ms.",
                keys::HEARTBEAT_TIMEOUT,
                HEARTBEAT_TIMEOUT_MIN.as_millis(),
                HEARTBEAT_TIMEOUT_MAX.as_millis()
            )));
        }
        Ok(timeout)
    }

    /// Entries with secrets masked, for display
    pub fn masked(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| {
            if k.contains("password") {
                (k.as_str(), "****")
            } else {
                (k.as_str(), v.as_str())
            }
        })
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no properties are set
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn flatten_table(prefix: Option<&str>, table: &toml::Table, out: &mut BTreeMap<String, String>) {
    for (key, value) in table {
        let full_key = match prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key.clone(),
        };
        match value {
            toml::Value::Table(nested) => flatten_table(Some(&full_key), nested, out),
            toml::Value::String(s) => {
                out.insert(full_key, s.clone());
            }
            toml::Value::Array(items) => {
                let joined = items
                    .iter()
                    .map(|item| match item {
                        toml::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                out.insert(full_key, joined);
            }
            other => {
                out.insert(full_key, other.to_string());
            }
        }
    }
}
