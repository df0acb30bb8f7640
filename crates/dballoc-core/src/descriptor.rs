//! Database descriptor
//!
//! A [`DbDescriptor`] is the complete, immutable description of one
//! provisioned test database: how to connect to it, which driver talks to
//! it, how the transactional pool should wrap it and how to check that it
//! answers queries. Strategies fill in only the fields that make sense for
//! their backend and leave the rest empty.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Named, optional fields used to construct a [`DbDescriptor`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorSpec {
    /// Data source implementation type
    pub ds_type: Option<String>,
    /// User name as the pool expects it
    pub ds_username: Option<String>,
    /// User name as the data source expects it
    pub ds_user: Option<String>,
    /// Password
    pub ds_password: Option<String>,
    /// Database name
    pub ds_db_name: Option<String>,
    /// Port, as a string
    pub ds_db_port: Option<String>,
    /// Host name
    pub ds_db_hostname: Option<String>,
    /// Connection URL
    pub ds_url: Option<String>,
    /// Login timeout, as a string
    pub ds_login_timeout: Option<String>,
    /// Data source object factory
    pub ds_factory: Option<String>,
    /// Driver class to load dynamically for probing
    pub ds_driver_class_name: Option<String>,
    /// Default schema
    pub ds_schema: Option<String>,
    /// Transactional data source type
    pub tds_type: Option<String>,
    /// Transactional data source URL
    pub tds_url: Option<String>,
    /// Transactional data source driver class
    pub tds_driver_class_name: Option<String>,
    /// Driver artifact: a `group:artifact:version` coordinate or a local jar path
    pub db_driver_artifact: Option<String>,
    /// Trivial statement proving the database answers queries
    pub heartbeat_statement: Option<String>,
    /// Extra facts recorded by the allocating strategy
    #[serde(default)]
    pub allocation_properties: BTreeMap<String, String>,
}

impl DescriptorSpec {
    /// Freeze the spec into a descriptor
    pub fn build(self) -> DbDescriptor {
        DbDescriptor { spec: self }
    }
}

/// Immutable description of one provisioned database
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DbDescriptor {
    spec: DescriptorSpec,
}

impl DbDescriptor {
    /// Data source implementation type
    pub fn ds_type(&self) -> Option<&str> {
        self.spec.ds_type.as_deref()
    }

    /// User name as the pool expects it
    pub fn ds_username(&self) -> Option<&str> {
        self.spec.ds_username.as_deref()
    }

    /// User name as the data source expects it
    pub fn ds_user(&self) -> Option<&str> {
        self.spec.ds_user.as_deref()
    }

    /// Password
    pub fn ds_password(&self) -> Option<&str> {
        self.spec.ds_password.as_deref()
    }

    /// Database name
    pub fn ds_db_name(&self) -> Option<&str> {
        self.spec.ds_db_name.as_deref()
    }

    /// Port
    pub fn ds_db_port(&self) -> Option<&str> {
        self.spec.ds_db_port.as_deref()
    }

    /// Host name
    pub fn ds_db_hostname(&self) -> Option<&str> {
        self.spec.ds_db_hostname.as_deref()
    }

    /// Connection URL
    pub fn ds_url(&self) -> Option<&str> {
        self.spec.ds_url.as_deref()
    }

    /// Login timeout
    pub fn ds_login_timeout(&self) -> Option<&str> {
        self.spec.ds_login_timeout.as_deref()
    }

    /// Data source object factory
    pub fn ds_factory(&self) -> Option<&str> {
        self.spec.ds_factory.as_deref()
    }

    /// Driver class loaded for probing
    pub fn ds_driver_class_name(&self) -> Option<&str> {
        self.spec.ds_driver_class_name.as_deref()
    }

    /// Default schema
    pub fn ds_schema(&self) -> Option<&str> {
        self.spec.ds_schema.as_deref()
    }

    /// Transactional data source type
    pub fn tds_type(&self) -> Option<&str> {
        self.spec.tds_type.as_deref()
    }

    /// Transactional data source URL
    pub fn tds_url(&self) -> Option<&str> {
        self.spec.tds_url.as_deref()
    }

    /// Transactional data source driver class
    pub fn tds_driver_class_name(&self) -> Option<&str> {
        self.spec.tds_driver_class_name.as_deref()
    }

    /// Driver artifact coordinate or jar path
    pub fn db_driver_artifact(&self) -> Option<&str> {
        self.spec.db_driver_artifact.as_deref()
    }

    /// Heartbeat statement, possibly blank
    pub fn heartbeat_statement(&self) -> Option<&str> {
        self.spec.heartbeat_statement.as_deref()
    }

    /// Extra facts recorded by the allocating strategy
    pub fn allocation_properties(&self) -> &BTreeMap<String, String> {
        &self.spec.allocation_properties
    }

    /// One allocation property
    pub fn allocation_property(&self, key: &str) -> Option<&str> {
        self.spec.allocation_properties.get(key).map(String::as_str)
    }

    /// Whether a liveness probe was requested.
    ///
    /// A missing or blank statement means "skip probing", never an error.
    pub fn has_heartbeat(&self) -> bool {
        self.heartbeat_statement()
            .is_some_and(|stmt| !stmt.trim().is_empty())
    }

    /// Copy the fields back into a spec
    pub fn to_spec(&self) -> DescriptorSpec {
        self.spec.clone()
    }
}

impl fmt::Debug for DbDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbDescriptor")
            .field("ds_type", &self.spec.ds_type)
            .field("ds_user", &self.spec.ds_user)
            .field("ds_password", &self.spec.ds_password.as_ref().map(|_| "****"))
            .field("ds_db_hostname", &self.spec.ds_db_hostname)
            .field("ds_db_port", &self.spec.ds_db_port)
            .field("ds_db_name", &self.spec.ds_db_name)
            .field("ds_url", &self.spec.ds_url)
            .field("ds_driver_class_name", &self.spec.ds_driver_class_name)
            .field("db_driver_artifact", &self.spec.db_driver_artifact)
            .field("heartbeat_statement", &self.spec.heartbeat_statement)
            .field("allocation_properties", &self.spec.allocation_properties)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_spec() -> DescriptorSpec {
        let mut allocation_properties = BTreeMap::new();
        allocation_properties.insert("uuid".to_string(), "42".to_string());
        DescriptorSpec {
            ds_type: Some("org.postgresql.xa.PGXADataSource".into()),
            ds_username: Some("alice".into()),
            ds_user: Some("alice-ds".into()),
            ds_password: Some("pw".into()),
            ds_db_name: Some("crashrec".into()),
            ds_db_port: Some("5432".into()),
            ds_db_hostname: Some("db.local".into()),
            ds_url: Some("jdbc:postgresql://db.local:5432/crashrec".into()),
            ds_login_timeout: Some("0".into()),
            ds_factory: Some("org.postgresql.xa.PGXADataSourceFactory".into()),
            ds_driver_class_name: Some("org.postgresql.Driver".into()),
            ds_schema: Some("public".into()),
            tds_type: Some("javax.sql.XADataSource".into()),
            tds_url: Some("jdbc:postgresql://db.local:5432/crashrec?xa".into()),
            tds_driver_class_name: Some("org.postgresql.xa.Driver".into()),
            db_driver_artifact: Some("org.postgresql:postgresql:42.7.3".into()),
            heartbeat_statement: Some("SELECT 1".into()),
            allocation_properties,
        }
    }

    #[test]
    fn test_every_field_round_trips() {
        let spec = full_spec();
        let db = spec.clone().build();

        assert_eq!(db.ds_type(), spec.ds_type.as_deref());
        assert_eq!(db.ds_username(), spec.ds_username.as_deref());
        assert_eq!(db.ds_user(), spec.ds_user.as_deref());
        assert_eq!(db.ds_password(), spec.ds_password.as_deref());
        assert_eq!(db.ds_db_name(), spec.ds_db_name.as_deref());
        assert_eq!(db.ds_db_port(), spec.ds_db_port.as_deref());
        assert_eq!(db.ds_db_hostname(), spec.ds_db_hostname.as_deref());
        assert_eq!(db.ds_url(), spec.ds_url.as_deref());
        assert_eq!(db.ds_login_timeout(), spec.ds_login_timeout.as_deref());
        assert_eq!(db.ds_factory(), spec.ds_factory.as_deref());
        assert_eq!(
            db.ds_driver_class_name(),
            spec.ds_driver_class_name.as_deref()
        );
        assert_eq!(db.ds_schema(), spec.ds_schema.as_deref());
        assert_eq!(db.tds_type(), spec.tds_type.as_deref());
        assert_eq!(db.tds_url(), spec.tds_url.as_deref());
        assert_eq!(
            db.tds_driver_class_name(),
            spec.tds_driver_class_name.as_deref()
        );
        assert_eq!(db.db_driver_artifact(), spec.db_driver_artifact.as_deref());
        assert_eq!(db.heartbeat_statement(), spec.heartbeat_statement.as_deref());
        assert_eq!(db.allocation_property("uuid"), Some("42"));
        assert_eq!(db.to_spec(), spec);
    }

    #[test]
    fn test_blank_heartbeat_means_no_probe() {
        assert!(!DescriptorSpec::default().build().has_heartbeat());
        let blank = DescriptorSpec {
            heartbeat_statement: Some("   ".into()),
            ..Default::default()
        };
        assert!(!blank.build().has_heartbeat());
        assert!(full_spec().build().has_heartbeat());
    }

    #[test]
    fn test_debug_masks_password() {
        let rendered = format!("{:?}", full_spec().build());
        assert!(rendered.contains("****"));
        assert!(!rendered.contains("\"pw\""));
    }

    #[test]
    fn test_json_is_flat() {
        let json = serde_json::to_value(full_spec().build()).unwrap();
        assert_eq!(json["ds_url"], "jdbc:postgresql://db.local:5432/crashrec");
        assert_eq!(json["allocation_properties"]["uuid"], "42");
    }
}
