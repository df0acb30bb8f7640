//! Container resource entries derived from a descriptor
//!
//! An application server under test needs two named resources: the raw XA
//! data source (`myDataSource`) and a transactional pool wrapping it
//! (`transactionalDataSource`). Attributes whose descriptor value is absent
//! are left out rather than written empty.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::descriptor::DbDescriptor;

/// Name of the XA data source resource
pub const DATA_SOURCE_NAME: &str = "myDataSource";
/// Name of the transactional pool resource
pub const TRANSACTIONAL_DATA_SOURCE_NAME: &str = "transactionalDataSource";

const DEFAULT_DS_FACTORY: &str = "org.apache.tomcat.jdbc.naming.GenericNamingResourcesFactory";
const TDS_FACTORY: &str = "org.jboss.narayana.tomcat.jta.TransactionalDataSourceFactory";

/// Pool settings of the transactional data source
const TDS_POOL: [(&str, &str); 12] = [
    ("initialSize", "10"),
    ("maxWaitMillis", "10000"),
    ("maxTotal", "4"),
    ("maxIdle", "16"),
    ("minIdle", "8"),
    ("maxAge", "30000"),
    ("testOnBorrow", "true"),
    ("validationQuery", "select 1"),
    ("removeAbandonedTimeout", "60"),
    ("removeAbandoned", "true"),
    ("logAbandoned", "true"),
    ("jmxEnabled", "true"),
];

/// One `<Resource>` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    /// Resource name
    pub name: String,
    /// Attributes in name order
    pub attributes: BTreeMap<String, String>,
}

impl ResourceEntry {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    fn set_opt(&mut self, key: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.set(key, value);
        }
        self
    }

    /// Attribute value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Render as a self-closing `<Resource .../>` element
    pub fn to_xml(&self) -> String {
        let mut xml = format!("<Resource name=\"{}\"", escape(&self.name));
        for (key, value) in &self.attributes {
            let _ = write!(xml, "\n          {}=\"{}\"", key, escape(value));
        }
        xml.push_str("/>");
        xml
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Build the data source and transactional pool entries for `db`
pub fn context_resources(db: &DbDescriptor) -> [ResourceEntry; 2] {
    let mut ds = ResourceEntry::new(DATA_SOURCE_NAME);
    ds.set("uniqueName", DATA_SOURCE_NAME)
        .set("description", "Data Source")
        .set("auth", "Container")
        .set_opt("type", db.ds_type())
        .set_opt("username", db.ds_username())
        .set_opt("user", db.ds_user())
        .set_opt("password", db.ds_password())
        .set("driverType", "4")
        .set_opt("url", db.ds_url())
        // Some XA data sources only read the upper-case spelling
        .set_opt("URL", db.ds_url())
        .set_opt("loginTimeout", db.ds_login_timeout())
        .set("factory", db.ds_factory().unwrap_or(DEFAULT_DS_FACTORY))
        .set_opt("databaseName", db.ds_db_name())
        .set_opt("portNumber", db.ds_db_port())
        .set_opt("serverName", db.ds_db_hostname())
        .set_opt("schema", db.ds_schema());

    let mut tds = ResourceEntry::new(TRANSACTIONAL_DATA_SOURCE_NAME);
    tds.set("uniqueName", TRANSACTIONAL_DATA_SOURCE_NAME)
        .set("auth", "Container")
        .set_opt("type", db.tds_type())
        .set_opt("username", db.ds_user())
        .set_opt("password", db.ds_password())
        .set_opt("url", db.tds_url())
        .set_opt("driverClassName", db.tds_driver_class_name())
        .set("transactionManager", "TransactionManager")
        .set("xaDataSource", DATA_SOURCE_NAME)
        .set(
            "transactionSynchronizationRegistry",
            "TransactionSynchronizationRegistry",
        )
        .set("description", "Transactional Driver Data Source")
        .set("factory", TDS_FACTORY);
    for (key, value) in TDS_POOL {
        tds.set(key, value);
    }

    [ds, tds]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorSpec;

    fn db() -> DbDescriptor {
        DescriptorSpec {
            ds_type: Some("org.postgresql.xa.PGXADataSource".into()),
            ds_username: Some("crashrec".into()),
            ds_user: Some("crashrec".into()),
            ds_password: Some("p&w\"1".into()),
            ds_url: Some("jdbc:postgresql://db:5432/crashrec".into()),
            ds_db_port: Some("5432".into()),
            tds_type: Some("javax.sql.XADataSource".into()),
            ..Default::default()
        }
        .build()
    }

    #[test]
    fn test_data_source_entry() {
        let [ds, _] = context_resources(&db());
        assert_eq!(ds.name, "myDataSource");
        assert_eq!(ds.get("url"), Some("jdbc:postgresql://db:5432/crashrec"));
        assert_eq!(ds.get("URL"), ds.get("url"));
        assert_eq!(ds.get("portNumber"), Some("5432"));
        assert_eq!(ds.get("factory"), Some(DEFAULT_DS_FACTORY));
        assert_eq!(ds.get("schema"), None);
        assert_eq!(ds.get("databaseName"), None);
    }

    #[test]
    fn test_transactional_entry_wraps_data_source() {
        let [_, tds] = context_resources(&db());
        assert_eq!(tds.get("xaDataSource"), Some("myDataSource"));
        assert_eq!(tds.get("type"), Some("javax.sql.XADataSource"));
        assert_eq!(tds.get("username"), Some("crashrec"));
        assert_eq!(tds.get("maxTotal"), Some("4"));
        assert_eq!(tds.get("validationQuery"), Some("select 1"));
        assert_eq!(tds.get("url"), None);
    }

    #[test]
    fn test_xml_escapes_values() {
        let [ds, _] = context_resources(&db());
        let xml = ds.to_xml();
        assert!(xml.starts_with("<Resource name=\"myDataSource\""));
        assert!(xml.ends_with("/>"));
        assert!(xml.contains("password=\"p&amp;w&quot;1\""));
    }
}
