//! Allocator backed by an external allocation service
//!
//! The service hands out real, uniquely leased databases. Every request is a
//! `GET` on the configured endpoint with an `operation` query parameter;
//! allocation answers with `key=value` lines describing the database. The
//! lease is identified by the `uuid` returned at allocation time and must be
//! handed back on deallocation.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use super::{AllocationStrategy, Mode, XA_DATASOURCE_TYPE};
use crate::config::{Properties, keys};
use crate::descriptor::{DbDescriptor, DescriptorSpec};
use crate::{Error, Result};

/// Allocation property carrying the lease id
pub const LEASE_UUID: &str = "uuid";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Leases databases from the allocation service
#[derive(Debug, Clone)]
pub struct RestAllocator {
    client: Client,
    url: Url,
    props: Properties,
    requestee: String,
    default_expiry: u32,
}

impl RestAllocator {
    /// Build the client. The service endpoint must be configured.
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let raw_url = props.require(keys::DBALLOCATOR_URL)?;
        let url = Url::parse(raw_url).map_err(|e| {
            Error::config(format!(
                "{} is not a valid URL ({}): {}",
                keys::DBALLOCATOR_URL,
                raw_url,
                e
            ))
        })?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            url,
            props: props.clone(),
            requestee: props.get_or(keys::DBALLOCATOR_REQUESTEE, "dballoc"),
            default_expiry: props.parsed_or(keys::DBALLOCATOR_EXPIRY, 60)?,
        })
    }

    fn expiry(&self, expiry_minutes: u32) -> u32 {
        if expiry_minutes == 0 {
            self.default_expiry
        } else {
            expiry_minutes
        }
    }

    /// Issue one service operation and return the response body
    async fn call(&self, operation: &str, params: &[(&str, String)]) -> Result<String> {
        let mut query: Vec<(&str, &str)> = vec![("operation", operation)];
        query.extend(params.iter().map(|(k, v)| (*k, v.as_str())));

        let response = self
            .client
            .get(self.url.clone())
            .query(&query)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::allocation(format!(
                "{} failed ({}): {}",
                operation,
                status,
                body.trim()
            )));
        }
        Ok(body)
    }

    /// Run a lease operation, turning failures into `false`
    async fn lease_call(&self, operation: &str, params: &[(&str, String)]) -> bool {
        match self.call(operation, params).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Allocation service {} failed: {}", operation, e);
                false
            }
        }
    }
}

/// Parse `key=value` lines; `#` and `!` start comments.
///
/// Backslash escapes in values are undone.
pub fn parse_properties(body: &str) -> BTreeMap<String, String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let split = line.find(['=', ':'])?;
            let key = line[..split].trim();
            let value = unescape(line[split + 1..].trim());
            (!key.is_empty()).then(|| (key.to_string(), value))
        })
        .collect()
}

/// Undo backslash escapes in one left-to-right pass.
///
/// `\t`, `\n` and `\r` become control characters and any other escaped
/// character stands for itself. A trailing lone backslash is kept.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Descriptor for a lease, from the allocation response values
fn lease_descriptor(values: &BTreeMap<String, String>, driver_jar: &str) -> Result<DbDescriptor> {
    let required = |key: &str| -> Result<String> {
        values
            .get(key)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| Error::allocation(format!("allocation response lacks {}", key)))
    };
    let optional = |key: &str| values.get(key).filter(|v| !v.is_empty()).cloned();

    let user = required("db.username")?;
    let spec = DescriptorSpec {
        ds_type: Some(required("datasource.class.xa")?),
        ds_username: Some(user.clone()),
        ds_user: Some(user),
        ds_password: Some(required("db.password")?),
        ds_db_name: optional("db.name"),
        ds_db_port: optional("db.port"),
        ds_db_hostname: optional("db.hostname"),
        ds_url: Some(required("db.jdbc_url")?),
        ds_login_timeout: Some("0".into()),
        ds_driver_class_name: Some(required("db.jdbc_class")?),
        ds_schema: optional("db.schema"),
        tds_type: Some(XA_DATASOURCE_TYPE.into()),
        db_driver_artifact: Some(driver_jar.to_string()),
        allocation_properties: values.clone(),
        ..Default::default()
    };
    Ok(spec.build())
}

#[async_trait]
impl AllocationStrategy for RestAllocator {
    fn mode(&self) -> Mode {
        Mode::ExternalRest
    }

    async fn allocate_db_with_expiry(&self, expiry_minutes: u32) -> Result<DbDescriptor> {
        let label = self.props.require(keys::DBALLOCATOR_LABEL)?;
        let driver_jar = self.props.require(keys::DBALLOCATOR_DRIVER_JAR)?;
        let expiry = self.expiry(expiry_minutes);

        let body = self
            .call(
                "alloc",
                &[
                    ("label", label.to_string()),
                    ("expiry", expiry.to_string()),
                    ("requestee", self.requestee.clone()),
                ],
            )
            .await?;
        let values = parse_properties(&body);

        let uuid = values
            .get(LEASE_UUID)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| Error::allocation("allocation response lacks uuid"))?;

        let db = match lease_descriptor(&values, driver_jar) {
            Ok(db) => db,
            Err(e) => {
                // The lease exists on the service side, hand it back
                self.lease_call("dealloc", &[("uuid", uuid.clone())]).await;
                return Err(e);
            }
        };

        tracing::info!(
            "Leased {} database {} for {} minutes",
            label,
            uuid,
            expiry
        );
        Ok(db)
    }

    async fn deallocate_db(&self, db: &DbDescriptor) -> bool {
        let Some(uuid) = db.allocation_property(LEASE_UUID) else {
            return true;
        };
        let released = self.lease_call("dealloc", &[("uuid", uuid.to_string())]).await;
        if released {
            tracing::info!("Released database lease {}", uuid);
        }
        released
    }

    async fn reallocate_db_with_expiry(&self, expiry_minutes: u32, db: &DbDescriptor) -> bool {
        let Some(uuid) = db.allocation_property(LEASE_UUID) else {
            return true;
        };
        self.lease_call(
            "reallocate",
            &[
                ("uuid", uuid.to_string()),
                ("expiry", self.expiry(expiry_minutes).to_string()),
            ],
        )
        .await
    }

    async fn clean_db(&self, db: &DbDescriptor) -> bool {
        let Some(uuid) = db.allocation_property(LEASE_UUID) else {
            return true;
        };
        self.lease_call("erase", &[("uuid", uuid.to_string())]).await
    }
}
