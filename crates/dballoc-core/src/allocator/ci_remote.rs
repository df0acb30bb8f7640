//! CI-provided PostgreSQL allocator
//!
//! The database is always running and shared; the test suite has no
//! control over it, so deallocate, reallocate and clean do nothing.

use async_trait::async_trait;

use super::{AllocationStrategy, Mode, XA_DATASOURCE_TYPE};
use crate::config::{Properties, keys};
use crate::descriptor::{DbDescriptor, DescriptorSpec};
use crate::{Error, Result};

/// Accepted port range for the CI database
pub const PORT_RANGE: std::ops::RangeInclusive<u16> = 1025..=65535;

/// Reads every connection fact of an always-on PostgreSQL from configuration
#[derive(Debug, Clone)]
pub struct CiFixedRemoteAllocator {
    props: Properties,
}

impl CiFixedRemoteAllocator {
    /// Create the allocator
    pub fn new(props: Properties) -> Self {
        Self { props }
    }
}

#[async_trait]
impl AllocationStrategy for CiFixedRemoteAllocator {
    fn mode(&self) -> Mode {
        Mode::CiFixedRemote
    }

    async fn allocate_db_with_expiry(&self, _expiry_minutes: u32) -> Result<DbDescriptor> {
        let props = &self.props;
        let driver_version = props.require(keys::POSTGRESQL_VERSION)?;
        let user = props.require(keys::PGSQL_USER)?;
        let password = props.require(keys::PGSQL_PASSWORD)?;
        let server = props.require(keys::PGSQL_SERVER)?;
        let port: u32 = props.require_parsed(keys::PGSQL_PORT)?;
        let port = u16::try_from(port)
            .ok()
            .filter(|p| PORT_RANGE.contains(p))
            .ok_or_else(|| {
                Error::config(format!(
                    "{} out of expected range [{}, {}]",
                    keys::PGSQL_PORT,
                    PORT_RANGE.start(),
                    PORT_RANGE.end()
                ))
            })?;
        let database = props.require(keys::PGSQL_DATABASE)?;

        Ok(DescriptorSpec {
            ds_type: Some("org.postgresql.xa.PGXADataSource".into()),
            ds_username: Some(user.into()),
            ds_user: Some(user.into()),
            ds_password: Some(password.into()),
            ds_db_name: Some(database.into()),
            ds_db_port: Some(port.to_string()),
            ds_db_hostname: Some(server.into()),
            ds_url: Some(format!("jdbc:postgresql://{}:{}/{}", server, port, database)),
            ds_login_timeout: Some("0".into()),
            ds_factory: Some("org.postgresql.xa.PGXADataSourceFactory".into()),
            ds_driver_class_name: Some("org.postgresql.Driver".into()),
            tds_type: Some(XA_DATASOURCE_TYPE.into()),
            db_driver_artifact: Some(format!("org.postgresql:postgresql:{}", driver_version)),
            ..Default::default()
        }
        .build())
    }
}
