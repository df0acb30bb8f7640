//! Statically configured external database

use async_trait::async_trait;

use super::{AllocationStrategy, Mode, XA_DATASOURCE_TYPE};
use crate::config::{Properties, keys};
use crate::descriptor::{DbDescriptor, DescriptorSpec};
use crate::Result;

/// Reads every connection and driver fact from configuration.
///
/// The driver artifact is a local jar path. There is no allocation service,
/// so the lifecycle operations are no-ops.
#[derive(Debug, Clone)]
pub struct StaticExternalAllocator {
    props: Properties,
}

impl StaticExternalAllocator {
    /// Create the allocator
    pub fn new(props: Properties) -> Self {
        Self { props }
    }
}

#[async_trait]
impl AllocationStrategy for StaticExternalAllocator {
    fn mode(&self) -> Mode {
        Mode::StaticExternal
    }

    async fn allocate_db_with_expiry(&self, _expiry_minutes: u32) -> Result<DbDescriptor> {
        let props = &self.props;
        let user = props.require(keys::STATIC_USERNAME)?;
        let optional = |key: &str| props.get(key).map(str::to_string);

        Ok(DescriptorSpec {
            ds_type: Some(props.require(keys::STATIC_DATASOURCE_CLASS)?.into()),
            ds_username: Some(user.into()),
            ds_user: Some(user.into()),
            ds_password: Some(props.require(keys::STATIC_PASSWORD)?.into()),
            ds_db_name: optional(keys::STATIC_DB_NAME),
            ds_db_port: optional(keys::STATIC_DB_PORT),
            ds_db_hostname: optional(keys::STATIC_DB_SERVER),
            ds_url: Some(props.require(keys::STATIC_URL)?.into()),
            ds_login_timeout: Some("0".into()),
            ds_driver_class_name: Some(props.require(keys::STATIC_DRIVER_CLASS)?.into()),
            ds_schema: optional(keys::STATIC_SCHEMA),
            tds_type: Some(XA_DATASOURCE_TYPE.into()),
            db_driver_artifact: Some(props.require(keys::STATIC_DRIVER_JAR)?.into()),
            ..Default::default()
        }
        .build())
    }
}
