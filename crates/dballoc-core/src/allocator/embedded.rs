//! In-memory database allocator

use async_trait::async_trait;

use super::{AllocationStrategy, Mode, XA_DATASOURCE_TYPE};
use crate::config::{Properties, keys};
use crate::descriptor::{DbDescriptor, DescriptorSpec};
use crate::driver::EMBEDDED_DRIVER_CLASS;
use crate::Result;

/// Connection URL of the embedded database
pub const EMBEDDED_URL: &str = "jdbc:h2:mem:testdb;TRACE_LEVEL_FILE=3;TRACE_LEVEL_SYSTEM_OUT=3";

/// Points tests at a private in-memory database.
///
/// Nothing runs outside the process, so the lifecycle operations are the
/// trait's no-ops: the database dies with the process.
#[derive(Debug, Clone)]
pub struct EmbeddedAllocator {
    props: Properties,
}

impl EmbeddedAllocator {
    /// Create the allocator
    pub fn new(props: Properties) -> Self {
        Self { props }
    }
}

#[async_trait]
impl AllocationStrategy for EmbeddedAllocator {
    fn mode(&self) -> Mode {
        Mode::Embedded
    }

    async fn allocate_db_with_expiry(&self, _expiry_minutes: u32) -> Result<DbDescriptor> {
        let h2_version = self.props.require(keys::H2_VERSION)?;
        Ok(DescriptorSpec {
            ds_type: Some("org.h2.jdbcx.JdbcDataSource".into()),
            ds_username: Some("sa".into()),
            ds_user: Some("sa".into()),
            ds_password: Some("sa".into()),
            ds_db_name: Some("testdb".into()),
            ds_url: Some(EMBEDDED_URL.into()),
            ds_login_timeout: Some("0".into()),
            ds_factory: Some("org.h2.jdbcx.JdbcDataSourceFactory".into()),
            ds_driver_class_name: Some(EMBEDDED_DRIVER_CLASS.into()),
            tds_type: Some(XA_DATASOURCE_TYPE.into()),
            db_driver_artifact: Some(format!("com.h2database:h2:{}", h2_version)),
            ..Default::default()
        }
        .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn allocator() -> EmbeddedAllocator {
        EmbeddedAllocator::new(Properties::new().with(keys::H2_VERSION, "2.2.224"))
    }

    #[tokio::test]
    async fn test_allocates_in_memory_descriptor() {
        let db = allocator().allocate_db().await.unwrap();
        assert!(db.ds_url().unwrap().contains("jdbc:h2:mem:"));
        assert_eq!(db.ds_user(), Some("sa"));
        assert_eq!(db.ds_password(), Some("sa"));
        assert_eq!(db.tds_type(), Some(XA_DATASOURCE_TYPE));
        assert_eq!(db.db_driver_artifact(), Some("com.h2database:h2:2.2.224"));
        assert!(!db.has_heartbeat());
    }

    #[tokio::test]
    async fn test_missing_version_is_config_error() {
        let err = EmbeddedAllocator::new(Properties::new())
            .allocate_db()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains(keys::H2_VERSION));
    }

    #[tokio::test]
    async fn test_lifecycle_is_noop() {
        let allocator = allocator();
        let db = allocator.allocate_db().await.unwrap();
        assert!(allocator.deallocate_db(&db).await);
        assert!(allocator.deallocate_db(&db).await);
        assert!(allocator.reallocate_db(&db).await);
        assert!(allocator.reallocate_db_with_expiry(30, &db).await);
        assert!(allocator.clean_db(&db).await);
    }
}
