//! Database allocators
//!
//! One [`Allocator`] is selected per process from the `test.db.type`
//! property. Every variant implements the same lifecycle through
//! [`AllocationStrategy`]; variants that do not own their database keep the
//! trait's no-op defaults for deallocate, reallocate and clean, so calling
//! code can run the full lifecycle without branching on the backend.

pub mod ci_remote;
pub mod container;
pub mod embedded;
pub mod rest;
pub mod static_external;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use crate::config::{Properties, keys};
use crate::descriptor::DbDescriptor;
use crate::{Error, Result};

pub use ci_remote::CiFixedRemoteAllocator;
pub use container::ContainerAllocator;
pub use embedded::EmbeddedAllocator;
pub use rest::RestAllocator;
pub use static_external::StaticExternalAllocator;

/// Data source type shared by every transactional pool
pub const XA_DATASOURCE_TYPE: &str = "javax.sql.XADataSource";

/// Allocator operation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// In-process in-memory database
    Embedded,
    /// Always-on database provided by CI
    CiFixedRemote,
    /// Disposable database container per run
    Container,
    /// Database leased from an allocation service
    ExternalRest,
    /// Database described entirely by configuration
    StaticExternal,
}

impl Mode {
    /// Every mode, in documentation order
    pub const ALL: [Mode; 5] = [
        Mode::Embedded,
        Mode::CiFixedRemote,
        Mode::Container,
        Mode::ExternalRest,
        Mode::StaticExternal,
    ];

    /// Property value selecting this mode
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Embedded => "embedded",
            Mode::CiFixedRemote => "ci-fixed-remote",
            Mode::Container => "container",
            Mode::ExternalRest => "external-rest",
            Mode::StaticExternal => "static-external",
        }
    }

    /// Read the mode from `test.db.type`
    pub fn from_properties(props: &Properties) -> Result<Self> {
        props.require(keys::MODE)?.parse()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s.trim())
            .ok_or_else(|| {
                let expected: Vec<&str> = Mode::ALL.iter().map(Mode::as_str).collect();
                Error::config(format!(
                    "Unknown operation mode, expected one of {} but it was: {}",
                    expected.join(", "),
                    s
                ))
            })
    }
}

/// Lifecycle of one provisioning backend.
///
/// Only [`AllocationStrategy::allocate_db_with_expiry`] is mandatory. The
/// remaining operations default to no-ops reporting success, which is the
/// right behavior for any backend that does not own its database.
#[async_trait]
pub trait AllocationStrategy: Send + Sync {
    /// Mode this strategy implements
    fn mode(&self) -> Mode;

    /// Allocate a database.
    ///
    /// `expiry_minutes` is a lease hint; `0` means no explicit expiry.
    /// Strategies without leases ignore it.
    async fn allocate_db_with_expiry(&self, expiry_minutes: u32) -> Result<DbDescriptor>;

    /// Allocate a database without an explicit expiry
    async fn allocate_db(&self) -> Result<DbDescriptor> {
        self.allocate_db_with_expiry(0).await
    }

    /// Release `db`. Never fails; `false` reports an unsuccessful release.
    async fn deallocate_db(&self, _db: &DbDescriptor) -> bool {
        // Intentionally nothing
        true
    }

    /// Extend or refresh the lease on `db`
    async fn reallocate_db_with_expiry(&self, _expiry_minutes: u32, _db: &DbDescriptor) -> bool {
        // Intentionally nothing
        true
    }

    /// Refresh the lease on `db` without an explicit expiry
    async fn reallocate_db(&self, db: &DbDescriptor) -> bool {
        self.reallocate_db_with_expiry(0, db).await
    }

    /// Reset the contents of `db` while keeping the allocation
    async fn clean_db(&self, _db: &DbDescriptor) -> bool {
        // Intentionally nothing
        true
    }

    /// Whether descriptors from this strategy must pass the heartbeat probe
    fn requires_heartbeat(&self) -> bool {
        false
    }
}

/// The selected provisioning backend
#[derive(Debug)]
pub enum Allocator {
    /// In-memory database
    Embedded(EmbeddedAllocator),
    /// CI-provided database
    CiFixedRemote(CiFixedRemoteAllocator),
    /// Container-launched database
    Container(ContainerAllocator),
    /// Database leased over REST
    ExternalRest(RestAllocator),
    /// Statically configured database
    StaticExternal(StaticExternalAllocator),
}

impl Allocator {
    /// Build the allocator selected by `test.db.type`
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let allocator = match Mode::from_properties(props)? {
            Mode::Embedded => Allocator::Embedded(EmbeddedAllocator::new(props.clone())),
            Mode::CiFixedRemote => {
                Allocator::CiFixedRemote(CiFixedRemoteAllocator::new(props.clone()))
            }
            Mode::Container => Allocator::Container(ContainerAllocator::from_properties(props)?),
            Mode::ExternalRest => Allocator::ExternalRest(RestAllocator::from_properties(props)?),
            Mode::StaticExternal => {
                Allocator::StaticExternal(StaticExternalAllocator::new(props.clone()))
            }
        };
        Ok(allocator)
    }

    fn strategy(&self) -> &dyn AllocationStrategy {
        match self {
            Allocator::Embedded(a) => a,
            Allocator::CiFixedRemote(a) => a,
            Allocator::Container(a) => a,
            Allocator::ExternalRest(a) => a,
            Allocator::StaticExternal(a) => a,
        }
    }
}

#[async_trait]
impl AllocationStrategy for Allocator {
    fn mode(&self) -> Mode {
        self.strategy().mode()
    }

    async fn allocate_db_with_expiry(&self, expiry_minutes: u32) -> Result<DbDescriptor> {
        self.strategy().allocate_db_with_expiry(expiry_minutes).await
    }

    async fn allocate_db(&self) -> Result<DbDescriptor> {
        self.strategy().allocate_db().await
    }

    async fn deallocate_db(&self, db: &DbDescriptor) -> bool {
        self.strategy().deallocate_db(db).await
    }

    async fn reallocate_db_with_expiry(&self, expiry_minutes: u32, db: &DbDescriptor) -> bool {
        self.strategy()
            .reallocate_db_with_expiry(expiry_minutes, db)
            .await
    }

    async fn reallocate_db(&self, db: &DbDescriptor) -> bool {
        self.strategy().reallocate_db(db).await
    }

    async fn clean_db(&self, db: &DbDescriptor) -> bool {
        self.strategy().clean_db(db).await
    }

    fn requires_heartbeat(&self) -> bool {
        self.strategy().requires_heartbeat()
    }
}
