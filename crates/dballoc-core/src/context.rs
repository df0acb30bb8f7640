//! Allocation context
//!
//! [`AllocatorContext`] owns everything a test harness needs to provision a
//! database: the configuration snapshot, the driver registry, the prober
//! and the allocator selected for this process. The allocator is chosen on
//! the first successful [`AllocatorContext::get_instance`] call and reused
//! for the lifetime of the context.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::allocator::{AllocationStrategy, Allocator};
use crate::config::Properties;
use crate::descriptor::DbDescriptor;
use crate::driver::{DriverRegistry, DriverResolver};
use crate::probe::Prober;
use crate::{Error, Result};

/// Process-wide allocation state, passed explicitly to callers
#[derive(Debug)]
pub struct AllocatorContext {
    properties: Properties,
    drivers: DriverRegistry,
    prober: Prober,
    allocator: OnceCell<Arc<Allocator>>,
}

/// A database that was allocated, resolved and verified
#[derive(Debug, Clone)]
pub struct ProvisionedDb {
    /// Descriptor returned by the allocator
    pub descriptor: DbDescriptor,
    /// Local jar the driver was resolved to
    pub driver_path: PathBuf,
}

impl AllocatorContext {
    /// Create a context over `properties` with the built-in drivers
    pub fn new(properties: Properties) -> Self {
        Self {
            properties,
            drivers: DriverRegistry::with_builtin(),
            prober: Prober::new(),
            allocator: OnceCell::new(),
        }
    }

    /// Replace the driver registry
    pub fn with_drivers(mut self, drivers: DriverRegistry) -> Self {
        self.drivers = drivers;
        self
    }

    /// Replace the prober, e.g. to share a cancellation token
    pub fn with_prober(mut self, prober: Prober) -> Self {
        self.prober = prober;
        self
    }

    /// Configuration snapshot
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Driver registry used by the heartbeat probe
    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    /// Prober used for readiness checks
    pub fn prober(&self) -> &Prober {
        &self.prober
    }

    /// The allocator for this process.
    ///
    /// The mode is read once; the first successful call builds and caches
    /// the allocator and every later call returns the same instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the mode is missing, empty or unknown.
    pub fn get_instance(&self) -> Result<Arc<Allocator>> {
        self.allocator
            .get_or_try_init(|| {
                let allocator = match Allocator::from_properties(&self.properties)? {
                    Allocator::Container(container) => {
                        Allocator::Container(container.with_prober(self.prober.clone()))
                    }
                    other => other,
                };
                tracing::info!("Selected {} database allocator", allocator.mode());
                Ok(Arc::new(allocator))
            })
            .cloned()
    }

    /// Check that `db` answers queries, when its strategy asks for it.
    ///
    /// Strategies that do not require a heartbeat are skipped. For those
    /// that do, a blank heartbeat statement is a configuration error.
    pub async fn verify_ready(
        &self,
        allocator: &Allocator,
        db: &DbDescriptor,
        driver_path: &Path,
    ) -> Result<bool> {
        if !allocator.requires_heartbeat() {
            tracing::debug!(
                "{} allocator does not require a heartbeat, skipping",
                allocator.mode()
            );
            return Ok(true);
        }
        if !db.has_heartbeat() {
            return Err(Error::config(format!(
                "heartbeat statement on the descriptor must be set for the {} allocator, \
                 check the allocator and the db.timeout.waiting.for.heartbeat.statement property.",
                allocator.mode()
            )));
        }
        self.prober
            .heartbeat(&self.properties, db, driver_path, &self.drivers)
            .await
    }

    /// Allocate a database, resolve its driver and verify it is ready.
    ///
    /// Once a descriptor exists every failure deallocates it before the
    /// error is returned.
    pub async fn provision(&self, resolver: &dyn DriverResolver) -> Result<ProvisionedDb> {
        self.provision_with_expiry(0, resolver).await
    }

    /// [`AllocatorContext::provision`] with a lease hint
    pub async fn provision_with_expiry(
        &self,
        expiry_minutes: u32,
        resolver: &dyn DriverResolver,
    ) -> Result<ProvisionedDb> {
        let allocator = self.get_instance()?;
        tracing::info!(
            "Allocating a new database might take many minutes, depending on the {} mode.",
            allocator.mode()
        );
        let descriptor = allocator.allocate_db_with_expiry(expiry_minutes).await?;

        match self.prepare(&allocator, &descriptor, resolver).await {
            Ok(driver_path) => Ok(ProvisionedDb {
                descriptor,
                driver_path,
            }),
            Err(e) => {
                tracing::error!("Database setup failed, releasing it: {}", e);
                allocator.deallocate_db(&descriptor).await;
                Err(e)
            }
        }
    }

    async fn prepare(
        &self,
        allocator: &Allocator,
        descriptor: &DbDescriptor,
        resolver: &dyn DriverResolver,
    ) -> Result<PathBuf> {
        let artifact = descriptor
            .db_driver_artifact()
            .ok_or_else(|| Error::config("descriptor does not name a driver artifact"))?;
        let driver_path = resolver.resolve(artifact)?;

        if !self.verify_ready(allocator, descriptor, &driver_path).await? {
            return Err(Error::NotReady(
                "the database system is not ready to execute statements, check the database logs"
                    .to_string(),
            ));
        }
        Ok(driver_path)
    }

    /// Release a provisioned database through the cached allocator
    pub async fn release(&self, provisioned: &ProvisionedDb) -> bool {
        match self.allocator.get() {
            Some(allocator) => allocator.deallocate_db(&provisioned.descriptor).await,
            // Nothing was ever allocated through this context
            None => true,
        }
    }
}
