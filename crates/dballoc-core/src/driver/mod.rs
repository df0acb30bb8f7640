//! Driver loading for the heartbeat probe
//!
//! Drivers are looked up by class name in a [`DriverRegistry`] that is
//! handed to whoever needs it; there is no process-wide registry. Loading a
//! driver checks that its artifact is readable and yields a [`LoadedDriver`]
//! that is released as soon as it goes out of scope, so repeated
//! allocations in the same process never accumulate driver instances.

pub mod embedded;
pub mod postgres;
pub mod resolver;

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{Error, Result};

pub use embedded::{EMBEDDED_DRIVER_CLASS, EMBEDDED_URL_PREFIX, EmbeddedDriver};
pub use postgres::{POSTGRES_DRIVER_CLASS, POSTGRES_URL_PREFIX, PostgresDriver};
pub use resolver::{DriverResolver, LocalRepositoryResolver};

/// A SQL driver able to open connections for a family of URLs
pub trait Driver: Send + Sync {
    /// Driver class name this instance answers to
    fn name(&self) -> &str;

    /// Whether `url` is one this driver understands
    fn accepts_url(&self, url: &str) -> bool;

    /// Open a connection
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sql`] when the database cannot be reached or refuses
    /// the credentials.
    fn connect(
        &self,
        url: &str,
        user: Option<&str>,
        password: Option<&str>,
    ) -> Result<Box<dyn DriverConnection>>;
}

/// An open connection; closed when dropped
pub trait DriverConnection: Send {
    /// Run `statement` and report whether it produced at least one row
    fn query(&mut self, statement: &str) -> Result<bool>;
}

/// Builds a driver from the artifact it ships in
pub type DriverFactory = Arc<dyn Fn(&Path) -> Result<Arc<dyn Driver>> + Send + Sync>;

/// Driver factories keyed by driver class name
#[derive(Clone, Default)]
pub struct DriverRegistry {
    factories: Arc<RwLock<HashMap<String, DriverFactory>>>,
}

impl DriverRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the embedded and PostgreSQL drivers registered
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register(EMBEDDED_DRIVER_CLASS, |_artifact| {
            Ok(Arc::new(EmbeddedDriver::new()) as Arc<dyn Driver>)
        });
        registry.register(POSTGRES_DRIVER_CLASS, |_artifact| {
            Ok(Arc::new(PostgresDriver::new()) as Arc<dyn Driver>)
        });
        registry
    }

    /// Register `factory` under `class_name`.
    ///
    /// Returns `true` if an earlier factory was replaced.
    pub fn register<F>(&self, class_name: impl Into<String>, factory: F) -> bool
    where
        F: Fn(&Path) -> Result<Arc<dyn Driver>> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .insert(class_name.into(), Arc::new(factory))
            .is_some()
    }

    /// Remove the factory registered under `class_name`
    pub fn unregister(&self, class_name: &str) -> bool {
        self.factories.write().remove(class_name).is_some()
    }

    /// Whether a factory is registered under `class_name`
    pub fn is_registered(&self, class_name: &str) -> bool {
        self.factories.read().contains_key(class_name)
    }

    /// Registered class names, sorted
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Load `class_name` from the artifact at `artifact`.
    ///
    /// # Errors
    ///
    /// * [`Error::DriverArtifact`] if the artifact is missing or unreadable
    /// * [`Error::UnknownDriver`] if nothing is registered under `class_name`
    pub fn load(&self, class_name: &str, artifact: &Path) -> Result<LoadedDriver> {
        let metadata = std::fs::metadata(artifact)
            .map_err(|e| Error::driver_artifact(artifact, e.to_string()))?;
        if !metadata.is_file() {
            return Err(Error::driver_artifact(artifact, "not a regular file"));
        }
        File::open(artifact).map_err(|e| Error::driver_artifact(artifact, e.to_string()))?;

        // Clone the factory out so it runs without holding the lock
        let factory = self
            .factories
            .read()
            .get(class_name)
            .cloned()
            .ok_or_else(|| Error::UnknownDriver(class_name.to_string()))?;

        let driver = factory(artifact)?;
        tracing::debug!("Loaded driver {} from {:?}", class_name, artifact);

        Ok(LoadedDriver {
            class_name: class_name.to_string(),
            driver,
        })
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("class_names", &self.class_names())
            .finish()
    }
}

/// A driver loaded for the duration of one probe
pub struct LoadedDriver {
    class_name: String,
    driver: Arc<dyn Driver>,
}

impl LoadedDriver {
    /// Class name the driver was loaded under
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Shared handle for work moved onto other threads
    pub fn handle(&self) -> Arc<dyn Driver> {
        Arc::clone(&self.driver)
    }
}

impl Drop for LoadedDriver {
    fn drop(&mut self) {
        tracing::trace!("Released driver {}", self.class_name);
    }
}
