//! dballoc core - test database allocation and readiness probing
//!
//! This crate hands a test harness a database to run against, whatever
//! backend the environment provides:
//! - In-memory embedded database for local runs
//! - Always-on CI PostgreSQL
//! - Disposable PostgreSQL containers
//! - Databases leased from an external allocation service
//! - Statically configured external databases
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │             AllocatorContext                │
//! │   (mode selection, provision, release)      │
//! └──────────────┬──────────────────────────────┘
//!                │
//! ┌──────────────┴──────────────────────────────┐
//! │        Allocator (AllocationStrategy)       │
//! │  embedded | ci | container | rest | static  │
//! └──────────────┬──────────────────────────────┘
//!                │ DbDescriptor
//! ┌──────────────┴──────────────────────────────┐
//! │                  Prober                     │
//! │   (TCP wait, heartbeat via DriverRegistry)  │
//! └─────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod allocator;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod driver;
pub mod error;
pub mod probe;
pub mod resources;

pub use allocator::{AllocationStrategy, Allocator, Mode};
pub use config::Properties;
pub use context::{AllocatorContext, ProvisionedDb};
pub use descriptor::{DbDescriptor, DescriptorSpec};
pub use driver::{DriverRegistry, DriverResolver, LocalRepositoryResolver};
pub use error::{Error, Result};
pub use probe::Prober;
pub use resources::{ResourceEntry, context_resources};
