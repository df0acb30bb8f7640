//! Container-launched PostgreSQL allocator
//!
//! Starts one disposable PostgreSQL container per allocation through the
//! container runtime CLI, publishes its port on loopback and waits for the
//! port to accept connections. The descriptor carries a heartbeat statement
//! because an open port does not mean the server is ready for queries.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use uuid::Uuid;

use super::{AllocationStrategy, Mode, XA_DATASOURCE_TYPE};
use crate::config::{Properties, keys};
use crate::descriptor::{DbDescriptor, DescriptorSpec};
use crate::probe::Prober;
use crate::{Error, Result};

/// Allocation property holding the container id
pub const CONTAINER_ID: &str = "container.id";
/// Allocation property holding the container name
pub const CONTAINER_NAME: &str = "container.name";
/// Allocation property holding the runtime that started the container
pub const CONTAINER_RUNTIME: &str = "container.runtime";
/// Allocation property recording the requested expiry
pub const CONTAINER_EXPIRY: &str = "container.expiry.minutes";

const POSTGRES_PORT: &str = "5432/tcp";
const PUBLISH_HOST: &str = "127.0.0.1";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Launches a PostgreSQL container per allocation
#[derive(Debug, Clone)]
pub struct ContainerAllocator {
    props: Properties,
    runtime: String,
    image: String,
    user: String,
    password: String,
    database: String,
    startup_timeout: Duration,
    heartbeat: String,
    prober: Prober,
}

impl ContainerAllocator {
    /// Read container settings, applying defaults
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let startup_ms: u64 = props.parsed_or(keys::CONTAINER_STARTUP_TIMEOUT, 60_000)?;
        Ok(Self {
            props: props.clone(),
            runtime: props.get_or(keys::CONTAINER_RUNTIME, "docker"),
            image: props.get_or(keys::CONTAINER_IMAGE, "postgres:16-alpine"),
            user: props.get_or(keys::CONTAINER_USER, "test"),
            password: props.get_or(keys::CONTAINER_PASSWORD, "test"),
            database: props.get_or(keys::CONTAINER_DATABASE, "test"),
            startup_timeout: Duration::from_millis(startup_ms),
            heartbeat: props.get_or(keys::CONTAINER_HEARTBEAT, "SELECT 1"),
            prober: Prober::new(),
        })
    }

    /// Use `prober` (and its cancellation token) for startup waits
    pub fn with_prober(mut self, prober: Prober) -> Self {
        self.prober = prober;
        self
    }

    /// Arguments for `<runtime> run`
    fn run_args(&self, name: &str, expiry_minutes: u32) -> Vec<String> {
        vec![
            "run".into(),
            "-d".into(),
            "--rm".into(),
            "--name".into(),
            name.into(),
            "--label".into(),
            format!("dballoc.expiry.minutes={}", expiry_minutes),
            "-e".into(),
            format!("POSTGRES_USER={}", self.user),
            "-e".into(),
            format!("POSTGRES_PASSWORD={}", self.password),
            "-e".into(),
            format!("POSTGRES_DB={}", self.database),
            "-p".into(),
            format!("{}::5432", PUBLISH_HOST),
            self.image.clone(),
        ]
    }

    /// Run the container runtime and return its trimmed stdout
    async fn runtime(&self, args: &[&str]) -> Result<String> {
        tracing::debug!("{} {}", self.runtime, args.join(" "));
        let output = Command::new(&self.runtime)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::container(format!("cannot run {}: {}", self.runtime, e)))?;
        if !output.status.success() {
            return Err(Error::container(format!(
                "{} {} failed: {}",
                self.runtime,
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn remove(&self, id: &str) -> bool {
        match self.runtime(&["rm", "-f", id]).await {
            Ok(_) => {
                tracing::info!("Removed database container {}", id);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to remove database container {}: {}", id, e);
                false
            }
        }
    }

    /// Publish, wait and describe a freshly started container
    async fn describe(&self, id: &str, name: &str, expiry_minutes: u32) -> Result<DbDescriptor> {
        let driver_version = self.props.require(keys::POSTGRESQL_VERSION)?;
        let published = self.runtime(&["port", id, POSTGRES_PORT]).await?;
        let (host, port) = parse_published_port(&published).ok_or_else(|| {
            Error::container(format!("cannot parse published port from {:?}", published))
        })?;

        if !self
            .prober
            .wait_for_tcp(&host, port, CONNECT_TIMEOUT, self.startup_timeout)
            .await
        {
            return Err(Error::container(format!(
                "container {} did not accept connections on {}:{} within {:?}",
                name, host, port, self.startup_timeout
            )));
        }

        let mut allocation_properties = std::collections::BTreeMap::new();
        allocation_properties.insert(CONTAINER_ID.to_string(), id.to_string());
        allocation_properties.insert(CONTAINER_NAME.to_string(), name.to_string());
        allocation_properties.insert(CONTAINER_RUNTIME.to_string(), self.runtime.clone());
        allocation_properties.insert(CONTAINER_EXPIRY.to_string(), expiry_minutes.to_string());

        Ok(DescriptorSpec {
            ds_type: Some("org.postgresql.xa.PGXADataSource".into()),
            ds_username: Some(self.user.clone()),
            ds_user: Some(self.user.clone()),
            ds_password: Some(self.password.clone()),
            ds_db_name: Some(self.database.clone()),
            ds_db_port: Some(port.to_string()),
            ds_db_hostname: Some(host.clone()),
            ds_url: Some(format!(
                "jdbc:postgresql://{}:{}/{}",
                host, port, self.database
            )),
            ds_login_timeout: Some("0".into()),
            ds_factory: Some("org.postgresql.xa.PGXADataSourceFactory".into()),
            ds_driver_class_name: Some("org.postgresql.Driver".into()),
            tds_type: Some(XA_DATASOURCE_TYPE.into()),
            db_driver_artifact: Some(format!("org.postgresql:postgresql:{}", driver_version)),
            heartbeat_statement: Some(self.heartbeat.clone()),
            allocation_properties,
            ..Default::default()
        }
        .build())
    }
}

/// Parse `<runtime> port` output such as `127.0.0.1:49153` or `[::]:49153`
fn parse_published_port(output: &str) -> Option<(String, u16)> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let (host, port) = line.rsplit_once(':')?;
    let port = port.parse().ok()?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let host = match host {
        "" | "0.0.0.0" | "::" => PUBLISH_HOST,
        other => other,
    };
    Some((host.to_string(), port))
}

#[async_trait]
impl AllocationStrategy for ContainerAllocator {
    fn mode(&self) -> Mode {
        Mode::Container
    }

    async fn allocate_db_with_expiry(&self, expiry_minutes: u32) -> Result<DbDescriptor> {
        let name = format!("dballoc-{}", Uuid::new_v4().simple());
        let args = self.run_args(&name, expiry_minutes);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let id = self.runtime(&args).await?;
        tracing::info!("Started database container {} ({}) from {}", name, id, self.image);

        match self.describe(&id, &name, expiry_minutes).await {
            Ok(db) => Ok(db),
            Err(e) => {
                self.remove(&id).await;
                Err(e)
            }
        }
    }

    async fn deallocate_db(&self, db: &DbDescriptor) -> bool {
        match db.allocation_property(CONTAINER_ID) {
            Some(id) => self.remove(id).await,
            // Not started by us
            None => true,
        }
    }

    async fn reallocate_db_with_expiry(&self, _expiry_minutes: u32, db: &DbDescriptor) -> bool {
        let Some(id) = db.allocation_property(CONTAINER_ID) else {
            return true;
        };
        match self
            .runtime(&["inspect", "-f", "{{.State.Running}}", id])
            .await
        {
            Ok(running) => running == "true",
            Err(e) => {
                tracing::warn!("Cannot inspect database container {}: {}", id, e);
                false
            }
        }
    }

    async fn clean_db(&self, db: &DbDescriptor) -> bool {
        let Some(id) = db.allocation_property(CONTAINER_ID) else {
            return true;
        };
        let user = db.ds_user().unwrap_or(&self.user);
        let database = db.ds_db_name().unwrap_or(&self.database);
        let result = self
            .runtime(&[
                "exec",
                id,
                "psql",
                "-U",
                user,
                "-d",
                database,
                "-c",
                "DROP SCHEMA public CASCADE; CREATE SCHEMA public;",
            ])
            .await;
        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Cannot clean database in container {}: {}", id, e);
                false
            }
        }
    }

    fn requires_heartbeat(&self) -> bool {
        true
    }
}
