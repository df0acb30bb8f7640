//! Readiness probes
//!
//! Both probes share one shape: try, sleep one second on failure, give up
//! once the overall deadline has passed. Cancelling the prober's token wakes
//! the back-off sleep early and ends the loop with the failure value; an
//! attempt already in flight is not interrupted.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::config::Properties;
use crate::descriptor::DbDescriptor;
use crate::driver::DriverRegistry;
use crate::{Error, Result};

/// Pause between two attempts
pub const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Runs readiness probes against a provisioned database
#[derive(Debug, Clone, Default)]
pub struct Prober {
    cancel: CancellationToken,
}

impl Prober {
    /// Create a prober with its own cancellation token
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a prober stopped by `cancel`
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Token that stops running probes at their next back-off
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Sleep one retry interval. `false` if cancelled meanwhile.
    async fn back_off(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = sleep(RETRY_INTERVAL) => true,
        }
    }

    /// Wait until `host:port` accepts a TCP connection.
    ///
    /// Each attempt is bounded by `connect_timeout`. Returns `false` once
    /// `overall_timeout` has elapsed without success, or on cancellation.
    pub async fn wait_for_tcp(
        &self,
        host: &str,
        port: u16,
        connect_timeout: Duration,
        overall_timeout: Duration,
    ) -> bool {
        let started = Instant::now();
        while started.elapsed() < overall_timeout {
            match timeout(connect_timeout, TcpStream::connect((host, port))).await {
                Ok(Ok(stream)) => {
                    if let Ok(stream) = stream.into_std() {
                        let _ = stream.shutdown(std::net::Shutdown::Both);
                    }
                    tracing::debug!("{}:{} accepts connections", host, port);
                    return true;
                }
                Ok(Err(e)) => tracing::debug!("wait_for_tcp: {}:{}: {}", host, port, e),
                Err(_) => tracing::debug!(
                    "wait_for_tcp: {}:{}: no answer within {:?}",
                    host,
                    port,
                    connect_timeout
                ),
            }
            if !self.back_off().await {
                tracing::debug!("wait_for_tcp {}:{} interrupted", host, port);
                return false;
            }
        }
        // still not reachable
        false
    }

    /// Run the descriptor's heartbeat statement until it returns a row.
    ///
    /// The overall timeout comes from
    /// `db.timeout.waiting.for.heartbeat.statement` and is validated before
    /// anything else happens. A blank heartbeat statement skips the probe.
    ///
    /// # Errors
    ///
    /// Configuration, driver artifact, unknown driver and malformed URL
    /// errors abort immediately. SQL failures are retried; running out of
    /// time yields `Ok(false)`.
    pub async fn heartbeat(
        &self,
        props: &Properties,
        db: &DbDescriptor,
        driver_path: &Path,
        drivers: &DriverRegistry,
    ) -> Result<bool> {
        let overall_timeout = props.heartbeat_timeout()?;
        self.heartbeat_with_timeout(db, driver_path, drivers, overall_timeout)
            .await
    }

    /// [`Prober::heartbeat`] with an explicit, already validated timeout
    pub async fn heartbeat_with_timeout(
        &self,
        db: &DbDescriptor,
        driver_path: &Path,
        drivers: &DriverRegistry,
        overall_timeout: Duration,
    ) -> Result<bool> {
        let Some(statement) = db
            .heartbeat_statement()
            .filter(|stmt| !stmt.trim().is_empty())
        else {
            tracing::debug!("No heartbeat statement on descriptor, skipping liveness probe");
            return Ok(true);
        };

        let started = Instant::now();
        let class_name = db.ds_driver_class_name().ok_or_else(|| {
            Error::config("ds_driver_class_name must be set to run the heartbeat statement")
        })?;
        let url = db
            .ds_url()
            .ok_or_else(|| Error::MalformedUrl("no connection URL on descriptor".to_string()))?;

        let loaded = drivers.load(class_name, driver_path)?;
        let driver = loaded.handle();
        if !driver.accepts_url(url) {
            return Err(Error::MalformedUrl(format!(
                "{} does not accept {}",
                class_name, url
            )));
        }

        let url = Arc::<str>::from(url);
        let statement = Arc::<str>::from(statement);
        let user = db.ds_user().map(str::to_string);
        let password = db.ds_password().map(str::to_string);

        while started.elapsed() < overall_timeout {
            let attempt = {
                let driver = Arc::clone(&driver);
                let url = Arc::clone(&url);
                let statement = Arc::clone(&statement);
                let user = user.clone();
                let password = password.clone();
                tokio::task::spawn_blocking(move || {
                    let mut conn = driver.connect(&url, user.as_deref(), password.as_deref())?;
                    conn.query(&statement)
                })
                .await
            };

            let failure = match attempt {
                Ok(Ok(true)) => {
                    tracing::info!(
                        "Database answered {:?} after {:?}",
                        statement,
                        started.elapsed()
                    );
                    return Ok(true);
                }
                Ok(Ok(false)) => "statement returned no rows".to_string(),
                Ok(Err(e)) if e.is_fatal() => return Err(e),
                Ok(Err(e)) => e.to_string(),
                Err(join_error) => return Err(Error::Io(std::io::Error::other(join_error))),
            };

            let remaining = overall_timeout.saturating_sub(started.elapsed());
            tracing::error!(
                "DB not ready to answer the test statement: {}. Remaining time: {} ms, approx {} attempts. Cause: {}",
                statement,
                remaining.as_millis(),
                remaining.as_secs(),
                failure
            );

            if !self.back_off().await {
                tracing::debug!("Waiting for the heartbeat statement was interrupted");
                return Ok(false);
            }
        }

        Ok(false)
    }
}
