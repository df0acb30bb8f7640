//! Shared helpers for dballoc-core integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use dballoc_core::Properties;
use dballoc_core::config::keys;

/// H2 version used by the embedded fixtures
pub const H2_VERSION: &str = "2.2.224";

/// Initialize test logging (safe to call from every test)
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("dballoc_core=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Properties selecting the embedded mode
pub fn embedded_props() -> Properties {
    Properties::new()
        .with(keys::MODE, "embedded")
        .with(keys::H2_VERSION, H2_VERSION)
        .with(keys::HEARTBEAT_TIMEOUT, "3000")
}

/// Write a placeholder driver jar at the Maven layout path under `repo`
pub fn install_jar(repo: &Path, group: &str, artifact: &str, version: &str) -> PathBuf {
    let mut dir = repo.to_path_buf();
    dir.extend(group.split('.'));
    dir.push(artifact);
    dir.push(version);
    std::fs::create_dir_all(&dir).unwrap();
    let jar = dir.join(format!("{}-{}.jar", artifact, version));
    std::fs::write(&jar, b"PK\x03\x04").unwrap();
    jar
}
