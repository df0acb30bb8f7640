//! Configuration loading from file and process environment

use std::io::Write;

use dballoc_core::config::keys;
use dballoc_core::{AllocationStrategy, AllocatorContext, Mode, Properties};
use serial_test::serial;
use tempfile::NamedTempFile;

fn set_env(name: &str, value: &str) {
    // SAFETY: every test touching the environment is #[serial]
    unsafe { std::env::set_var(name, value) }
}

fn remove_env(name: &str) {
    // SAFETY: see set_env
    unsafe { std::env::remove_var(name) }
}

#[test]
#[serial]
fn test_env_overrides_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
"test.db.type" = "ci-fixed-remote"

[version]
"com.h2database" = "2.2.224"
"#
    )
    .unwrap();

    set_env("DBALLOC_TEST_DB_TYPE", "embedded");
    let props = Properties::load(Some(file.path()));
    remove_env("DBALLOC_TEST_DB_TYPE");

    let props = props.unwrap();
    assert_eq!(props.get(keys::MODE), Some("embedded"));
    assert_eq!(props.get(keys::H2_VERSION), Some("2.2.224"));
    let ctx = AllocatorContext::new(props);
    assert_eq!(ctx.get_instance().unwrap().mode(), Mode::Embedded);
}

#[test]
#[serial]
fn test_missing_file_is_config_error() {
    let err = Properties::load(Some(std::path::Path::new("/nonexistent/dballoc.toml")))
        .unwrap_err();
    assert!(err.to_string().contains("/nonexistent/dballoc.toml"));
}

#[test]
#[serial]
fn test_no_file_reads_environment_only() {
    set_env("DBALLOC_PGSQL_PORTNUMBER", "6543");
    let props = Properties::load(None);
    remove_env("DBALLOC_PGSQL_PORTNUMBER");

    assert_eq!(props.unwrap().get(keys::PGSQL_PORT), Some("6543"));
}
