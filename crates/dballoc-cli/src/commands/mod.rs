pub mod check;
pub mod config;
pub mod up;
pub mod wait_tcp;

use anyhow::Result;
use dballoc_core::DbDescriptor;
use dballoc_core::driver::LocalRepositoryResolver;
use dballoc_core::{AllocatorContext, ProvisionedDb};

#[derive(Debug, Clone)]
pub struct OutputContext {
    pub json: bool,
    pub verbose: bool,
}

impl OutputContext {
    pub fn print_json<T: serde::Serialize>(&self, data: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(data)?);
        Ok(())
    }

    pub fn print_success(&self, message: &str) {
        use colored::Colorize;
        println!("{} {}", "✓".green(), message);
    }

    pub fn print_error(&self, message: &str) {
        use colored::Colorize;
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn print_info(&self, message: &str) {
        use colored::Colorize;
        println!("{} {}", "ℹ".blue(), message);
    }

    /// Print a descriptor; the password is masked outside JSON mode
    pub fn print_descriptor(&self, provisioned: &ProvisionedDb) -> Result<()> {
        if self.json {
            return self.print_json(&serde_json::json!({
                "descriptor": provisioned.descriptor,
                "driver_path": provisioned.driver_path,
            }));
        }

        let db = &provisioned.descriptor;
        for (label, value) in descriptor_rows(db) {
            println!("{:<22} {}", label, value.unwrap_or("(not set)"));
        }
        println!("{:<22} {}", "driver path", provisioned.driver_path.display());
        if self.verbose {
            for (key, value) in db.allocation_properties() {
                println!("{:<22} {}", key, value);
            }
        }
        Ok(())
    }
}

fn descriptor_rows(db: &DbDescriptor) -> Vec<(&'static str, Option<&str>)> {
    vec![
        ("url", db.ds_url()),
        ("type", db.ds_type()),
        ("user", db.ds_user()),
        ("password", db.ds_password().map(|_| "********")),
        ("database", db.ds_db_name()),
        ("host", db.ds_db_hostname()),
        ("port", db.ds_db_port()),
        ("schema", db.ds_schema()),
        ("driver class", db.ds_driver_class_name()),
        ("driver artifact", db.db_driver_artifact()),
        ("heartbeat", db.heartbeat_statement()),
    ]
}

/// Provision through `ctx`, resolving drivers from the configured repository
pub async fn provision(ctx: &AllocatorContext, expiry_minutes: u32) -> Result<ProvisionedDb> {
    let resolver = LocalRepositoryResolver::from_properties(ctx.properties());
    let provisioned = ctx.provision_with_expiry(expiry_minutes, &resolver).await?;
    Ok(provisioned)
}
