use anyhow::Result;
use clap::Args;
use dballoc_core::{AllocationStrategy, AllocatorContext, context_resources};

use super::OutputContext;

#[derive(Args, Debug)]
pub struct UpArgs {
    /// Lease length hint in minutes; 0 uses the configured default
    #[arg(long, default_value_t = 0)]
    pub expiry_minutes: u32,

    /// Also print the data source resource entries
    #[arg(long)]
    pub resources: bool,
}

pub async fn execute(ctx: &AllocatorContext, args: UpArgs, output: &OutputContext) -> Result<()> {
    let mode = ctx.get_instance()?.mode();
    let provisioned = super::provision(ctx, args.expiry_minutes).await?;
    output.print_descriptor(&provisioned)?;

    if args.resources {
        for entry in context_resources(&provisioned.descriptor) {
            println!("{}", entry.to_xml());
        }
    }

    if !output.json {
        output.print_info(&format!(
            "{} database is up, press Ctrl-C to release it",
            mode
        ));
    }
    ctx.prober().cancellation_token().cancelled().await;

    if ctx.release(&provisioned).await {
        if !output.json {
            output.print_success("Database released");
        }
    } else {
        output.print_error("Database could not be released");
    }
    Ok(())
}
