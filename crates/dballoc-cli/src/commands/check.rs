use anyhow::{Result, bail};
use clap::Args;
use dballoc_core::{AllocationStrategy, AllocatorContext};

use super::OutputContext;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Lease length hint in minutes; 0 uses the configured default
    #[arg(long, default_value_t = 0)]
    pub expiry_minutes: u32,
}

pub async fn execute(
    ctx: &AllocatorContext,
    args: CheckArgs,
    output: &OutputContext,
) -> Result<()> {
    let mode = ctx.get_instance()?.mode();
    if !output.json {
        output.print_info(&format!("Provisioning a {} database", mode));
    }

    let provisioned = super::provision(ctx, args.expiry_minutes).await?;
    output.print_descriptor(&provisioned)?;

    if !ctx.release(&provisioned).await {
        bail!("the {} database could not be released", mode);
    }
    if !output.json {
        output.print_success("Database provisioned, verified and released");
    }
    Ok(())
}
