use std::time::Duration;

use anyhow::{Result, bail};
use clap::Args;
use dballoc_core::AllocatorContext;

use super::OutputContext;

#[derive(Args, Debug)]
pub struct WaitTcpArgs {
    /// Host to connect to
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Port to connect to
    #[arg(long)]
    pub port: u16,

    /// Timeout of a single connection attempt
    #[arg(long, default_value_t = 1000)]
    pub connect_timeout_ms: u64,

    /// Give up after this long
    #[arg(long, default_value_t = 30_000)]
    pub timeout_ms: u64,
}

pub async fn execute(
    ctx: &AllocatorContext,
    args: WaitTcpArgs,
    output: &OutputContext,
) -> Result<()> {
    let ready = ctx
        .prober()
        .wait_for_tcp(
            &args.host,
            args.port,
            Duration::from_millis(args.connect_timeout_ms),
            Duration::from_millis(args.timeout_ms),
        )
        .await;

    if output.json {
        output.print_json(&serde_json::json!({
            "host": args.host,
            "port": args.port,
            "ready": ready,
        }))?;
    }
    if !ready {
        bail!(
            "{}:{} did not accept connections within {} ms",
            args.host,
            args.port,
            args.timeout_ms
        );
    }
    if !output.json {
        output.print_success(&format!("{}:{} accepts connections", args.host, args.port));
    }
    Ok(())
}
