use anyhow::Result;
use clap::Parser;
use dballoc_cli::commands::{self, check, config as config_cmd, up, wait_tcp};
use dballoc_cli::{Cli, Commands, init_tracing};
use dballoc_core::{AllocatorContext, Prober};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let props = cli.properties()?;

    // Ctrl-C stops running probes at their next back-off and ends `up`
    let prober = Prober::new();
    let cancel = prober.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            cancel.cancel();
        }
    });
    let ctx = AllocatorContext::new(props).with_prober(prober);

    let output = commands::OutputContext {
        json: cli.json,
        verbose: cli.verbose,
    };

    let result = match cli.command {
        Commands::Check(args) => check::execute(&ctx, args, &output).await,
        Commands::Up(args) => up::execute(&ctx, args, &output).await,
        Commands::WaitTcp(args) => wait_tcp::execute(&ctx, args, &output).await,
        Commands::Config => config_cmd::execute(&ctx, &output),
    };

    if let Err(e) = result {
        output.print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}
