//! opsdiag - health checks and support bundles for edge IoT operations clusters

use anyhow::Result;
use clap::Parser;
use opsdiag::cli::{Cli, Command, SupportCommand};
use opsdiag::commands;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose);

    if cli.no_color {
        owo_colors::set_override(false);
    }

    let context = cli.context.as_deref();
    let result = match cli.command {
        Command::Check(ref args) => commands::run_check(context, args).await,
        Command::Support(ref support) => match support.command {
            SupportCommand::CreateBundle(ref args) => {
                commands::run_create_bundle(context, args).await
            }
        },
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}

/// Logs go to stderr so stdout stays parseable
fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
