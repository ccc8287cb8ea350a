//! CLI command definitions using clap

use crate::checks::DetailLevel;
use crate::resources::ServiceKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "opsdiag",
    version,
    about = "Health checks and support bundles for edge IoT operations clusters",
    long_about = None,
)]
pub struct Cli {
    /// Kubernetes context to use
    #[arg(long, global = true, env = "OPSDIAG_CONTEXT")]
    pub context: Option<String>,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Evaluate cluster readiness and deployed service resources
    Check(CheckArgs),

    /// Support bundle operations
    Support(SupportArgs),
}

#[derive(Args, Clone, Debug)]
pub struct CheckArgs {
    /// Run pre-deployment checks
    #[arg(long)]
    pub pre: bool,

    /// Run post-deployment checks
    #[arg(long)]
    pub post: bool,

    /// Service to evaluate (mq, opcua, deviceregistry, akri, dataflow)
    #[arg(long = "ops-service", visible_alias = "svc")]
    pub ops_service: Option<ServiceKind>,

    /// Only evaluate these kinds of the selected service
    #[arg(long = "resources", num_args = 1..)]
    pub resources: Vec<String>,

    /// Only evaluate resources whose name matches this glob
    #[arg(long)]
    pub resource_name: Option<String>,

    /// How much resource detail to show
    #[arg(long, value_enum, default_value_t)]
    pub detail_level: DetailLevel,

    /// Print the result as a JSON object instead of a styled list
    #[arg(long)]
    pub as_object: bool,

    /// Expect the broker to run without internal traffic encryption
    #[arg(long)]
    pub mq_insecure: bool,
}

#[derive(Args, Debug)]
pub struct SupportArgs {
    #[command(subcommand)]
    pub command: SupportCommand,
}

#[derive(Subcommand, Debug)]
pub enum SupportCommand {
    /// Collect logs, manifests, events and traces into a zip archive
    CreateBundle(BundleArgs),
}

#[derive(Args, Clone, Debug)]
pub struct BundleArgs {
    /// Limit collection to one service
    #[arg(long = "ops-service", visible_alias = "svc")]
    pub ops_service: Option<ServiceKind>,

    /// Include broker traces from the diagnostics probe
    #[arg(long)]
    pub mq_traces: bool,

    /// Directory the archive is written to
    #[arg(long, default_value = ".")]
    pub bundle_dir: PathBuf,

    /// Only collect log lines newer than this (e.g. 30m, 2h)
    #[arg(long)]
    pub log_age: Option<humantime::Duration>,

    /// Keep an unfinished archive with a .partial suffix
    #[arg(long)]
    pub keep_partial: bool,
}
