//! Support bundle command implementation

use super::{cancel_on_ctrl_c, connect};
use crate::cli::BundleArgs;
use crate::config::{load_config, AppConfig};
use crate::error::Result;
use crate::output::format_bundle_summary;
use crate::support::{create_bundle, BundleOptions, PartialPolicy};
use chrono::{DateTime, Utc};

/// Execute `support create-bundle`; returns the process exit code
pub async fn run_create_bundle(context: Option<&str>, args: &BundleArgs) -> Result<i32> {
    let config = load_config()?;
    let options = bundle_options(&config, args, Utc::now());

    let cluster = connect(context, &config).await?;
    let cancel = cancel_on_ctrl_c();
    let summary = create_bundle(&cluster, &options, &cancel).await?;

    println!("{}", format_bundle_summary(&summary));
    Ok(if summary.cancelled { 1 } else { 0 })
}

/// Map command line arguments onto collector options
pub fn bundle_options(config: &AppConfig, args: &BundleArgs, now: DateTime<Utc>) -> BundleOptions {
    let mut options = BundleOptions::from_config(config, args.bundle_dir.clone(), now);
    options.services = args.ops_service.into_iter().collect();
    options.include_mq_traces = args.mq_traces;
    options.log_age = args.log_age.map(Into::into);
    if args.keep_partial {
        options.partial_policy = PartialPolicy::KeepPartial;
    }
    options
}
