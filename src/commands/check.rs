//! Check command implementation

use super::{cancel_on_ctrl_c, connect};
use crate::checks::report::{render_list, render_object};
use crate::checks::{run_checks, CheckOptions};
use crate::cli::CheckArgs;
use crate::config::{load_config, AppConfig};
use crate::error::Result;
use crate::output::format_lines;

/// Execute the check command; returns the process exit code
pub async fn run_check(context: Option<&str>, args: &CheckArgs) -> Result<i32> {
    let config = load_config()?;
    let options = check_options(&config, args);
    options.validate()?;

    let cluster = connect(context, &config).await?;
    let cancel = cancel_on_ctrl_c();
    let result = run_checks(&cluster, &options, &cancel).await?;

    if options.as_list {
        println!("{}", format_lines(&render_list(&result)));
    } else {
        println!("{}", render_object(&result)?);
    }
    Ok(result.exit_code())
}

/// Map command line arguments onto engine options
pub fn check_options(config: &AppConfig, args: &CheckArgs) -> CheckOptions {
    CheckOptions {
        ops_service: args.ops_service,
        pre: args.pre,
        post: args.post,
        as_list: !args.as_object,
        detail_level: args.detail_level,
        resource_kinds: args.resources.clone(),
        resource_name: args.resource_name.clone(),
        mq_insecure: args.mq_insecure,
        ..CheckOptions::from_config(config)
    }
}
