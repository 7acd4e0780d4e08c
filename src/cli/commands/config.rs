//! The config command: validate and print the effective configuration.

use super::shared::{load_configuration, setup_logging};
use crate::cli::args::ConfigArgs;
use crate::config::QcConfig;
use crate::engine::build_plan;
use anyhow::Result;
use tracing::info;

pub fn run_config(args: ConfigArgs) -> Result<QcConfig> {
    setup_logging(args.get_log_level(), false);

    let config = load_configuration(args.config_file.as_ref())?;
    let plan = build_plan(&config);
    info!(
        "Configuration is valid: {} steps expand to {} checks",
        config.steps.len(),
        plan.len()
    );

    print!("{}", config.to_yaml_string()?);
    Ok(config)
}
