//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;

use std::path::Path;

use contracts::SyncConfig;
use tracing::info;

use crate::error::CliError;

/// Load a config file, or fall back to built-in defaults when none is given
fn load_config(path: Option<&Path>) -> Result<SyncConfig, CliError> {
    let Some(path) = path else {
        info!("No configuration file given, using defaults");
        return Ok(SyncConfig::default());
    };

    if !path.exists() {
        return Err(CliError::config_not_found(path));
    }

    info!(config = %path.display(), "Loading configuration");
    Ok(config_loader::ConfigLoader::load_from_path(path)?)
}
