//! `load_config`: builds the run [`Config`] from defaults, an optional YAML
//! file and `NOTEBOOKIFY_*` environment variables.
//!
//! Precedence, lowest first: built-in defaults, YAML file, environment. CLI
//! flags are applied on top by the caller.
//!
//! The YAML file is `--config PATH` when given (missing file is an error), or
//! `notebookify.yaml` in the working directory when it exists. Every key is
//! optional:
//!
//! ```yaml
//! output_dir: docs/notebooks
//! template_dir: templates
//! template_name: template.jinja2
//! root_folder_id: 1AbCdEf
//! snapshots:
//!   enabled: true
//!   timeout_secs: 30
//! ```

use anyhow::Result;
use notebookify_core::config::Config;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "notebookify.yaml";

pub const ENV_OUTPUT_DIR: &str = "NOTEBOOKIFY_OUTPUT_DIR";
pub const ENV_TEMPLATE_DIR: &str = "NOTEBOOKIFY_TEMPLATE_DIR";
pub const ENV_ROOT_FOLDER_ID: &str = "NOTEBOOKIFY_ROOT_FOLDER_ID";
pub const ENV_TOKEN_PATH: &str = "NOTEBOOKIFY_TOKEN_PATH";
pub const ENV_METADATA_PATH: &str = "NOTEBOOKIFY_METADATA_PATH";
pub const ENV_CHROME: &str = "NOTEBOOKIFY_CHROME";

/// Load configuration. `path` is the explicit `--config` argument, if any.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => read_yaml(path)?,
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if fallback.is_file() {
                read_yaml(fallback)?
            } else {
                debug!("No config file given or found, using defaults");
                Config::default()
            }
        }
    };
    apply_env(&mut config);
    Ok(config)
}

fn read_yaml(path: &Path) -> Result<Config> {
    info!(config_path = ?path, "Loading configuration from file");

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path,
                e
            ));
        }
    };

    // An empty file is a valid "all defaults" config.
    if content.trim().is_empty() {
        return Ok(Config::default());
    }

    match serde_yaml::from_str::<Config>(&content) {
        Ok(config) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(config)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML {:?}: {e}", path))
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Overlay `NOTEBOOKIFY_*` variables onto `config`. Empty values are ignored.
pub fn apply_env(config: &mut Config) {
    if let Some(v) = env_value(ENV_OUTPUT_DIR) {
        config.output_dir = PathBuf::from(v);
    }
    if let Some(v) = env_value(ENV_TEMPLATE_DIR) {
        config.template_dir = PathBuf::from(v);
    }
    if let Some(v) = env_value(ENV_ROOT_FOLDER_ID) {
        config.root_folder_id = Some(v);
    }
    if let Some(v) = env_value(ENV_TOKEN_PATH) {
        config.token_path = PathBuf::from(v);
    }
    if let Some(v) = env_value(ENV_METADATA_PATH) {
        config.metadata_path = PathBuf::from(v);
    }
    if let Some(v) = env_value(ENV_CHROME) {
        config.snapshots.chrome_executable = Some(PathBuf::from(v));
    }
}
