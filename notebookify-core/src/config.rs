use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Run configuration, built once at startup and handed to each component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output_dir: PathBuf,
    pub template_dir: PathBuf,
    pub template_name: String,
    pub metadata_path: PathBuf,
    pub token_path: PathBuf,
    pub root_folder_id: Option<String>,
    pub notebook_extension: String,
    pub snapshots: SnapshotSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            template_dir: PathBuf::from("templates"),
            template_name: "template.jinja2".to_string(),
            metadata_path: PathBuf::from("drive_metadata.json"),
            token_path: PathBuf::from("token.json"),
            root_folder_id: None,
            notebook_extension: "ipynb".to_string(),
            snapshots: SnapshotSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSettings {
    pub enabled: bool,
    pub chrome_executable: Option<PathBuf>,
    pub plotly_js_url: String,
    pub timeout_secs: u64,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            chrome_executable: None,
            plotly_js_url: "https://cdn.plot.ly/plotly-2.35.2.min.js".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn trace_loaded(&self) {
        info!(
            output_dir = %self.output_dir.display(),
            template_dir = %self.template_dir.display(),
            template = %self.template_name,
            metadata_path = %self.metadata_path.display(),
            root_folder_id = ?self.root_folder_id,
            snapshots = self.snapshots.enabled,
            "Loaded Config"
        );
        debug!(?self, "Config loaded (full debug)");
    }
}
