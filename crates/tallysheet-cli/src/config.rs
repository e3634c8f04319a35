//! Run configuration
//!
//! Read from a TOML file. Every field has a default, so an empty file (or no
//! file at all) formats the standard advertising delivery report.
//!
//! ```toml
//! sheet_name = "Report data"
//! inputs_dir = "inputs"
//! outputs_dir = "outputs"
//!
//! [cleaning]
//! goal_threshold = 1000
//!
//! [engine.semantics]
//! ratio = ["Ad server CTR"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tallysheet_engine::EngineConfig;
use tallysheet_xlsx::StyleConfig;

/// Input cleaning options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Goal quantities at or below this are treated as missing
    pub goal_threshold: f64,
    pub goal_column: String,
    /// Fallback source for `Native` creative sizes
    pub native_format_column: String,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            goal_threshold: 1000.0,
            goal_column: "Goal quantity".into(),
            native_format_column: "DAP Native Format".into(),
        }
    }
}

/// Full configuration of a formatter run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sheet_name: String,
    pub inputs_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub template: PathBuf,
    /// Used only if the file exists
    pub icon: Option<PathBuf>,
    pub output_prefix: String,
    /// Columns every input must carry
    pub required_columns: Vec<String>,
    /// Columns of the formatted report, in order
    pub report_columns: Vec<String>,
    pub cleaning: CleaningConfig,
    pub engine: EngineConfig,
    pub style: StyleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sheet_name: "Report data".into(),
            inputs_dir: "inputs".into(),
            outputs_dir: "outputs".into(),
            template: Path::new("assets").join("template.xlsx"),
            icon: Some(Path::new("assets").join("icon.png")),
            output_prefix: "formatted_".into(),
            required_columns: to_strings(&[
                "Line Item",
                "Creative",
                "Delivery Indicator",
                "Line item start date",
                "Line item end date",
                "Goal quantity",
                "Creative Size",
                "DAP Native Format",
                "Ad server impressions",
                "Ad server clicks",
                "Ad server CTR",
            ]),
            report_columns: to_strings(&[
                "Line Item",
                "Line item start date",
                "Line item end date",
                "Goal quantity",
                "Creative Size",
                "Delivery Indicator",
                "Ad server impressions",
                "Ad server clicks",
                "Ad server CTR",
            ]),
            cleaning: CleaningConfig::default(),
            engine: EngineConfig::default(),
            style: StyleConfig::default(),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Config {
    /// Load from `path`, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let Some(path) = path else {
            return Ok(Config::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Config::parse(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Config> {
        Ok(toml::from_str(text)?)
    }

    /// Style options with the icon resolved against the filesystem
    pub fn style(&self) -> StyleConfig {
        StyleConfig {
            icon: self.icon.clone().filter(|path| path.is_file()),
            ..self.style.clone()
        }
    }

    pub fn output_path(&self, input: &Path) -> PathBuf {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.outputs_dir.join(format!("{}{name}", self.output_prefix))
    }
}
