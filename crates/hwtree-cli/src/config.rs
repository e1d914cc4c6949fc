//! Configuration loading

use anyhow::{Context, Result};
use clap::ValueEnum;
use hwtree_core::{DeviceClass, DeviceNode, ReportOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// The root node every scan record is replayed into
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Id of the root node
    #[serde(default = "default_system_id")]
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            id: default_system_id(),
            description: None,
            vendor: None,
            product: None,
            serial: None,
        }
    }
}

fn default_system_id() -> String {
    "computer".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Xml,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Report format
    #[serde(default)]
    pub format: ReportFormat,
    /// Wrap top-level nodes in a list element
    #[serde(default)]
    pub list: bool,
    /// Redact serial numbers
    #[serde(default)]
    pub sanitize: bool,
    /// Device classes left out of the XML report
    #[serde(default)]
    pub hidden_classes: Vec<DeviceClass>,
}

impl SystemConfig {
    /// Build the root node of the tree
    pub fn root_node(&self) -> DeviceNode {
        let mut root = DeviceNode::new(&self.id, DeviceClass::System);
        if let Some(ref description) = self.description {
            root.set_description(description);
        }
        if let Some(ref vendor) = self.vendor {
            root.set_vendor(vendor);
        }
        if let Some(ref product) = self.product {
            root.set_product(product);
        }
        if let Some(ref serial) = self.serial {
            if let Err(e) = root.set_serial(serial) {
                warn!(error = %e, "Configured system serial ignored");
            }
        }
        root
    }
}

impl OutputConfig {
    /// Report policy, with host facts filled in by the caller
    pub fn report_options(&self, os: Option<String>, privileged: bool) -> ReportOptions {
        ReportOptions {
            list: self.list,
            sanitize: self.sanitize,
            hidden_classes: self.hidden_classes.clone(),
            os,
            privileged,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Default configuration as TOML, for `--print-default-config`
pub fn default_config_toml() -> Result<String> {
    let config = Config {
        system: SystemConfig {
            description: Some("Computer".to_string()),
            ..Default::default()
        },
        output: OutputConfig {
            hidden_classes: vec![DeviceClass::Volume],
            ..Default::default()
        },
    };
    Ok(toml::to_string_pretty(&config)?)
}
