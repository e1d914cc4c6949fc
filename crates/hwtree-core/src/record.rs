//! Scan records - replayable scanner output
//!
//! A scan record is an ordered list of device descriptions, written in TOML
//! or JSON, exactly as scanners would hand them to the tree. Replaying a
//! record goes through [`DeviceNode::add_child`] and [`DeviceNode::merge`],
//! so renaming, attraction and physical id conflicts behave as they would
//! during a live scan.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::class::DeviceClass;
use crate::env::Host;
use crate::node::DeviceNode;
use crate::value::Value;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Failed to parse TOML scan record: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("Failed to parse JSON scan record: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// One device as reported by a scanner.
///
/// Empty strings and zero numbers mean "not reported".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceRecord {
    pub id: String,
    pub class: DeviceClass,
    /// Slash-separated id path of the parent, below the root
    pub parent: Option<String>,
    /// Handle of the parent, searched anywhere in the tree
    pub parent_handle: Option<String>,
    /// Merge into the node with the same handle instead of inserting
    pub merge: bool,
    pub handle: String,
    pub description: String,
    pub vendor: String,
    pub product: String,
    pub version: String,
    pub date: String,
    pub serial: String,
    pub slot: String,
    pub businfo: String,
    pub physid: String,
    pub dev: String,
    pub start: u64,
    pub size: u64,
    pub capacity: u64,
    pub clock: u64,
    pub width: u32,
    pub enabled: Option<bool>,
    pub claimed: bool,
    pub logicalnames: Vec<String>,
    pub capabilities: Vec<String>,
    /// Capability id to description
    pub descriptions: BTreeMap<String, String>,
    pub config: BTreeMap<String, String>,
    pub hints: BTreeMap<String, Value>,
    /// Handles this device claims for later insertions
    pub attract: Vec<String>,
}

/// A replayable scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, rename = "device")]
    pub devices: Vec<DeviceRecord>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ScanRecord {
    fn default() -> Self {
        Self {
            version: default_version(),
            devices: Vec::new(),
        }
    }
}

impl DeviceRecord {
    /// Build a detached node through the regular setters
    pub fn to_node(&self, host: &dyn Host) -> DeviceNode {
        let mut node = DeviceNode::new(&self.id, self.class);
        node.set_handle(&self.handle);
        node.set_description(&self.description);
        node.set_vendor(&self.vendor);
        node.set_product(&self.product);
        node.set_version(&self.version);
        node.set_date(&self.date);
        node.set_slot(&self.slot);

        if !self.serial.is_empty() {
            if let Err(e) = node.set_serial(&self.serial) {
                debug!(device = %self.id, error = %e, "Serial ignored");
            }
        }
        if !self.businfo.is_empty() {
            node.set_bus_info(&self.businfo, host);
        }
        if !self.physid.is_empty() {
            node.set_phys_id(&self.physid);
        }
        if !self.dev.is_empty() {
            if let Err(e) = node.set_dev(&self.dev) {
                warn!(device = %self.id, error = %e, "Device number ignored");
            }
        }

        node.set_start(self.start);
        node.set_size(self.size);
        node.set_capacity(self.capacity);
        node.set_clock(self.clock);
        node.set_width(self.width);

        match self.enabled {
            Some(true) => node.enable(),
            Some(false) => node.disable(),
            None => {}
        }
        if self.claimed {
            node.claim(false);
        }

        for name in &self.logicalnames {
            node.set_logical_name(name, host);
        }
        for capability in &self.capabilities {
            node.add_capability(capability, "");
        }
        for (capability, description) in &self.descriptions {
            if let Err(e) = node.describe_capability(capability, description) {
                warn!(device = %self.id, error = %e, "Capability description ignored");
            }
        }
        for (key, value) in &self.config {
            node.set_config(key, value);
        }
        for (key, value) in &self.hints {
            node.add_hint(key, value.clone());
        }
        for handle in &self.attract {
            node.attract_handle(handle);
        }

        node
    }
}

impl ScanRecord {
    pub fn from_toml(content: &str) -> Result<Self, RecordError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json(content: &str) -> Result<Self, RecordError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Replay every device into the tree below `root`, in order.
    ///
    /// Returns how many records were inserted or merged.
    pub fn apply(&self, root: &mut DeviceNode, host: &dyn Host) -> usize {
        let mut applied = 0;

        for record in &self.devices {
            let node = record.to_node(host);

            if record.merge {
                if let Some(existing) = root.find_child_by_handle_mut(&record.handle) {
                    existing.merge(&node);
                    applied += 1;
                    continue;
                }
                debug!(device = %record.id, handle = %record.handle, "Nothing to merge into, inserting");
            }

            let inserted = attach(root, record, node);
            trace!(device = %record.id, inserted = %inserted, "Device inserted");
            applied += 1;
        }

        applied
    }
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

/// Insert below the requested parent, falling back to the root. Returns the
/// id the node ended up with.
fn attach(root: &mut DeviceNode, record: &DeviceRecord, node: DeviceNode) -> String {
    if let Some(path) = non_empty(&record.parent) {
        if let Some(parent) = root.get_child_mut(path) {
            return parent.add_child(node).id().to_string();
        }
    }
    if let Some(handle) = non_empty(&record.parent_handle) {
        if let Some(parent) = root.find_child_by_handle_mut(handle) {
            return parent.add_child(node).id().to_string();
        }
    }

    if non_empty(&record.parent).is_some() || non_empty(&record.parent_handle).is_some() {
        warn!(
            device = %record.id,
            parent = ?record.parent,
            parent_handle = ?record.parent_handle,
            "Parent not found, attaching to root"
        );
    }
    root.add_child(node).id().to_string()
}
