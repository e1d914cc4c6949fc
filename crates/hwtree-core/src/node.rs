//! Device nodes: identity, attributes and bookkeeping
//!
//! A [`DeviceNode`] describes one detected device or bus segment. Every
//! text attribute goes through [`strip`] when set, ids additionally through
//! [`normalize_id`]. Tree-shaped operations (insertion, lookup, physical id
//! numbering, merge) live in [`crate::tree`].

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::class::DeviceClass;
use crate::env::Host;
use crate::text::{hex_phys_id, is_dev_id, normalize_id, normalize_phys_id, strip, TERMINATOR};
use crate::value::Value;

/// Setter input that was refused. The previous value is always kept, so
/// callers are free to ignore this.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttributeError {
    #[error("Malformed device number {0:?}, expected major:minor")]
    MalformedDev(String),
    #[error("Serial number is the nil UUID")]
    NilSerial,
    #[error("Capability {0} is not present")]
    UnknownCapability(String),
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

fn is_zero_u32(n: &u32) -> bool {
    *n == 0
}

/// A node of the hardware inventory tree.
///
/// Children are owned exclusively; there is no way to share a node between
/// two parents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceNode {
    pub(crate) id: String,
    pub(crate) class: DeviceClass,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) handle: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) vendor: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) product: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) date: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) serial: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) slot: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) businfo: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) physid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) dev: String,
    pub(crate) enabled: bool,
    pub(crate) claimed: bool,
    #[serde(skip_serializing_if = "is_zero")]
    pub(crate) start: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub(crate) size: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub(crate) capacity: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub(crate) clock: u64,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub(crate) width: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) logicalnames: Vec<String>,
    #[serde(rename = "capabilities", skip_serializing_if = "Vec::is_empty")]
    pub(crate) features: Vec<String>,
    #[serde(rename = "capability_descriptions", skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) features_descriptions: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) config: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) hints: BTreeMap<String, Value>,
    #[serde(skip)]
    pub(crate) attracted: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) children: Vec<DeviceNode>,
}

impl Default for DeviceNode {
    fn default() -> Self {
        Self {
            id: String::new(),
            class: DeviceClass::Generic,
            handle: String::new(),
            description: String::new(),
            vendor: String::new(),
            product: String::new(),
            version: String::new(),
            date: String::new(),
            serial: String::new(),
            slot: String::new(),
            businfo: String::new(),
            physid: String::new(),
            dev: String::new(),
            enabled: true,
            claimed: false,
            start: 0,
            size: 0,
            capacity: 0,
            clock: 0,
            width: 0,
            logicalnames: Vec::new(),
            features: Vec::new(),
            features_descriptions: BTreeMap::new(),
            config: BTreeMap::new(),
            hints: BTreeMap::new(),
            attracted: Vec::new(),
            children: Vec::new(),
        }
    }
}

impl DeviceNode {
    /// Create a detached node with a normalized id
    pub fn new(id: &str, class: DeviceClass) -> Self {
        Self {
            id: normalize_id(id),
            class,
            ..Default::default()
        }
    }

    /// Create a node with its vendor, product and version already set
    pub fn with_product(id: &str, class: DeviceClass, vendor: &str, product: &str, version: &str) -> Self {
        let mut node = Self::new(id, class);
        node.set_vendor(vendor);
        node.set_product(product);
        node.set_version(version);
        node
    }

    // Identity

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: &str) {
        self.id = normalize_id(id);
    }

    pub fn class(&self) -> DeviceClass {
        self.class
    }

    pub fn class_name(&self) -> &'static str {
        self.class.name()
    }

    pub fn set_class(&mut self, class: DeviceClass) {
        self.class = class;
    }

    /// Scanner-assigned opaque handle, used for attraction
    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn set_handle(&mut self, handle: &str) {
        self.handle = handle.to_string();
    }

    // Descriptive attributes

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: &str) {
        self.description = strip(description);
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn set_vendor(&mut self, vendor: &str) {
        self.vendor = strip(vendor);
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn set_product(&mut self, product: &str) {
        self.product = strip(product);
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn set_version(&mut self, version: &str) {
        self.version = strip(version);
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn set_date(&mut self, date: &str) {
        self.date = strip(date);
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Set the serial number. The hyphenated nil UUID is what firmware
    /// reports when no serial was programmed, so exactly that is refused.
    pub fn set_serial(&mut self, serial: &str) -> Result<(), AttributeError> {
        let serial = strip(serial);
        if serial == Uuid::nil().hyphenated().to_string() {
            debug!(node = %self.id, "Ignoring nil UUID serial");
            return Err(AttributeError::NilSerial);
        }
        self.serial = serial;
        Ok(())
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn set_slot(&mut self, slot: &str) {
        self.slot = strip(slot);
    }

    // Addressing

    pub fn bus_info(&self) -> &str {
        &self.businfo
    }

    /// Set the bus address. Anything not already in `bus@address` form is
    /// handed to the host for normalization.
    pub fn set_bus_info(&mut self, businfo: &str, host: &dyn Host) {
        let businfo = strip(businfo);
        self.businfo = if businfo.contains('@') {
            businfo
        } else {
            strip(&host.guess_bus_info(&businfo))
        };
    }

    pub fn phys_id(&self) -> &str {
        &self.physid
    }

    pub fn set_phys_id(&mut self, physid: &str) {
        self.physid = normalize_phys_id(physid);
    }

    pub fn set_phys_id_value(&mut self, physid: u64) {
        self.physid = hex_phys_id(physid);
    }

    /// `a.b`, or just `a` when `b` is zero
    pub fn set_phys_id_pair(&mut self, first: u32, second: u32) {
        self.physid = if second != 0 {
            format!("{:x}.{:x}", first, second)
        } else {
            format!("{:x}", first)
        };
    }

    pub fn set_phys_id_triple(&mut self, first: u32, second: u32, third: u32) {
        self.physid = format!("{:x}.{:x}.{:x}", first, second, third);
    }

    /// Device number as `major:minor`
    pub fn dev(&self) -> &str {
        &self.dev
    }

    pub fn set_dev(&mut self, dev: &str) -> Result<(), AttributeError> {
        let dev = strip(dev);
        if !is_dev_id(&dev) {
            debug!(node = %self.id, dev = %dev, "Ignoring malformed device number");
            return Err(AttributeError::MalformedDev(dev));
        }
        self.dev = dev;
        Ok(())
    }

    // Numeric attributes

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn set_start(&mut self, start: u64) {
        self.start = start;
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn set_size(&mut self, size: u64) {
        self.size = size;
    }

    /// Capacity is stored as given; a value below size is zeroed by
    /// [`DeviceNode::fix_inconsistencies`] once scanning is over.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: u64) {
        self.capacity = capacity;
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn set_clock(&mut self, clock: u64) {
        self.clock = clock;
    }

    /// Bus width in bits
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn set_width(&mut self, width: u32) {
        self.width = width;
    }

    // Flags

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_disabled(&self) -> bool {
        !self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// True if this node or any descendant has been claimed by a driver.
    ///
    /// Computed on every call; reading never mutates the tree.
    pub fn claimed(&self) -> bool {
        self.claimed || self.children.iter().any(DeviceNode::claimed)
    }

    pub fn claim(&mut self, recursive: bool) {
        self.claimed = true;
        if recursive {
            for child in &mut self.children {
                child.claim(true);
            }
        }
    }

    /// Clear the local flag only; claimed descendants still make
    /// [`DeviceNode::claimed`] report true.
    pub fn unclaim(&mut self) {
        self.claimed = false;
    }

    // Logical names

    /// Canonical logical name (the first one recorded)
    pub fn logical_name(&self) -> &str {
        self.logicalnames.first().map(String::as_str).unwrap_or("")
    }

    pub fn logical_names(&self) -> &[String] {
        &self.logicalnames
    }

    /// Record a logical name such as `sda` or `eth0`.
    ///
    /// Relative names that exist under `/dev` are stored with that prefix.
    /// The device number is looked up from the host the first time a name
    /// is recorded on a node without one.
    pub fn set_logical_name(&mut self, name: &str, host: &dyn Host) {
        let name = strip(name);
        if name.is_empty() {
            return;
        }

        let in_dev = format!("/dev/{}", name);
        if self.logicalnames.iter().any(|n| *n == name || *n == in_dev) {
            return;
        }

        if !name.starts_with('/') && host.device_file_exists(&in_dev) {
            self.logicalnames.push(in_dev);
        } else {
            self.logicalnames.push(name.clone());
        }

        if self.dev.is_empty() {
            if let Some(devid) = host.device_id(&name) {
                let _ = self.set_dev(&devid);
            }
        }
    }

    // Capabilities

    /// Register one or more capabilities.
    ///
    /// `feature` may pack several ids separated by [`TERMINATOR`]. The
    /// description, if any, is attached to the first id only.
    pub fn add_capability(&mut self, feature: &str, description: &str) {
        let mut first = None;

        for segment in feature.split(TERMINATOR) {
            let id = normalize_id(segment);
            if id.is_empty() {
                continue;
            }
            if !self.features.contains(&id) {
                self.features.push(id.clone());
            }
            if first.is_none() {
                first = Some(id);
            }
        }

        let description = strip(description);
        if let (Some(id), false) = (first, description.is_empty()) {
            self.features_descriptions.insert(id, description);
        }
    }

    /// Attach a description to a capability that is already present
    pub fn describe_capability(&mut self, feature: &str, description: &str) -> Result<(), AttributeError> {
        let id = normalize_id(feature);
        if !self.features.contains(&id) {
            return Err(AttributeError::UnknownCapability(id));
        }

        let description = strip(description);
        if description.is_empty() {
            self.features_descriptions.remove(&id);
        } else {
            self.features_descriptions.insert(id, description);
        }
        Ok(())
    }

    pub fn is_capable(&self, feature: &str) -> bool {
        let id = normalize_id(feature);
        self.features.contains(&id)
    }

    /// All capability ids, space separated
    pub fn capabilities(&self) -> String {
        self.features.join(" ")
    }

    pub fn capabilities_list(&self) -> &[String] {
        &self.features
    }

    pub fn capability_description(&self, feature: &str) -> &str {
        let id = normalize_id(feature);
        self.features_descriptions
            .get(&id)
            .map(String::as_str)
            .unwrap_or("")
    }

    // Configuration

    /// Set a configuration entry; an empty value removes the key
    pub fn set_config(&mut self, key: &str, value: &str) {
        let value = strip(value);
        if value.is_empty() {
            self.config.remove(key);
        } else {
            self.config.insert(key.to_string(), value);
        }
    }

    pub fn set_config_number(&mut self, key: &str, value: u64) {
        self.config.insert(key.to_string(), value.to_string());
    }

    pub fn config(&self, key: &str) -> &str {
        self.config.get(key).map(String::as_str).unwrap_or("")
    }

    /// Configuration keys in sorted order
    pub fn config_keys(&self) -> impl Iterator<Item = &str> {
        self.config.keys().map(String::as_str)
    }

    /// `key<separator>value` for every entry, in key order
    pub fn config_values(&self, separator: &str) -> Vec<String> {
        self.config
            .iter()
            .map(|(key, value)| format!("{}{}{}", key, separator, value))
            .collect()
    }

    // Hints

    pub fn add_hint(&mut self, id: &str, value: impl Into<Value>) {
        self.hints.insert(id.to_string(), value.into());
    }

    /// The hint stored under `id`, or [`Value::Nil`]
    pub fn hint(&self, id: &str) -> Value {
        self.hints.get(id).cloned().unwrap_or_default()
    }

    pub fn hint_keys(&self) -> impl Iterator<Item = &str> {
        self.hints.keys().map(String::as_str)
    }

    // Attraction

    /// Claim `handle`: nodes inserted later with that handle are routed
    /// into this node's subtree
    pub fn attract_handle(&mut self, handle: &str) {
        if !handle.is_empty() && !self.attracted.iter().any(|h| h == handle) {
            self.attracted.push(handle.to_string());
        }
    }

    /// Whether this node or any descendant attracts `handle`
    pub fn attracts_handle(&self, handle: &str) -> bool {
        if handle.is_empty() {
            return false;
        }

        self.attracted.iter().any(|h| h == handle)
            || self.children.iter().any(|child| child.attracts_handle(handle))
    }

    pub fn attracts_node(&self, node: &DeviceNode) -> bool {
        self.attracts_handle(&node.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Detached;

    struct FakeHost;

    impl Host for FakeHost {
        fn device_file_exists(&self, path: &str) -> bool {
            path == "/dev/sda"
        }

        fn device_id(&self, logical_name: &str) -> Option<String> {
            match logical_name {
                "sda" => Some("8:0".to_string()),
                "eth0" => Some("not-a-devid".to_string()),
                _ => None,
            }
        }

        fn guess_bus_info(&self, raw: &str) -> String {
            format!("pci@{}", raw)
        }
    }

    #[test]
    fn test_default_node() {
        let node = DeviceNode::default();
        assert_eq!(node.id(), "");
        assert_eq!(node.class(), DeviceClass::Generic);
        assert!(node.is_enabled());
        assert!(!node.claimed());
        assert_eq!(node.size(), 0);
        assert_eq!(node.logical_name(), "");
        assert_eq!(node.config("missing"), "");
        assert_eq!(node.hint("missing"), Value::Nil);
    }

    #[test]
    fn test_text_setters_strip() {
        let mut node = DeviceNode::with_product("CPU 0", DeviceClass::Processor, " Intel\n", "Core\0junk", "\t6.1 ");
        assert_eq!(node.id(), "cpu_0");
        assert_eq!(node.vendor(), "Intel");
        assert_eq!(node.product(), "Core");
        assert_eq!(node.version(), "6.1");

        node.set_slot(" U3E1 ");
        node.set_description("Central\x07 processor");
        assert_eq!(node.slot(), "U3E1");
        assert_eq!(node.description(), "Central processor");
    }

    #[test]
    fn test_nil_serial_rejected() {
        let mut node = DeviceNode::new("board", DeviceClass::System);
        assert_eq!(
            node.set_serial("00000000-0000-0000-0000-000000000000"),
            Err(AttributeError::NilSerial)
        );
        assert_eq!(node.serial(), "");

        node.set_serial("ABC123").unwrap();
        assert!(node.set_serial("00000000-0000-0000-0000-000000000000").is_err());
        assert_eq!(node.serial(), "ABC123");
    }

    #[test]
    fn test_other_zero_serial_forms_kept() {
        let mut node = DeviceNode::new("board", DeviceClass::System);
        node.set_serial("00000000000000000000000000000000").unwrap();
        assert_eq!(node.serial(), "00000000000000000000000000000000");

        node.set_serial("{00000000-0000-0000-0000-000000000000}").unwrap();
        assert_eq!(node.serial(), "{00000000-0000-0000-0000-000000000000}");

        assert!(node.set_serial(" 00000000-0000-0000-0000-000000000000 ").is_err());
        assert_eq!(node.serial(), "{00000000-0000-0000-0000-000000000000}");
    }

    #[test]
    fn test_dev_validation() {
        let mut node = DeviceNode::new("disk", DeviceClass::Disk);
        node.set_dev("8:16").unwrap();
        assert!(matches!(node.set_dev("8-16"), Err(AttributeError::MalformedDev(_))));
        assert!(node.set_dev(":").is_err());
        assert_eq!(node.dev(), "8:16");
    }

    #[test]
    fn test_phys_id_forms() {
        let mut node = DeviceNode::new("fn", DeviceClass::Generic);
        node.set_phys_id("0001f");
        assert_eq!(node.phys_id(), "1f");
        node.set_phys_id_value(255);
        assert_eq!(node.phys_id(), "ff");
        node.set_phys_id_pair(0x1c, 0);
        assert_eq!(node.phys_id(), "1c");
        node.set_phys_id_pair(0x1c, 2);
        assert_eq!(node.phys_id(), "1c.2");
        node.set_phys_id_triple(0, 1, 0xa);
        assert_eq!(node.phys_id(), "0.1.a");
    }

    #[test]
    fn test_bus_info_normalization() {
        let mut node = DeviceNode::new("sata", DeviceClass::Storage);
        node.set_bus_info("0000:00:1f.2", &FakeHost);
        assert_eq!(node.bus_info(), "pci@0000:00:1f.2");
        node.set_bus_info(" usb@1:2 ", &FakeHost);
        assert_eq!(node.bus_info(), "usb@1:2");
    }

    #[test]
    fn test_logical_names() {
        let mut node = DeviceNode::new("disk", DeviceClass::Disk);
        node.set_logical_name("sda", &FakeHost);
        node.set_logical_name("/dev/sda", &FakeHost);
        node.set_logical_name("sda", &FakeHost);
        node.set_logical_name("/dev/disk/by-id/ata-X", &FakeHost);

        assert_eq!(node.logical_name(), "/dev/sda");
        assert_eq!(node.logical_names().len(), 2);
        assert_eq!(node.dev(), "8:0");

        let mut nic = DeviceNode::new("network", DeviceClass::Network);
        nic.set_logical_name("eth0", &FakeHost);
        assert_eq!(nic.logical_name(), "eth0");
        assert_eq!(nic.dev(), "");

        let mut detached = DeviceNode::new("volume", DeviceClass::Volume);
        detached.set_logical_name("  ", &Detached);
        assert!(detached.logical_names().is_empty());
    }

    #[test]
    fn test_claimed_aggregates_descendants() {
        let mut root = DeviceNode::new("root", DeviceClass::System);
        let mut bus = DeviceNode::new("bus", DeviceClass::Bus);
        let mut leaf = DeviceNode::new("leaf", DeviceClass::Disk);
        leaf.claim(false);
        bus.children.push(leaf);
        root.children.push(bus);

        assert!(root.claimed());
        root.unclaim();
        assert!(root.claimed());
        assert!(!root.claimed);
    }

    #[test]
    fn test_claim_recursive() {
        let mut root = DeviceNode::new("root", DeviceClass::System);
        root.children.push(DeviceNode::new("a", DeviceClass::Bus));
        root.claim(true);
        assert!(root.children[0].claimed);

        let mut other = DeviceNode::new("other", DeviceClass::System);
        other.children.push(DeviceNode::new("b", DeviceClass::Bus));
        other.claim(false);
        assert!(!other.children[0].claimed);
    }

    #[test]
    fn test_capabilities() {
        let mut node = DeviceNode::new("cpu", DeviceClass::Processor);
        node.add_capability("usb", "");
        node.add_capability("USB", "");
        assert!(node.is_capable("usb"));
        assert!(node.is_capable("Usb"));
        assert_eq!(node.capabilities_list(), ["usb".to_string()]);

        node.add_capability("fpu\0vme\0de", "Floating point unit");
        assert_eq!(node.capabilities(), "usb fpu vme de");
        assert_eq!(node.capability_description("fpu"), "Floating point unit");
        assert_eq!(node.capability_description("vme"), "");

        assert!(node.describe_capability("vme", "Virtual mode").is_ok());
        assert_eq!(node.capability_description("vme"), "Virtual mode");
        assert_eq!(
            node.describe_capability("sse", "Streaming SIMD"),
            Err(AttributeError::UnknownCapability("sse".to_string()))
        );
        assert!(!node.is_capable("sse"));
        assert_eq!(node.capability_description("sse"), "");
    }

    #[test]
    fn test_config() {
        let mut node = DeviceNode::new("eth", DeviceClass::Network);
        node.set_config("driver", " e1000e ");
        node.set_config_number("latency", 0);
        node.set_config("autonegotiation", "on");
        assert_eq!(node.config("driver"), "e1000e");
        assert_eq!(node.config("latency"), "0");

        node.set_config("driver", "  ");
        assert_eq!(node.config("driver"), "");
        assert_eq!(node.config_keys().collect::<Vec<_>>(), vec!["autonegotiation", "latency"]);
        assert_eq!(node.config_values("="), vec!["autonegotiation=on", "latency=0"]);
    }

    #[test]
    fn test_hints() {
        let mut node = DeviceNode::new("usb", DeviceClass::Bus);
        node.add_hint("usb.idVendor", 0x8087);
        node.add_hint("pci.class", "0c03");
        node.add_hint("usb.idVendor", 0x8086);
        assert_eq!(node.hint("usb.idVendor"), Value::Integer(0x8086));
        assert_eq!(node.hint("pci.class").as_text(), Some("0c03"));
        assert!(!node.hint("other").is_defined());
        assert_eq!(node.hint_keys().count(), 2);
    }

    #[test]
    fn test_attraction_is_recursive() {
        let mut bus = DeviceNode::new("usb", DeviceClass::Bus);
        let mut hub = DeviceNode::new("hub", DeviceClass::Bus);
        hub.attract_handle("USB:1:2");
        bus.children.push(hub);

        assert!(bus.attracts_handle("USB:1:2"));
        assert!(!bus.attracts_handle(""));

        let mut node = DeviceNode::new("mouse", DeviceClass::Input);
        assert!(!bus.attracts_node(&node));
        node.set_handle("USB:1:2");
        assert!(bus.attracts_node(&node));
    }
}
