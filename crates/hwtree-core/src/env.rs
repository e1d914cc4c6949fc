//! Seams to the collaborators the device tree relies on
//!
//! The tree itself never touches the filesystem or the running system.
//! Anything that needs to look outside the model goes through one of these
//! traits:
//! - [`Host`] answers device-file and bus-address questions while attributes
//!   are being set
//! - [`Heuristics`] fills in product and vendor names during fixup
//! - [`ReportContext`] decides visibility and output options while rendering

use crate::class::DeviceClass;
use crate::node::DeviceNode;

/// Facts about the machine the scanners run on
pub trait Host {
    /// Whether a device file exists at `path`
    fn device_file_exists(&self, _path: &str) -> bool {
        false
    }

    /// `major:minor` of the device behind a logical name, if known
    fn device_id(&self, _logical_name: &str) -> Option<String> {
        None
    }

    /// Turn a raw bus address into its normalized `bus@address` form
    fn guess_bus_info(&self, raw: &str) -> String {
        raw.to_string()
    }
}

/// Product and vendor inference run by [`DeviceNode::fix_inconsistencies`]
pub trait Heuristics {
    fn guess_product(&self, _node: &mut DeviceNode) {}

    fn guess_vendor(&self, _node: &mut DeviceNode) {}
}

/// Output switches consulted while rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputOption {
    /// Wrap top-level nodes in a `<list>` element
    List,
    /// Redact serial numbers
    Sanitize,
}

impl OutputOption {
    pub fn name(self) -> &'static str {
        match self {
            Self::List => "output:list",
            Self::Sanitize => "output:sanitize",
        }
    }
}

/// Rendering policy and envelope information
pub trait ReportContext {
    fn is_class_visible(&self, _class: DeviceClass) -> bool {
        true
    }

    fn is_option_enabled(&self, _option: OutputOption) -> bool {
        false
    }

    /// One-line description of the operating system, for the report header
    fn os_identification(&self) -> Option<String> {
        None
    }

    /// Whether the scan ran with elevated privileges
    fn is_privileged(&self) -> bool {
        true
    }
}

/// Collaborator that knows nothing about its surroundings
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl Host for Detached {}
impl Heuristics for Detached {}
impl ReportContext for Detached {}

/// Report policy held as plain data
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub list: bool,
    pub sanitize: bool,
    pub hidden_classes: Vec<DeviceClass>,
    pub os: Option<String>,
    pub privileged: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            list: false,
            sanitize: false,
            hidden_classes: Vec::new(),
            os: None,
            privileged: true,
        }
    }
}

impl ReportContext for ReportOptions {
    fn is_class_visible(&self, class: DeviceClass) -> bool {
        !self.hidden_classes.contains(&class)
    }

    fn is_option_enabled(&self, option: OutputOption) -> bool {
        match option {
            OutputOption::List => self.list,
            OutputOption::Sanitize => self.sanitize,
        }
    }

    fn os_identification(&self) -> Option<String> {
        self.os.clone()
    }

    fn is_privileged(&self) -> bool {
        self.privileged
    }
}
