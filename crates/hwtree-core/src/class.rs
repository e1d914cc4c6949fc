//! Device classification

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown device class: {0}")]
pub struct ParseClassError(pub String);

/// Broad category of a device node.
///
/// The class drives unit annotations in reports and the base used when
/// physical ids are allocated automatically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    #[default]
    Generic,
    Processor,
    Memory,
    Address,
    Storage,
    Disk,
    Tape,
    System,
    Bridge,
    Bus,
    Network,
    Display,
    Input,
    Printer,
    Multimedia,
    Communication,
    Power,
    Volume,
}

impl DeviceClass {
    pub const ALL: [DeviceClass; 18] = [
        Self::Generic,
        Self::Processor,
        Self::Memory,
        Self::Address,
        Self::Storage,
        Self::Disk,
        Self::Tape,
        Self::System,
        Self::Bridge,
        Self::Bus,
        Self::Network,
        Self::Display,
        Self::Input,
        Self::Printer,
        Self::Multimedia,
        Self::Communication,
        Self::Power,
        Self::Volume,
    ];

    /// Lowercase class name as it appears in reports
    pub fn name(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Processor => "processor",
            Self::Memory => "memory",
            Self::Address => "address",
            Self::Storage => "storage",
            Self::Disk => "disk",
            Self::Tape => "tape",
            Self::System => "system",
            Self::Bridge => "bridge",
            Self::Bus => "bus",
            Self::Network => "network",
            Self::Display => "display",
            Self::Input => "input",
            Self::Printer => "printer",
            Self::Multimedia => "multimedia",
            Self::Communication => "communication",
            Self::Power => "power",
            Self::Volume => "volume",
        }
    }

    /// First physical id tried when numbering children of this class
    pub fn phys_id_base(self) -> u64 {
        match self {
            Self::Bridge => 0x100,
            _ => 0,
        }
    }

    /// Unit attribute for the `size` element
    pub fn size_units(self) -> Option<&'static str> {
        match self {
            Self::Memory | Self::Address | Self::Storage | Self::Disk | Self::Volume | Self::Display => {
                Some("bytes")
            }
            Self::Processor | Self::Bus | Self::System => Some("Hz"),
            Self::Network => Some("bit/s"),
            Self::Power => Some("mWh"),
            _ => None,
        }
    }

    /// Unit attribute for the `capacity` element.
    ///
    /// Unlike size, volumes and displays carry no unit, and neither do
    /// network devices.
    pub fn capacity_units(self) -> Option<&'static str> {
        match self {
            Self::Memory | Self::Address | Self::Storage | Self::Disk => Some("bytes"),
            Self::Processor | Self::Bus | Self::System => Some("Hz"),
            Self::Power => Some("mWh"),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DeviceClass {
    type Err = ParseClassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|class| class.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseClassError(s.to_string()))
    }
}
