//! Facts about the machine hwtree runs on

use hwtree_core::Host;
use std::path::{Path, PathBuf};

/// [`Host`] backed by the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct HostSystem;

impl Host for HostSystem {
    fn device_file_exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn device_id(&self, logical_name: &str) -> Option<String> {
        let path = if logical_name.starts_with('/') {
            PathBuf::from(logical_name)
        } else {
            Path::new("/dev").join(logical_name)
        };
        device_number(&path)
    }

    fn guess_bus_info(&self, raw: &str) -> String {
        guess_pci_address(raw).unwrap_or_else(|| raw.to_string())
    }
}

/// Recognize bare PCI addresses (`0000:00:1f.2` or `00:1f.2`)
fn guess_pci_address(raw: &str) -> Option<String> {
    let (rest, function) = raw.rsplit_once('.')?;
    let parts: Vec<&str> = rest.split(':').collect();
    let widths: &[usize] = match parts.len() {
        3 => &[4, 2, 2],
        2 => &[2, 2],
        _ => return None,
    };

    let is_hex = |s: &str, width: usize| s.len() == width && s.bytes().all(|b| b.is_ascii_hexdigit());
    if !parts.iter().zip(widths).all(|(part, &width)| is_hex(part, width)) || !is_hex(function, 1) {
        return None;
    }

    let address = raw.to_lowercase();
    Some(if parts.len() == 2 {
        format!("pci@0000:{}", address)
    } else {
        format!("pci@{}", address)
    })
}

#[cfg(unix)]
fn device_number(path: &Path) -> Option<String> {
    use std::os::unix::fs::{FileTypeExt, MetadataExt};

    let metadata = std::fs::metadata(path).ok()?;
    let file_type = metadata.file_type();
    if !file_type.is_block_device() && !file_type.is_char_device() {
        return None;
    }

    let rdev = metadata.rdev();
    let major = ((rdev >> 8) & 0xfff) | ((rdev >> 32) & !0xfff);
    let minor = (rdev & 0xff) | ((rdev >> 12) & !0xff);
    Some(format!("{}:{}", major, minor))
}

#[cfg(not(unix))]
fn device_number(_path: &Path) -> Option<String> {
    None
}

/// Kernel name, release, build and machine, like `uname -srvm`
pub fn os_identification() -> Option<String> {
    let read = |name: &str| {
        std::fs::read_to_string(Path::new("/proc/sys/kernel").join(name))
            .ok()
            .map(|s| s.trim().to_string())
    };

    match (read("ostype"), read("osrelease")) {
        (Some(ostype), Some(release)) => {
            let mut ident = format!("{} {}", ostype, release);
            if let Some(build) = read("version") {
                ident.push(' ');
                ident.push_str(&build);
            }
            ident.push(' ');
            ident.push_str(std::env::consts::ARCH);
            Some(ident)
        }
        _ => Some(format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)),
    }
}

/// Whether the process runs with an effective uid of root
#[cfg(unix)]
pub fn is_privileged() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn is_privileged() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_pci_address() {
        assert_eq!(HostSystem.guess_bus_info("0000:00:1F.2"), "pci@0000:00:1f.2");
        assert_eq!(HostSystem.guess_bus_info("02:00.0"), "pci@0000:02:00.0");
        assert_eq!(HostSystem.guess_bus_info("1-1.4"), "1-1.4");
        assert_eq!(HostSystem.guess_bus_info("0:0:0:0"), "0:0:0:0");
        assert_eq!(HostSystem.guess_bus_info(""), "");
    }

    #[test]
    fn test_device_id_of_regular_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("plain");
        std::fs::write(&path, b"x").unwrap();
        assert_eq!(HostSystem.device_id(path.to_str().unwrap()), None);
        assert_eq!(HostSystem.device_id("/nonexistent/hwtree"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_device_id_of_dev_null() {
        assert!(HostSystem.device_file_exists("/dev/null"));
        assert_eq!(HostSystem.device_id("null").as_deref(), Some("1:3"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_is_privileged_follows_effective_uid() {
        let status = std::fs::read_to_string("/proc/self/status").unwrap();
        let euid: u32 = status
            .lines()
            .find_map(|line| line.strip_prefix("Uid:"))
            .and_then(|ids| ids.split_whitespace().nth(1))
            .and_then(|euid| euid.parse().ok())
            .unwrap();
        assert_eq!(is_privileged(), euid == 0);
    }

    #[test]
    fn test_os_identification() {
        let ident = os_identification().unwrap();
        assert!(ident.ends_with(std::env::consts::ARCH));
    }
}
