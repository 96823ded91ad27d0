use crate::DeviceError;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Kernel names under this prefix are hub and controller nodes, not peripherals.
pub const BUS_NAME_PREFIX: &str = "bus/";

/// One attached USB peripheral as seen during a single scan.
///
/// `syspath` is stable for the physical port during a boot; `device_node` may
/// change across reattachments, so nothing here is ever cached between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsbDevice {
    pub syspath: PathBuf,
    pub device_node: PathBuf,
    pub serial: Option<String>,
}

impl UsbDevice {
    /// The `"<node> - <serial>"` diagnostics line.
    pub fn info_line(&self) -> String {
        format!(
            "{} - {}",
            self.device_node.display(),
            self.serial.as_deref().unwrap_or("")
        )
    }

    pub fn name_line(&self) -> String {
        self.device_node.display().to_string()
    }
}

/// Property lookups against the device manager.
pub trait UdevQuery: Send + Sync {
    /// Kernel device name relative to `/dev`, e.g. `ttyUSB0` or `bus/usb/001/002`.
    fn device_name(&self, syspath: &Path) -> Result<String, DeviceError>;

    fn properties(&self, syspath: &Path) -> Result<HashMap<String, String>, DeviceError>;
}

/// `UdevQuery` backed by the `udevadm` command line tool.
#[derive(Debug, Clone)]
pub struct Udevadm {
    binary: String,
}

impl Default for Udevadm {
    fn default() -> Self {
        Self {
            binary: "udevadm".to_owned(),
        }
    }
}

impl Udevadm {
    pub fn new() -> Self {
        Self::default()
    }

    fn info(&self, args: &[&str], syspath: &Path) -> Result<String, DeviceError> {
        let output = Command::new(&self.binary)
            .arg("info")
            .args(args)
            .arg("-p")
            .arg(syspath)
            .output()?;
        if !output.status.success() {
            return Err(DeviceError::Query {
                syspath: syspath.display().to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl UdevQuery for Udevadm {
    fn device_name(&self, syspath: &Path) -> Result<String, DeviceError> {
        Ok(self.info(&["-q", "name"], syspath)?.trim().to_owned())
    }

    fn properties(&self, syspath: &Path) -> Result<HashMap<String, String>, DeviceError> {
        let raw = self.info(&["-q", "property", "--export"], syspath)?;
        Ok(parse_exported_properties(&raw))
    }
}

/// Parse `udevadm info --export` output (`KEY='value'` per line).
pub fn parse_exported_properties(raw: &str) -> HashMap<String, String> {
    raw.lines()
        .filter_map(|line| {
            let (key, value) = line.trim().split_once('=')?;
            let value = value
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
                .unwrap_or(value);
            Some((key.to_owned(), value.to_owned()))
        })
        .collect()
}

/// Scan the USB topology under `sysfs_root` for serial-capable peripherals.
///
/// Candidate discovery walks the tree up front; each udev lookup happens as
/// the iterator is advanced. Devices whose lookup fails are skipped.
pub fn scan_devices<'a>(
    sysfs_root: &Path,
    udev: &'a dyn UdevQuery,
) -> impl Iterator<Item = UsbDevice> + 'a {
    let candidates = candidate_syspaths(sysfs_root);
    debug!("{} candidate USB sysfs nodes", candidates.len());
    candidates
        .into_iter()
        .filter_map(move |syspath| match resolve_device(udev, &syspath) {
            Ok(device) => device,
            Err(e) => {
                debug!("skipping {}: {e}", syspath.display());
                None
            }
        })
}

fn resolve_device(udev: &dyn UdevQuery, syspath: &Path) -> Result<Option<UsbDevice>, DeviceError> {
    let name = udev.device_name(syspath)?;
    if name.is_empty() || name.starts_with(BUS_NAME_PREFIX) {
        return Ok(None);
    }

    let props = udev.properties(syspath)?;
    let serial = props
        .get("ID_SERIAL")
        .or_else(|| props.get("ID_USB_SERIAL"))
        .filter(|s| !s.is_empty())
        .cloned();
    if serial.is_none() {
        return Ok(None);
    }

    Ok(Some(UsbDevice {
        syspath: syspath.to_path_buf(),
        device_node: Path::new("/dev").join(name),
        serial,
    }))
}

fn candidate_syspaths(sysfs_root: &Path) -> Vec<PathBuf> {
    let devices_dir = sysfs_root.join("bus/usb/devices");
    let Ok(entries) = std::fs::read_dir(&devices_dir) else {
        debug!("no USB device directory at {}", devices_dir.display());
        return Vec::new();
    };

    let mut roots: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with("usb"))
        .map(|e| e.path())
        .collect();
    roots.sort();

    let mut found = Vec::new();
    for root in roots {
        collect_dev_parents(&root, &mut found);
    }
    found
}

/// Collect every directory below `dir` holding a `dev` attribute file.
/// Nested symlinks are not followed; sysfs links back up the tree.
fn collect_dev_parents(dir: &Path, found: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut entries: Vec<_> = entries.flatten().collect();
    entries.sort_by_key(std::fs::DirEntry::file_name);

    for entry in entries {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            collect_dev_parents(&entry.path(), found);
        } else if file_type.is_file() && entry.file_name() == "dev" {
            found.push(dir.to_path_buf());
        }
    }
}
