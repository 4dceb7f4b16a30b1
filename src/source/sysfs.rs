//! Cards discovered from the DRM class in sysfs

use super::{is_numbered, DeviceSource};
use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

/// DRM class directory holding one entry per GPU
pub const ROOT_DIR: &str = "/sys/class/drm";

/// Location of the hwmon directories relative to a card
pub const HWMON_DIR: &str = "device/hwmon";

/// Directory entries of a hwmon node that are not endpoints
const IGNORED_ENTRIES: [&str; 4] = ["device", "power", "subsystem", "uevent"];

/// Devices discovered from the DRM class in sysfs
#[derive(Debug, Clone)]
pub struct SysfsSource {
    root: PathBuf,
}

impl SysfsSource {
    pub fn new() -> Self {
        Self::with_root(ROOT_DIR)
    }

    /// Scan a different tree, used to point at a fake sysfs
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find the `hwmonN` directory of a card
    fn monitor_dir(&self, id: &str) -> io::Result<PathBuf> {
        let hwmon_dir = self.root.join(id).join(HWMON_DIR);

        let mut monitor = None;
        for entry in fs::read_dir(&hwmon_dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if is_numbered(name, "hwmon") {
                    monitor = Some(entry.path());
                }
            }
        }

        monitor.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no hwmon node in {}", hwmon_dir.display()),
            )
        })
    }
}

impl Default for SysfsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceSource for SysfsSource {
    fn candidates(&self) -> io::Result<Vec<String>> {
        let mut cards = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if is_numbered(name, "card") {
                    cards.push(name.to_string());
                }
            }
        }
        cards.sort();
        Ok(cards)
    }

    fn locate(&self, id: &str) -> io::Result<BTreeMap<String, PathBuf>> {
        let dir = self.monitor_dir(id)?;

        let mut endpoints = BTreeMap::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if IGNORED_ENTRIES.contains(&name.as_str()) {
                continue;
            }
            endpoints.insert(name, entry.path());
        }
        Ok(endpoints)
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write(&self, path: &Path, value: &str) -> io::Result<()> {
        fs::write(path, value)
    }
}
