//! Where devices and their endpoint files come from

use std::{collections::BTreeMap, io, path::Path, path::PathBuf};

mod memory;
mod sysfs;

pub use memory::MemorySource;
pub use sysfs::SysfsSource;

/// Capability to discover devices and access their endpoint files.
///
/// The control loop only talks to hardware through this trait, so it can run
/// against the real sysfs tree or an in-memory fake.
pub trait DeviceSource: Send + Sync {
    /// Identifiers of every device that might be controllable
    fn candidates(&self) -> io::Result<Vec<String>>;

    /// Endpoint name to path for every endpoint the device exposes
    fn locate(&self, id: &str) -> io::Result<BTreeMap<String, PathBuf>>;

    fn read(&self, path: &Path) -> io::Result<String>;

    fn write(&self, path: &Path, value: &str) -> io::Result<()>;
}

/// Matches `<prefix><digits>`, e.g. `card0` or `hwmon12`
pub(crate) fn is_numbered(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .map(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}
