//! In-memory device tree for driving the controller without hardware

use super::DeviceSource;
use crate::device::Endpoint;
use std::{
    collections::{BTreeMap, BTreeSet},
    io,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<PathBuf, String>,
    writes: Vec<(PathBuf, String)>,
    read_only: bool,
}

/// In-memory device tree.
///
/// Endpoints live at `<id>/<endpoint>`. Every successful write is recorded so
/// callers can inspect what the controller did.
#[derive(Debug, Default)]
pub struct MemorySource {
    state: Mutex<State>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn path(id: &str, endpoint: &str) -> PathBuf {
        Path::new(id).join(endpoint)
    }

    /// Add a fully compatible card reporting `temp` °C
    pub fn add_card(&self, id: &str, temp: f32, pwm_min: u32, pwm_max: u32) {
        self.set(id, Endpoint::Temperature.name(), ((temp * 1000.0).round() as i64).to_string());
        self.set(id, Endpoint::FanSpeed.name(), "1200");
        self.set(id, Endpoint::PwmMin.name(), pwm_min.to_string());
        self.set(id, Endpoint::PwmMax.name(), pwm_max.to_string());
        self.set(id, Endpoint::PwmEnable.name(), "2");
        self.set(id, Endpoint::Pwm.name(), pwm_min.to_string());
    }

    /// Update the temperature a card reports
    pub fn set_temperature(&self, id: &str, temp: f32) {
        self.set(id, Endpoint::Temperature.name(), ((temp * 1000.0).round() as i64).to_string());
    }

    pub fn set(&self, id: &str, endpoint: &str, value: impl Into<String>) {
        self.state()
            .files
            .insert(Self::path(id, endpoint), value.into());
    }

    pub fn remove(&self, id: &str, endpoint: &str) {
        self.state().files.remove(&Self::path(id, endpoint));
    }

    pub fn value(&self, id: &str, endpoint: &str) -> Option<String> {
        self.state().files.get(&Self::path(id, endpoint)).cloned()
    }

    /// Reject every write with `PermissionDenied`, like sysfs does for non-root users
    pub fn set_read_only(&self, read_only: bool) {
        self.state().read_only = read_only;
    }

    /// Writes to `endpoint` of `id`, oldest first
    pub fn writes_to(&self, id: &str, endpoint: &str) -> Vec<String> {
        let path = Self::path(id, endpoint);
        self.state()
            .writes
            .iter()
            .filter(|(p, _)| *p == path)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }
}

impl DeviceSource for MemorySource {
    fn candidates(&self) -> io::Result<Vec<String>> {
        let ids: BTreeSet<String> = self
            .state()
            .files
            .keys()
            .filter_map(|p| p.parent())
            .filter_map(|p| p.to_str())
            .map(str::to_string)
            .collect();
        Ok(ids.into_iter().collect())
    }

    fn locate(&self, id: &str) -> io::Result<BTreeMap<String, PathBuf>> {
        let state = self.state();
        let endpoints: BTreeMap<String, PathBuf> = state
            .files
            .keys()
            .filter(|p| p.parent() == Some(Path::new(id)))
            .filter_map(|p| {
                let name = p.file_name()?.to_str()?.to_string();
                Some((name, p.clone()))
            })
            .collect();

        if endpoints.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such device: {}", id),
            ));
        }
        Ok(endpoints)
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        self.state().files.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{}", path.display()))
        })
    }

    fn write(&self, path: &Path, value: &str) -> io::Result<()> {
        let mut state = self.state();
        if state.read_only {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{}", path.display()),
            ));
        }
        if !state.files.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}", path.display()),
            ));
        }
        state.files.insert(path.to_path_buf(), value.to_string());
        state.writes.push((path.to_path_buf(), value.to_string()));
        Ok(())
    }
}
