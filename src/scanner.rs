//! Discovery of the cards the controller can drive

use crate::{device::Device, logging::Logger, source::DeviceSource};
use std::{collections::BTreeMap, sync::Arc};

/// Compatible cards keyed by identifier, iterated in identifier order
#[derive(Debug, Default)]
pub struct Registry {
    devices: BTreeMap<String, Device>,
}

impl Registry {
    /// Scan `source` for usable cards.
    ///
    /// With a non-empty allow-list only the named cards (compared
    /// case-insensitively) are considered; an empty one means every card.
    /// Cards lacking the hwmon endpoints are skipped: not every DRM card is a
    /// fan-controllable GPU.
    pub fn scan(
        source: Arc<dyn DeviceSource>,
        allowlist: Option<&[String]>,
        logger: &Logger,
    ) -> Self {
        let candidates = match source.candidates() {
            Ok(candidates) => candidates,
            Err(e) => {
                logger.warn(format_args!("Unable to list cards: {}", e));
                return Self::default();
            }
        };

        let allowlist = allowlist.filter(|allowed| !allowed.is_empty());

        let mut devices = BTreeMap::new();
        for id in candidates {
            if let Some(allowed) = allowlist {
                if !allowed.iter().any(|a| a.eq_ignore_ascii_case(&id)) {
                    continue;
                }
            }

            match Device::open(&id, source.clone(), logger.clone()) {
                Ok(device) => {
                    devices.insert(id, device);
                }
                Err(e) => logger.info(format_args!("skipping card: {}", e)),
            }
        }

        Self { devices }
    }

    pub fn get(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
