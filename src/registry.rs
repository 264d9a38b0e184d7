use std::fmt;

use derivative::Derivative;
use serde::{Deserialize, Serialize};

use crate::{
    config::{EntryConfig, MapperConfig, Mode},
    device::{DeviceDirectory, SharedDevice},
    error::ConfigError,
};

/// What services an address once its entry matched.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    Sram,
    Rom0,
    Rom1,
    Rom1A,
    Dram,
    /// Interrupt level sense register (not implemented by the hardware model).
    Ints,
    /// Internal DSR ROM, gated by the DSR select bit.
    Dsr,
    /// Named peripheral from the device directory.
    Device,
}

/// Pseudo resource names as they appear in the device list.
const PSEUDO_RESOURCES: [(&str, ResourceKind); 7] = [
    ("SRAM", ResourceKind::Sram),
    ("ROM0", ResourceKind::Rom0),
    ("ROM1", ResourceKind::Rom1),
    ("ROM1A", ResourceKind::Rom1A),
    ("DRAM", ResourceKind::Dram),
    ("INTS", ResourceKind::Ints),
    ("DSR", ResourceKind::Dsr),
];

impl ResourceKind {
    pub fn from_pseudo_name(name: &str) -> Option<Self> {
        PSEUDO_RESOURCES
            .iter()
            .find(|(pseudo, _)| *pseudo == name)
            .map(|(_, kind)| *kind)
    }
}

#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct AddressSpaceEntry {
    pub name: String,
    pub address_mask: u32,
    pub select_pattern: u32,
    pub write_select: u32,
    pub mode: Mode,
    pub stop: bool,
    pub kind: ResourceKind,
    #[derivative(Debug = "ignore")]
    pub device: Option<SharedDevice>,
}

impl AddressSpaceEntry {
    fn from_config(config: &EntryConfig, kind: ResourceKind, device: Option<SharedDevice>) -> Self {
        Self {
            name: config.name.clone(),
            address_mask: config.address_mask,
            select_pattern: config.select_pattern,
            write_select: config.write_select,
            mode: config.mode,
            stop: config.stop,
            kind,
            device,
        }
    }

    pub fn matches_read(&self, address: u32) -> bool {
        address & self.address_mask == self.select_pattern
    }

    pub fn matches_write(&self, address: u32) -> bool {
        address & self.address_mask == self.select_pattern | self.write_select
    }

    /// Offset of `address` inside the window selected by this entry.
    pub fn offset(&self, address: u32) -> u32 {
        address & !self.address_mask
    }
}

impl fmt::Display for AddressSpaceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:?}/{}] {:#08X}/{:#08X}",
            self.name, self.kind, self.mode, self.select_pattern, self.address_mask
        )
    }
}

/// The two ordered entry lists. Built once, read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    logical: Vec<AddressSpaceEntry>,
    physical: Vec<AddressSpaceEntry>,
    skipped: Vec<String>,
}

impl Registry {
    pub fn build(config: &MapperConfig, directory: &DeviceDirectory) -> Self {
        let mut registry = Registry::default();

        for record in &config.entries {
            let entry = match Self::resolve(record, directory) {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!("[MAPPER] {}; entry {} dropped", err, record);
                    registry.skipped.push(record.name.clone());
                    continue;
                }
            };

            if entry.mode == Mode::Physical {
                tracing::debug!("[MAPPER] {} mounted into physical address space", entry.name);
                registry.physical.push(entry);
            } else {
                tracing::debug!("[MAPPER] {} mounted into logical address space", entry.name);
                registry.logical.push(entry);
            }
        }

        tracing::info!(
            "[MAPPER] Logical device count = {}, physical device count = {}",
            registry.logical.len(),
            registry.physical.len()
        );
        registry
    }

    fn resolve(
        record: &EntryConfig,
        directory: &DeviceDirectory,
    ) -> Result<AddressSpaceEntry, ConfigError> {
        if let Some(kind) = ResourceKind::from_pseudo_name(&record.name) {
            return Ok(AddressSpaceEntry::from_config(record, kind, None));
        }

        let device = directory
            .get(&record.name)
            .ok_or_else(|| ConfigError::UnresolvedDevice(record.name.clone()))?;
        Ok(AddressSpaceEntry::from_config(
            record,
            ResourceKind::Device,
            Some(device),
        ))
    }

    pub fn logical(&self) -> &[AddressSpaceEntry] {
        &self.logical
    }

    pub fn physical(&self) -> &[AddressSpaceEntry] {
        &self.physical
    }

    /// Names of configuration records that could not be resolved.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }
}
