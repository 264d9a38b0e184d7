use serde::{Deserialize, Serialize};

use crate::{
    config::Mode,
    memory::{Memory, DSR_OFFSET, ROM0_OFFSET, ROM1A_OFFSET, ROM1_OFFSET, ROM_WINDOW_MASK},
    registry::{AddressSpaceEntry, ResourceKind},
};

/// Value returned for an address nobody drives.
pub const FLOATING_BUS: u8 = 0x00;

/// Mode lines that decide which entries take part in decoding.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ModeFlags {
    /// Internal DSR ROM paged in (CRU bit 0 at >2700).
    pub dsr_selected: bool,
    /// CRUS line. Set selects the TI-99/4A compatible map, cleared the native map.
    pub crus: bool,
    /// Pattern generator enable (PTGEN is active low on the board; stored here as active high).
    pub ptge: bool,
}

impl Default for ModeFlags {
    fn default() -> Self {
        Self {
            dsr_selected: false,
            crus: true,
            ptge: false,
        }
    }
}

impl ModeFlags {
    pub fn is_enabled(&self, mode: Mode) -> bool {
        match mode {
            Mode::Native => !self.crus,
            Mode::Ti99Em => self.crus,
            Mode::PatGen => self.ptge,
            Mode::Physical => true,
        }
    }
}

/// Scans `entries` in priority order for a read of `address`.
///
/// Returns the value on the data bus and whether any entry responded. The
/// value starts out floating; entries that do not drive the bus leave the
/// previous value in place, so with non-stopping entries the last driver wins.
pub fn read(
    entries: &[AddressSpaceEntry],
    flags: &ModeFlags,
    memory: &Memory,
    address: u32,
) -> (u8, bool) {
    let mut value = FLOATING_BUS;
    let mut found = false;

    for entry in entries {
        if !flags.is_enabled(entry.mode) || !entry.matches_read(address) {
            continue;
        }

        if let Some(byte) = read_entry(entry, flags, memory, address) {
            value = byte;
        }
        found = true;

        if entry.stop {
            break;
        }
    }

    (value, found)
}

/// Scans `entries` in priority order for a write of `value` to `address`.
/// The write select bit of each entry takes part in the match.
pub fn write(
    entries: &[AddressSpaceEntry],
    flags: &ModeFlags,
    memory: &mut Memory,
    address: u32,
    value: u8,
) -> bool {
    let mut found = false;

    for entry in entries {
        if !flags.is_enabled(entry.mode) || !entry.matches_write(address) {
            continue;
        }

        write_entry(entry, memory, address, value);
        found = true;

        if entry.stop {
            break;
        }
    }

    found
}

fn read_entry(
    entry: &AddressSpaceEntry,
    flags: &ModeFlags,
    memory: &Memory,
    address: u32,
) -> Option<u8> {
    let offset = entry.offset(address);

    let value = match entry.kind {
        ResourceKind::Sram => memory.sram.read(offset),
        ResourceKind::Dram => memory.dram.read(offset),
        ResourceKind::Rom0 => memory.rom.read(ROM0_OFFSET | offset),
        ResourceKind::Rom1 => memory.rom.read(ROM1_OFFSET | (offset & ROM_WINDOW_MASK)),
        ResourceKind::Rom1A => memory.rom.read(ROM1A_OFFSET | (offset & ROM_WINDOW_MASK)),
        ResourceKind::Dsr => {
            if !flags.dsr_selected {
                tracing::trace!("[MAPPER] (DSR) {:06X} not selected", address);
                return None;
            }
            memory.rom.read(DSR_OFFSET | (offset & ROM_WINDOW_MASK))
        }
        ResourceKind::Ints => {
            tracing::debug!("[MAPPER] ILSENSE not implemented ({:06X})", address);
            return None;
        }
        ResourceKind::Device => {
            let Some(device) = &entry.device else {
                tracing::warn!("[MAPPER] Entry {} has no device attached", entry);
                return None;
            };
            let value = device.borrow_mut().read_byte(address);
            tracing::trace!("[MAPPER] (dev {}) {:06X} -> {:02X?}", entry.name, address, value);
            return value;
        }
    };

    match value {
        Some(byte) => {
            tracing::trace!("[MAPPER] ({:?}) {:06X} -> {:02X}", entry.kind, address, byte);
        }
        None => {
            tracing::warn!(
                "[MAPPER] ({:?}) {:06X} lies outside the backing store, bus floats",
                entry.kind,
                address
            );
        }
    }
    value
}

fn write_entry(entry: &AddressSpaceEntry, memory: &mut Memory, address: u32, value: u8) {
    let offset = entry.offset(address);

    match entry.kind {
        ResourceKind::Sram | ResourceKind::Dram => {
            let ram = if entry.kind == ResourceKind::Sram {
                &mut memory.sram
            } else {
                &mut memory.dram
            };
            if ram.write(offset, value) {
                tracing::trace!("[MAPPER] ({:?}) {:06X} <- {:02X}", entry.kind, address, value);
            } else {
                tracing::warn!(
                    "[MAPPER] ({:?}) {:06X} <- {:02X} lies outside the backing store, ignored",
                    entry.kind,
                    address,
                    value
                );
            }
        }
        ResourceKind::Rom0 | ResourceKind::Rom1 | ResourceKind::Rom1A => {
            tracing::trace!("[MAPPER] (ROM) {:06X} <- {:02X} (ignored)", address, value);
        }
        ResourceKind::Dsr => {
            tracing::debug!("[MAPPER] Write access to DSR space {:06X} ignored", address);
        }
        ResourceKind::Ints => {
            tracing::debug!("[MAPPER] Write to ILSENSE {:06X} ignored", address);
        }
        ResourceKind::Device => match &entry.device {
            Some(device) => {
                tracing::trace!("[MAPPER] (dev {}) {:06X} <- {:02X}", entry.name, address, value);
                device.borrow_mut().write_byte(address, value);
            }
            None => tracing::warn!("[MAPPER] Entry {} has no device attached", entry),
        },
    }
}
