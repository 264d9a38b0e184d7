use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    decoder::{self, ModeFlags},
    memory::{Memory, Ram},
    registry::AddressSpaceEntry,
};

pub const PAGE_COUNT: usize = 16;
pub const PAGE_MASK: u16 = 0x0FFF;

/// Bytes taken by one saved bank table in SRAM (16 big-endian u32).
pub const BANK_SLOT_SIZE: usize = PAGE_COUNT * 4;

/// Physical base offset for each 4 KiB logical page.
#[derive(Debug, Default, Copy, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct BankTable {
    offsets: [u32; PAGE_COUNT],
}

impl BankTable {
    pub fn new(offsets: [u32; PAGE_COUNT]) -> Self {
        Self { offsets }
    }

    pub fn clear(&mut self) {
        self.offsets = [0; PAGE_COUNT];
    }

    pub fn offsets(&self) -> &[u32; PAGE_COUNT] {
        &self.offsets
    }

    pub fn page(address: u16) -> usize {
        ((address >> 12) & 0xF) as usize
    }

    /// Maps a logical address into the physical space. The page offset is
    /// added to the low 12 bits, it is not a prefix.
    pub fn relocate(&self, address: u16) -> u32 {
        self.offsets[Self::page(address)].wrapping_add((address & PAGE_MASK) as u32)
    }

    /// Copies saved table `bank` out of `sram`. Returns false if the slot does
    /// not fit in the store.
    pub fn load(&mut self, sram: &Ram, bank: usize) -> bool {
        let Some(slot) = sram.slice(bank * BANK_SLOT_SIZE, BANK_SLOT_SIZE) else {
            return false;
        };

        for (offset, bytes) in self.offsets.iter_mut().zip(slot.chunks_exact(4)) {
            *offset = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        true
    }

    /// Saves the table into slot `bank` of `sram`.
    pub fn store(&self, sram: &mut Ram, bank: usize) -> bool {
        let Some(slot) = sram.slice_mut(bank * BANK_SLOT_SIZE, BANK_SLOT_SIZE) else {
            return false;
        };

        for (offset, bytes) in self.offsets.iter().zip(slot.chunks_exact_mut(4)) {
            bytes.copy_from_slice(&offset.to_be_bytes());
        }
        true
    }
}

impl fmt::Display for BankTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (page, offset) in self.offsets.iter().enumerate() {
            if page > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:X}={:08X}", page, offset)?;
        }
        Ok(())
    }
}

/// Payload of a write to the mapper port: `0000 bbbl`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BankCommand {
    Load(usize),
    Store(usize),
}

impl BankCommand {
    pub fn decode(data: u8) -> Option<Self> {
        if data & 0xF0 != 0 {
            return None;
        }

        let bank = ((data & 0x0E) >> 1) as usize;
        if data & 1 != 0 {
            Some(BankCommand::Load(bank))
        } else {
            Some(BankCommand::Store(bank))
        }
    }

    /// Runs the transfer between `table` and the nonvolatile store.
    pub fn execute(self, table: &mut BankTable, sram: &mut Ram) {
        // The real CPU sits in HOLD for the duration of the transfer.
        match self {
            BankCommand::Load(bank) => {
                if table.load(sram, bank) {
                    tracing::debug!("[MAPPER] Load mapper from SRAM, bank {}: {}", bank, table);
                } else {
                    tracing::warn!("[MAPPER] Bank {} does not fit in SRAM, load ignored", bank);
                }
            }
            BankCommand::Store(bank) => {
                if table.store(sram, bank) {
                    tracing::debug!("[MAPPER] Store mapper to SRAM, bank {}: {}", bank, table);
                } else {
                    tracing::warn!("[MAPPER] Bank {} does not fit in SRAM, store ignored", bank);
                }
            }
        }
    }
}

/// Reads through the bank table from the physical entries.
pub fn read(
    table: &BankTable,
    entries: &[AddressSpaceEntry],
    flags: &ModeFlags,
    memory: &Memory,
    address: u16,
) -> (u8, bool) {
    let physical = table.relocate(address);
    let (value, found) = decoder::read(entries, flags, memory, physical);
    if !found {
        tracing::trace!("[MAPPER] Unmapped physical read {:06X} ({:04X})", physical, address);
    }
    (value, found)
}

/// Writes through the bank table to the physical entries.
pub fn write(
    table: &BankTable,
    entries: &[AddressSpaceEntry],
    flags: &ModeFlags,
    memory: &mut Memory,
    address: u16,
    value: u8,
) -> bool {
    let physical = table.relocate(address);
    let found = decoder::write(entries, flags, memory, physical, value);
    if !found {
        tracing::trace!(
            "[MAPPER] Unmapped physical write {:06X} ({:04X}) <- {:02X}",
            physical,
            address,
            value
        );
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleared_table_is_identity_on_page_offset() {
        let table = BankTable::default();
        for address in [0x0000u16, 0x1234, 0x9FFF, 0xF870, 0xFFFF] {
            assert_eq!(table.relocate(address), (address & 0x0FFF) as u32);
        }
    }

    #[test]
    fn test_relocate_adds_page_offset() {
        let mut offsets = [0; PAGE_COUNT];
        offsets[0x2] = 0x000800;
        offsets[0xF] = 0x007800;
        let table = BankTable::new(offsets);

        assert_eq!(table.relocate(0x2000), 0x000800);
        assert_eq!(table.relocate(0x2FFF), 0x0017FF);
        assert_eq!(table.relocate(0xFFFF), 0x0087FF);
    }

    #[test]
    fn test_decode_command() {
        assert_eq!(BankCommand::decode(0b0000_0011), Some(BankCommand::Load(1)));
        assert_eq!(BankCommand::decode(0b0000_1110), Some(BankCommand::Store(7)));
        assert_eq!(BankCommand::decode(0x00), Some(BankCommand::Store(0)));
        assert_eq!(BankCommand::decode(0x10), None);
        assert_eq!(BankCommand::decode(0xFF), None);
    }

    #[test]
    fn test_store_layout_is_big_endian() {
        let mut offsets = [0; PAGE_COUNT];
        offsets[0] = 0x00FF_0000;
        offsets[1] = 0x1234_5678;
        let table = BankTable::new(offsets);
        let mut sram = Ram::new(vec![0xAA; 0x800]);

        assert!(table.store(&mut sram, 2));
        assert_eq!(sram.slice(128, 8), Some(&[0x00, 0xFF, 0x00, 0x00, 0x12, 0x34, 0x56, 0x78][..]));
        assert_eq!(sram.read(127), Some(0xAA));
        assert_eq!(sram.read(192), Some(0xAA));
    }

    #[test]
    fn test_store_then_load_restores_table() {
        let offsets: [u32; PAGE_COUNT] = std::array::from_fn(|i| (i as u32) * 0x0101_0100 + 0x800);
        let table = BankTable::new(offsets);
        let mut sram = Ram::new(vec![0; 0x800]);
        table.store(&mut sram, 5);

        let mut loaded = BankTable::default();
        assert!(loaded.load(&sram, 5));
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_short_store_is_ignored() {
        let mut table = BankTable::new([7; PAGE_COUNT]);
        let mut sram = Ram::new(vec![0; 100]);

        BankCommand::Store(1).execute(&mut table, &mut sram);
        assert_eq!(sram.data, vec![0; 100]);

        BankCommand::Load(1).execute(&mut table, &mut sram);
        assert_eq!(table, BankTable::new([7; PAGE_COUNT]));
    }
}
