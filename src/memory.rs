use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::{BufferId, MachineController};

pub const SRAM_SIZE: usize = 0x0800;
pub const DRAM_SIZE: usize = 0x10000;
pub const ROM_SIZE: usize = 0x8000;

/// Start of each ROM window inside the console ROM image.
pub const ROM0_OFFSET: u32 = 0x0000;
pub const ROM1_OFFSET: u32 = 0x2000;
pub const DSR_OFFSET: u32 = 0x4000;
pub const ROM1A_OFFSET: u32 = 0x6000;

/// ROM1, ROM1A and the DSR window are 8 KiB each.
pub const ROM_WINDOW_MASK: u32 = 0x1FFF;

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Clone)]
pub struct Ram {
    pub data: Vec<u8>,
}

impl Ram {
    pub fn new(data: Vec<u8>) -> Self {
        Ram { data }
    }

    pub fn read(&self, index: u32) -> Option<u8> {
        self.data.get(index as usize).copied()
    }

    /// Returns false when `index` lies outside the image.
    pub fn write(&mut self, index: u32, value: u8) -> bool {
        match self.data.get_mut(index as usize) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    pub fn slice(&self, start: usize, len: usize) -> Option<&[u8]> {
        self.data.get(start..start.checked_add(len)?)
    }

    pub fn slice_mut(&mut self, start: usize, len: usize) -> Option<&mut [u8]> {
        self.data.get_mut(start..start.checked_add(len)?)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Clone)]
pub struct Rom {
    pub data: Vec<u8>,
}

impl Rom {
    pub fn new(data: Vec<u8>) -> Self {
        Rom { data }
    }

    pub fn read(&self, index: u32) -> Option<u8> {
        self.data.get(index as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Backing stores fetched from the machine at start-up.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Clone)]
pub struct Memory {
    pub sram: Ram,
    pub dram: Ram,
    pub rom: Rom,
}

impl Memory {
    pub fn fetch(controller: &mut dyn MachineController) -> Self {
        let memory = Memory {
            sram: Ram::new(controller.get_buffer(BufferId::Sram)),
            dram: Ram::new(controller.get_buffer(BufferId::Dram)),
            rom: Rom::new(controller.get_buffer(BufferId::Rom)),
        };
        tracing::debug!("[MAPPER] Backing stores: {}", memory);
        memory
    }
}

impl fmt::Display for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SRAM={:#06X} DRAM={:#07X} ROM={:#06X}",
            self.sram.len(),
            self.dram.len(),
            self.rom.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ram_out_of_range() {
        let mut ram = Ram::new(vec![0; 4]);
        assert!(ram.write(3, 0xAA));
        assert_eq!(ram.read(3), Some(0xAA));
        assert!(!ram.write(4, 0x55));
        assert_eq!(ram.read(4), None);
    }

    #[test]
    fn test_ram_slices() {
        let mut ram = Ram::new((0..8).collect());
        assert_eq!(ram.slice(4, 4), Some(&[4, 5, 6, 7][..]));
        assert_eq!(ram.slice(6, 4), None);
        ram.slice_mut(0, 2).unwrap().copy_from_slice(&[9, 9]);
        assert_eq!(ram.read(1), Some(9));
    }

    #[test]
    fn test_rom_read() {
        let rom = Rom::new(vec![1, 2, 3]);
        assert_eq!(rom.read(2), Some(3));
        assert_eq!(rom.read(3), None);
    }
}
