// TI-99/8 address decoder and mapper.
//
// The CPU sees a 64 KiB logical map. Addresses that no logical entry claims
// are relocated through a 16 entry bank table into a 24-bit physical map and
// decoded again there. The mapper multiplexes the physical address over 16
// lines, so physical accesses take one more wait state.
use std::{cell::RefCell, rc::Rc};

use derivative::Derivative;
use serde::{Deserialize, Serialize};

use crate::{
    config::{CommandWindow, MapperConfig},
    decoder::{self, ModeFlags, FLOATING_BUS},
    device::{DeviceDirectory, MachineController},
    memory::{Memory, Ram},
    registry::Registry,
    relocator::{self, BankCommand, BankTable},
    timing::{WaitStates, LOGICAL_WAIT_STATES, PHYSICAL_WAIT_STATES},
};

pub const MAPPER_CRU_BASE: u16 = 0x2700;
pub const HEXBUS_CRU_BASE: u16 = 0x1700;

/// CRU bits inside the mapper base.
const CRU_DSR_SELECT: u16 = 0;
const CRU_SOFT_RESET: u16 = 1;

pub type SharedController = Rc<RefCell<dyn MachineController>>;

/// Externally driven mode lines.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub enum ModeLine {
    Crus,
    Ptgen,
}

/// Run-time state of the mapper, suitable for save states.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct MapperState {
    pub flags: ModeFlags,
    pub bank_table: BankTable,
    pub waits: WaitStates,
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct Mapper {
    registry: Registry,
    bank_command: Vec<CommandWindow>,
    memory: Memory,
    flags: ModeFlags,
    bank_table: BankTable,
    waits: WaitStates,
    #[derivative(Debug = "ignore")]
    controller: SharedController,
}

impl Mapper {
    /// Fetches the backing stores from `controller`, builds the device lists
    /// and leaves the mapper in its reset state.
    pub fn new(
        config: &MapperConfig,
        directory: &DeviceDirectory,
        controller: SharedController,
    ) -> Self {
        tracing::info!("[MAPPER] Starting mapper with {} entries", config.entries.len());
        let memory = Memory::fetch(&mut *controller.borrow_mut());
        let registry = Registry::build(config, directory);

        let mut mapper = Self {
            registry,
            bank_command: config.bank_command.clone(),
            memory,
            flags: ModeFlags::default(),
            bank_table: BankTable::default(),
            waits: WaitStates::new(),
            controller,
        };
        mapper.reset();
        mapper
    }

    pub fn reset(&mut self) {
        tracing::debug!("[MAPPER] Reset");
        self.flags = ModeFlags::default();
        self.bank_table.clear();
        self.waits.reset();
        self.controller.borrow_mut().notify_ready(true);
    }

    /// CPU memory read. Starts the wait state sequence.
    pub fn read(&mut self, address: u16) -> u8 {
        tracing::trace!("[MAPPER] Read from {:04X}", address);
        let (mut value, found) = self.read_logical(address);

        if found {
            self.waits.start(LOGICAL_WAIT_STATES);
        } else {
            (value, _) = relocator::read(
                &self.bank_table,
                self.registry.physical(),
                &self.flags,
                &self.memory,
                address,
            );
            self.waits.start(PHYSICAL_WAIT_STATES);
        }

        self.controller.borrow_mut().notify_ready(false);
        value
    }

    /// CPU memory write. Starts the wait state sequence.
    pub fn write(&mut self, address: u16, value: u8) {
        tracing::trace!("[MAPPER] Write {:04X} <- {:02X}", address, value);

        if self.write_logical(address, value) {
            self.waits.start(LOGICAL_WAIT_STATES);
        } else {
            relocator::write(
                &self.bank_table,
                self.registry.physical(),
                &self.flags,
                &mut self.memory,
                address,
                value,
            );
            self.waits.start(PHYSICAL_WAIT_STATES);
        }

        self.controller.borrow_mut().notify_ready(false);
    }

    /// Decodes `address` in the logical map only, without touching the wait
    /// state counter. The bank command windows answer reads without driving
    /// the bus.
    pub fn read_logical(&self, address: u16) -> (u8, bool) {
        if self.in_bank_command_window(address) {
            tracing::debug!("[MAPPER] Read access to mapper {:04X} ignored", address);
            return (FLOATING_BUS, true);
        }

        decoder::read(
            self.registry.logical(),
            &self.flags,
            &self.memory,
            address as u32,
        )
    }

    /// Logical map write, without touching the wait state counter. Writes to
    /// a bank command window are consumed by the mapper itself.
    pub fn write_logical(&mut self, address: u16, value: u8) -> bool {
        if self.in_bank_command_window(address) {
            self.run_bank_command(address, value);
            return true;
        }

        decoder::write(
            self.registry.logical(),
            &self.flags,
            &mut self.memory,
            address as u32,
            value,
        )
    }

    fn in_bank_command_window(&self, address: u16) -> bool {
        self.bank_command.iter().any(|window| window.contains(address))
    }

    pub fn relocate(&self, address: u16) -> u32 {
        self.bank_table.relocate(address)
    }

    fn run_bank_command(&mut self, address: u16, value: u8) {
        match BankCommand::decode(value) {
            Some(command) => command.execute(&mut self.bank_table, &mut self.memory.sram),
            None => tracing::debug!(
                "[MAPPER] Invalid mapper command {:02X} at {:04X} ignored",
                value,
                address
            ),
        }
    }

    pub fn cru_read(&self, address: u16) -> Option<u8> {
        tracing::trace!("[MAPPER] Read CRU {:04X} ignored", address);
        None
    }

    pub fn cru_write(&mut self, address: u16, value: u8) {
        let base = address & 0xFF00;

        if base == MAPPER_CRU_BASE {
            match (address & 0xFF) >> 1 {
                CRU_DSR_SELECT => {
                    self.flags.dsr_selected = value != 0;
                    tracing::debug!("[MAPPER] DSR select = {}", self.flags.dsr_selected);
                }
                CRU_SOFT_RESET => {
                    if value != 0 {
                        tracing::info!("[MAPPER] System reset by CRU request");
                        self.controller.borrow_mut().request_soft_reset();
                    }
                }
                bit => {
                    tracing::debug!("[MAPPER] Set CRU>{:04X} (bit {}) to {} ignored", address, bit, value)
                }
            }
            return;
        }

        if base == HEXBUS_CRU_BASE {
            tracing::debug!("[MAPPER] Set CRU>{:04X} (Hexbus) to {}", address, value);
        } else if base >= 0x0100 {
            tracing::debug!("[MAPPER] Set CRU>{:04X} (unknown) to {}", address, value);
        } else {
            tracing::trace!("[MAPPER] Set CRU>{:04X} to {} ignored", address, value);
        }
    }

    pub fn set_mode_line(&mut self, line: ModeLine, state: bool) {
        tracing::debug!("[MAPPER] Set {:?}={}", line, state);
        match line {
            ModeLine::Crus => self.flags.crus = state,
            ModeLine::Ptgen => self.flags.ptge = state,
        }
    }

    /// Clock input for the wait state counter.
    pub fn clock_in(&mut self, asserted: bool) {
        if self.waits.clock(asserted) {
            self.controller.borrow_mut().notify_ready(true);
        }
    }

    pub fn flags(&self) -> ModeFlags {
        self.flags
    }

    pub fn bank_table(&self) -> &BankTable {
        &self.bank_table
    }

    pub fn wait_count(&self) -> u8 {
        self.waits.count()
    }

    pub fn is_ready(&self) -> bool {
        self.waits.is_ready()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Nonvolatile SRAM, including the saved bank tables.
    pub fn sram(&self) -> &Ram {
        &self.memory.sram
    }

    pub fn dram(&self) -> &Ram {
        &self.memory.dram
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn state(&self) -> MapperState {
        MapperState {
            flags: self.flags,
            bank_table: self.bank_table,
            waits: self.waits,
        }
    }

    pub fn restore(&mut self, state: &MapperState) {
        self.flags = state.flags;
        self.bank_table = state.bank_table;
        self.waits = state.waits;
        let ready = self.waits.is_ready();
        self.controller.borrow_mut().notify_ready(ready);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{EntryConfig, Mode},
        device::BufferId,
        memory::{DRAM_SIZE, ROM_SIZE, SRAM_SIZE},
    };

    #[derive(Default)]
    struct Host {
        ready: Vec<bool>,
        resets: usize,
    }

    impl MachineController for Host {
        fn request_soft_reset(&mut self) {
            self.resets += 1;
        }

        fn get_buffer(&mut self, id: BufferId) -> Vec<u8> {
            match id {
                BufferId::Sram => vec![0; SRAM_SIZE],
                BufferId::Dram => vec![0; DRAM_SIZE],
                BufferId::Rom => vec![0; ROM_SIZE],
            }
        }

        fn notify_ready(&mut self, state: bool) {
            self.ready.push(state);
        }
    }

    fn mapper() -> (Mapper, Rc<RefCell<Host>>) {
        let host = Rc::new(RefCell::new(Host::default()));
        let mut config = MapperConfig::default();
        config
            .entry(EntryConfig::new("SRAM", Mode::Native, true, 0xF000, 0xF800, 0))
            .entry(EntryConfig::new("DRAM", Mode::Physical, true, 0, 0xFF0000, 0));
        let mapper = Mapper::new(&config, &DeviceDirectory::new(), host.clone());
        (mapper, host)
    }

    #[test]
    fn test_new_applies_reset_defaults() {
        let (mapper, host) = mapper();

        assert_eq!(mapper.flags(), ModeFlags::default());
        assert_eq!(mapper.bank_table(), &BankTable::default());
        assert!(mapper.is_ready());
        assert_eq!(host.borrow().ready, vec![true]);
        assert_eq!(mapper.sram().len(), SRAM_SIZE);
    }

    #[test]
    fn test_cru_dsr_select() {
        let (mut mapper, host) = mapper();

        mapper.cru_write(0x2700, 1);
        assert!(mapper.flags().dsr_selected);
        mapper.cru_write(0x2700, 0);
        assert!(!mapper.flags().dsr_selected);
        assert_eq!(host.borrow().resets, 0);
    }

    #[test]
    fn test_cru_other_ranges_are_ignored() {
        let (mut mapper, host) = mapper();
        let before = mapper.state();

        mapper.cru_write(0x1700, 1);
        mapper.cru_write(0x1702, 1);
        mapper.cru_write(0x2704, 1);
        mapper.cru_write(0x0400, 1);
        mapper.cru_write(0x0020, 1);
        mapper.cru_write(0x00FE, 1);

        assert_eq!(mapper.state(), before);
        assert_eq!(host.borrow().resets, 0);
        assert_eq!(mapper.cru_read(0x2700), None);
    }

    #[test]
    fn test_mode_line_switches_map() {
        let (mut mapper, _host) = mapper();
        mapper.memory_mut().sram.write(0x10, 0xAB);

        assert_eq!(mapper.read_logical(0xF010), (0x00, false));
        mapper.set_mode_line(ModeLine::Crus, false);
        assert_eq!(mapper.read_logical(0xF010), (0xAB, true));
    }

    #[test]
    fn test_restore_state() {
        let (mut mapper, host) = mapper();
        mapper.set_mode_line(ModeLine::Ptgen, true);
        mapper.write(0x3000, 1);
        let saved = mapper.state();

        mapper.reset();
        assert_ne!(mapper.state(), saved);

        mapper.restore(&saved);
        assert_eq!(mapper.state(), saved);
        assert!(!mapper.is_ready());
        assert_eq!(host.borrow().ready.last(), Some(&false));
    }
}
