pub mod config;
pub mod decoder;
pub mod device;
pub mod error;
pub mod mapper;
pub mod memory;
pub mod registry;
pub mod relocator;
pub mod timing;

use std::{cell::RefCell, rc::Rc};

pub use config::{EntryConfig, MapperConfig, Mode};
pub use decoder::ModeFlags;
pub use device::{BufferId, ByteDevice, DeviceDirectory, MachineController};
pub use error::ConfigError;
pub use mapper::{Mapper, MapperState, ModeLine};
pub use relocator::BankTable;
use wasm_bindgen::prelude::*;

use memory::{DRAM_SIZE, ROM_SIZE, SRAM_SIZE};

/// Minimal machine around a mapper: owns the images handed out at start-up
/// and latches the READY line and soft reset requests for the host to poll.
#[derive(Debug)]
pub struct Console {
    rom: Vec<u8>,
    pub ready: bool,
    pub reset_requested: bool,
}

impl Console {
    pub fn new(rom_data: &[u8]) -> Self {
        let mut rom = vec![0xFF; ROM_SIZE];
        let len = rom_data.len().min(ROM_SIZE);
        rom[..len].copy_from_slice(&rom_data[..len]);

        Self {
            rom,
            ready: true,
            reset_requested: false,
        }
    }
}

impl MachineController for Console {
    fn request_soft_reset(&mut self) {
        self.reset_requested = true;
    }

    fn get_buffer(&mut self, id: BufferId) -> Vec<u8> {
        match id {
            BufferId::Sram => vec![0; SRAM_SIZE],
            BufferId::Dram => vec![0; DRAM_SIZE],
            BufferId::Rom => self.rom.clone(),
        }
    }

    fn notify_ready(&mut self, state: bool) {
        self.ready = state;
    }
}

pub fn get_mapper(rom_data: &[u8]) -> (Mapper, Rc<RefCell<Console>>) {
    let console = Rc::new(RefCell::new(Console::new(rom_data)));
    let mapper = Mapper::new(
        &MapperConfig::ti998(),
        &DeviceDirectory::new(),
        console.clone(),
    );
    (mapper, console)
}

#[wasm_bindgen(js_name = Mapper)]
pub struct JsMapper {
    mapper: Mapper,
    console: Rc<RefCell<Console>>,
}

#[wasm_bindgen(js_class = Mapper)]
impl JsMapper {
    #[wasm_bindgen(constructor)]
    pub fn new(rom_data: &[u8]) -> Self {
        console_error_panic_hook::set_once();
        let _ = tracing_wasm::try_set_as_global_default();

        let (mapper, console) = get_mapper(rom_data);
        Self { mapper, console }
    }

    pub fn read(&mut self, address: u16) -> u8 {
        self.mapper.read(address)
    }

    pub fn write(&mut self, address: u16, value: u8) {
        self.mapper.write(address, value);
    }

    #[wasm_bindgen(js_name = cruWrite)]
    pub fn cru_write(&mut self, address: u16, value: u8) {
        self.mapper.cru_write(address, value);
    }

    #[wasm_bindgen(js_name = setCrus)]
    pub fn set_crus(&mut self, state: bool) {
        self.mapper.set_mode_line(ModeLine::Crus, state);
    }

    #[wasm_bindgen(js_name = setPtgen)]
    pub fn set_ptgen(&mut self, state: bool) {
        self.mapper.set_mode_line(ModeLine::Ptgen, state);
    }

    pub fn clock(&mut self, asserted: bool) {
        self.mapper.clock_in(asserted);
    }

    pub fn reset(&mut self) {
        self.console.borrow_mut().reset_requested = false;
        self.mapper.reset();
    }

    #[wasm_bindgen(getter)]
    pub fn ready(&self) -> bool {
        self.console.borrow().ready
    }

    /// Returns and clears a pending soft reset request.
    #[wasm_bindgen(js_name = takeResetRequest)]
    pub fn take_reset_request(&mut self) -> bool {
        std::mem::take(&mut self.console.borrow_mut().reset_requested)
    }

    #[wasm_bindgen(getter = bankTable)]
    pub fn bank_table(&self) -> Vec<u32> {
        self.mapper.bank_table().offsets().to_vec()
    }

    #[wasm_bindgen(getter)]
    pub fn sram(&self) -> Vec<u8> {
        self.mapper.sram().data.clone()
    }
}
