use std::{cell::RefCell, collections::HashMap, fmt, rc::Rc};

use serde::{Deserialize, Serialize};

/// Peripheral reachable through the mapper.
///
/// Addresses are passed unmodified: 16-bit logical addresses for entries in
/// the logical map, 24-bit physical addresses for entries in the physical map.
pub trait ByteDevice {
    /// Returns `None` when the device does not drive the data bus for this
    /// address. That path must not have side effects beyond logging.
    fn read_byte(&mut self, address: u32) -> Option<u8>;
    fn write_byte(&mut self, address: u32, value: u8);
}

pub type SharedDevice = Rc<RefCell<dyn ByteDevice>>;

/// Backing images owned by the machine.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub enum BufferId {
    /// Static RAM, battery backed. Also holds the saved bank tables.
    Sram,
    Dram,
    /// Console ROM image (ROM0, ROM1, ROM1A and DSR windows).
    Rom,
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferId::Sram => write!(f, "SRAM"),
            BufferId::Dram => write!(f, "DRAM"),
            BufferId::Rom => write!(f, "ROM"),
        }
    }
}

/// The machine the mapper is mounted in.
pub trait MachineController {
    fn request_soft_reset(&mut self);
    fn get_buffer(&mut self, id: BufferId) -> Vec<u8>;
    /// READY line sink. Repeated calls with the same state are harmless.
    fn notify_ready(&mut self, state: bool);
}

/// Named peripherals the registry resolves configuration entries against.
#[derive(Default, Clone)]
pub struct DeviceDirectory {
    devices: HashMap<String, SharedDevice>,
}

impl DeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, device: SharedDevice) -> &mut Self {
        self.devices.insert(name.to_string(), device);
        self
    }

    pub fn get(&self, name: &str) -> Option<SharedDevice> {
        self.devices.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl fmt::Debug for DeviceDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.devices.keys().collect();
        names.sort();
        f.debug_struct("DeviceDirectory")
            .field("devices", &names)
            .finish()
    }
}
