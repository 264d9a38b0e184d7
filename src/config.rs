// +----------------+----------+------------------------------------------+
// | Logical range  | Mode     | Resource                                 |
// +----------------+----------+------------------------------------------+
// | 0x0000-0x1FFF  | both     | ROM0 (console ROM, image offset 0x0000)  |
// | 0x6000-0x7FFF  | ti99em   | Cartridge port                           |
// | 0x8000-0x83FF  | ti99em   | SRAM                                     |
// | 0x8400-0x9FFF  | ti99em   | Sound, VDP, speech, GROM ports           |
// | 0x8810-0x881F  | any      | Mapper (bank store/load command)         |
// | 0xF000-0xF7FF  | native   | SRAM                                     |
// | 0xF800-0xF83F  | native   | VDP, sound, speech, GROM ports           |
// | 0xF870-0xF87F  | any      | Mapper (bank store/load command)         |
// +----------------+----------+------------------------------------------+
// Everything else is relocated through the bank table into the 24-bit
// physical space (DRAM at 0x000000, system ROMs and DSR at 0xFF0000).
use std::{fmt, fs, path::Path};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Operating context in which an entry takes part in decoding.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Visible while CRUS is cleared (TI-99/8 native map).
    Native,
    /// Visible while CRUS is set (TI-99/4A compatible map).
    Ti99Em,
    /// Visible while the pattern generator line is enabled.
    PatGen,
    /// Member of the physical address space, reached through the bank table.
    Physical,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Native => write!(f, "native"),
            Mode::Ti99Em => write!(f, "ti99em"),
            Mode::PatGen => write!(f, "patgen"),
            Mode::Physical => write!(f, "physical"),
        }
    }
}

/// One record of the mapper device list.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct EntryConfig {
    pub name: String,
    pub mode: Mode,
    /// Stop scanning after this entry matched.
    #[serde(default = "default_stop")]
    pub stop: bool,
    pub select_pattern: u32,
    pub address_mask: u32,
    #[serde(default)]
    pub write_select: u32,
}

fn default_stop() -> bool {
    true
}

impl EntryConfig {
    pub fn new(name: &str, mode: Mode, stop: bool, select: u32, mask: u32, write: u32) -> Self {
        Self {
            name: name.to_string(),
            mode,
            stop,
            select_pattern: select,
            address_mask: mask,
            write_select: write,
        }
    }
}

impl fmt::Display for EntryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) select={:#08X} mask={:#08X} write={:#06X}{}",
            self.name,
            self.mode,
            self.select_pattern,
            self.address_mask,
            self.write_select,
            if self.stop { "" } else { " cont" }
        )
    }
}

/// Logical address window that carries the bank store/load command.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct CommandWindow {
    pub select_pattern: u16,
    pub address_mask: u16,
}

impl CommandWindow {
    pub fn contains(&self, address: u16) -> bool {
        address & self.address_mask == self.select_pattern
    }
}

pub const NATIVE_MAPPER_PORT: CommandWindow = CommandWindow {
    select_pattern: 0xF870,
    address_mask: 0xFFF0,
};

pub const TI99EM_MAPPER_PORT: CommandWindow = CommandWindow {
    select_pattern: 0x8810,
    address_mask: 0xFFF0,
};

fn default_bank_command() -> Vec<CommandWindow> {
    vec![NATIVE_MAPPER_PORT, TI99EM_MAPPER_PORT]
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct MapperConfig {
    /// Device list in priority order.
    pub entries: Vec<EntryConfig>,
    #[serde(default = "default_bank_command")]
    pub bank_command: Vec<CommandWindow>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            bank_command: default_bank_command(),
        }
    }
}

static TI998_MAP: Lazy<MapperConfig> = Lazy::new(|| {
    use Mode::*;

    let entries = vec![
        // TI-99/4A compatible map (CRUS=1)
        EntryConfig::new("ROM0", Ti99Em, true, 0x0000, 0xE000, 0x0000),
        EntryConfig::new("gromport", Ti99Em, true, 0x6000, 0xE000, 0x0000),
        EntryConfig::new("SRAM", Ti99Em, true, 0x8000, 0xFC00, 0x0000),
        EntryConfig::new("sound", Ti99Em, true, 0x8400, 0xFC01, 0x0000),
        EntryConfig::new("video", Ti99Em, true, 0x8800, 0xFC01, 0x0400),
        EntryConfig::new("speech", Ti99Em, true, 0x9000, 0xFC01, 0x0400),
        EntryConfig::new("grom", Ti99Em, true, 0x9800, 0xFC01, 0x0400),
        // Native map (CRUS=0)
        EntryConfig::new("ROM0", Native, true, 0x0000, 0xE000, 0x0000),
        EntryConfig::new("SRAM", Native, true, 0xF000, 0xF800, 0x0000),
        EntryConfig::new("video", Native, true, 0xF800, 0xFFF1, 0x0002),
        EntryConfig::new("sound", Native, true, 0xF810, 0xFFF1, 0x0000),
        EntryConfig::new("speech", Native, true, 0xF820, 0xFFF1, 0x0002),
        EntryConfig::new("grom", Native, true, 0xF830, 0xFFF1, 0x0002),
        // Pattern generator window, shadows the cartridge port
        EntryConfig::new("gromport", PatGen, false, 0x6000, 0xE000, 0x0000),
        // Physical space
        EntryConfig::new("DRAM", Physical, true, 0x000000, 0xFF0000, 0x000000),
        EntryConfig::new("ROM1", Physical, true, 0xFF0000, 0xFFE000, 0x000000),
        EntryConfig::new("ROM1A", Physical, true, 0xFF2000, 0xFFE000, 0x000000),
        EntryConfig::new("DSR", Physical, false, 0xFF4000, 0xFFE000, 0x000000),
        EntryConfig::new("peribox", Physical, true, 0xFF4000, 0xFFE000, 0x000000),
        EntryConfig::new("INTS", Physical, true, 0xFF6000, 0xFFF000, 0x000000),
    ];

    MapperConfig {
        entries,
        bank_command: default_bank_command(),
    }
});

impl MapperConfig {
    /// The stock TI-99/8 console device list.
    pub fn ti998() -> Self {
        TI998_MAP.clone()
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: MapperConfig = serde_json::from_str(json)?;
        tracing::debug!(
            "[CONFIG] Parsed mapper configuration with {} entries",
            config.entries.len()
        );
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&text)?;
        tracing::info!(
            "[CONFIG] Loaded {} mapper entries from {:?}",
            config.entries.len(),
            path.as_ref()
        );
        Ok(config)
    }

    pub fn entry(&mut self, entry: EntryConfig) -> &mut Self {
        self.entries.push(entry);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let json = r#"{
            "entries": [
                { "name": "dsr", "mode": "native", "select_pattern": 24576, "address_mask": 61440 }
            ]
        }"#;

        let config = MapperConfig::from_json(json).unwrap();
        assert_eq!(config.entries.len(), 1);
        let entry = &config.entries[0];
        assert_eq!(entry.mode, Mode::Native);
        assert!(entry.stop);
        assert_eq!(entry.write_select, 0);
        assert_eq!(config.bank_command, vec![NATIVE_MAPPER_PORT, TI99EM_MAPPER_PORT]);
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let json = r#"{ "entries": [
            { "name": "x", "mode": "turbo", "select_pattern": 0, "address_mask": 0 }
        ] }"#;

        assert!(matches!(
            MapperConfig::from_json(json),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_default_map_round_trips_through_json() {
        let config = MapperConfig::ti998();
        let json = config.to_json().unwrap();
        assert_eq!(MapperConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_default_map_layout() {
        let config = MapperConfig::ti998();
        let physical: Vec<_> = config
            .entries
            .iter()
            .filter(|e| e.mode == Mode::Physical)
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(physical, ["DRAM", "ROM1", "ROM1A", "DSR", "peribox", "INTS"]);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join("ti998-mapper-config-test.json");
        fs::write(&path, MapperConfig::ti998().to_json().unwrap()).unwrap();

        let config = MapperConfig::load(&path).unwrap();
        assert_eq!(config.entries.len(), MapperConfig::ti998().entries.len());

        fs::remove_file(&path).unwrap();
        assert!(MapperConfig::load(&path).is_err());
    }

    #[test]
    fn test_command_window() {
        assert!(NATIVE_MAPPER_PORT.contains(0xF870));
        assert!(NATIVE_MAPPER_PORT.contains(0xF87F));
        assert!(!NATIVE_MAPPER_PORT.contains(0xF880));
        assert!(TI99EM_MAPPER_PORT.contains(0x8812));
    }
}
