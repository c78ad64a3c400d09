//! Target description file
//!
//! Describes the emulated AVR and the programmer board in TOML format:
//!
//! ```toml
//! [target]
//! flash_size = "0x8000"
//! eeprom_size = 1024
//! signature = [0x1E, 0x95, 0x0F]
//!
//! [board]
//! slow_sck_jumper = false
//! ```
//!
//! Every key is optional; missing keys take the ATmega328P defaults.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use usbasp_dummy::DummyConfig;

use crate::error::BenchError;

/// Parsed target description
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    pub target: TargetSection,
    pub board: BoardSection,
}

/// `[target]` table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetSection {
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub flash_size: u32,
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub eeprom_size: u32,
    pub signature: [u8; 3],
}

impl Default for TargetSection {
    fn default() -> Self {
        let dummy = DummyConfig::default();
        Self {
            flash_size: dummy.flash_size as u32,
            eeprom_size: dummy.eeprom_size as u32,
            signature: dummy.signature,
        }
    }
}

/// `[board]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoardSection {
    pub slow_sck_jumper: bool,
}

impl BenchConfig {
    /// Parse a description from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, BenchError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a description file
    pub fn from_file(path: &Path) -> Result<Self, BenchError> {
        let content = fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
        let config = Self::from_toml_str(&content)?;
        log::debug!("Loaded target config from {}", path.display());
        Ok(config)
    }

    /// Configuration of the emulated target
    pub fn dummy_config(&self) -> DummyConfig {
        DummyConfig {
            flash_size: self.target.flash_size as usize,
            eeprom_size: self.target.eeprom_size as usize,
            signature: self.target.signature,
        }
    }
}

/// Deserialize a u32 that can be hex (0x...) or decimal
fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    // Try to deserialize as a number first, then as a string
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Int(u32),
        Str(String),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(n),
        HexOrInt::Str(s) => parse_number(&s).map_err(serde::de::Error::custom),
    }
}

/// Parse a number that can be hex (0x...) or decimal
pub fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex '{}': {}", s, e))
    } else {
        s.parse()
            .map_err(|e| format!("invalid number '{}': {}", s, e))
    }
}
