use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    command::{CommandLength, GB_DMG_WRITE},
    error::VgmError,
    header::Version,
    strip::{RegisterPredicate, ScanMode, StripOptions, REGISTER_WRITE_LEN},
};

/// What to do with a file older than `min_supported_version`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionPolicy {
    Reject,
    #[default]
    WarnAndProceed,
}

/// Inclusive `[low, high]` register ranges.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegisterRanges(pub Vec<(u8, u8)>);

impl RegisterRanges {
    /// The Game Boy registers Furnace writes as power-on state at the
    /// start of every export.
    pub fn gb_power_on() -> Self {
        Self(vec![
            (0x00, 0x00),
            (0x02, 0x02),
            (0x04, 0x04),
            (0x07, 0x07),
            (0x09, 0x09),
            (0x0C, 0x0C),
            (0x0E, 0x0E),
            (0x11, 0x11),
            (0x13, 0x16),
        ])
    }

    fn validate(&self) -> Result<(), VgmError> {
        match self.0.iter().find(|(low, high)| low > high) {
            Some((low, high)) => Err(VgmError::Config(format!(
                "register range [0x{:02X}, 0x{:02X}] is reversed",
                low, high
            ))),
            None => Ok(()),
        }
    }
}

impl RegisterPredicate for RegisterRanges {
    fn is_init_register(&self, register: u8) -> bool {
        self.0
            .iter()
            .any(|&(low, high)| (low..=high).contains(&register))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatchConfig {
    pub min_supported_version: Version,
    pub on_unsupported_version: VersionPolicy,
    pub register_write_opcode: u8,
    pub init_register_ranges: RegisterRanges,
    pub scan_mode: ScanMode,
    /// Also move the loop offset back by the bytes removed before it.
    pub adjust_loop_offset: bool,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            min_supported_version: Version::new(1, 61),
            on_unsupported_version: VersionPolicy::default(),
            register_write_opcode: GB_DMG_WRITE,
            init_register_ranges: RegisterRanges::gb_power_on(),
            scan_mode: ScanMode::default(),
            adjust_loop_offset: false,
        }
    }
}

impl PatchConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, VgmError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, VgmError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), VgmError> {
        self.init_register_ranges.validate()?;

        let length = CommandLength::of(self.register_write_opcode);
        if length != CommandLength::Fixed(REGISTER_WRITE_LEN) {
            return Err(VgmError::Config(format!(
                "opcode 0x{:02X} is not a {} byte register write",
                self.register_write_opcode, REGISTER_WRITE_LEN
            )));
        }

        Ok(())
    }

    pub fn strip_options(&self) -> StripOptions {
        StripOptions {
            opcode: self.register_write_opcode,
            scan_mode: self.scan_mode,
        }
    }
}
