use std::{fmt, io::Cursor, ops::Range, str::FromStr};

use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};

use crate::{config::VersionPolicy, error::VgmError};

pub const VGM_MAGIC: &[u8; 4] = b"Vgm ";
pub const HEADER_SIZE: usize = 0x40;

pub const EOF_OFFSET_POS: usize = 0x04;
pub const VERSION_POS: usize = 0x08;
pub const GD3_OFFSET_POS: usize = 0x14;
pub const TOTAL_SAMPLES_POS: usize = 0x18;
pub const LOOP_OFFSET_POS: usize = 0x1C;
pub const DATA_OFFSET_POS: usize = 0x34;

/// Where the commands start in files that predate the data offset field.
pub const LEGACY_DATA_START: usize = 0x40;

const DATA_OFFSET_SINCE: Version = Version::new(1, 50);

/// A decoded `major.minor` VGM version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u8,
}

impl Version {
    pub const fn new(major: u32, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Decodes the raw version field.
    ///
    /// Writers have used two encodings over the years: BCD nibbles
    /// (`0x00000171` is 1.71) and a plain decimal integer (`171`). A value
    /// only counts as BCD when every nibble is a decimal digit and the
    /// major part is non-zero, otherwise it is read as decimal.
    pub fn from_raw(raw: u32) -> Self {
        match (bcd_value(raw >> 8), bcd_value(raw & 0xFF)) {
            (Some(major), Some(minor)) if major > 0 => Self::new(major, minor as u8),
            _ => Self::new(raw / 100, (raw % 100) as u8),
        }
    }
}

fn bcd_value(mut raw: u32) -> Option<u32> {
    let mut value = 0;
    let mut scale = 1;

    while raw != 0 {
        let digit = raw & 0xF;
        if digit > 9 {
            return None;
        }
        value += digit * scale;
        scale *= 10;
        raw >>= 4;
    }

    Some(value)
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = VgmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || VgmError::Config(format!("'{}' is not a version like 1.61", s));

        let (major, minor) = s.trim().split_once('.').ok_or_else(bad)?;
        let major = major.parse::<u32>().map_err(|_| bad())?;
        let minor = minor.parse::<u8>().map_err(|_| bad())?;
        if minor > 99 {
            return Err(bad());
        }

        Ok(Self::new(major, minor))
    }
}

impl TryFrom<String> for Version {
    type Error = VgmError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}

/// The fields of the fixed header this crate reads or rewrites.
///
/// All offsets are kept exactly as stored, relative to their own field.
/// The absolute positions are resolved once in [`VgmHeader::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VgmHeader {
    pub eof_offset: u32,
    pub version_raw: u32,
    pub version: Version,
    pub gd3_offset: u32,
    pub total_samples: u32,
    pub loop_offset: u32,
    pub data_offset: u32,
    command_start: usize,
    command_end: usize,
}

impl VgmHeader {
    pub fn parse(buf: &[u8]) -> Result<Self, VgmError> {
        if buf.len() < HEADER_SIZE {
            return Err(VgmError::invalid(
                "header",
                0,
                format!("need {} bytes, file has {}", HEADER_SIZE, buf.len()),
            ));
        }

        if &buf[0..4] != VGM_MAGIC {
            return Err(VgmError::invalid(
                "signature",
                0,
                format!(
                    "expected {:?}, found {:?}",
                    String::from_utf8_lossy(VGM_MAGIC),
                    String::from_utf8_lossy(&buf[0..4])
                ),
            ));
        }

        let mut reader = Cursor::new(buf);

        reader.set_position(EOF_OFFSET_POS as u64);
        let eof_offset = reader.read_u32::<LittleEndian>()?;
        let version_raw = reader.read_u32::<LittleEndian>()?;

        reader.set_position(GD3_OFFSET_POS as u64);
        let gd3_offset = reader.read_u32::<LittleEndian>()?;
        let total_samples = reader.read_u32::<LittleEndian>()?;
        let loop_offset = reader.read_u32::<LittleEndian>()?;

        reader.set_position(DATA_OFFSET_POS as u64);
        let data_offset = reader.read_u32::<LittleEndian>()?;

        let version = Version::from_raw(version_raw);

        let command_start = if data_offset == 0 || version < DATA_OFFSET_SINCE {
            LEGACY_DATA_START
        } else {
            DATA_OFFSET_POS + data_offset as usize
        };

        if command_start < HEADER_SIZE {
            return Err(VgmError::invalid(
                "data offset",
                DATA_OFFSET_POS,
                format!("0x{:X} points inside the fixed header", data_offset),
            ));
        }

        let eof_end = (EOF_OFFSET_POS + eof_offset as usize).min(buf.len());

        let command_end = if gd3_offset == 0 {
            eof_end
        } else {
            let gd3_start = GD3_OFFSET_POS + gd3_offset as usize;
            if gd3_start > buf.len() {
                return Err(VgmError::invalid(
                    "GD3 offset",
                    GD3_OFFSET_POS,
                    format!(
                        "block at 0x{:X} lies past the end of the file (0x{:X} bytes)",
                        gd3_start,
                        buf.len()
                    ),
                ));
            }
            gd3_start
        };

        if command_start > command_end {
            return Err(VgmError::invalid(
                "data offset",
                DATA_OFFSET_POS,
                format!(
                    "commands start at 0x{:X}, after the end of the command data at 0x{:X}",
                    command_start, command_end
                ),
            ));
        }

        Ok(Self {
            eof_offset,
            version_raw,
            version,
            gd3_offset,
            total_samples,
            loop_offset,
            data_offset,
            command_start,
            command_end,
        })
    }

    /// Absolute position of the first command byte.
    pub fn command_stream_start(&self) -> usize {
        self.command_start
    }

    /// Absolute byte range of the command stream. It ends at the GD3 block
    /// when there is one, otherwise at the end of the file.
    pub fn command_region(&self) -> Range<usize> {
        self.command_start..self.command_end
    }

    pub fn has_gd3(&self) -> bool {
        self.gd3_offset != 0
    }

    /// Absolute position the player jumps back to, if the file loops.
    pub fn loop_position(&self) -> Option<usize> {
        (self.loop_offset != 0).then(|| LOOP_OFFSET_POS + self.loop_offset as usize)
    }

    /// Applies the version gate. Under [`VersionPolicy::WarnAndProceed`]
    /// an old file is logged and accepted.
    pub fn check_version(&self, minimum: Version, policy: VersionPolicy) -> Result<(), VgmError> {
        if self.version >= minimum {
            return Ok(());
        }

        match policy {
            VersionPolicy::Reject => Err(VgmError::UnsupportedVersion {
                found: self.version,
                minimum,
            }),
            VersionPolicy::WarnAndProceed => {
                tracing::warn!(
                    "VGM version {} is older than {}, init register table may not apply",
                    self.version,
                    minimum
                );
                Ok(())
            }
        }
    }
}
