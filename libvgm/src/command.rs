//! Instruction lengths of the VGM command set.
//!
//! The stripper only interprets one register write opcode, but it still has
//! to step over every other instruction whole. Otherwise an operand byte
//! (a sample, a data block payload) that happens to equal the write opcode
//! would be mistaken for a command.

use byteorder::{ByteOrder, LittleEndian};

pub const END_OF_DATA: u8 = 0x66;
pub const DATA_BLOCK: u8 = 0x67;
pub const GB_DMG_WRITE: u8 = 0xB3;

/// `0x67 0x66 tt ss ss ss ss`
const DATA_BLOCK_HEADER_LEN: usize = 7;
/// Bit 31 of the block size selects the second chip.
const DATA_BLOCK_SIZE_MASK: u32 = 0x7FFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandLength {
    /// Opcode plus operands, in bytes.
    Fixed(usize),
    /// Length-prefixed data block.
    DataBlock,
    /// `0x66`, nothing after it is a command.
    EndOfData,
    /// Unassigned opcode, stepped over one byte at a time.
    Unknown,
}

impl CommandLength {
    pub fn of(opcode: u8) -> Self {
        use CommandLength::*;

        match opcode {
            0x30..=0x3F => Fixed(2),
            0x40..=0x4E => Fixed(3),
            0x4F | 0x50 => Fixed(2),
            0x51..=0x5F => Fixed(3),
            0x61 => Fixed(3),
            0x62 | 0x63 => Fixed(1),
            END_OF_DATA => EndOfData,
            DATA_BLOCK => DataBlock,
            0x68 => Fixed(12),
            0x70..=0x8F => Fixed(1),
            0x90 | 0x91 => Fixed(5),
            0x92 => Fixed(6),
            0x93 => Fixed(11),
            0x94 => Fixed(2),
            0x95 => Fixed(5),
            0xA0..=0xBF => Fixed(3),
            0xC0..=0xDF => Fixed(4),
            0xE0..=0xFF => Fixed(5),
            _ => Unknown,
        }
    }
}

/// How much of `stream` the instruction at its first byte occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extent {
    Complete(usize),
    /// The instruction needs `needed` bytes but the stream ends first.
    Truncated { needed: usize },
    /// End of data, the remainder belongs to it.
    Rest,
}

pub fn instruction_extent(stream: &[u8]) -> Extent {
    let Some(&opcode) = stream.first() else {
        return Extent::Complete(0);
    };

    let needed = match CommandLength::of(opcode) {
        CommandLength::Fixed(n) => n,
        CommandLength::Unknown => 1,
        CommandLength::EndOfData => return Extent::Rest,
        CommandLength::DataBlock => {
            if stream.len() < DATA_BLOCK_HEADER_LEN {
                return Extent::Truncated {
                    needed: DATA_BLOCK_HEADER_LEN,
                };
            }
            let size = LittleEndian::read_u32(&stream[3..7]) & DATA_BLOCK_SIZE_MASK;
            DATA_BLOCK_HEADER_LEN + size as usize
        }
    };

    if stream.len() < needed {
        Extent::Truncated { needed }
    } else {
        Extent::Complete(needed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lengths() {
        assert_eq!(CommandLength::of(0x50), CommandLength::Fixed(2));
        assert_eq!(CommandLength::of(0x52), CommandLength::Fixed(3));
        assert_eq!(CommandLength::of(0x61), CommandLength::Fixed(3));
        assert_eq!(CommandLength::of(0x62), CommandLength::Fixed(1));
        assert_eq!(CommandLength::of(0x7F), CommandLength::Fixed(1));
        assert_eq!(CommandLength::of(GB_DMG_WRITE), CommandLength::Fixed(3));
        assert_eq!(CommandLength::of(0xC0), CommandLength::Fixed(4));
        assert_eq!(CommandLength::of(0xE0), CommandLength::Fixed(5));
        assert_eq!(CommandLength::of(END_OF_DATA), CommandLength::EndOfData);
        assert_eq!(CommandLength::of(DATA_BLOCK), CommandLength::DataBlock);
        assert_eq!(CommandLength::of(0x00), CommandLength::Unknown);
        assert_eq!(CommandLength::of(0x64), CommandLength::Unknown);
    }

    #[test]
    fn test_data_block_extent() {
        // 3 byte payload, second-chip bit set
        let block = [0x67, 0x66, 0x00, 0x03, 0x00, 0x00, 0x80, 0xB3, 0xB3, 0xB3, 0x62];
        assert_eq!(instruction_extent(&block), Extent::Complete(10));
        assert_eq!(
            instruction_extent(&block[..8]),
            Extent::Truncated { needed: 10 }
        );
        assert_eq!(
            instruction_extent(&block[..4]),
            Extent::Truncated { needed: 7 }
        );
    }

    #[test]
    fn test_fixed_extent() {
        assert_eq!(instruction_extent(&[0x61, 0x02, 0x00]), Extent::Complete(3));
        assert_eq!(
            instruction_extent(&[0xE0, 0x00]),
            Extent::Truncated { needed: 5 }
        );
        assert_eq!(instruction_extent(&[0x66, 0xB3, 0x10]), Extent::Rest);
        assert_eq!(instruction_extent(&[0x01, 0xB3]), Extent::Complete(1));
    }
}
