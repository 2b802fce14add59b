use serde::{Deserialize, Serialize};

use crate::command::{instruction_extent, Extent, GB_DMG_WRITE};

/// `opcode register value`
pub const REGISTER_WRITE_LEN: usize = 3;

/// Decides which registers have their first write removed.
pub trait RegisterPredicate {
    fn is_init_register(&self, register: u8) -> bool;
}

impl<F: Fn(u8) -> bool> RegisterPredicate for F {
    fn is_init_register(&self, register: u8) -> bool {
        self(register)
    }
}

/// How instructions other than the register write are stepped over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanMode {
    /// Step over each instruction by its length in the opcode table.
    #[default]
    OpcodeTable,
    /// Treat every other byte as a one byte instruction. Operand bytes that
    /// equal the write opcode are misread, kept for compatibility with the
    /// output of older tools.
    BytewiseLegacy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StripOptions {
    pub opcode: u8,
    pub scan_mode: ScanMode,
}

impl Default for StripOptions {
    fn default() -> Self {
        Self {
            opcode: GB_DMG_WRITE,
            scan_mode: ScanMode::default(),
        }
    }
}

/// Registers already stripped during one pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StrippedRegisters {
    bits: [u64; 4],
}

impl StrippedRegisters {
    /// Returns false if the register was already in the set.
    pub fn insert(&mut self, register: u8) -> bool {
        let (word, bit) = (register as usize / 64, 1u64 << (register % 64));
        let fresh = self.bits[word] & bit == 0;
        self.bits[word] |= bit;
        fresh
    }

    pub fn contains(&self, register: u8) -> bool {
        self.bits[register as usize / 64] & (1u64 << (register % 64)) != 0
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(|&r| self.contains(r))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StripWarning {
    /// An instruction runs past the end of the command data. Its bytes were
    /// copied through as they are.
    TruncatedInstruction {
        stream_offset: usize,
        opcode: u8,
        needed: usize,
        available: usize,
    },
}

#[derive(Clone, Debug, Default)]
pub struct StripOutcome {
    pub stream: Vec<u8>,
    pub bytes_removed: usize,
    pub stripped: StrippedRegisters,
    pub warnings: Vec<StripWarning>,
    /// Input offsets of the removed writes, ascending.
    removed_at: Vec<usize>,
}

impl StripOutcome {
    /// Bytes removed strictly before `stream_offset` of the input stream.
    pub fn removed_before(&self, stream_offset: usize) -> usize {
        self.removed_at.partition_point(|&p| p < stream_offset) * REGISTER_WRITE_LEN
    }
}

fn truncated(
    warnings: &mut Vec<StripWarning>,
    stream_offset: usize,
    opcode: u8,
    needed: usize,
    available: usize,
) {
    tracing::warn!(
        "Truncated instruction 0x{:02X} at stream offset 0x{:X}: needs {} bytes, {} left",
        opcode,
        stream_offset,
        needed,
        available
    );
    warnings.push(StripWarning::TruncatedInstruction {
        stream_offset,
        opcode,
        needed,
        available,
    });
}

/// Removes the first write to every init register in `stream`.
///
/// Later writes to the same register are kept, as is every other byte in
/// its original order.
pub fn strip_init_writes<P>(stream: &[u8], predicate: &P, options: &StripOptions) -> StripOutcome
where
    P: RegisterPredicate + ?Sized,
{
    let mut out = Vec::with_capacity(stream.len());
    let mut stripped = StrippedRegisters::default();
    let mut removed_at = Vec::new();
    let mut warnings = Vec::new();
    let mut pos = 0;

    while pos < stream.len() {
        let opcode = stream[pos];
        let available = stream.len() - pos;

        if opcode == options.opcode {
            if available < REGISTER_WRITE_LEN {
                truncated(&mut warnings, pos, opcode, REGISTER_WRITE_LEN, available);
                out.push(opcode);
                pos += 1;
                continue;
            }

            let register = stream[pos + 1];
            let value = stream[pos + 2];

            if predicate.is_init_register(register) && stripped.insert(register) {
                tracing::debug!(
                    "Stripping init write 0x{:02X} = 0x{:02X} at stream offset 0x{:X}",
                    register,
                    value,
                    pos
                );
                removed_at.push(pos);
            } else {
                out.extend_from_slice(&stream[pos..pos + REGISTER_WRITE_LEN]);
            }

            pos += REGISTER_WRITE_LEN;
            continue;
        }

        let len = match options.scan_mode {
            ScanMode::BytewiseLegacy => 1,
            ScanMode::OpcodeTable => match instruction_extent(&stream[pos..]) {
                Extent::Complete(n) => n,
                Extent::Rest => available,
                Extent::Truncated { needed } => {
                    truncated(&mut warnings, pos, opcode, needed, available);
                    available
                }
            },
        };

        out.extend_from_slice(&stream[pos..pos + len]);
        pos += len;
    }

    StripOutcome {
        stream: out,
        bytes_removed: removed_at.len() * REGISTER_WRITE_LEN,
        stripped,
        warnings,
        removed_at,
    }
}
