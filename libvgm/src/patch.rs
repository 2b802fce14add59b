use crate::{
    config::PatchConfig,
    error::VgmError,
    header::{Version, VgmHeader, HEADER_SIZE},
    offsets::{rewrite_offsets, RewrittenOffsets},
    strip::{strip_init_writes, StripWarning, StrippedRegisters},
};

#[derive(Clone, Debug)]
pub struct PatchReport {
    pub version: Version,
    pub bytes_removed: usize,
    pub stripped: StrippedRegisters,
    /// Tolerated problems, with offsets relative to the command stream.
    pub warnings: Vec<StripWarning>,
    pub command_stream_start: usize,
    pub old_eof_offset: u32,
    pub old_gd3_offset: Option<u32>,
    pub offsets: RewrittenOffsets,
}

#[derive(Clone, Debug)]
pub struct PatchOutput {
    pub bytes: Vec<u8>,
    pub report: PatchReport,
}

/// Strips the init register writes from a whole VGM file.
///
/// The input is not modified. Everything before the command stream and
/// everything after it (the GD3 block) is copied unchanged apart from the
/// offset fields.
pub fn patch(input: &[u8], config: &PatchConfig) -> Result<PatchOutput, VgmError> {
    let header = VgmHeader::parse(input)?;
    header.check_version(config.min_supported_version, config.on_unsupported_version)?;

    let region = header.command_region();
    let outcome = strip_init_writes(
        &input[region.clone()],
        &config.init_register_ranges,
        &config.strip_options(),
    );

    let mut bytes = Vec::with_capacity(input.len() - outcome.bytes_removed);
    bytes.extend_from_slice(&input[..region.start]);
    bytes.extend_from_slice(&outcome.stream);
    bytes.extend_from_slice(&input[region.end..]);

    let loop_shift = if config.adjust_loop_offset {
        header
            .loop_position()
            .map(|pos| outcome.removed_before(pos.saturating_sub(region.start)))
    } else {
        None
    };

    let new_len = bytes.len();
    let offsets = rewrite_offsets(
        &mut bytes[..HEADER_SIZE],
        &header,
        new_len,
        outcome.bytes_removed,
        loop_shift,
    )?;

    tracing::debug!(
        "Removed {} bytes ({} registers), EOF offset 0x{:X} -> 0x{:X}",
        outcome.bytes_removed,
        outcome.stripped.len(),
        header.eof_offset,
        offsets.eof_offset
    );

    Ok(PatchOutput {
        bytes,
        report: PatchReport {
            version: header.version,
            bytes_removed: outcome.bytes_removed,
            stripped: outcome.stripped,
            warnings: outcome.warnings,
            command_stream_start: region.start,
            old_eof_offset: header.eof_offset,
            old_gd3_offset: header.has_gd3().then_some(header.gd3_offset),
            offsets,
        },
    })
}
