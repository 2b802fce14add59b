use byteorder::{ByteOrder, LittleEndian};

use crate::{
    error::VgmError,
    header::{VgmHeader, EOF_OFFSET_POS, GD3_OFFSET_POS, HEADER_SIZE, LOOP_OFFSET_POS},
};

/// Offset values as written into the patched header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RewrittenOffsets {
    pub eof_offset: u32,
    pub gd3_offset: Option<u32>,
    pub loop_offset: Option<u32>,
}

fn underflow(field: &'static str, value: usize, subtrahend: usize) -> VgmError {
    VgmError::ArithmeticUnderflow {
        field,
        value: value as u64,
        subtrahend: subtrahend as u64,
    }
}

fn to_u32(field: &'static str, offset: usize, value: usize) -> Result<u32, VgmError> {
    u32::try_from(value)
        .map_err(|_| VgmError::invalid(field, offset, format!("{} does not fit in 32 bits", value)))
}

/// Rewrites the EOF and GD3 offsets in a copy of the header.
///
/// `loop_shift` is the number of bytes removed before the loop point; when
/// given, the loop offset is pulled back by it as well.
pub fn rewrite_offsets(
    header_bytes: &mut [u8],
    header: &VgmHeader,
    new_total_len: usize,
    bytes_removed: usize,
    loop_shift: Option<usize>,
) -> Result<RewrittenOffsets, VgmError> {
    if header_bytes.len() < HEADER_SIZE {
        return Err(VgmError::invalid(
            "header",
            0,
            format!("need {} bytes to patch, got {}", HEADER_SIZE, header_bytes.len()),
        ));
    }

    let eof = new_total_len
        .checked_sub(EOF_OFFSET_POS)
        .ok_or_else(|| underflow("EOF offset", new_total_len, EOF_OFFSET_POS))?;
    let eof_offset = to_u32("EOF offset", EOF_OFFSET_POS, eof)?;

    let gd3_offset = if header.has_gd3() {
        let old = header.gd3_offset as usize;
        let new = old
            .checked_sub(bytes_removed)
            .ok_or_else(|| underflow("GD3 offset", old, bytes_removed))?;
        Some(to_u32("GD3 offset", GD3_OFFSET_POS, new)?)
    } else {
        None
    };

    let loop_offset = match (header.loop_offset, loop_shift) {
        (0, _) | (_, None) => None,
        (old, Some(shift)) => {
            let old = old as usize;
            let new = old
                .checked_sub(shift)
                .ok_or_else(|| underflow("loop offset", old, shift))?;
            Some(to_u32("loop offset", LOOP_OFFSET_POS, new)?)
        }
    };

    LittleEndian::write_u32(&mut header_bytes[EOF_OFFSET_POS..EOF_OFFSET_POS + 4], eof_offset);
    if let Some(gd3) = gd3_offset {
        LittleEndian::write_u32(&mut header_bytes[GD3_OFFSET_POS..GD3_OFFSET_POS + 4], gd3);
    }
    if let Some(lp) = loop_offset {
        LittleEndian::write_u32(&mut header_bytes[LOOP_OFFSET_POS..LOOP_OFFSET_POS + 4], lp);
    }

    Ok(RewrittenOffsets {
        eof_offset,
        gd3_offset,
        loop_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::tests::build_vgm;

    #[test]
    fn test_eof_and_gd3_rewritten() {
        let data = build_vgm(0x171, &[0xB3, 0x10, 0x00, 0x66], Some(b"Gd3 "));
        let header = VgmHeader::parse(&data).unwrap();
        let mut bytes = data[..HEADER_SIZE].to_vec();

        let rewritten = rewrite_offsets(&mut bytes, &header, data.len() - 3, 3, None).unwrap();

        assert_eq!(rewritten.eof_offset as usize, data.len() - 3 - 4);
        assert_eq!(rewritten.gd3_offset, Some(header.gd3_offset - 3));
        assert_eq!(rewritten.loop_offset, None);
        assert_eq!(
            LittleEndian::read_u32(&bytes[EOF_OFFSET_POS..]),
            rewritten.eof_offset
        );
        assert_eq!(
            LittleEndian::read_u32(&bytes[GD3_OFFSET_POS..]),
            header.gd3_offset - 3
        );
        // nothing else moved
        assert_eq!(bytes[0x08..0x14], data[0x08..0x14]);
        assert_eq!(bytes[0x18..], data[0x18..HEADER_SIZE]);
    }

    #[test]
    fn test_absent_gd3_left_zero() {
        let data = build_vgm(0x171, &[0x66], None);
        let header = VgmHeader::parse(&data).unwrap();
        let mut bytes = data[..HEADER_SIZE].to_vec();

        let rewritten = rewrite_offsets(&mut bytes, &header, data.len(), 0, None).unwrap();
        assert_eq!(rewritten.gd3_offset, None);
        assert_eq!(bytes, data[..HEADER_SIZE]);
    }

    #[test]
    fn test_gd3_underflow() {
        let data = build_vgm(0x171, &[0x66], Some(b"Gd3 "));
        let header = VgmHeader::parse(&data).unwrap();
        let mut bytes = data[..HEADER_SIZE].to_vec();
        let removed = header.gd3_offset as usize + 1;

        assert!(matches!(
            rewrite_offsets(&mut bytes, &header, data.len(), removed, None),
            Err(VgmError::ArithmeticUnderflow { field: "GD3 offset", .. })
        ));
        // failed rewrite leaves the header untouched
        assert_eq!(bytes, data[..HEADER_SIZE]);
    }

    #[test]
    fn test_tiny_total_length_underflows() {
        let data = build_vgm(0x171, &[], None);
        let header = VgmHeader::parse(&data).unwrap();
        let mut bytes = data[..HEADER_SIZE].to_vec();

        assert!(matches!(
            rewrite_offsets(&mut bytes, &header, 3, 0, None),
            Err(VgmError::ArithmeticUnderflow { field: "EOF offset", .. })
        ));
    }

    #[test]
    fn test_loop_offset_shift() {
        let mut data = build_vgm(0x171, &[0xB3, 0x10, 0x00, 0x62, 0x66], None);
        // loop back to the 0x62 wait at 0x43
        let loop_offset = (0x43 - LOOP_OFFSET_POS) as u32;
        LittleEndian::write_u32(&mut data[LOOP_OFFSET_POS..], loop_offset);
        let header = VgmHeader::parse(&data).unwrap();
        let mut bytes = data[..HEADER_SIZE].to_vec();

        let rewritten = rewrite_offsets(&mut bytes, &header, data.len() - 3, 3, Some(3)).unwrap();
        assert_eq!(rewritten.loop_offset, Some(loop_offset - 3));
        assert_eq!(
            LittleEndian::read_u32(&bytes[LOOP_OFFSET_POS..]),
            loop_offset - 3
        );
    }
}
