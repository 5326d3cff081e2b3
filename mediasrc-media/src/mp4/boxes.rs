//! ISO-BMFF box parsing
//!
//! Only the boxes needed to locate video samples are understood. The movie
//! box is read into memory whole and walked with [`bytes::Buf`]; every read
//! is bounds-checked so truncated or corrupt files surface as
//! [`MediaError::InvalidContainer`] instead of panics.

use bytes::{Buf, Bytes};
use mediasrc_core::{MediaError, MediaResult};
use std::io::{Read, Seek, SeekFrom};

/// Four-character box or sample entry code
pub type FourCc = [u8; 4];

pub const FTYP: FourCc = *b"ftyp";
pub const MOOV: FourCc = *b"moov";
pub const MDAT: FourCc = *b"mdat";
pub const MVHD: FourCc = *b"mvhd";
pub const TRAK: FourCc = *b"trak";
pub const TKHD: FourCc = *b"tkhd";
pub const MDIA: FourCc = *b"mdia";
pub const MDHD: FourCc = *b"mdhd";
pub const HDLR: FourCc = *b"hdlr";
pub const MINF: FourCc = *b"minf";
pub const STBL: FourCc = *b"stbl";
pub const STSD: FourCc = *b"stsd";
pub const STTS: FourCc = *b"stts";
pub const CTTS: FourCc = *b"ctts";
pub const STSC: FourCc = *b"stsc";
pub const STSZ: FourCc = *b"stsz";
pub const STCO: FourCc = *b"stco";
pub const CO64: FourCc = *b"co64";
pub const STSS: FourCc = *b"stss";

/// Handler type of video tracks
pub const VIDE: FourCc = *b"vide";

pub(crate) fn invalid(reason: impl Into<String>) -> MediaError {
    MediaError::InvalidContainer {
        reason: reason.into(),
    }
}

pub(crate) fn fourcc_str(cc: &FourCc) -> String {
    String::from_utf8_lossy(cc).into_owned()
}

fn need(buf: &Bytes, n: usize, what: &str) -> MediaResult<()> {
    if buf.remaining() < n {
        return Err(invalid(format!(
            "truncated {}: need {} bytes, have {}",
            what,
            n,
            buf.remaining()
        )));
    }
    Ok(())
}

pub(crate) fn read_u16(buf: &mut Bytes, what: &str) -> MediaResult<u16> {
    need(buf, 2, what)?;
    Ok(buf.get_u16())
}

pub(crate) fn read_u32(buf: &mut Bytes, what: &str) -> MediaResult<u32> {
    need(buf, 4, what)?;
    Ok(buf.get_u32())
}

pub(crate) fn read_u64(buf: &mut Bytes, what: &str) -> MediaResult<u64> {
    need(buf, 8, what)?;
    Ok(buf.get_u64())
}

pub(crate) fn read_fourcc(buf: &mut Bytes, what: &str) -> MediaResult<FourCc> {
    need(buf, 4, what)?;
    let mut cc = [0u8; 4];
    buf.copy_to_slice(&mut cc);
    Ok(cc)
}

pub(crate) fn skip(buf: &mut Bytes, n: usize, what: &str) -> MediaResult<()> {
    need(buf, n, what)?;
    buf.advance(n);
    Ok(())
}

/// Version byte and 24-bit flags of a full box
pub(crate) fn read_full_box_header(buf: &mut Bytes, what: &str) -> MediaResult<(u8, u32)> {
    let word = read_u32(buf, what)?;
    Ok(((word >> 24) as u8, word & 0x00FF_FFFF))
}

/// Make sure a table of `count` entries of `entry_size` bytes fits before allocating for it
pub(crate) fn check_table(buf: &Bytes, count: u32, entry_size: usize, what: &str) -> MediaResult<()> {
    let wanted = (count as usize).checked_mul(entry_size).ok_or_else(|| {
        invalid(format!("{} entry count {} overflows", what, count))
    })?;
    need(buf, wanted, what)
}

/// Split an in-memory container payload into its child boxes
pub fn child_boxes(mut buf: Bytes) -> MediaResult<Vec<(FourCc, Bytes)>> {
    let mut children = Vec::new();

    while buf.has_remaining() {
        let size = read_u32(&mut buf, "box header")? as u64;
        let kind = read_fourcc(&mut buf, "box header")?;

        let (total, header_len) = match size {
            0 => (buf.remaining() as u64 + 8, 8),
            1 => (read_u64(&mut buf, "box largesize")?, 16),
            n => (n, 8),
        };
        if total < header_len {
            return Err(invalid(format!(
                "{} box size {} smaller than its header",
                fourcc_str(&kind),
                total
            )));
        }

        let payload_len = usize::try_from(total - header_len)
            .map_err(|_| invalid(format!("{} box too large", fourcc_str(&kind))))?;
        need(&buf, payload_len, &fourcc_str(&kind))?;
        children.push((kind, buf.split_to(payload_len)));
    }

    Ok(children)
}

/// Find the first child of a given kind
pub fn find_child(children: &[(FourCc, Bytes)], kind: FourCc) -> Option<Bytes> {
    children
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, payload)| payload.clone())
}

/// Header of a top-level box read from a file
#[derive(Debug, Clone, Copy)]
pub struct TopLevelBox {
    pub kind: FourCc,
    /// Offset of the payload from the start of the file
    pub payload_offset: u64,
    pub payload_len: u64,
}

/// Walk the top-level boxes of a seekable stream without reading payloads
pub fn scan_top_level<R: Read + Seek>(reader: &mut R) -> MediaResult<Vec<TopLevelBox>> {
    let file_size = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let mut boxes = Vec::new();
    let mut pos = 0u64;

    while pos < file_size {
        if file_size - pos < 8 {
            return Err(invalid(format!("{} trailing bytes after last box", file_size - pos)));
        }

        let mut header = [0u8; 8];
        reader.read_exact(&mut header)?;
        let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let kind = [header[4], header[5], header[6], header[7]];

        let (total, header_len) = match size {
            0 => (file_size - pos, 8),
            1 => {
                let mut large = [0u8; 8];
                reader.read_exact(&mut large)?;
                (u64::from_be_bytes(large), 16)
            }
            n => (n, 8),
        };

        if total < header_len || total > file_size - pos {
            return Err(invalid(format!(
                "{} box at offset {} has size {} but the file has {} bytes left",
                fourcc_str(&kind),
                pos,
                total,
                file_size - pos
            )));
        }

        boxes.push(TopLevelBox {
            kind,
            payload_offset: pos + header_len,
            payload_len: total - header_len,
        });

        pos += total;
        reader.seek(SeekFrom::Start(pos))?;
    }

    Ok(boxes)
}

/// Read a top-level box payload into memory
pub fn read_payload<R: Read + Seek>(reader: &mut R, top: &TopLevelBox) -> MediaResult<Bytes> {
    let len = usize::try_from(top.payload_len)
        .map_err(|_| invalid(format!("{} box too large", fourcc_str(&top.kind))))?;
    reader.seek(SeekFrom::Start(top.payload_offset))?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(Bytes::from(payload))
}
