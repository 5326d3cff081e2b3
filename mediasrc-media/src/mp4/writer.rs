//! Minimal single-track MP4 writer
//!
//! Lays out `ftyp`, one `mdat` holding every sample as a single chunk, then
//! `moov`. Used to produce fixture files and demo assets; it does not
//! encode anything, it only wraps access units the caller already has.

use super::boxes::{invalid, FourCc};
use bytes::BufMut;
use mediasrc_core::MediaResult;
use std::path::Path;

const UNITY_MATRIX: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

#[derive(Debug, Clone, Copy)]
struct PendingEntry {
    size: u32,
    duration: u32,
    composition_offset: i32,
    is_sync: bool,
}

/// Builds an MP4 file with a single video track
#[derive(Debug, Clone)]
pub struct Mp4Writer {
    format: FourCc,
    width: u16,
    height: u16,
    timescale: u32,
    entries: Vec<PendingEntry>,
    data: Vec<u8>,
}

fn boxed(kind: &[u8; 4], payload: &[u8]) -> MediaResult<Vec<u8>> {
    let size = u32::try_from(payload.len() + 8)
        .map_err(|_| invalid(format!("{} box too large to write", String::from_utf8_lossy(kind))))?;
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.put_u32(size);
    out.put_slice(kind);
    out.put_slice(payload);
    Ok(out)
}

fn full_boxed(kind: &[u8; 4], version: u8, flags: u32, payload: &[u8]) -> MediaResult<Vec<u8>> {
    let mut body = Vec::with_capacity(payload.len() + 4);
    body.put_u32(((version as u32) << 24) | (flags & 0x00FF_FFFF));
    body.put_slice(payload);
    boxed(kind, &body)
}

fn container(kind: &[u8; 4], children: &[Vec<u8>]) -> MediaResult<Vec<u8>> {
    boxed(kind, &children.concat())
}

impl Mp4Writer {
    /// New writer for samples of the given sample entry format
    pub fn new(format: FourCc, width: u16, height: u16, timescale: u32) -> Self {
        Self {
            format,
            width,
            height,
            timescale: timescale.max(1),
            entries: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn sample_count(&self) -> usize {
        self.entries.len()
    }

    /// Append a sample whose presentation time equals its decode time
    pub fn push_sample(&mut self, data: &[u8], duration: u32, is_sync: bool) {
        self.push_sample_with_offset(data, duration, 0, is_sync);
    }

    /// Append a sample with an explicit composition offset
    pub fn push_sample_with_offset(
        &mut self,
        data: &[u8],
        duration: u32,
        composition_offset: i32,
        is_sync: bool,
    ) {
        self.entries.push(PendingEntry {
            size: data.len() as u32,
            duration,
            composition_offset,
            is_sync,
        });
        self.data.extend_from_slice(data);
    }

    /// Serialize the whole file
    pub fn finish(&self) -> MediaResult<Vec<u8>> {
        let mut ftyp = Vec::new();
        ftyp.put_slice(b"isom");
        ftyp.put_u32(0x200);
        for brand in [b"isom", b"iso2", b"avc1", b"mp41"] {
            ftyp.put_slice(brand);
        }
        let ftyp = boxed(b"ftyp", &ftyp)?;

        let mdat = boxed(b"mdat", &self.data)?;
        let chunk_offset = u32::try_from(ftyp.len() + 8)
            .map_err(|_| invalid("chunk offset out of range"))?;
        let moov = self.moov(chunk_offset)?;

        Ok([ftyp, mdat, moov].concat())
    }

    /// Serialize and write to `path`
    pub fn write_to(&self, path: impl AsRef<Path>) -> MediaResult<()> {
        std::fs::write(path, self.finish()?)?;
        Ok(())
    }

    fn total_duration(&self) -> u32 {
        self.entries
            .iter()
            .map(|e| e.duration as u64)
            .sum::<u64>()
            .min(u32::MAX as u64) as u32
    }

    fn moov(&self, chunk_offset: u32) -> MediaResult<Vec<u8>> {
        let duration = self.total_duration();

        let mut mvhd = Vec::new();
        mvhd.put_u32(0);
        mvhd.put_u32(0);
        mvhd.put_u32(self.timescale);
        mvhd.put_u32(duration);
        mvhd.put_u32(0x0001_0000);
        mvhd.put_u16(0x0100);
        mvhd.put_bytes(0, 10);
        UNITY_MATRIX.iter().for_each(|m| mvhd.put_u32(*m));
        mvhd.put_bytes(0, 24);
        mvhd.put_u32(2);
        let mvhd = full_boxed(b"mvhd", 0, 0, &mvhd)?;

        let mut tkhd = Vec::new();
        tkhd.put_u32(0);
        tkhd.put_u32(0);
        tkhd.put_u32(1);
        tkhd.put_u32(0);
        tkhd.put_u32(duration);
        tkhd.put_bytes(0, 8);
        tkhd.put_u16(0);
        tkhd.put_u16(0);
        tkhd.put_u16(0);
        tkhd.put_u16(0);
        UNITY_MATRIX.iter().for_each(|m| tkhd.put_u32(*m));
        tkhd.put_u32((self.width as u32) << 16);
        tkhd.put_u32((self.height as u32) << 16);
        let tkhd = full_boxed(b"tkhd", 0, 3, &tkhd)?;

        let mut mdhd = Vec::new();
        mdhd.put_u32(0);
        mdhd.put_u32(0);
        mdhd.put_u32(self.timescale);
        mdhd.put_u32(duration);
        mdhd.put_u16(0x55C4);
        mdhd.put_u16(0);
        let mdhd = full_boxed(b"mdhd", 0, 0, &mdhd)?;

        let mut hdlr = Vec::new();
        hdlr.put_u32(0);
        hdlr.put_slice(b"vide");
        hdlr.put_bytes(0, 12);
        hdlr.put_slice(b"VideoHandler\0");
        let hdlr = full_boxed(b"hdlr", 0, 0, &hdlr)?;

        let mut vmhd = Vec::new();
        vmhd.put_u16(0);
        vmhd.put_bytes(0, 6);
        let vmhd = full_boxed(b"vmhd", 0, 1, &vmhd)?;

        let url = full_boxed(b"url ", 0, 1, &[])?;
        let mut dref = Vec::new();
        dref.put_u32(1);
        dref.put_slice(&url);
        let dinf = container(b"dinf", &[full_boxed(b"dref", 0, 0, &dref)?])?;

        let stbl = container(b"stbl", &self.sample_table(chunk_offset)?)?;
        let minf = container(b"minf", &[vmhd, dinf, stbl])?;
        let mdia = container(b"mdia", &[mdhd, hdlr, minf])?;
        let trak = container(b"trak", &[tkhd, mdia])?;
        container(b"moov", &[mvhd, trak])
    }

    fn sample_table(&self, chunk_offset: u32) -> MediaResult<Vec<Vec<u8>>> {
        let count = self.entries.len() as u32;
        let mut boxes = Vec::new();

        let mut entry = Vec::new();
        entry.put_bytes(0, 6);
        entry.put_u16(1);
        entry.put_bytes(0, 16);
        entry.put_u16(self.width);
        entry.put_u16(self.height);
        entry.put_u32(0x0048_0000);
        entry.put_u32(0x0048_0000);
        entry.put_u32(0);
        entry.put_u16(1);
        entry.put_bytes(0, 32);
        entry.put_u16(0x0018);
        entry.put_i16(-1);
        let entry = boxed(&self.format, &entry)?;
        let mut stsd = Vec::new();
        stsd.put_u32(1);
        stsd.put_slice(&entry);
        boxes.push(full_boxed(b"stsd", 0, 0, &stsd)?);

        let mut stts_runs: Vec<(u32, u32)> = Vec::new();
        for e in &self.entries {
            match stts_runs.last_mut() {
                Some((n, delta)) if *delta == e.duration => *n += 1,
                _ => stts_runs.push((1, e.duration)),
            }
        }
        let mut stts = Vec::new();
        stts.put_u32(stts_runs.len() as u32);
        stts_runs.iter().for_each(|(n, d)| {
            stts.put_u32(*n);
            stts.put_u32(*d);
        });
        boxes.push(full_boxed(b"stts", 0, 0, &stts)?);

        if self.entries.iter().any(|e| e.composition_offset != 0) {
            let mut runs: Vec<(u32, i32)> = Vec::new();
            for e in &self.entries {
                match runs.last_mut() {
                    Some((n, off)) if *off == e.composition_offset => *n += 1,
                    _ => runs.push((1, e.composition_offset)),
                }
            }
            let version = u8::from(runs.iter().any(|(_, off)| *off < 0));
            let mut ctts = Vec::new();
            ctts.put_u32(runs.len() as u32);
            runs.iter().for_each(|(n, off)| {
                ctts.put_u32(*n);
                ctts.put_i32(*off);
            });
            boxes.push(full_boxed(b"ctts", version, 0, &ctts)?);
        }

        let mut stsc = Vec::new();
        if count == 0 {
            stsc.put_u32(0);
        } else {
            stsc.put_u32(1);
            stsc.put_u32(1);
            stsc.put_u32(count);
            stsc.put_u32(1);
        }
        boxes.push(full_boxed(b"stsc", 0, 0, &stsc)?);

        let mut stsz = Vec::new();
        stsz.put_u32(0);
        stsz.put_u32(count);
        self.entries.iter().for_each(|e| stsz.put_u32(e.size));
        boxes.push(full_boxed(b"stsz", 0, 0, &stsz)?);

        let mut stco = Vec::new();
        stco.put_u32(1);
        stco.put_u32(chunk_offset);
        boxes.push(full_boxed(b"stco", 0, 0, &stco)?);

        if !self.entries.iter().all(|e| e.is_sync) {
            let mut stss = Vec::new();
            let sync: Vec<u32> = self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.is_sync)
                .map(|(i, _)| i as u32 + 1)
                .collect();
            stss.put_u32(sync.len() as u32);
            sync.iter().for_each(|n| stss.put_u32(*n));
            boxes.push(full_boxed(b"stss", 0, 0, &stss)?);
        }

        Ok(boxes)
    }
}

#[cfg(test)]
mod tests {
    use super::super::reader::Mp4SampleReader;
    use super::*;
    use mediasrc_core::{FrameRate, MediaTime, VideoSubtype};
    use std::io::Cursor;

    #[test]
    fn test_written_file_reads_back() {
        let mut writer = Mp4Writer::new(*b"avc1", 320, 240, 30);
        for i in 0..6u8 {
            writer.push_sample(&[i; 16], 1, i % 3 == 0);
        }
        let bytes = writer.finish().unwrap();

        let mut reader = Mp4SampleReader::from_reader(Cursor::new(bytes)).unwrap();
        let track = reader.track().clone();
        assert_eq!(track.subtype, VideoSubtype::H264);
        assert_eq!((track.width, track.height), (320, 240));
        assert_eq!(track.sample_count, 6);
        assert_eq!(track.frame_rate, FrameRate::fps(30));
        assert_eq!(track.duration, MediaTime::new(6, 30));

        let mut keyframes = Vec::new();
        while let Some(sample) = reader.read_sample().unwrap() {
            keyframes.push(sample.is_keyframe);
            assert_eq!(sample.data.len(), 16);
        }
        assert_eq!(keyframes, vec![true, false, false, true, false, false]);
    }

    #[test]
    fn test_empty_track() {
        let bytes = Mp4Writer::new(*b"avc1", 16, 16, 30).finish().unwrap();
        let mut reader = Mp4SampleReader::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.track().sample_count, 0);
        assert!(reader.read_sample().unwrap().is_none());
    }
}
