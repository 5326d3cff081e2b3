//! Sample table flattening
//!
//! The `stbl` box describes samples through run-length tables. They are
//! expanded here into one [`SampleInfo`] per sample so the reader can step
//! through a track by index.

use super::boxes::{
    check_table, child_boxes, find_child, fourcc_str, invalid, read_fourcc, read_full_box_header,
    read_u16, read_u32, read_u64, skip, FourCc, CO64, CTTS, STCO, STSC, STSD, STSS, STSZ, STTS,
};
use bytes::Bytes;
use mediasrc_core::MediaResult;

/// Location and timing of one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleInfo {
    /// Absolute file offset of the sample data
    pub offset: u64,
    pub size: u32,
    /// Decode time in track timescale units
    pub decode_time: u64,
    /// Duration in track timescale units
    pub duration: u32,
    /// Presentation offset from the decode time (`ctts`)
    pub composition_offset: i32,
    pub is_sync: bool,
}

impl SampleInfo {
    /// Presentation time in track timescale units
    pub fn presentation_time(&self) -> i64 {
        i64::try_from(self.decode_time)
            .unwrap_or(i64::MAX)
            .saturating_add(self.composition_offset as i64)
    }
}

/// First visual sample entry of an `stsd` box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualSampleEntry {
    pub format: FourCc,
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone, Copy)]
struct ChunkRun {
    first_chunk: u32,
    samples_per_chunk: u32,
}

/// Parse the first entry of an `stsd` box as a visual sample entry
pub fn parse_visual_entry(mut stsd: Bytes) -> MediaResult<VisualSampleEntry> {
    read_full_box_header(&mut stsd, "stsd")?;
    let count = read_u32(&mut stsd, "stsd entry count")?;
    if count == 0 {
        return Err(invalid("stsd has no sample entries"));
    }

    let _entry_size = read_u32(&mut stsd, "sample entry")?;
    let format = read_fourcc(&mut stsd, "sample entry")?;
    // reserved(6) + data_reference_index(2) + pre_defined/reserved(16)
    skip(&mut stsd, 24, "visual sample entry")?;
    let width = read_u16(&mut stsd, "visual sample entry width")?;
    let height = read_u16(&mut stsd, "visual sample entry height")?;

    Ok(VisualSampleEntry {
        format,
        width,
        height,
    })
}

fn parse_stts(mut buf: Bytes) -> MediaResult<Vec<(u32, u32)>> {
    read_full_box_header(&mut buf, "stts")?;
    let count = read_u32(&mut buf, "stts entry count")?;
    check_table(&buf, count, 8, "stts")?;
    (0..count)
        .map(|_| Ok((read_u32(&mut buf, "stts")?, read_u32(&mut buf, "stts")?)))
        .collect()
}

fn parse_ctts(mut buf: Bytes) -> MediaResult<Vec<(u32, i32)>> {
    read_full_box_header(&mut buf, "ctts")?;
    let count = read_u32(&mut buf, "ctts entry count")?;
    check_table(&buf, count, 8, "ctts")?;
    // Offsets are read as signed for both box versions.
    (0..count)
        .map(|_| {
            let n = read_u32(&mut buf, "ctts")?;
            let raw = read_u32(&mut buf, "ctts")?;
            Ok((n, raw as i32))
        })
        .collect()
}

fn parse_stsc(mut buf: Bytes) -> MediaResult<Vec<ChunkRun>> {
    read_full_box_header(&mut buf, "stsc")?;
    let count = read_u32(&mut buf, "stsc entry count")?;
    check_table(&buf, count, 12, "stsc")?;
    (0..count)
        .map(|_| {
            let first_chunk = read_u32(&mut buf, "stsc")?;
            let samples_per_chunk = read_u32(&mut buf, "stsc")?;
            let _description_index = read_u32(&mut buf, "stsc")?;
            Ok(ChunkRun {
                first_chunk,
                samples_per_chunk,
            })
        })
        .collect()
}

/// `data_len` bounds a uniform-size table: its samples must fit in the file.
fn parse_stsz(mut buf: Bytes, data_len: u64) -> MediaResult<Vec<u32>> {
    read_full_box_header(&mut buf, "stsz")?;
    let uniform = read_u32(&mut buf, "stsz sample size")?;
    let count = read_u32(&mut buf, "stsz sample count")?;
    if uniform != 0 {
        if count as u64 * uniform as u64 > data_len {
            return Err(invalid(format!(
                "stsz lists {} samples of {} bytes in a {} byte file",
                count, uniform, data_len
            )));
        }
        return Ok(vec![uniform; count as usize]);
    }
    check_table(&buf, count, 4, "stsz")?;
    (0..count).map(|_| read_u32(&mut buf, "stsz")).collect()
}

fn parse_stco(mut buf: Bytes) -> MediaResult<Vec<u64>> {
    read_full_box_header(&mut buf, "stco")?;
    let count = read_u32(&mut buf, "stco entry count")?;
    check_table(&buf, count, 4, "stco")?;
    (0..count)
        .map(|_| read_u32(&mut buf, "stco").map(u64::from))
        .collect()
}

fn parse_co64(mut buf: Bytes) -> MediaResult<Vec<u64>> {
    read_full_box_header(&mut buf, "co64")?;
    let count = read_u32(&mut buf, "co64 entry count")?;
    check_table(&buf, count, 8, "co64")?;
    (0..count).map(|_| read_u64(&mut buf, "co64")).collect()
}

fn parse_stss(mut buf: Bytes) -> MediaResult<Vec<u32>> {
    read_full_box_header(&mut buf, "stss")?;
    let count = read_u32(&mut buf, "stss entry count")?;
    check_table(&buf, count, 4, "stss")?;
    (0..count).map(|_| read_u32(&mut buf, "stss")).collect()
}

/// Sample entry and flattened samples of one track
#[derive(Debug, Clone)]
pub struct SampleTable {
    pub entry: VisualSampleEntry,
    pub samples: Vec<SampleInfo>,
}

impl SampleTable {
    /// Parse an `stbl` payload of a file that is `data_len` bytes long
    ///
    /// Every sample must lie inside the file.
    pub fn parse(stbl: Bytes, data_len: u64) -> MediaResult<Self> {
        let children = child_boxes(stbl)?;
        let required = |kind: FourCc| {
            find_child(&children, kind)
                .ok_or_else(|| invalid(format!("stbl is missing {}", fourcc_str(&kind))))
        };

        let entry = parse_visual_entry(required(STSD)?)?;
        let durations = parse_stts(required(STTS)?)?;
        let chunk_runs = parse_stsc(required(STSC)?)?;
        let sizes = parse_stsz(required(STSZ)?, data_len)?;
        let chunk_offsets = match find_child(&children, STCO) {
            Some(stco) => parse_stco(stco)?,
            None => match find_child(&children, CO64) {
                Some(co64) => parse_co64(co64)?,
                None => return Err(invalid("stbl has neither stco nor co64")),
            },
        };
        let composition = find_child(&children, CTTS).map(parse_ctts).transpose()?;
        let sync = find_child(&children, STSS).map(parse_stss).transpose()?;

        let samples = flatten(
            &durations,
            composition.as_deref(),
            &chunk_runs,
            &sizes,
            &chunk_offsets,
            sync.as_deref(),
            data_len,
        )?;

        Ok(Self { entry, samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

fn flatten(
    durations: &[(u32, u32)],
    composition: Option<&[(u32, i32)]>,
    chunk_runs: &[ChunkRun],
    sizes: &[u32],
    chunk_offsets: &[u64],
    sync: Option<&[u32]>,
    data_len: u64,
) -> MediaResult<Vec<SampleInfo>> {
    let sample_count = sizes.len();

    let timed: u64 = durations.iter().map(|(n, _)| *n as u64).sum();
    if timed != sample_count as u64 {
        return Err(invalid(format!(
            "stts covers {} samples but stsz lists {}",
            timed, sample_count
        )));
    }

    let mut samples = Vec::with_capacity(sample_count);

    // Offsets: walk chunks, each run of stsc applies until the next run's first chunk.
    let mut sample_index = 0usize;
    for (run_index, run) in chunk_runs.iter().enumerate() {
        if run.first_chunk == 0 {
            return Err(invalid("stsc chunk numbers start at 1"));
        }
        let last_chunk = chunk_runs
            .get(run_index + 1)
            .map(|next| next.first_chunk.saturating_sub(1))
            .unwrap_or(chunk_offsets.len() as u32);

        for chunk in run.first_chunk..=last_chunk {
            let Some(&chunk_offset) = chunk_offsets.get(chunk as usize - 1) else {
                return Err(invalid(format!("stsc refers to missing chunk {}", chunk)));
            };
            let mut offset = chunk_offset;
            for _ in 0..run.samples_per_chunk {
                let Some(&size) = sizes.get(sample_index) else {
                    break;
                };
                let end = offset
                    .checked_add(size as u64)
                    .filter(|&end| end <= data_len)
                    .ok_or_else(|| {
                        invalid(format!(
                            "sample {} ({} bytes at offset {}) lies outside the file",
                            sample_index + 1,
                            size,
                            offset
                        ))
                    })?;
                samples.push(SampleInfo {
                    offset,
                    size,
                    decode_time: 0,
                    duration: 0,
                    composition_offset: 0,
                    is_sync: sync.is_none(),
                });
                offset = end;
                sample_index += 1;
            }
        }
    }

    if samples.len() != sample_count {
        return Err(invalid(format!(
            "chunk layout covers {} samples but stsz lists {}",
            samples.len(),
            sample_count
        )));
    }

    let mut decode_time = 0u64;
    let mut iter = samples.iter_mut();
    for &(count, delta) in durations {
        for sample in iter.by_ref().take(count as usize) {
            sample.decode_time = decode_time;
            sample.duration = delta;
            decode_time = decode_time
                .checked_add(delta as u64)
                .ok_or_else(|| invalid("stts decode time overflows"))?;
        }
    }

    if let Some(runs) = composition {
        let mut iter = samples.iter_mut();
        for &(count, offset) in runs {
            for sample in iter.by_ref().take(count as usize) {
                sample.composition_offset = offset;
            }
        }
    }

    if let Some(sync) = sync {
        for &number in sync {
            let sample = number
                .checked_sub(1)
                .and_then(|i| samples.get_mut(i as usize))
                .ok_or_else(|| invalid(format!("stss refers to missing sample {}", number)))?;
            sample.is_sync = true;
        }
    }

    Ok(samples)
}
