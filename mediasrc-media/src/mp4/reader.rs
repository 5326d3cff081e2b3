//! Sequential video sample reader for MP4 files

use super::boxes::{
    child_boxes, find_child, fourcc_str, invalid, read_full_box_header, read_fourcc, read_payload,
    read_u32, read_u64, scan_top_level, skip, FTYP, HDLR, MDHD, MDIA, MINF, MOOV, STBL, TKHD,
    TRAK, VIDE,
};
use super::sample_table::{SampleInfo, SampleTable};
use bytes::Bytes;
use mediasrc_core::{FrameRate, MediaError, MediaResult, MediaSample, MediaTime, VideoSubtype};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, info, warn};

/// Properties of the video track a reader serves
#[derive(Debug, Clone, PartialEq)]
pub struct VideoTrackInfo {
    pub track_id: u32,
    pub subtype: VideoSubtype,
    pub width: u32,
    pub height: u32,
    /// Media timescale of the track (ticks per second)
    pub timescale: u32,
    pub sample_count: usize,
    pub duration: MediaTime,
    /// Nominal frame rate derived from the sample durations
    pub frame_rate: FrameRate,
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn total_ticks(samples: &[SampleInfo]) -> u64 {
    samples
        .iter()
        .fold(0u64, |acc, s| acc.saturating_add(s.duration as u64))
}

/// Frame rate implied by the sample durations of a track
fn nominal_frame_rate(samples: &[SampleInfo], timescale: u32) -> FrameRate {
    let Some(first) = samples.first() else {
        return FrameRate::new(0, 1);
    };

    let constant = first.duration != 0 && samples.iter().all(|s| s.duration == first.duration);
    let (num, den) = if constant {
        (timescale as u64, first.duration as u64)
    } else {
        let total = total_ticks(samples);
        if total == 0 {
            return FrameRate::new(0, 1);
        }
        ((samples.len() as u64).saturating_mul(timescale as u64), total)
    };

    let divisor = gcd(num, den).max(1);
    let (num, den) = (num / divisor, den / divisor);
    match (u32::try_from(num), u32::try_from(den)) {
        (Ok(n), Ok(d)) => FrameRate::new(n, d),
        _ => FrameRate::new((num as f64 / den as f64).round() as u32, 1),
    }
}

struct ParsedTrack {
    track_id: u32,
    timescale: u32,
    table: SampleTable,
}

fn parse_track_id(mut tkhd: Bytes) -> MediaResult<u32> {
    let (version, _) = read_full_box_header(&mut tkhd, "tkhd")?;
    let times = if version == 1 { 16 } else { 8 };
    skip(&mut tkhd, times, "tkhd")?;
    read_u32(&mut tkhd, "tkhd track id")
}

fn parse_timescale(mut mdhd: Bytes) -> MediaResult<u32> {
    let (version, _) = read_full_box_header(&mut mdhd, "mdhd")?;
    let times = if version == 1 { 16 } else { 8 };
    skip(&mut mdhd, times, "mdhd")?;
    let timescale = read_u32(&mut mdhd, "mdhd timescale")?;
    // Duration follows; only its presence is checked.
    if version == 1 {
        read_u64(&mut mdhd, "mdhd duration")?;
    } else {
        read_u32(&mut mdhd, "mdhd duration")?;
    }
    if timescale == 0 {
        return Err(invalid("mdhd timescale is zero"));
    }
    Ok(timescale)
}

fn parse_handler(mut hdlr: Bytes) -> MediaResult<[u8; 4]> {
    read_full_box_header(&mut hdlr, "hdlr")?;
    skip(&mut hdlr, 4, "hdlr")?;
    read_fourcc(&mut hdlr, "hdlr handler type")
}

/// Parse a `trak` payload; `None` for anything other than a video track
fn parse_video_track(trak: Bytes, data_len: u64) -> MediaResult<Option<ParsedTrack>> {
    let children = child_boxes(trak)?;
    let missing = |what: &str| invalid(format!("trak is missing {}", what));

    let mdia = child_boxes(find_child(&children, MDIA).ok_or_else(|| missing("mdia"))?)?;
    let handler = parse_handler(find_child(&mdia, HDLR).ok_or_else(|| missing("hdlr"))?)?;
    if handler != VIDE {
        debug!(handler = %fourcc_str(&handler), "Skipping non-video track");
        return Ok(None);
    }

    let track_id = match find_child(&children, TKHD) {
        Some(tkhd) => parse_track_id(tkhd)?,
        None => 0,
    };
    let timescale = parse_timescale(find_child(&mdia, MDHD).ok_or_else(|| missing("mdhd"))?)?;
    let minf = child_boxes(find_child(&mdia, MINF).ok_or_else(|| missing("minf"))?)?;
    let stbl = find_child(&minf, STBL).ok_or_else(|| missing("stbl"))?;

    Ok(Some(ParsedTrack {
        track_id,
        timescale,
        table: SampleTable::parse(stbl, data_len)?,
    }))
}

/// Reads the samples of the first video track of an MP4 file in decode order
///
/// Presentation timestamps are decode time plus the composition offset,
/// clamped so they never decrease from one sample to the next.
pub struct Mp4SampleReader<R: Read + Seek = BufReader<File>> {
    reader: R,
    track: VideoTrackInfo,
    samples: Vec<SampleInfo>,
    next: usize,
    last_pts: Option<i64>,
}

impl Mp4SampleReader<BufReader<File>> {
    /// Open a file and locate its video track
    pub fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let reader = Self::from_reader(BufReader::new(file))?;
        info!(
            path = %path.display(),
            subtype = %reader.track.subtype,
            width = reader.track.width,
            height = reader.track.height,
            samples = reader.track.sample_count,
            "Opened MP4 video track"
        );
        Ok(reader)
    }

    /// Read only the video track properties of a file
    pub fn probe(path: impl AsRef<Path>) -> MediaResult<VideoTrackInfo> {
        let file = File::open(path.as_ref())?;
        Ok(Self::from_reader(BufReader::new(file))?.track)
    }
}

impl<R: Read + Seek> Mp4SampleReader<R> {
    /// Parse the container from any seekable byte source
    pub fn from_reader(mut reader: R) -> MediaResult<Self> {
        let data_len = reader.seek(SeekFrom::End(0))?;
        let top = scan_top_level(&mut reader)?;

        if top.first().map(|b| b.kind) != Some(FTYP) {
            return Err(invalid("file does not start with ftyp"));
        }
        let moov = top
            .iter()
            .find(|b| b.kind == MOOV)
            .ok_or_else(|| invalid("no moov box"))?;
        let moov = child_boxes(read_payload(&mut reader, moov)?)?;

        let mut parsed = None;
        for (kind, payload) in moov {
            if kind != TRAK {
                continue;
            }
            if let Some(track) = parse_video_track(payload, data_len)? {
                parsed = Some(track);
                break;
            }
        }
        let parsed = parsed.ok_or_else(|| MediaError::UnsupportedFormat {
            format: "MP4 without a video track".to_string(),
        })?;

        let samples = parsed.table.samples;
        let entry = parsed.table.entry;
        let ticks = total_ticks(&samples);

        let track = VideoTrackInfo {
            track_id: parsed.track_id,
            subtype: VideoSubtype::from_fourcc(entry.format),
            width: entry.width as u32,
            height: entry.height as u32,
            timescale: parsed.timescale,
            sample_count: samples.len(),
            duration: MediaTime::new(ticks as i64, parsed.timescale),
            frame_rate: nominal_frame_rate(&samples, parsed.timescale),
        };

        Ok(Self {
            reader,
            track,
            samples,
            next: 0,
            last_pts: None,
        })
    }

    pub fn track(&self) -> &VideoTrackInfo {
        &self.track
    }

    /// Samples not yet read
    pub fn remaining(&self) -> usize {
        self.samples.len() - self.next
    }

    /// Whether [`read_sample`](Self::read_sample) would return a sample
    ///
    /// Empty entries are skipped by reads, so they do not count.
    pub fn has_next_sample(&self) -> bool {
        self.samples[self.next..].iter().any(|s| s.size != 0)
    }

    /// Read the next sample; `None` once the track is exhausted
    pub fn read_sample(&mut self) -> MediaResult<Option<MediaSample>> {
        loop {
            let Some(info) = self.samples.get(self.next).copied() else {
                return Ok(None);
            };
            self.next += 1;

            if info.size == 0 {
                warn!(index = self.next - 1, "Skipping empty sample");
                continue;
            }

            let size = usize::try_from(info.size)
                .map_err(|_| invalid(format!("sample of {} bytes", info.size)))?;
            let mut data = vec![0u8; size];
            self.reader.seek(SeekFrom::Start(info.offset))?;
            self.reader.read_exact(&mut data)?;

            let mut pts = info.presentation_time();
            if let Some(last) = self.last_pts {
                if pts < last {
                    debug!(pts, last, "Clamping presentation time");
                    pts = last;
                }
            }
            self.last_pts = Some(pts);

            return Ok(Some(MediaSample {
                data: Bytes::from(data),
                timestamp: MediaTime::new(pts, self.track.timescale),
                duration: MediaTime::new(info.duration as i64, self.track.timescale),
                is_keyframe: info.is_sync,
            }));
        }
    }

    /// Rewind to the first sample
    pub fn rewind(&mut self) {
        self.next = 0;
        self.last_pts = None;
    }
}

impl<R: Read + Seek> std::fmt::Debug for Mp4SampleReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mp4SampleReader")
            .field("track", &self.track)
            .field("next", &self.next)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(duration: u32) -> SampleInfo {
        SampleInfo {
            offset: 0,
            size: 1,
            decode_time: 0,
            duration,
            composition_offset: 0,
            is_sync: true,
        }
    }

    #[test]
    fn test_constant_frame_rate() {
        let samples = vec![info(512); 10];
        assert_eq!(nominal_frame_rate(&samples, 15360), FrameRate::new(30, 1));
        let samples = vec![info(1001); 10];
        assert_eq!(nominal_frame_rate(&samples, 30000), FrameRate::new(30000, 1001));
    }

    #[test]
    fn test_variable_frame_rate_averages() {
        let samples = vec![info(1), info(3)];
        assert_eq!(nominal_frame_rate(&samples, 4), FrameRate::new(2, 1));
        assert!(!nominal_frame_rate(&[], 90000).is_valid());
    }
}
