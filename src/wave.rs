//! WAVE descriptor model and RIFF header parser/validator.
//!
//! A [`WaveDescriptor`] is built either by walking the RIFF chunks of a real
//! stream or as a zero-valued synthetic descriptor for generated output.
//! Derived sizes and the problem set are always recomputed from the header
//! fields by [`WaveDescriptor::recompute`].

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, warn};
use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::fileio::{read_n, skip_n};
use crate::length::length_to_str;
use crate::stream::StreamOpener;

pub const CD_BLOCK_SIZE: u64 = 2352;
pub const CD_BLOCKS_PER_SEC: u64 = 75;
pub const CD_CHANNELS: u16 = 2;
pub const CD_SAMPLES_PER_SEC: u32 = 44100;
pub const CD_BITS_PER_SAMPLE: u16 = 16;
pub const CD_BLOCK_ALIGN: u16 = 4;
pub const CD_RATE: u64 = 176_400;
pub const CD_MIN_BURNABLE_SIZE: u64 = 705_600;

pub const CANONICAL_HEADER_SIZE: u64 = 44;
pub const WAVE_FORMAT_PCM: u16 = 0x0001;

const TAG_RIFF: &[u8; 4] = b"RIFF";
const TAG_WAVE: &[u8; 4] = b"WAVE";
const TAG_FMT: &[u8; 4] = b"fmt ";
const TAG_DATA: &[u8; 4] = b"data";
const TAG_AIFF_FORM: &[u8; 4] = b"FORM";

/// One thing that can be wrong with (or notable about) a WAVE file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Problem {
    NotCdQuality,
    CdButBadBound,
    CdButTooShort,
    HeaderNotCanonical,
    ExtraChunks,
    HeaderInconsistent,
    MayBeTruncated,
    JunkAppended,
    DataNotAligned,
}

impl Problem {
    pub const ALL: [Problem; 9] = [
        Problem::NotCdQuality,
        Problem::CdButBadBound,
        Problem::CdButTooShort,
        Problem::HeaderNotCanonical,
        Problem::ExtraChunks,
        Problem::HeaderInconsistent,
        Problem::MayBeTruncated,
        Problem::JunkAppended,
        Problem::DataNotAligned,
    ];

    /// Bit position used in legacy reports.
    pub fn bit(self) -> u16 {
        match self {
            Problem::NotCdQuality => 0x0001,
            Problem::CdButBadBound => 0x0002,
            Problem::CdButTooShort => 0x0004,
            Problem::HeaderNotCanonical => 0x0008,
            Problem::ExtraChunks => 0x0010,
            Problem::HeaderInconsistent => 0x0020,
            Problem::MayBeTruncated => 0x0040,
            Problem::JunkAppended => 0x0080,
            Problem::DataNotAligned => 0x0100,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Problem::NotCdQuality => "not CD-quality",
            Problem::CdButBadBound => "not cut on a sector boundary",
            Problem::CdButTooShort => "too short to be burned",
            Problem::HeaderNotCanonical => "non-canonical header",
            Problem::ExtraChunks => "extra RIFF chunks",
            Problem::HeaderInconsistent => "inconsistent header",
            Problem::MayBeTruncated => "possibly truncated",
            Problem::JunkAppended => "junk appended",
            Problem::DataNotAligned => "data not block-aligned",
        }
    }
}

/// Set of [`Problem`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Problems(u16);

impl Problems {
    pub fn empty() -> Self {
        Problems(0)
    }

    pub fn contains(&self, problem: Problem) -> bool {
        self.0 & problem.bit() != 0
    }

    fn insert(&mut self, problem: Problem) {
        self.0 |= problem.bit();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = Problem> + '_ {
        Problem::ALL.iter().copied().filter(move |p| self.contains(*p))
    }
}

impl fmt::Display for Problems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|p| p.describe()).collect();
        write!(f, "{}", names.join(", "))
    }
}

/// Human-readable name of a WAVE format code.
pub fn format_to_str(format_code: u16) -> &'static str {
    match format_code {
        0x0000 => "Microsoft Official Unknown",
        0x0001 => "Microsoft PCM",
        0x0002 => "Microsoft ADPCM",
        0x0003 => "IEEE Float",
        0x0006 => "Microsoft A-law",
        0x0007 => "Microsoft U-law",
        0x0010 => "OKI ADPCM format",
        0x0011 => "IMA ADPCM",
        0x0015 => "Digistd format",
        0x0016 => "Digifix format",
        0x0030 => "Dolby AC2",
        0x0031 => "GSM 6.10",
        0x003b => "Rockwell ADPCM",
        0x003c => "Rockwell DIGITALK",
        0x0040 => "G.721 ADPCM",
        0x0041 => "G.728 CELP",
        0x0050 => "MPEG",
        0x0055 => "MPEG Layer 3",
        0x0064 => "G.726 ADPCM",
        0x0065 => "G.722 ADPCM",
        _ => "Unknown",
    }
}

/// Everything known about one WAVE stream.
#[derive(Debug, Clone, Default)]
pub struct WaveDescriptor {
    pub path: PathBuf,

    pub header_size: u64,
    pub data_size: u64,
    pub padded_data_size: u64,
    pub total_size: u64,
    pub chunk_size: u64,
    /// On-disk size, when the input is a plain file
    pub actual_size: Option<u64>,

    pub format_code: u16,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub samples_per_sec: u32,
    pub avg_bytes_per_sec: u32,
    pub block_align: u16,

    pub rate: u64,
    pub length: u64,
    pub exact_length: f64,
    pub extra_riff_size: i64,

    /// Bytes of leading ID3v2 tag skipped before the RIFF header
    pub tag_size: u64,

    // planner/splitter scratch
    pub new_data_size: i64,
    pub beginning_byte: i64,
    pub new_beginning_byte: i64,

    problems: Problems,
}

fn read_tag(input: &mut dyn Read) -> io::Result<[u8; 4]> {
    let mut tag = [0u8; 4];
    input.read_exact(&mut tag)?;
    Ok(tag)
}

fn tag_str(tag: &[u8; 4]) -> String {
    tag.iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
        .collect()
}

impl WaveDescriptor {
    /// Zero-valued descriptor for generated, joined or split output.
    pub fn synthetic<P: AsRef<Path>>(path: P) -> Self {
        WaveDescriptor {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Synthetic descriptor carrying the audio format of `template`,
    /// a canonical header and `data_size` bytes of PCM.
    pub fn with_format_of<P: AsRef<Path>>(path: P, template: &WaveDescriptor, data_size: u64) -> Self {
        let mut desc = WaveDescriptor::synthetic(path);
        desc.copy_format(template);
        desc.set_canonical_sizes(data_size);
        desc
    }

    /// Synthetic CD-quality descriptor.
    pub fn cd_quality<P: AsRef<Path>>(path: P, data_size: u64) -> Self {
        let mut desc = WaveDescriptor::synthetic(path);
        desc.format_code = WAVE_FORMAT_PCM;
        desc.channels = CD_CHANNELS;
        desc.samples_per_sec = CD_SAMPLES_PER_SEC;
        desc.avg_bytes_per_sec = CD_RATE as u32;
        desc.block_align = CD_BLOCK_ALIGN;
        desc.bits_per_sample = CD_BITS_PER_SAMPLE;
        desc.set_canonical_sizes(data_size);
        desc
    }

    pub fn copy_format(&mut self, other: &WaveDescriptor) {
        self.format_code = other.format_code;
        self.channels = other.channels;
        self.samples_per_sec = other.samples_per_sec;
        self.avg_bytes_per_sec = other.avg_bytes_per_sec;
        self.block_align = other.block_align;
        self.bits_per_sample = other.bits_per_sample;
    }

    /// Size fields for a canonical header around `data_size` bytes,
    /// counting the NULL pad byte an odd data chunk needs.
    pub fn set_canonical_sizes(&mut self, data_size: u64) {
        self.header_size = CANONICAL_HEADER_SIZE;
        self.data_size = data_size;
        self.chunk_size = data_size + CANONICAL_HEADER_SIZE - 8 + (data_size & 1);
        self.recompute();
    }

    pub fn name(&self) -> String {
        self.path.display().to_string()
    }

    /// Walk the RIFF header of `input`, leaving it positioned at the first
    /// byte of PCM data.
    pub fn parse(input: &mut dyn Read, path: &Path) -> Result<Self> {
        let name = path.display().to_string();
        let eof = |what: &str| Error::validation(name.as_str(), format!("reached end of file {}", what));

        let tag = read_tag(input).map_err(|_| eof("while reading RIFF tag"))?;
        if &tag == TAG_AIFF_FORM {
            return Err(Error::validation(name.as_str(), "encountered unsupported AIFF data"));
        }
        if &tag != TAG_RIFF {
            return Err(Error::validation(name.as_str(), "WAVE header is missing RIFF tag"));
        }

        let chunk_size = input
            .read_u32::<LittleEndian>()
            .map_err(|_| eof("while reading chunk size"))?;

        let tag = read_tag(input).map_err(|_| eof("while reading WAVE tag"))?;
        if &tag != TAG_WAVE {
            return Err(Error::validation(name.as_str(), "WAVE header is missing WAVE tag"));
        }

        let mut header_len: u64 = 12;

        let fmt_len = loop {
            let (tag, len) = Self::read_chunk_head(input).map_err(|_| eof("while looking for fmt tag"))?;
            header_len += 8;
            if &tag == TAG_FMT {
                break len;
            }
            Self::skip_chunk(input, len).map_err(|_| eof("while skipping to fmt tag"))?;
            header_len += len;
        };

        if fmt_len < 16 {
            return Err(Error::validation(name.as_str(), "fmt chunk in WAVE header was too short"));
        }

        let format_code = input
            .read_u16::<LittleEndian>()
            .map_err(|_| eof("while reading format"))?;
        if format_code != WAVE_FORMAT_PCM {
            return Err(Error::validation(
                name.as_str(),
                format!("unsupported format 0x{:04x} ({})", format_code, format_to_str(format_code)),
            ));
        }

        let channels = input.read_u16::<LittleEndian>().map_err(|_| eof("while reading channels"))?;
        let samples_per_sec = input
            .read_u32::<LittleEndian>()
            .map_err(|_| eof("while reading samples/sec"))?;
        let avg_bytes_per_sec = input
            .read_u32::<LittleEndian>()
            .map_err(|_| eof("while reading average bytes/sec"))?;
        let block_align = input.read_u16::<LittleEndian>().map_err(|_| eof("while reading block align"))?;
        let bits_per_sample = input
            .read_u16::<LittleEndian>()
            .map_err(|_| eof("while reading bits/sample"))?;
        header_len += 16;

        let fmt_extra = fmt_len - 16;
        if fmt_extra > 0 {
            Self::skip_chunk(input, fmt_extra).map_err(|_| eof("while skipping extra fmt bytes"))?;
            header_len += fmt_extra;
        }

        let data_size = loop {
            let (tag, len) = Self::read_chunk_head(input).map_err(|_| eof("while looking for data tag"))?;
            header_len += 8;
            if &tag == TAG_DATA {
                break len;
            }
            Self::skip_chunk(input, len).map_err(|_| eof("while skipping to data tag"))?;
            header_len += len;
        };

        let rate = samples_per_sec as u64 * channels as u64 * bits_per_sample as u64 / 8;
        if rate == 0 {
            return Err(Error::validation(name.as_str(), "WAVE header describes a zero byte rate"));
        }

        let mut desc = WaveDescriptor {
            path: path.to_path_buf(),
            header_size: header_len,
            data_size,
            chunk_size: chunk_size as u64,
            format_code,
            channels,
            bits_per_sample,
            samples_per_sec,
            avg_bytes_per_sec,
            block_align,
            ..Default::default()
        };
        desc.recompute();
        Ok(desc)
    }

    fn read_chunk_head(input: &mut dyn Read) -> io::Result<([u8; 4], u64)> {
        let tag = read_tag(input)?;
        let len = input.read_u32::<LittleEndian>()? as u64;
        debug!("found chunk: [{}] with length: {}", tag_str(&tag), len);
        Ok((tag, len))
    }

    fn skip_chunk(input: &mut dyn Read, len: u64) -> io::Result<()> {
        if skip_n(input, len, None) != len {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short chunk"));
        }
        Ok(())
    }

    /// Open `path` through `opener`, parse its header, apply the opener's
    /// header kluge and record on-disk size and tag size.
    pub fn open(opener: &dyn StreamOpener, path: &Path) -> Result<Self> {
        let mut stream = opener.open_input(path)?;
        let mut desc = Self::parse(&mut stream.reader, path)?;
        desc.tag_size = stream.tag_size;
        desc.actual_size = stream.actual_size;
        opener.header_kluge(&mut desc)?;
        desc.recompute();
        Ok(desc)
    }

    /// Re-derive sizes, lengths and the problem set from the header fields.
    pub fn recompute(&mut self) {
        self.rate = self.samples_per_sec as u64 * self.channels as u64 * self.bits_per_sample as u64 / 8;
        self.total_size = self.chunk_size + 8;
        self.padded_data_size = self.data_size + (self.data_size & 1);
        self.extra_riff_size =
            self.total_size as i64 - (self.padded_data_size as i64 + self.header_size as i64);

        if self.rate > 0 {
            self.length = self.data_size / self.rate;
            self.exact_length = self.data_size as f64 / self.rate as f64;
        } else {
            self.length = 0;
            self.exact_length = 0.0;
        }

        self.problems = self.derive_problems();
    }

    fn derive_problems(&self) -> Problems {
        let mut problems = Problems::empty();

        let cd_quality = self.channels == CD_CHANNELS
            && self.bits_per_sample == CD_BITS_PER_SAMPLE
            && self.samples_per_sec == CD_SAMPLES_PER_SEC
            && self.avg_bytes_per_sec as u64 == CD_RATE
            && self.rate == CD_RATE;

        if cd_quality {
            if self.data_size < CD_MIN_BURNABLE_SIZE {
                problems.insert(Problem::CdButTooShort);
            }
            if self.data_size % CD_BLOCK_SIZE != 0 {
                problems.insert(Problem::CdButBadBound);
            }
        } else {
            problems.insert(Problem::NotCdQuality);
        }

        if self.header_size != CANONICAL_HEADER_SIZE {
            problems.insert(Problem::HeaderNotCanonical);
        }

        if self.data_size as i64 > self.total_size as i64 - self.header_size as i64 {
            problems.insert(Problem::HeaderInconsistent);
        }

        if self.block_align == 0 || self.data_size % self.block_align as u64 != 0 {
            problems.insert(Problem::DataNotAligned);
        }

        if let Some(actual) = self.actual_size {
            let on_disk = actual as i64 - self.tag_size as i64;
            if (self.total_size as i64) < on_disk {
                problems.insert(Problem::JunkAppended);
            }
            if (self.total_size as i64) > on_disk {
                problems.insert(Problem::MayBeTruncated);
            }
        }

        if self.extra_riff_size > 0 {
            problems.insert(Problem::ExtraChunks);
        }

        problems
    }

    pub fn problems(&self) -> Problems {
        self.problems
    }

    pub fn has(&self, problem: Problem) -> bool {
        self.problems.contains(problem)
    }

    pub fn is_cd_quality(&self) -> bool {
        !self.has(Problem::NotCdQuality)
    }

    pub fn is_odd_sized(&self) -> bool {
        self.data_size & 1 == 1
    }

    pub fn sample_size(&self) -> u64 {
        self.bits_per_sample as u64 * self.channels as u64 / 8
    }

    pub fn length_str(&self, show_hmmss: bool) -> String {
        length_to_str(self, show_hmmss)
    }

    /// Whether the audio format matches `other` closely enough to share a stream.
    /// Block align is deliberately not compared.
    pub fn check_same_format(&self, other: &WaveDescriptor, among: &str) -> Result<()> {
        if self.format_code != other.format_code {
            return Err(Error::consistency(format!("WAVE format differs {}", among)));
        }
        if self.channels != other.channels {
            return Err(Error::consistency(format!("number of channels differs {}", among)));
        }
        if self.samples_per_sec != other.samples_per_sec {
            return Err(Error::consistency(format!("samples per second differs {}", among)));
        }
        if self.avg_bytes_per_sec != other.avg_bytes_per_sec {
            return Err(Error::consistency(format!("average bytes per second differs {}", among)));
        }
        if self.bits_per_sample != other.bits_per_sample {
            return Err(Error::consistency(format!("bits per sample differs {}", among)));
        }
        Ok(())
    }
}

/// Require every file to share the format of the first. A block-align
/// mismatch is reported once and tolerated.
pub fn check_compatible(files: &[WaveDescriptor]) -> Result<()> {
    let Some(first) = files.first() else {
        return Ok(());
    };
    let mut ba_warned = false;
    for f in &files[1..] {
        first.check_same_format(f, "among these files")?;
        if f.block_align != first.block_align && !ba_warned {
            warn!("block align differs among these files");
            ba_warned = true;
        }
    }
    Ok(())
}

/// Whether an odd-sized data chunk is followed by the RIFF NULL pad byte.
///
/// Decided from `extra_riff_size` when possible; with extra chunks present
/// the byte after the data is read from a fresh stream.
pub fn odd_sized_data_chunk_is_null_padded(opener: &dyn StreamOpener, desc: &WaveDescriptor) -> Result<bool> {
    if !desc.is_odd_sized() {
        return Ok(true);
    }
    match desc.extra_riff_size {
        -1 => return Ok(false),
        0 => return Ok(true),
        n if n < 0 => return Ok(false),
        _ => {}
    }

    let mut stream = opener.open_input(&desc.path)?;
    let skip = desc.header_size + desc.data_size;
    let skipped = skip_n(&mut stream.reader, skip, None);
    if skipped != skip {
        return Err(Error::short(
            format!("scanning for NULL pad byte in [{}]", desc.name()),
            skip,
            skipped,
        ));
    }
    let mut pad = [0u8; 1];
    if read_n(&mut stream.reader, &mut pad, None) != 1 {
        return Err(Error::short(format!("reading NULL pad byte of [{}]", desc.name()), 1, 0));
    }
    Ok(pad[0] == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::make_canonical_header;
    use crate::stream::FileOpener;
    use byteorder::WriteBytesExt;
    use std::io::{Cursor, Write};

    fn cd(data_size: u64) -> WaveDescriptor {
        WaveDescriptor::cd_quality("test.wav", data_size)
    }

    /// Header with a LIST chunk before fmt and an extended fmt chunk.
    fn odd_header(data_size: u32, fmt_extra: u16) -> Vec<u8> {
        let mut h = Vec::new();
        h.extend_from_slice(b"RIFF");
        h.write_u32::<LittleEndian>(0).unwrap();
        h.extend_from_slice(b"WAVE");
        h.extend_from_slice(b"LIST");
        h.write_u32::<LittleEndian>(4).unwrap();
        h.extend_from_slice(b"INFO");
        h.extend_from_slice(b"fmt ");
        h.write_u32::<LittleEndian>(16 + fmt_extra as u32).unwrap();
        h.write_u16::<LittleEndian>(1).unwrap();
        h.write_u16::<LittleEndian>(2).unwrap();
        h.write_u32::<LittleEndian>(44100).unwrap();
        h.write_u32::<LittleEndian>(176400).unwrap();
        h.write_u16::<LittleEndian>(4).unwrap();
        h.write_u16::<LittleEndian>(16).unwrap();
        h.extend(std::iter::repeat(0u8).take(fmt_extra as usize));
        h.extend_from_slice(b"data");
        h.write_u32::<LittleEndian>(data_size).unwrap();
        let chunk = (h.len() as u32 - 8) + data_size;
        (&mut h[4..8]).write_u32::<LittleEndian>(chunk).unwrap();
        h
    }

    #[test]
    fn test_cd_quality_rate() {
        let desc = cd(2352 * 400);
        assert_eq!(desc.rate, 176400);
        assert!(desc.is_cd_quality());
        assert!(desc.problems().is_empty());
    }

    #[test]
    fn test_misaligned_odd_flags() {
        let desc = cd(2352 * 100 + 1);
        assert!(desc.has(Problem::CdButBadBound));
        assert!(desc.has(Problem::CdButTooShort));
        assert!(desc.is_odd_sized());
        assert_eq!(desc.padded_data_size, 2352 * 100 + 2);
        assert_eq!(desc.total_size, desc.chunk_size + 8);
    }

    #[test]
    fn test_not_cd_quality() {
        let mut desc = cd(1000);
        desc.samples_per_sec = 48000;
        desc.avg_bytes_per_sec = 192000;
        desc.recompute();
        assert!(desc.has(Problem::NotCdQuality));
        assert!(!desc.has(Problem::CdButBadBound));
    }

    #[test]
    fn test_parse_canonical_round_trip() {
        let desc = cd(2352 * 300 + 8);
        let mut bytes = make_canonical_header(&desc).to_vec();
        bytes.extend(vec![0u8; desc.data_size as usize]);

        let parsed = WaveDescriptor::parse(&mut Cursor::new(bytes), Path::new("test.wav")).unwrap();

        assert_eq!(parsed.header_size, 44);
        assert_eq!(parsed.data_size, desc.data_size);
        assert_eq!(parsed.chunk_size, desc.chunk_size);
        assert_eq!(parsed.channels, 2);
        assert_eq!(parsed.samples_per_sec, 44100);
        assert_eq!(parsed.block_align, 4);
        assert_eq!(parsed.problems(), desc.problems());
    }

    #[test]
    fn test_parse_round_trip_mono_odd_sized() {
        let mut template = WaveDescriptor::synthetic("");
        template.format_code = 1;
        template.channels = 1;
        template.samples_per_sec = 22050;
        template.avg_bytes_per_sec = 22050;
        template.block_align = 1;
        template.bits_per_sample = 8;
        let desc = WaveDescriptor::with_format_of("mono.wav", &template, 1001);

        let mut bytes = make_canonical_header(&desc).to_vec();
        bytes.extend(vec![0x80u8; 1001]);
        bytes.push(0);

        let parsed = WaveDescriptor::parse(&mut Cursor::new(bytes), Path::new("mono.wav")).unwrap();

        assert_eq!(parsed.header_size, desc.header_size);
        assert_eq!(parsed.data_size, 1001);
        assert_eq!(parsed.chunk_size, desc.chunk_size);
        assert_eq!(parsed.total_size, desc.total_size);
        assert_eq!(parsed.padded_data_size, 1002);
        assert_eq!(parsed.extra_riff_size, 0);
        assert_eq!(parsed.format_code, 1);
        assert_eq!(parsed.channels, 1);
        assert_eq!(parsed.samples_per_sec, 22050);
        assert_eq!(parsed.avg_bytes_per_sec, 22050);
        assert_eq!(parsed.block_align, 1);
        assert_eq!(parsed.bits_per_sample, 8);
        assert_eq!(parsed.rate, 22050);
        assert!(parsed.is_odd_sized());
        assert!(parsed.has(Problem::NotCdQuality));
        assert_eq!(parsed.problems(), desc.problems());
    }

    #[test]
    fn test_parse_skips_chunks_and_fmt_extra() {
        let mut bytes = odd_header(2352, 2);
        let header_len = bytes.len() as u64;
        bytes.extend(vec![1u8; 2352]);

        let mut cursor = Cursor::new(bytes);
        let parsed = WaveDescriptor::parse(&mut cursor, Path::new("list.wav")).unwrap();

        assert_eq!(parsed.header_size, header_len);
        assert_eq!(parsed.header_size, 12 + 12 + 8 + 18 + 8);
        assert!(parsed.has(Problem::HeaderNotCanonical));
        assert!(!parsed.has(Problem::ExtraChunks));
        assert_eq!(cursor.position(), header_len);
    }

    #[test]
    fn test_parse_rejects_non_pcm() {
        let desc = cd(16);
        let mut bytes = make_canonical_header(&desc).to_vec();
        bytes[20] = 0x55;
        let err = WaveDescriptor::parse(&mut Cursor::new(bytes), Path::new("song.wav")).unwrap_err();
        assert!(err.to_string().contains("MPEG Layer 3"));
        assert!(err.to_string().contains("song.wav"));
    }

    #[test]
    fn test_parse_rejects_aiff_and_truncation() {
        let err = WaveDescriptor::parse(&mut Cursor::new(b"FORM\0\0\0\0AIFF".to_vec()), Path::new("a.aif"))
            .unwrap_err();
        assert!(err.to_string().contains("AIFF"));

        let desc = cd(16);
        let bytes = make_canonical_header(&desc)[..30].to_vec();
        let err = WaveDescriptor::parse(&mut Cursor::new(bytes), Path::new("cut.wav")).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_inconsistent_header() {
        let mut desc = cd(5000);
        desc.chunk_size = 1000;
        desc.recompute();
        assert!(desc.has(Problem::HeaderInconsistent));
    }

    #[test]
    fn test_open_detects_truncation_and_junk() {
        let dir = tempfile::tempdir().unwrap();
        let desc = cd(2352);
        let header = make_canonical_header(&desc);

        let short = dir.path().join("short.wav");
        let mut f = std::fs::File::create(&short).unwrap();
        f.write_all(&header).unwrap();
        f.write_all(&[0u8; 100]).unwrap();
        drop(f);

        let junk = dir.path().join("junk.wav");
        let mut f = std::fs::File::create(&junk).unwrap();
        f.write_all(&header).unwrap();
        f.write_all(&[0u8; 2352 + 7]).unwrap();
        drop(f);

        let opener = FileOpener::default();
        let a = WaveDescriptor::open(&opener, &short).unwrap();
        assert!(a.has(Problem::MayBeTruncated));
        let b = WaveDescriptor::open(&opener, &junk).unwrap();
        assert!(b.has(Problem::JunkAppended));
        assert_eq!(b.actual_size, Some(44 + 2352 + 7));
    }

    #[test]
    fn test_null_pad_detection() {
        let dir = tempfile::tempdir().unwrap();
        let opener = FileOpener::default();

        let mut desc = cd(11);
        assert_eq!(desc.extra_riff_size, 0);
        assert!(odd_sized_data_chunk_is_null_padded(&opener, &desc).unwrap());

        desc.chunk_size -= 1;
        desc.recompute();
        assert_eq!(desc.extra_riff_size, -1);
        assert!(!odd_sized_data_chunk_is_null_padded(&opener, &desc).unwrap());

        // odd data, pad byte present, then an 8-byte extra chunk
        let path = dir.path().join("extra.wav");
        let mut desc = cd(11);
        desc.chunk_size += 8;
        let mut bytes = make_canonical_header(&desc).to_vec();
        bytes.extend(vec![3u8; 11]);
        bytes.push(0);
        bytes.extend_from_slice(b"junk\0\0\0\0");
        std::fs::write(&path, &bytes).unwrap();

        let desc = WaveDescriptor::open(&opener, &path).unwrap();
        assert!(desc.has(Problem::ExtraChunks));
        assert!(odd_sized_data_chunk_is_null_padded(&opener, &desc).unwrap());
    }

    #[test]
    fn test_format_names() {
        assert_eq!(format_to_str(0x0001), "Microsoft PCM");
        assert_eq!(format_to_str(0x0003), "IEEE Float");
        assert_eq!(format_to_str(0x1234), "Unknown");
    }
}
