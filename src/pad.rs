//! Zero-padding CD-quality files out to a sector boundary.

use log::info;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::fileio::{read_n, transfer_n, write_padding, Progress};
use crate::header::{put_chunk_size, put_data_size};
use crate::stream::{files_are_identical, open_with_header, OutputNaming, PendingOutput, StreamOpener};
use crate::wave::{odd_sized_data_chunk_is_null_padded, Problem, WaveDescriptor, CD_BLOCK_SIZE};

/// Where padding zero bytes go relative to the audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PadMode {
    Prepad,
    #[default]
    Postpad,
    Nopad,
}

impl PadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PadMode::Prepad => "prepad",
            PadMode::Postpad => "postpad",
            PadMode::Nopad => "nopad",
        }
    }
}

impl FromStr for PadMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "prepad" => Ok(PadMode::Prepad),
            "postpad" => Ok(PadMode::Postpad),
            "nopad" => Ok(PadMode::Nopad),
            other => Err(Error::user_input(format!("invalid pad type: [{}]", other))),
        }
    }
}

/// Zero bytes needed to bring `data_size` up to the next sector boundary.
pub fn sector_pad_bytes(data_size: u64) -> u64 {
    match data_size % CD_BLOCK_SIZE {
        0 => 0,
        rem => CD_BLOCK_SIZE - rem,
    }
}

/// Write a sector-aligned copy of `desc`, keeping its original header
/// bytes and any trailing chunks.
///
/// # Arguments
/// * `opener` - Source of input and output streams
/// * `desc` - Parsed descriptor of the file to pad
/// * `mode` - `Prepad` or `Postpad`
/// * `naming` - Output naming rules; the default postfix is `-padded`
///
/// # Returns
/// Path of the padded file
pub fn pad_file(
    opener: &dyn StreamOpener,
    desc: &WaveDescriptor,
    mode: PadMode,
    naming: &OutputNaming,
) -> Result<PathBuf> {
    if mode == PadMode::Nopad {
        return Err(Error::user_input("pad mode needs either prepad or postpad"));
    }
    if desc.has(Problem::NotCdQuality) {
        return Err(Error::skipped(desc.name(), "file is not CD-quality"));
    }
    if !desc.has(Problem::CdButBadBound) {
        return Err(Error::skipped(desc.name(), "file is already sector-aligned"));
    }

    let outfile = naming.derived(&desc.path, "-padded");
    if files_are_identical(&desc.path, &outfile) {
        return Err(Error::skipped(desc.name(), "output file would overwrite input file"));
    }

    let pad_bytes = sector_pad_bytes(desc.data_size);
    let has_null_pad = odd_sized_data_chunk_is_null_padded(opener, desc)?;

    let (mut header, mut input) = open_with_header(opener, desc)?;
    let header_size = desc.header_size;

    put_data_size(&mut header, header_size as usize, desc.data_size + pad_bytes);

    let mut extra = desc.extra_riff_size;
    if desc.has(Problem::ExtraChunks) {
        if !has_null_pad {
            extra += 1;
        }
        put_chunk_size(
            &mut header,
            (header_size + desc.data_size + pad_bytes) + extra as u64 - 8,
        );
    } else {
        put_chunk_size(&mut header, header_size + desc.data_size + pad_bytes - 8);
    }

    let mut progress = Progress::new(desc.total_size + pad_bytes);
    let mut out = PendingOutput::create(opener, &outfile)?;

    out.writer()
        .write_all(&header)
        .map_err(|e| Error::io(format!("error while writing {}-byte WAVE header", header_size), e))?;
    progress.add(header_size);

    if mode == PadMode::Prepad && write_padding(out.writer(), pad_bytes, Some(&mut progress)) != pad_bytes {
        return Err(Error::short("pre-padding with zero-bytes", pad_bytes, 0));
    }

    let moved = transfer_n(&mut input, out.writer(), desc.data_size, Some(&mut progress));
    if moved != desc.data_size {
        return Err(Error::short(
            format!("transferring data chunk of [{}]", desc.name()),
            desc.data_size,
            moved,
        ));
    }

    if mode == PadMode::Postpad && write_padding(out.writer(), pad_bytes, Some(&mut progress)) != pad_bytes {
        return Err(Error::short("post-padding with zero-bytes", pad_bytes, 0));
    }

    if desc.is_odd_sized() && has_null_pad {
        let mut nullpad = [0u8; 1];
        if read_n(&mut input, &mut nullpad, None) != 1 {
            return Err(Error::short("discarding NULL pad byte", 1, 0));
        }
    }

    if extra > 0 {
        let extra = extra as u64;
        let moved = transfer_n(&mut input, out.writer(), extra, Some(&mut progress));
        if moved != extra {
            return Err(Error::short("transferring extra RIFF chunks", extra, moved));
        }
    }

    out.commit()?;
    progress.success();
    info!(
        "{}-padded [{}] with {} zero-bytes --> [{}]",
        if mode == PadMode::Prepad { "Pre" } else { "Post" },
        desc.name(),
        pad_bytes,
        outfile.display()
    );
    Ok(outfile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::make_canonical_header;
    use crate::stream::FileOpener;
    use crate::testutil::{read_payload, write_wave};

    fn naming(dir: &std::path::Path) -> OutputNaming {
        OutputNaming {
            dir: Some(dir.join("out")),
            ..Default::default()
        }
    }

    #[test]
    fn test_sector_pad_bytes() {
        for size in [1u64, 2351, 2352, 2353, 7000, 2352 * 40 + 17] {
            let pad = sector_pad_bytes(size);
            assert!(pad < CD_BLOCK_SIZE);
            assert_eq!((size + pad) % CD_BLOCK_SIZE, 0);
        }
        assert_eq!(sector_pad_bytes(2352), 0);
        assert_eq!(sector_pad_bytes(2353), 2351);
    }

    #[test]
    fn test_postpad_odd_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("out")).unwrap();
        let data: Vec<u8> = (0..3001u32).map(|i| (i % 200) as u8 + 1).collect();
        let path = write_wave(dir.path(), "odd.wav", &data);

        let opener = FileOpener::default();
        let desc = WaveDescriptor::open(&opener, &path).unwrap();
        let out = pad_file(&opener, &desc, PadMode::Postpad, &naming(dir.path())).unwrap();
        assert!(out.ends_with("odd-padded.wav"));

        let padded = WaveDescriptor::open(&opener, &out).unwrap();
        assert_eq!(padded.data_size, 2352 * 2);
        assert!(!padded.has(Problem::CdButBadBound));
        assert!(!padded.has(Problem::MayBeTruncated));
        assert!(!padded.has(Problem::JunkAppended));

        let payload = read_payload(&out);
        assert_eq!(&payload[..3001], &data[..]);
        assert!(payload[3001..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_prepad_keeps_extra_chunks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("out")).unwrap();
        let path = dir.path().join("extra.wav");

        let data = vec![9u8; 2000];
        let mut desc = WaveDescriptor::cd_quality("extra.wav", 2000);
        desc.chunk_size += 12;
        let mut bytes = make_canonical_header(&desc).to_vec();
        bytes.extend_from_slice(&data);
        bytes.extend_from_slice(b"note\x04\0\0\0abcd");
        std::fs::write(&path, &bytes).unwrap();

        let opener = FileOpener::default();
        let desc = WaveDescriptor::open(&opener, &path).unwrap();
        assert!(desc.has(Problem::ExtraChunks));
        let out = pad_file(&opener, &desc, PadMode::Prepad, &naming(dir.path())).unwrap();

        let padded = WaveDescriptor::open(&opener, &out).unwrap();
        assert_eq!(padded.data_size, 2352);
        assert_eq!(padded.extra_riff_size, 12);
        assert!(!padded.has(Problem::MayBeTruncated));

        let raw = std::fs::read(&out).unwrap();
        assert!(raw[44..44 + 352].iter().all(|&b| b == 0));
        assert_eq!(&raw[44 + 352..44 + 2352], &data[..]);
        assert!(raw.ends_with(b"note\x04\0\0\0abcd"));
    }

    #[test]
    fn test_pad_skips_aligned_and_non_cd() {
        let dir = tempfile::tempdir().unwrap();
        let opener = FileOpener::default();

        let path = write_wave(dir.path(), "aligned.wav", &vec![1u8; 2352]);
        let desc = WaveDescriptor::open(&opener, &path).unwrap();
        let err = pad_file(&opener, &desc, PadMode::Postpad, &OutputNaming::default()).unwrap_err();
        assert!(matches!(err, Error::Skipped { .. }));

        let mut mono = WaveDescriptor::cd_quality("", 0);
        mono.channels = 1;
        mono.avg_bytes_per_sec = 88200;
        mono.block_align = 2;
        let path = crate::testutil::write_wave_as(dir.path(), "mono.wav", &mono, &vec![1u8; 1000]);
        let desc = WaveDescriptor::open(&opener, &path).unwrap();
        let err = pad_file(&opener, &desc, PadMode::Postpad, &OutputNaming::default()).unwrap_err();
        assert!(err.to_string().contains("not CD-quality"));
    }

    #[test]
    fn test_pad_refuses_to_overwrite_input() {
        let dir = tempfile::tempdir().unwrap();
        let opener = FileOpener::new(true);
        let path = write_wave(dir.path(), "self-padded.wav", &vec![1u8; 100]);
        let desc = WaveDescriptor::open(&opener, &path).unwrap();

        let naming = OutputNaming {
            dir: Some(dir.path().to_path_buf()),
            postfix: Some(String::new()),
            ..Default::default()
        };
        let err = pad_file(&opener, &desc, PadMode::Postpad, &naming).unwrap_err();
        assert!(err.to_string().contains("overwrite"));
    }
}
