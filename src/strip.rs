//! Rewriting a file with a canonical header and/or without extra RIFF chunks.

use log::info;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::fileio::transfer_n;
use crate::header::{make_canonical_header, put_chunk_size};
use crate::stream::{files_are_identical, open_with_header, OutputNaming, PendingOutput, StreamOpener};
use crate::wave::{odd_sized_data_chunk_is_null_padded, Problem, WaveDescriptor, CANONICAL_HEADER_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripOptions {
    /// Replace the header with the canonical 44-byte one
    pub header: bool,
    /// Drop RIFF chunks that follow the data chunk
    pub chunks: bool,
}

impl Default for StripOptions {
    fn default() -> Self {
        StripOptions { header: true, chunks: true }
    }
}

fn check_strippable(desc: &WaveDescriptor, opts: StripOptions) -> Result<()> {
    let skip = |reason: &str| Err(Error::skipped(desc.name(), reason));

    if !opts.header && !opts.chunks {
        return Err(Error::user_input("nothing to do if not stripping headers or RIFF chunks"));
    }
    if desc.has(Problem::HeaderInconsistent) {
        return skip("file has an inconsistent header");
    }
    if desc.has(Problem::MayBeTruncated) {
        return skip("file seems to be truncated");
    }
    let extra = desc.has(Problem::ExtraChunks);
    let non_canonical = desc.has(Problem::HeaderNotCanonical);
    match (opts.header, opts.chunks) {
        (true, true) if !extra && !non_canonical => {
            skip("file already has a canonical header and no extra RIFF chunks")
        }
        (false, true) if !extra => skip("file already has no extra RIFF chunks"),
        (true, false) if !non_canonical => skip("file already has a canonical header"),
        _ => Ok(()),
    }
}

/// Write a stripped copy of `desc` with postfix `-stripped`.
pub fn strip_file(
    opener: &dyn StreamOpener,
    desc: &WaveDescriptor,
    opts: StripOptions,
    naming: &OutputNaming,
) -> Result<PathBuf> {
    check_strippable(desc, opts)?;

    let outfile = naming.derived(&desc.path, "-stripped");
    if files_are_identical(&desc.path, &outfile) {
        return Err(Error::skipped(desc.name(), "output file would overwrite input file"));
    }

    let has_null_pad = odd_sized_data_chunk_is_null_padded(opener, desc)?;
    let mut extra = desc.extra_riff_size;
    if !has_null_pad {
        extra += 1;
    }
    let kept_extra = if opts.chunks { 0 } else { extra.max(0) };
    let new_header_size = if opts.header { CANONICAL_HEADER_SIZE } else { desc.header_size };
    let new_chunk_size = desc.chunk_size as i64
        - (desc.header_size as i64 - new_header_size as i64)
        - (extra - kept_extra);

    let (header, mut input) = open_with_header(opener, desc)?;
    let mut header = if opts.header {
        make_canonical_header(desc).to_vec()
    } else {
        header
    };
    put_chunk_size(&mut header, new_chunk_size.max(0) as u64);

    let mut out = PendingOutput::create(opener, &outfile)?;
    out.writer()
        .write_all(&header)
        .map_err(|e| Error::io(format!("error while writing {} bytes of data", new_header_size), e))?;

    let moved = transfer_n(&mut input, out.writer(), desc.data_size, None);
    if moved != desc.data_size {
        return Err(Error::short("transferring data chunk", desc.data_size, moved));
    }
    if desc.is_odd_sized() && has_null_pad && transfer_n(&mut input, out.writer(), 1, None) != 1 {
        return Err(Error::short("transferring NULL pad byte", 1, 0));
    }
    if kept_extra > 0 {
        let kept = kept_extra as u64;
        let moved = transfer_n(&mut input, out.writer(), kept, None);
        if moved != kept {
            return Err(Error::short("transferring extra RIFF chunks", kept, moved));
        }
    }

    out.commit()?;
    info!("Stripped [{}] --> [{}]", desc.name(), outfile.display());
    Ok(outfile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::FileOpener;
    use crate::testutil::{read_payload, write_wave};
    use byteorder::{LittleEndian, WriteBytesExt};

    /// LIST chunk before fmt, `note` chunk after the data.
    fn messy_wave(dir: &std::path::Path, data: &[u8]) -> PathBuf {
        let mut body = Vec::new();
        body.extend_from_slice(b"WAVE");
        body.extend_from_slice(b"LIST");
        body.write_u32::<LittleEndian>(4).unwrap();
        body.extend_from_slice(b"abcd");
        body.extend_from_slice(b"fmt ");
        body.write_u32::<LittleEndian>(16).unwrap();
        body.write_u16::<LittleEndian>(1).unwrap();
        body.write_u16::<LittleEndian>(2).unwrap();
        body.write_u32::<LittleEndian>(44100).unwrap();
        body.write_u32::<LittleEndian>(176400).unwrap();
        body.write_u16::<LittleEndian>(4).unwrap();
        body.write_u16::<LittleEndian>(16).unwrap();
        body.extend_from_slice(b"data");
        body.write_u32::<LittleEndian>(data.len() as u32).unwrap();
        body.extend_from_slice(data);
        body.extend_from_slice(b"note");
        body.write_u32::<LittleEndian>(2).unwrap();
        body.extend_from_slice(b"hi");

        let mut bytes = b"RIFF".to_vec();
        bytes.write_u32::<LittleEndian>(body.len() as u32).unwrap();
        bytes.extend_from_slice(&body);
        let path = dir.join("messy.wav");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn naming(dir: &std::path::Path) -> OutputNaming {
        OutputNaming {
            dir: Some(dir.join("out")),
            ..Default::default()
        }
    }

    #[test]
    fn test_strip_header_and_chunks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("out")).unwrap();
        let data = vec![4u8; 1000];
        let path = messy_wave(dir.path(), &data);
        let opener = FileOpener::default();

        let desc = WaveDescriptor::open(&opener, &path).unwrap();
        assert!(desc.has(Problem::HeaderNotCanonical));
        assert!(desc.has(Problem::ExtraChunks));

        let out = strip_file(&opener, &desc, StripOptions::default(), &naming(dir.path())).unwrap();
        assert!(out.ends_with("messy-stripped.wav"));
        let stripped = WaveDescriptor::open(&opener, &out).unwrap();
        assert_eq!(stripped.header_size, 44);
        assert_eq!(stripped.extra_riff_size, 0);
        assert!(!stripped.has(Problem::HeaderNotCanonical));
        assert!(!stripped.has(Problem::ExtraChunks));
        assert!(!stripped.has(Problem::JunkAppended));
        assert_eq!(read_payload(&out), data);
    }

    #[test]
    fn test_strip_header_only_keeps_chunks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("out")).unwrap();
        let path = messy_wave(dir.path(), &[4u8; 100]);
        let opener = FileOpener::default();

        let desc = WaveDescriptor::open(&opener, &path).unwrap();
        let opts = StripOptions { header: true, chunks: false };
        let out = strip_file(&opener, &desc, opts, &naming(dir.path())).unwrap();

        let stripped = WaveDescriptor::open(&opener, &out).unwrap();
        assert_eq!(stripped.header_size, 44);
        assert_eq!(stripped.extra_riff_size, 10);
        assert!(!stripped.has(Problem::MayBeTruncated));
        assert!(std::fs::read(&out).unwrap().ends_with(b"note\x02\0\0\0hi"));
    }

    #[test]
    fn test_strip_skips_clean_files() {
        let dir = tempfile::tempdir().unwrap();
        let opener = FileOpener::default();
        let path = write_wave(dir.path(), "clean.wav", &[1u8; 10]);
        let desc = WaveDescriptor::open(&opener, &path).unwrap();

        let err = strip_file(&opener, &desc, StripOptions::default(), &naming(dir.path())).unwrap_err();
        assert!(matches!(err, Error::Skipped { .. }));

        let none = StripOptions { header: false, chunks: false };
        let err = strip_file(&opener, &desc, none, &naming(dir.path())).unwrap_err();
        assert!(matches!(err, Error::UserInput(_)));
    }
}
