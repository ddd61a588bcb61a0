//! Concatenating the PCM payloads of several files into one.

use log::{info, warn};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::fileio::{transfer_n, write_padding, Progress};
use crate::header::make_canonical_header;
use crate::pad::{sector_pad_bytes, PadMode};
use crate::stream::{open_data, OutputNaming, PendingOutput, StreamOpener};
use crate::wave::{check_compatible, Problem, WaveDescriptor};

#[derive(Debug, Clone, Default)]
pub struct JoinReport {
    pub output: PathBuf,
    /// Zero bytes the joined data needed to end on a sector boundary
    pub pad_bytes: u64,
    pub data_size: u64,
}

/// Reject inputs that cannot be joined and return whether every input is CD-quality.
pub fn check_join_inputs(files: &[WaveDescriptor]) -> Result<bool> {
    let mut all_cd = true;
    for f in files {
        if f.has(Problem::NotCdQuality) {
            all_cd = false;
        }
        if f.has(Problem::HeaderInconsistent) {
            return Err(Error::consistency(format!("file has an inconsistent header: [{}]", f.name())));
        }
        if f.has(Problem::MayBeTruncated) {
            return Err(Error::consistency(format!("file seems to be truncated: [{}]", f.name())));
        }
    }
    check_compatible(files)?;
    Ok(all_cd)
}

/// Join `files` in order into a single output named `joined.wav` by default.
///
/// CD-quality inputs whose total is not sector-aligned are padded at the
/// front or back according to `pad`; an odd final data chunk always gets
/// its NULL pad byte.
pub fn join_files(
    opener: &dyn StreamOpener,
    files: &[WaveDescriptor],
    pad: PadMode,
    naming: &OutputNaming,
) -> Result<JoinReport> {
    if files.len() < 2 {
        return Err(Error::user_input("need two or more files to process"));
    }
    let all_cd = check_join_inputs(files)?;

    let mut total: u64 = files.iter().map(|f| f.data_size).sum();
    let mut pad_bytes = 0;
    if all_cd {
        pad_bytes = sector_pad_bytes(total);
        if pad != PadMode::Nopad {
            total += pad_bytes;
        }
    }

    let outfile = naming.named("", "joined");
    let joined = WaveDescriptor::with_format_of(&outfile, &files[0], total);
    let header = make_canonical_header(&joined);

    let mut out = PendingOutput::create(opener, &outfile)?;
    let mut progress = Progress::new(joined.total_size);

    out.writer()
        .write_all(&header)
        .map_err(|e| Error::io(format!("error while writing {}-byte WAVE header", header.len()), e))?;
    progress.add(header.len() as u64);

    if all_cd && pad == PadMode::Prepad && pad_bytes > 0
        && write_padding(out.writer(), pad_bytes, Some(&mut progress)) != pad_bytes
    {
        return Err(Error::short("pre-padding with zero-bytes", pad_bytes, 0));
    }

    for f in files {
        let mut input = open_data(opener, f)?;
        let moved = transfer_n(&mut input, out.writer(), f.data_size, Some(&mut progress));
        if moved != f.data_size {
            return Err(Error::short(
                format!("transferring data of [{}]", f.name()),
                f.data_size,
                moved,
            ));
        }
    }

    if all_cd && pad == PadMode::Postpad && pad_bytes > 0
        && write_padding(out.writer(), pad_bytes, Some(&mut progress)) != pad_bytes
    {
        return Err(Error::short("post-padding with zero-bytes", pad_bytes, 0));
    }

    if joined.is_odd_sized() && write_padding(out.writer(), 1, None) != 1 {
        return Err(Error::short("NULL-padding odd-sized data chunk", 1, 0));
    }

    out.commit()?;
    progress.success();

    if all_cd {
        match (pad, pad_bytes) {
            (PadMode::Nopad, 0) => info!("Output file was not padded, nor was it needed."),
            (PadMode::Nopad, n) => warn!("Output file was not padded, though it needs {} bytes of padding.", n),
            (_, 0) => info!("No padding needed."),
            (PadMode::Prepad, n) => info!("Pre-padded output file with {} zero-bytes.", n),
            (_, n) => info!("Post-padded output file with {} zero-bytes.", n),
        }
    }

    Ok(JoinReport {
        output: outfile,
        pad_bytes,
        data_size: total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::FileOpener;
    use crate::testutil::{read_payload, write_wave, write_wave_as};

    fn setup(sizes: &[usize]) -> (tempfile::TempDir, Vec<Vec<u8>>, Vec<WaveDescriptor>) {
        let dir = tempfile::tempdir().unwrap();
        let opener = FileOpener::default();
        let mut payloads = Vec::new();
        let mut descs = Vec::new();
        for (i, &n) in sizes.iter().enumerate() {
            let data: Vec<u8> = (0..n).map(|j| ((j * 3 + i) % 250) as u8 + 1).collect();
            let path = write_wave(dir.path(), &format!("in{}.wav", i), &data);
            descs.push(WaveDescriptor::open(&opener, &path).unwrap());
            payloads.push(data);
        }
        (dir, payloads, descs)
    }

    fn naming(dir: &std::path::Path) -> OutputNaming {
        OutputNaming {
            dir: Some(dir.to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn test_join_postpad() {
        let (dir, payloads, descs) = setup(&[3000, 2001]);
        let opener = FileOpener::default();
        let report = join_files(&opener, &descs, PadMode::Postpad, &naming(dir.path())).unwrap();

        assert!(report.output.ends_with("joined.wav"));
        assert_eq!(report.pad_bytes, 2352 * 3 - 5001);
        let out = read_payload(&report.output);
        assert_eq!(out.len(), 2352 * 3);
        assert_eq!(&out[..3000], &payloads[0][..]);
        assert_eq!(&out[3000..5001], &payloads[1][..]);
        assert!(out[5001..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_join_prepad() {
        let (dir, payloads, descs) = setup(&[100, 200]);
        let opener = FileOpener::default();
        let report = join_files(&opener, &descs, PadMode::Prepad, &naming(dir.path())).unwrap();

        let out = read_payload(&report.output);
        let pad = 2352 - 300;
        assert!(out[..pad].iter().all(|&b| b == 0));
        assert_eq!(&out[pad..pad + 100], &payloads[0][..]);
        assert_eq!(&out[pad + 100..], &payloads[1][..]);
    }

    #[test]
    fn test_join_nopad_odd_gets_null_byte() {
        let (dir, _, descs) = setup(&[100, 201]);
        let opener = FileOpener::default();
        let report = join_files(&opener, &descs, PadMode::Nopad, &naming(dir.path())).unwrap();

        let joined = WaveDescriptor::open(&opener, &report.output).unwrap();
        assert_eq!(joined.data_size, 301);
        assert!(!joined.has(Problem::MayBeTruncated));
        assert!(!joined.has(Problem::JunkAppended));
        assert_eq!(std::fs::metadata(&report.output).unwrap().len(), 44 + 302);
    }

    #[test]
    fn test_join_rejects_mismatch_and_single_file() {
        let (dir, _, mut descs) = setup(&[100, 200]);
        let opener = FileOpener::default();

        let err = join_files(&opener, &descs[..1], PadMode::Postpad, &naming(dir.path())).unwrap_err();
        assert!(matches!(err, Error::UserInput(_)));

        let mut mono = descs[0].clone();
        mono.channels = 1;
        mono.avg_bytes_per_sec = 88200;
        let path = write_wave_as(dir.path(), "mono.wav", &mono, &[1u8; 50]);
        descs.push(WaveDescriptor::open(&opener, &path).unwrap());
        let err = join_files(&opener, &descs, PadMode::Postpad, &naming(dir.path())).unwrap_err();
        assert!(err.to_string().contains("number of channels differs"));
    }
}
