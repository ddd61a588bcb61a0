//! Sector-boundary fixing for a sequence of CD-quality files.
//!
//! The planner moves bytes across file boundaries so that every file except
//! the last ends on a 2352-byte sector. The writer then streams the inputs
//! back out through rolling read/write cursors, one output per input.

use log::{info, warn};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::fileio::{transfer_n, write_padding, Progress};
use crate::header::{make_canonical_header, put_data_size};
use crate::stream::{open_data, OutputNaming, PendingOutput, StreamOpener};
use crate::wave::{Problem, WaveDescriptor, CANONICAL_HEADER_SIZE, CD_BLOCK_SIZE};

const BLOCK: i64 = CD_BLOCK_SIZE as i64;

/// Which way boundary bytes travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FixShift {
    /// Each boundary moves back to the previous sector; the last file grows.
    #[default]
    Backward,
    /// Each boundary moves ahead to the next sector; the last file shrinks.
    Forward,
    /// Each boundary moves to the nearest sector.
    Round,
}

impl FixShift {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixShift::Backward => "backward",
            FixShift::Forward => "forward",
            FixShift::Round => "round",
        }
    }
}

impl FromStr for FixShift {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "backward" => Ok(FixShift::Backward),
            "forward" => Ok(FixShift::Forward),
            "round" => Ok(FixShift::Round),
            other => Err(Error::user_input(format!("invalid shift type: [{}]", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FixOptions {
    pub shift: FixShift,
    /// Zero-pad the last file up to a sector boundary
    pub pad: bool,
    /// Leave out leading files whose output would be identical to their input
    pub skip_unchanged: bool,
    pub naming: OutputNaming,
}

impl Default for FixOptions {
    fn default() -> Self {
        FixOptions {
            shift: FixShift::Backward,
            pad: true,
            skip_unchanged: true,
            naming: OutputNaming::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FixReport {
    pub outputs: Vec<PathBuf>,
    /// Zero bytes the last file needs (written only when padding is on)
    pub pad_bytes: u64,
    pub skipped: usize,
}

/// Reject inputs that cannot be fixed and report whether any file is off
/// a sector boundary.
pub fn check(files: &[WaveDescriptor]) -> Result<bool> {
    let mut found_errors = false;
    let mut needs_fixing = false;

    for f in files {
        if f.has(Problem::NotCdQuality) {
            warn!("file is not CD-quality: [{}]", f.name());
            found_errors = true;
        }
        if f.has(Problem::HeaderInconsistent) {
            warn!("file has an inconsistent header: [{}]", f.name());
            found_errors = true;
        }
        if f.has(Problem::MayBeTruncated) {
            warn!("file seems to be truncated: [{}]", f.name());
            found_errors = true;
        }
        if f.has(Problem::CdButBadBound) {
            needs_fixing = true;
        }
    }

    if found_errors {
        return Err(Error::consistency("could not fix files due to errors, see above"));
    }
    Ok(needs_fixing)
}

fn plan_backward(files: &mut [WaveDescriptor]) {
    let last = files.len() - 1;
    let (mut begin_before, mut begin_after, mut remainder) = (0i64, 0i64, 0i64);

    for (i, f) in files.iter_mut().enumerate() {
        f.beginning_byte = begin_before;
        f.new_beginning_byte = begin_after;

        let tmp = f.data_size as i64 + remainder;
        if i == last {
            f.new_data_size = tmp;
        } else {
            remainder = tmp % BLOCK;
            f.new_data_size = tmp - remainder;
        }

        begin_before += f.data_size as i64;
        begin_after += f.new_data_size;
    }
}

fn plan_forward(files: &mut [WaveDescriptor]) {
    let last = files.len() - 1;
    let (mut begin_before, mut begin_after, mut used) = (0i64, 0i64, 0i64);

    for (i, f) in files.iter_mut().enumerate() {
        f.beginning_byte = begin_before;
        f.new_beginning_byte = begin_after;

        let tmp = f.data_size as i64 - used;
        if i == last {
            f.new_data_size = tmp;
        } else {
            let remainder = tmp % BLOCK;
            used = if remainder != 0 { BLOCK - remainder } else { 0 };
            f.new_data_size = tmp + used;
        }

        begin_before += f.data_size as i64;
        begin_after += f.new_data_size;
    }
}

fn plan_round(files: &mut [WaveDescriptor]) {
    let last = files.len() - 1;
    let (mut begin_before, mut begin_after, mut give_or_take) = (0i64, 0i64, 0i64);

    for (i, f) in files.iter_mut().enumerate() {
        f.beginning_byte = begin_before;
        f.new_beginning_byte = begin_after;

        let tmp = f.data_size as i64 + give_or_take;
        if i == last {
            f.new_data_size = tmp;
        } else {
            let how_much = ((tmp + BLOCK / 2) / BLOCK) * BLOCK;
            give_or_take = tmp - how_much;
            f.new_data_size = how_much;
        }

        begin_before += f.data_size as i64;
        begin_after += f.new_data_size;
    }
}

fn sanity_check(files: &[WaveDescriptor], shift: FixShift) -> Result<()> {
    let old_total: i64 = files.iter().map(|f| f.data_size as i64).sum();
    let new_total: i64 = files.iter().map(|f| f.new_data_size).sum();

    if old_total != new_total {
        for (i, f) in files.iter().enumerate() {
            info!(
                "file {:2}:  data size = {:10}, new data size = {:10}",
                i + 1,
                f.data_size,
                f.new_data_size
            );
        }
        return Err(Error::consistency(format!(
            "total WAVE data size ({}) differs from newly calculated total ({}) using {} shift",
            old_total,
            new_total,
            shift.as_str()
        )));
    }

    if let Some(f) = files.iter().find(|f| f.new_data_size < 0) {
        return Err(Error::consistency(format!(
            "{} shift leaves a negative data size ({}) for [{}]",
            shift.as_str(),
            f.new_data_size,
            f.name()
        )));
    }
    Ok(())
}

/// Compute `new_data_size` and the running offsets for every file and
/// return the number of zero bytes the last file needs to end on a sector.
pub fn plan(files: &mut [WaveDescriptor], shift: FixShift) -> Result<u64> {
    if files.is_empty() {
        return Err(Error::user_input("need one or more files to process"));
    }

    match shift {
        FixShift::Backward => plan_backward(files),
        FixShift::Forward => plan_forward(files),
        FixShift::Round => plan_round(files),
    }

    sanity_check(files, shift)?;

    let last = files[files.len() - 1].new_data_size;
    let remainder = last % BLOCK;
    Ok(if remainder != 0 { (BLOCK - remainder) as u64 } else { 0 })
}

fn open_fixed<'a>(
    opener: &'a dyn StreamOpener,
    desc: &WaveDescriptor,
    path: &Path,
    padded_size: Option<u64>,
) -> Result<PendingOutput<'a>> {
    let new_size = desc.new_data_size as u64;
    let out_desc = WaveDescriptor::with_format_of(path, desc, new_size);
    let mut header = make_canonical_header(&out_desc);
    if let Some(size) = padded_size {
        put_data_size(&mut header, CANONICAL_HEADER_SIZE as usize, size);
    }

    let mut out = PendingOutput::create(opener, path)?;
    out.writer().write_all(&header).map_err(|e| {
        Error::io(format!("error while writing {}-byte WAVE header", CANONICAL_HEADER_SIZE), e)
    })?;
    Ok(out)
}

fn finish_last(out: &mut PendingOutput, desc: &WaveDescriptor, pad: bool, pad_bytes: u64) -> Result<()> {
    if pad {
        if pad_bytes > 0 {
            if write_padding(out.writer(), pad_bytes, None) != pad_bytes {
                return Err(Error::short("padding last file", pad_bytes, 0));
            }
            info!("Padded last file with {} zero-bytes.", pad_bytes);
        } else {
            info!("No padding needed.");
        }
        return Ok(());
    }

    if pad_bytes > 0 {
        info!("Last file was not padded, though it needs {} bytes of padding.", pad_bytes);
    } else {
        info!("Last file was not padded, nor was it needed.");
    }
    if desc.new_data_size & 1 == 1 && write_padding(out.writer(), 1, None) != 1 {
        return Err(Error::short("NULL-padding odd-sized data chunk", 1, 0));
    }
    Ok(())
}

/// Validate, plan and write fixed copies of `files`.
pub fn fix_files(opener: &dyn StreamOpener, mut files: Vec<WaveDescriptor>, opts: &FixOptions) -> Result<FixReport> {
    if files.is_empty() {
        return Err(Error::user_input("need one or more files to process"));
    }
    if !check(&files)? {
        return Err(Error::user_input("everything seems fine, no need for fixing"));
    }

    let mut report = FixReport::default();

    let first_bad = files
        .iter()
        .position(|f| f.has(Problem::CdButBadBound))
        .unwrap_or(0);
    if opts.skip_unchanged && first_bad > 0 {
        warn!(
            "skipping first {} file{} because {} would not be changed",
            first_bad,
            if first_bad == 1 { "" } else { "s" },
            if first_bad == 1 { "it" } else { "they" }
        );
        files.drain(..first_bad);
        report.skipped = first_bad;
    }

    report.pad_bytes = plan(&mut files, opts.shift)?;
    let pad_bytes = report.pad_bytes;

    let n = files.len();
    let names: Vec<PathBuf> = files
        .iter()
        .map(|f| opts.naming.derived(&f.path, "-fixed"))
        .collect();
    let padded_size = |i: usize| {
        if i == n - 1 && opts.pad {
            Some(files[i].new_data_size as u64 + pad_bytes)
        } else {
            None
        }
    };

    let mut cur_in = 0;
    let mut reader: Box<dyn Read> = open_data(opener, &files[0])?;
    let mut have = files[0].data_size;

    let mut cur_out = 0;
    let mut out = Some(open_fixed(opener, &files[0], &names[0], padded_size(0))?);
    let mut needed = files[0].new_data_size as u64;
    let mut progress = Progress::new(needed + CANONICAL_HEADER_SIZE);

    while cur_out < n {
        if needed > 0 && have == 0 {
            cur_in += 1;
            if cur_in >= n {
                return Err(Error::consistency("ran out of input data while fixing files"));
            }
            reader = open_data(opener, &files[cur_in])?;
            have = files[cur_in].data_size;
            continue;
        }

        let xfer = have.min(needed);
        if xfer > 0 {
            let current = out
                .as_mut()
                .ok_or_else(|| Error::consistency("no output open while fixing files"))?;
            let moved = transfer_n(&mut reader, current.writer(), xfer, Some(&mut progress));
            if moved != xfer {
                return Err(Error::short(
                    format!("transferring data from [{}]", files[cur_in].name()),
                    xfer,
                    moved,
                ));
            }
        }
        have -= xfer;
        needed -= xfer;

        if needed == 0 {
            progress.success();
            if let Some(mut done) = out.take() {
                if cur_out == n - 1 {
                    finish_last(&mut done, &files[cur_out], opts.pad, pad_bytes)?;
                }
                done.commit()?;
            }
            report.outputs.push(names[cur_out].clone());

            cur_out += 1;
            if cur_out < n {
                out = Some(open_fixed(opener, &files[cur_out], &names[cur_out], padded_size(cur_out))?);
                needed = files[cur_out].new_data_size as u64;
                progress.reset(needed + CANONICAL_HEADER_SIZE);
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::FileOpener;
    use crate::testutil::write_wave;

    fn cds(sizes: &[u64]) -> Vec<WaveDescriptor> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &s)| WaveDescriptor::cd_quality(format!("f{}.wav", i), s))
            .collect()
    }

    fn new_sizes(files: &[WaveDescriptor]) -> Vec<i64> {
        files.iter().map(|f| f.new_data_size).collect()
    }

    #[test]
    fn test_backward_plan() {
        let mut files = cds(&[2352 * 10 + 100, 2352 * 5 + 2000, 3000]);
        let pad = plan(&mut files, FixShift::Backward).unwrap();

        assert_eq!(new_sizes(&files), vec![2352 * 10, 2352 * 5, 100 + 2000 + 3000]);
        assert_eq!(files[1].beginning_byte, 2352 * 10 + 100);
        assert_eq!(files[1].new_beginning_byte, 2352 * 10);
        assert_eq!((files[2].new_data_size as u64 + pad) % 2352, 0);
    }

    #[test]
    fn test_forward_plan() {
        let mut files = cds(&[2352 * 10 + 100, 2352 * 5 + 2000, 3000]);
        plan(&mut files, FixShift::Forward).unwrap();

        assert_eq!(files[0].new_data_size, 2352 * 11);
        // 2252 bytes were borrowed from the second file
        assert_eq!(files[1].new_data_size, 2352 * 5);
        assert_eq!(files[2].new_data_size, 3000 - (2352 - (2000 - 2252 + 2352)));
        let total: i64 = new_sizes(&files).iter().sum();
        assert_eq!(total, (2352 * 15 + 2100 + 3000) as i64);
    }

    #[test]
    fn test_round_plan() {
        let mut files = cds(&[2352 + 1000, 2352 + 1500, 500]);
        plan(&mut files, FixShift::Round).unwrap();

        assert_eq!(files[0].new_data_size, 2352);
        // 1000 carried into 3852 rounds up to 2352 * 2
        assert_eq!(files[1].new_data_size, 2352 * 2);
        assert_eq!(files[2].new_data_size, 500 + 1000 + 1500 - 2352);
    }

    #[test]
    fn test_conservation_all_strategies() {
        let sizes = [123_457u64, 2352 * 3, 99_999, 5_000, 777_777];
        for shift in [FixShift::Backward, FixShift::Forward, FixShift::Round] {
            let mut files = cds(&sizes);
            let pad = plan(&mut files, shift).unwrap();
            let total: i64 = new_sizes(&files).iter().sum();
            assert_eq!(total, sizes.iter().sum::<u64>() as i64, "{:?}", shift);
            for f in &files[..files.len() - 1] {
                assert_eq!(f.new_data_size % 2352, 0);
            }
            assert_eq!((files[4].new_data_size as u64 + pad) % 2352, 0);
            assert!(pad < 2352);
        }
    }

    #[test]
    fn test_negative_new_size_rejected() {
        // tiny trailing files cannot repay what forward shifting borrowed
        let mut files = cds(&[1, 100, 10]);
        let err = plan(&mut files, FixShift::Forward).unwrap_err();
        assert!(matches!(err, Error::Consistency(_)));

        let mut files = cds(&[1200, 10]);
        let err = plan(&mut files, FixShift::Round).unwrap_err();
        assert!(err.to_string().contains("negative"));

        let mut files = cds(&[1200, 10]);
        assert!(plan(&mut files, FixShift::Backward).is_ok());
    }

    #[test]
    fn test_check_rejects_non_cd() {
        let mut files = cds(&[2352 * 400 + 1]);
        assert!(check(&files).unwrap());

        files[0].samples_per_sec = 48000;
        files[0].recompute();
        assert!(matches!(check(&files), Err(Error::Consistency(_))));
    }

    #[test]
    fn test_fix_files_writes_aligned_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let a_data: Vec<u8> = (0..2352 * 2 + 10).map(|i| (i % 7) as u8 + 1).collect();
        let b_data: Vec<u8> = (0..2352 + 5).map(|i| (i % 5) as u8 + 10).collect();
        let a = write_wave(dir.path(), "a.wav", &a_data);
        let b = write_wave(dir.path(), "b.wav", &b_data);

        let opener = FileOpener::default();
        let files = vec![
            WaveDescriptor::open(&opener, &a).unwrap(),
            WaveDescriptor::open(&opener, &b).unwrap(),
        ];
        let opts = FixOptions {
            naming: OutputNaming {
                dir: Some(dir.path().to_path_buf()),
                ..Default::default()
            },
            ..Default::default()
        };

        let report = fix_files(&opener, files, &opts).unwrap();
        assert_eq!(report.outputs.len(), 2);
        assert_eq!(report.pad_bytes, 2352 - 15);

        let fa = WaveDescriptor::open(&opener, &report.outputs[0]).unwrap();
        let fb = WaveDescriptor::open(&opener, &report.outputs[1]).unwrap();
        assert_eq!(fa.data_size, 2352 * 2);
        assert_eq!(fb.data_size, 2352 * 2);
        assert!(fb.problems().contains(Problem::CdButTooShort));
        assert!(!fb.has(Problem::CdButBadBound));

        let mut joined = a_data.clone();
        joined.extend_from_slice(&b_data);
        let out_a = std::fs::read(&report.outputs[0]).unwrap();
        let out_b = std::fs::read(&report.outputs[1]).unwrap();
        assert_eq!(&out_a[44..], &joined[..2352 * 2]);
        assert_eq!(&out_b[44..44 + 2352 + 15], &joined[2352 * 2..]);
        assert!(out_b[44 + 2352 + 15..].iter().all(|&x| x == 0));
    }

    #[test]
    fn test_fix_nothing_to_do() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_wave(dir.path(), "a.wav", &vec![1u8; 2352 * 2]);
        let opener = FileOpener::default();
        let files = vec![WaveDescriptor::open(&opener, &a).unwrap()];
        let err = fix_files(&opener, files, &FixOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UserInput(_)));
    }

    #[test]
    fn test_skip_unchanged_leading_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_wave(dir.path(), "a.wav", &vec![1u8; 2352]);
        let b = write_wave(dir.path(), "b.wav", &vec![2u8; 2352 + 4]);
        let c = write_wave(dir.path(), "c.wav", &vec![3u8; 100]);
        let opener = FileOpener::default();
        let files: Vec<WaveDescriptor> = [a, b, c]
            .iter()
            .map(|p| WaveDescriptor::open(&opener, p).unwrap())
            .collect();
        let opts = FixOptions {
            pad: false,
            naming: OutputNaming {
                dir: Some(dir.path().join("out")),
                ..Default::default()
            },
            ..Default::default()
        };
        std::fs::create_dir(dir.path().join("out")).unwrap();

        let report = fix_files(&opener, files, &opts).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.outputs.len(), 2);
        let last = WaveDescriptor::open(&opener, &report.outputs[1]).unwrap();
        assert_eq!(last.data_size, 104);
    }
}
