//! Byte-exact comparison of two PCM payloads, optionally after detecting
//! a leading byte shift between them.

use log::{info, warn};
use std::io::Read;

use crate::error::{Error, Result};
use crate::fileio::{read_n, skip_n, Progress, XFER_SIZE};
use crate::stream::{open_data, StreamOpener};
use crate::wave::{WaveDescriptor, CD_BLOCK_SIZE};

/// Shortest run of matching bytes that confirms a shift candidate.
pub const CMP_MATCH_SIZE: u64 = 2352;

#[derive(Debug, Clone)]
pub struct CmpOptions {
    /// Look for a leading byte shift before comparing
    pub shift: bool,
    /// Keep going after a mismatch and record every differing byte
    pub list: bool,
    /// Mismatches tolerated while looking for a shift
    pub fuzz: usize,
    /// Seconds at the start of each file searched for a shift
    pub shift_secs: u64,
}

impl Default for CmpOptions {
    fn default() -> Self {
        CmpOptions {
            shift: false,
            list: false,
            fuzz: 0,
            shift_secs: 3,
        }
    }
}

impl CmpOptions {
    pub fn validate(&self) -> Result<()> {
        if self.fuzz > 0 && !self.shift {
            return Err(Error::user_input("fuzz factor can only be used with byte-shift"));
        }
        if self.shift_secs == 0 {
            return Err(Error::user_input("seconds for byte-shift comparison must be positive"));
        }
        Ok(())
    }
}

/// One differing byte. `offset` is 1-based within the compared region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Difference {
    pub offset: u64,
    pub first: u8,
    pub second: u8,
}

#[derive(Debug, Clone, Default)]
pub struct Comparison {
    /// Positive: the first file has this many extra leading bytes.
    /// Negative: the second one does.
    pub shift: i64,
    pub compared: u64,
    /// Data sizes left after the shift was applied
    pub sizes: (u64, u64),
    pub differences: Vec<Difference>,
}

impl Comparison {
    pub fn identical(&self) -> bool {
        self.differences.is_empty()
    }

    pub fn summary(&self) -> String {
        let what = if self.shift == 0 { "Contents" } else { "Aligned contents" };
        if !self.identical() {
            return format!("{} of these files differed as indicated above.", what);
        }
        let mut s = format!("{} of these files are identical", what);
        if self.sizes.0 != self.sizes.1 {
            s.push_str(&format!(" (up to the first {} bytes of WAVE data)", self.compared));
        }
        s.push('.');
        s
    }
}

/// Index of the first mismatch, tolerating `fuzz` of them. With fuzz,
/// the reported index is the first mismatch of a run that exceeded it.
pub fn memfuzzycmp(a: &[u8], b: &[u8], fuzz: usize) -> Option<usize> {
    let mut first_bad = None;
    let mut bad_count = 0;
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        if x != y {
            if fuzz == 0 {
                return Some(i);
            }
            first_bad.get_or_insert(i);
            bad_count += 1;
            if bad_count > fuzz {
                return first_bad;
            }
        }
    }
    None
}

/// Abort on a format mismatch; warn on a block-align or size mismatch.
pub fn check_headers(a: &WaveDescriptor, b: &WaveDescriptor, shift: i64) -> Result<()> {
    a.check_same_format(b, "between these files")?;
    if a.block_align != b.block_align {
        warn!("block align differs between these files");
    }
    let size_a = a.data_size.saturating_sub(shift.max(0) as u64);
    let size_b = b.data_size.saturating_sub((-shift).max(0) as u64);
    if size_a != size_b {
        warn!("WAVE data size differs between these files -- will check up to smaller size");
    }
    Ok(())
}

fn read_exact_n(input: &mut dyn Read, buf: &mut [u8], desc: &WaveDescriptor) -> Result<()> {
    let got = read_n(input, buf, None);
    if got != buf.len() {
        return Err(Error::short(
            format!("reading from file: [{}]", desc.name()),
            buf.len() as u64,
            got as u64,
        ));
    }
    Ok(())
}

fn read_beginning(opener: &dyn StreamOpener, desc: &WaveDescriptor, bytes: u64) -> Result<Vec<u8>> {
    let mut input = open_data(opener, desc)?;
    let mut buf = vec![0u8; bytes as usize];
    read_exact_n(&mut input, &mut buf, desc)?;
    Ok(buf)
}

/// Search the first `shift_secs` seconds of both files for a leading
/// shift that lines their data up.
pub fn find_shift(
    opener: &dyn StreamOpener,
    a: &WaveDescriptor,
    b: &WaveDescriptor,
    fuzz: usize,
    shift_secs: u64,
) -> Result<i64> {
    let cmp_size = shift_secs * a.rate;
    let bytes = a.data_size.min(b.data_size).min(cmp_size);
    let buf1 = read_beginning(opener, a, bytes)?;
    let buf2 = read_beginning(opener, b, bytes)?;
    let bytes = bytes as usize;

    let candidates = (bytes + 1).saturating_sub(CMP_MATCH_SIZE as usize);
    for i in 0..candidates {
        let window = bytes - i;
        if memfuzzycmp(&buf1[i..], &buf2[..window], fuzz).is_none() {
            return Ok(i as i64);
        }
        if memfuzzycmp(&buf1[..window], &buf2[i..], fuzz).is_none() {
            return Ok(-(i as i64));
        }
    }

    Err(Error::user_input(format!(
        "these files do not share identical data within the first {} bytes.",
        cmp_size
    )))
}

/// Human-readable description of a detected shift.
pub fn describe_shift(a: &WaveDescriptor, b: &WaveDescriptor, shift: i64, fuzz: usize) -> String {
    let mut s = if fuzz > 0 {
        format!("With fuzz factor {}, file", fuzz)
    } else {
        "File".to_string()
    };
    if shift == 0 {
        s.push_str("s are identical so far.");
        return s;
    }
    let k = shift.unsigned_abs();
    s.push_str(&format!(
        " the {} file seems to have {} extra bytes ({} extra samples",
        if shift > 0 { "first" } else { "second" },
        k,
        (k + 2) / 4
    ));
    if a.is_cd_quality() && b.is_cd_quality() {
        s.push_str(&format!(", or {} extra sectors", (k + CD_BLOCK_SIZE / 2) / CD_BLOCK_SIZE));
    }
    s.push(')');
    s
}

/// Compare the data of `a` and `b` after dropping `shift` leading bytes
/// from one of them. Without `list`, stops at the first difference.
pub fn compare_files(
    opener: &dyn StreamOpener,
    a: &WaveDescriptor,
    b: &WaveDescriptor,
    shift: i64,
    list: bool,
) -> Result<Comparison> {
    check_headers(a, b, shift)?;

    let mut in1 = open_data(opener, a)?;
    let mut in2 = open_data(opener, b)?;
    let mut size1 = a.data_size;
    let mut size2 = b.data_size;

    let k = shift.unsigned_abs();
    if shift != 0 {
        let (input, desc, size) = if shift > 0 { (&mut in1, a, &mut size1) } else { (&mut in2, b, &mut size2) };
        if skip_n(input, k, None) != k {
            return Err(Error::short(format!("shifting bytes from file: [{}]", desc.name()), k, 0));
        }
        *size -= k;
    }

    let to_check = size1.min(size2);
    let mut progress = Progress::new(to_check);
    let mut buf1 = vec![0u8; XFER_SIZE];
    let mut buf2 = vec![0u8; XFER_SIZE];
    let mut checked = 0u64;
    let mut differences = Vec::new();

    while checked < to_check {
        let n = (to_check - checked).min(XFER_SIZE as u64) as usize;
        read_exact_n(&mut in1, &mut buf1[..n], a)?;
        read_exact_n(&mut in2, &mut buf2[..n], b)?;
        progress.add(n as u64);

        let mut start = 0;
        while let Some(off) = memfuzzycmp(&buf1[start..n], &buf2[start..n], 0) {
            let i = start + off;
            differences.push(Difference {
                offset: checked + i as u64 + 1,
                first: buf1[i],
                second: buf2[i],
            });
            if !list {
                info!("WAVE data differs at byte offset: {}", checked + i as u64 + 1);
                return Ok(Comparison {
                    shift,
                    compared: checked + i as u64 + 1,
                    sizes: (size1, size2),
                    differences,
                });
            }
            start = i + 1;
        }
        checked += n as u64;
    }

    progress.success();
    let comparison = Comparison {
        shift,
        compared: to_check,
        sizes: (size1, size2),
        differences,
    };
    info!("{}", comparison.summary());
    Ok(comparison)
}

/// Compare two files per `opts`, searching for a shift first when asked.
pub fn cmp_files(
    opener: &dyn StreamOpener,
    a: &WaveDescriptor,
    b: &WaveDescriptor,
    opts: &CmpOptions,
) -> Result<Comparison> {
    opts.validate()?;
    let shift = if opts.shift {
        let shift = find_shift(opener, a, b, opts.fuzz, opts.shift_secs)?;
        info!("{}", describe_shift(a, b, shift, opts.fuzz));
        if shift != 0 {
            info!("These extra bytes will be ignored in the full comparison.");
        }
        shift
    } else {
        0
    };
    compare_files(opener, a, b, shift, opts.list)
}
