//! Removing all-zero samples from the ends of a file.

use log::info;
use std::io::Read;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::fileio::{read_n, skip_n, transfer_n, write_padding, Progress, XFER_SIZE};
use crate::header::{put_chunk_size, put_data_size};
use crate::stream::{files_are_identical, open_data, open_with_header, OutputNaming, PendingOutput, StreamOpener};
use crate::wave::{odd_sized_data_chunk_is_null_padded, WaveDescriptor};

/// Which ends of the file are trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimEnds {
    pub beginning: bool,
    pub end: bool,
}

impl Default for TrimEnds {
    fn default() -> Self {
        TrimEnds { beginning: true, end: true }
    }
}

impl TrimEnds {
    fn describe(&self) -> &'static str {
        match (self.beginning, self.end) {
            (true, true) => "either end",
            (true, false) => "the beginning",
            _ => "the end",
        }
    }
}

/// Read-ahead buffer over the data chunk, so the scan can take one sample
/// at a time without a read call per sample.
struct ReadCache<'a> {
    input: &'a mut dyn Read,
    cache: Vec<u8>,
    pos: usize,
    len: usize,
    /// Data bytes not yet pulled into the cache
    remaining: u64,
}

impl<'a> ReadCache<'a> {
    fn new(input: &'a mut dyn Read, data_size: u64) -> Self {
        ReadCache {
            input,
            cache: vec![0u8; XFER_SIZE],
            pos: 0,
            len: 0,
            remaining: data_size,
        }
    }

    fn read(&mut self, out: &mut [u8], progress: &mut Progress) -> Result<()> {
        let mut filled = 0;
        while filled < out.len() {
            if self.pos == self.len {
                let want = self.remaining.min(XFER_SIZE as u64) as usize;
                if want == 0 {
                    return Err(Error::short("reading into local cache", out.len() as u64, filled as u64));
                }
                let got = read_n(self.input, &mut self.cache[..want], Some(&mut *progress));
                if got != want {
                    return Err(Error::short(
                        format!("reading {} bytes into local cache from input file", want),
                        want as u64,
                        got as u64,
                    ));
                }
                self.remaining -= got as u64;
                self.pos = 0;
                self.len = got;
            }
            let n = (self.len - self.pos).min(out.len() - filled);
            out[filled..filled + n].copy_from_slice(&self.cache[self.pos..self.pos + n]);
            self.pos += n;
            filled += n;
        }
        Ok(())
    }
}

/// Bytes of leading and trailing silence, counted in whole samples.
pub fn scan_silence(opener: &dyn StreamOpener, desc: &WaveDescriptor) -> Result<(u64, u64)> {
    let mut input = open_data(opener, desc)?;
    let mut progress = Progress::new(desc.data_size);
    let mut cache = ReadCache::new(&mut input, desc.data_size);

    let sample_size = desc.sample_size().max(1);
    let mut sample = vec![0u8; sample_size as usize];
    let mut leading = 0u64;
    let mut trailing = 0u64;
    let mut found_noise = false;
    let mut remaining = desc.data_size;

    while remaining > 0 {
        let n = remaining.min(sample_size) as usize;
        cache.read(&mut sample[..n], &mut progress)?;

        if sample[..n].iter().all(|&b| b == 0) {
            if !found_noise {
                leading += n as u64;
            }
            trailing += n as u64;
        } else {
            found_noise = true;
            trailing = 0;
        }
        remaining -= n as u64;
    }

    progress.success();
    Ok((leading, trailing))
}

/// Write a copy of `desc` without its leading and/or trailing silence.
///
/// # Arguments
/// * `opener` - Source of input and output streams
/// * `desc` - Parsed descriptor of the file to trim
/// * `ends` - Which ends to trim
/// * `naming` - Output naming rules; the default postfix is `-trimmed`
///
/// # Returns
/// Path of the trimmed file
pub fn trim_file(
    opener: &dyn StreamOpener,
    desc: &WaveDescriptor,
    ends: TrimEnds,
    naming: &OutputNaming,
) -> Result<PathBuf> {
    let outfile = naming.derived(&desc.path, "-trimmed");
    if files_are_identical(&desc.path, &outfile) {
        return Err(Error::skipped(desc.name(), "output file would overwrite input file"));
    }

    let (mut leading, mut trailing) = scan_silence(opener, desc)?;
    if leading == desc.data_size || trailing == desc.data_size {
        return Err(Error::skipped(desc.name(), "input file contains nothing but silence"));
    }
    if !ends.beginning {
        leading = 0;
    }
    if !ends.end {
        trailing = 0;
    }
    if leading + trailing == 0 {
        return Err(Error::skipped(
            desc.name(),
            format!("input file has no silence to trim from {}", ends.describe()),
        ));
    }

    let data_bytes = desc.data_size - leading - trailing;
    let has_null_pad = odd_sized_data_chunk_is_null_padded(opener, desc)?;
    let mut extra = desc.extra_riff_size;
    if desc.is_odd_sized() && !has_null_pad {
        extra += 1;
    }
    let extra = extra.max(0) as u64;

    let (mut header, mut input) = open_with_header(opener, desc)?;
    let header_size = desc.header_size;
    put_data_size(&mut header, header_size as usize, data_bytes);
    put_chunk_size(&mut header, header_size + data_bytes + (data_bytes & 1) + extra - 8);

    let mut out = PendingOutput::create(opener, &outfile)?;
    let mut progress = Progress::new(desc.total_size);

    out.writer()
        .write_all(&header)
        .map_err(|e| Error::io(format!("error while writing {}-byte WAVE header", header_size), e))?;
    progress.add(header_size);

    if skip_n(&mut input, leading, Some(&mut progress)) != leading {
        return Err(Error::short("trimming bytes from beginning of file", leading, 0));
    }

    let moved = transfer_n(&mut input, out.writer(), data_bytes, Some(&mut progress));
    if moved != data_bytes {
        return Err(Error::short("transferring untrimmed data", data_bytes, moved));
    }
    if data_bytes & 1 == 1 && write_padding(out.writer(), 1, None) != 1 {
        return Err(Error::short("NULL-padding odd-sized data chunk", 1, 0));
    }

    if skip_n(&mut input, trailing, Some(&mut progress)) != trailing {
        return Err(Error::short("trimming bytes from end of file", trailing, 0));
    }

    if desc.is_odd_sized() && has_null_pad {
        let mut nullpad = [0u8; 1];
        if read_n(&mut input, &mut nullpad, None) != 1 {
            return Err(Error::short("discarding NULL pad byte", 1, 0));
        }
    }

    if extra > 0 {
        let moved = transfer_n(&mut input, out.writer(), extra, Some(&mut progress));
        if moved != extra {
            return Err(Error::short("transferring extra RIFF chunks", extra, moved));
        }
    }

    out.commit()?;
    progress.success();
    info!(
        "Trimmed {} leading and {} trailing bytes of silence from [{}] --> [{}]",
        leading,
        trailing,
        desc.name(),
        outfile.display()
    );
    Ok(outfile)
}
