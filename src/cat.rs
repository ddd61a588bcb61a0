//! Streaming the parts of a file (header, data, pad byte, extra chunks) to one writer.

use log::debug;
use std::io::{self, Write};

use crate::error::{Error, Result};
use crate::fileio::{read_n, transfer_n, write_n, Progress};
use crate::stream::{open_with_header, StreamOpener};
use crate::wave::{Problem, WaveDescriptor};

/// Which parts of each file are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatParts {
    pub header: bool,
    pub data: bool,
    /// NULL pad byte after odd-sized data, if present
    pub pad: bool,
    /// RIFF chunks after the data chunk
    pub extra: bool,
}

impl Default for CatParts {
    fn default() -> Self {
        CatParts {
            header: true,
            data: true,
            pad: true,
            extra: true,
        }
    }
}

impl CatParts {
    pub fn validate(&self) -> Result<()> {
        if !self.header && !self.data && !self.extra {
            return Err(Error::user_input(
                "nothing to do if WAVE header, data and extra RIFF chunks are suppressed",
            ));
        }
        Ok(())
    }
}

/// Write the selected parts of `desc` to `out`.
///
/// # Returns
/// Number of bytes written to `out`
pub fn cat_file(opener: &dyn StreamOpener, desc: &WaveDescriptor, parts: CatParts, out: &mut dyn Write) -> Result<u64> {
    parts.validate()?;
    if !parts.header && !parts.data && !desc.has(Problem::ExtraChunks) {
        return Err(Error::skipped(
            desc.name(),
            "input file contains no extra RIFF chunks -- nothing to do",
        ));
    }

    let (header, mut input) = open_with_header(opener, desc)?;
    let mut progress = Progress::new(desc.total_size);
    let mut written = 0u64;

    if parts.header {
        if write_n(out, &header, Some(&mut progress)) != header.len() {
            return Err(Error::short(
                format!("writing {}-byte WAVE header", header.len()),
                header.len() as u64,
                0,
            ));
        }
        written += header.len() as u64;
    } else {
        progress.add(header.len() as u64);
    }

    let mut sink = io::sink();
    let data_dest: &mut dyn Write = if parts.data { &mut *out } else { &mut sink as &mut dyn Write };
    let moved = transfer_n(&mut input, data_dest, desc.data_size, Some(&mut progress));
    if moved != desc.data_size {
        return Err(Error::short("transferring data chunk", desc.data_size, moved));
    }
    if parts.data {
        written += moved;
    }

    if desc.is_odd_sized() {
        let mut pad = [1u8; 1];
        let got = read_n(&mut input, &mut pad, None);
        if got == 0 || pad[0] != 0 {
            debug!("[{}] has no NULL pad byte after odd-sized data chunk", desc.name());
        }
        if got == 1 {
            let byte_dest: Option<&mut dyn Write> = if pad[0] == 0 && parts.pad {
                Some(if parts.data { &mut *out } else { &mut sink as &mut dyn Write })
            } else if pad[0] != 0 && parts.extra {
                Some(&mut *out)
            } else {
                None
            };
            if let Some(dest) = byte_dest {
                if write_n(dest, &pad, Some(&mut progress)) != 1 {
                    return Err(Error::short("writing byte after odd-sized data chunk", 1, 0));
                }
                if pad[0] != 0 || parts.data {
                    written += 1;
                }
            }
        }
    }

    if parts.extra && desc.has(Problem::ExtraChunks) {
        let extra = desc.extra_riff_size.max(0) as u64;
        let moved = transfer_n(&mut input, out, extra, Some(&mut progress));
        if moved != extra {
            return Err(Error::short("transferring extra RIFF chunks", extra, moved));
        }
        written += moved;
    }

    out.flush()
        .map_err(|e| Error::io(format!("error while writing [{}]", desc.name()), e))?;
    progress.success();
    Ok(written)
}
