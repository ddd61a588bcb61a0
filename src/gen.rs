//! Generating CD-quality silence.

use log::info;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::fileio::{write_padding, Progress, XFER_SIZE};
use crate::header::make_canonical_header;
use crate::length::parse_length;
use crate::stream::{OutputNaming, PendingOutput, StreamOpener};
use crate::wave::WaveDescriptor;

pub const GEN_PREFIX: &str = "silence";

/// Write `length` of CD-quality silence, named `silence.wav` by default.
///
/// # Arguments
/// * `opener` - Source of the output stream
/// * `length` - Any accepted length encoding, read at the CD rate
/// * `naming` - Output naming rules
///
/// # Returns
/// Path of the generated file
pub fn generate_silence(opener: &dyn StreamOpener, length: &str, naming: &OutputNaming) -> Result<PathBuf> {
    let template = WaveDescriptor::cd_quality("", 0);
    let bytes = parse_length(length, &template)?;

    let outfile = naming.named("", GEN_PREFIX);
    let desc = WaveDescriptor::cd_quality(&outfile, bytes);
    let header = make_canonical_header(&desc);

    let mut out = PendingOutput::create(opener, &outfile)?;
    let mut progress = Progress::new(desc.total_size);
    out.writer()
        .write_all(&header)
        .map_err(|e| Error::io(format!("error while writing {}-byte WAVE header", header.len()), e))?;
    progress.add(header.len() as u64);

    let silence = vec![0u8; XFER_SIZE];
    let mut left = bytes;
    while left > 0 {
        let n = left.min(XFER_SIZE as u64) as usize;
        out.writer()
            .write_all(&silence[..n])
            .map_err(|e| Error::io(format!("error while writing {}-byte chunk of silence", n), e))?;
        progress.add(n as u64);
        left -= n as u64;
    }

    if desc.is_odd_sized() && write_padding(out.writer(), 1, None) != 1 {
        return Err(Error::short("NULL-padding odd-sized data chunk", 1, 0));
    }

    out.commit()?;
    progress.success();
    info!("Generated [{}] ({})", outfile.display(), desc.length_str(false));
    Ok(outfile)
}
