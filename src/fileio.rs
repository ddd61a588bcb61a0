//! Bounded byte transfer with optional dual destination and progress accounting.
//!
//! Every primitive here moves exactly `n` bytes or stops at the first short
//! read or write and returns what it managed. Short counts are logged at debug
//! level; deciding whether they are fatal is the caller's job.

use log::debug;
use std::io::{self, Read, Write};

use crate::wave::CD_BLOCK_SIZE;

/// Chunk size used for bulk transfers.
pub const XFER_SIZE: usize = 262_144;

/// Scratch buffer size for small reads such as tag probes.
pub const BUF_SIZE: usize = 2048;

/// Running byte count for one transfer target.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    pub bytes_written: u64,
    pub bytes_total: u64,
    last_percent: Option<u8>,
}

impl Progress {
    pub fn new(bytes_total: u64) -> Self {
        Progress {
            bytes_written: 0,
            bytes_total,
            last_percent: None,
        }
    }

    /// Start accounting against a new total.
    pub fn reset(&mut self, bytes_total: u64) {
        self.bytes_written = 0;
        self.bytes_total = bytes_total;
        self.last_percent = None;
    }

    pub fn add(&mut self, bytes: u64) {
        self.bytes_written += bytes;
        let pct = self.percent();
        if self.last_percent != Some(pct) {
            debug!("progress: {}% ({}/{})", pct, self.bytes_written, self.bytes_total);
            self.last_percent = Some(pct);
        }
    }

    /// Percentage done, clamped to 0..=100. An empty total reads as 0.
    pub fn percent(&self) -> u8 {
        if self.bytes_total == 0 {
            return 0;
        }
        let pct = self.bytes_written.saturating_mul(100) / self.bytes_total;
        pct.min(100) as u8
    }

    pub fn success(&mut self) {
        self.bytes_written = self.bytes_total;
        self.last_percent = Some(100);
    }
}

fn account(progress: Option<&mut Progress>, bytes: usize) {
    if let Some(p) = progress {
        p.add(bytes as u64);
    }
}

/// Fill `buf` from `input`, returning how many bytes were read.
pub fn read_n(input: &mut dyn Read, buf: &mut [u8], progress: Option<&mut Progress>) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("read error after {} bytes: {}", filled, e);
                break;
            }
        }
    }
    if filled != buf.len() {
        debug!("tried to read {} bytes, got {}", buf.len(), filled);
    }
    account(progress, filled);
    filled
}

/// Write all of `buf` to `output`, returning how many bytes went out.
pub fn write_n(output: &mut dyn Write, buf: &[u8], progress: Option<&mut Progress>) -> usize {
    let mut done = 0;
    while done < buf.len() {
        match output.write(&buf[done..]) {
            Ok(0) => break,
            Ok(n) => done += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("write error after {} bytes: {}", done, e);
                break;
            }
        }
    }
    if done != buf.len() {
        debug!("tried to write {} bytes, wrote {}", buf.len(), done);
    }
    account(progress, done);
    done
}

fn transfer(
    input: &mut dyn Read,
    out1: &mut dyn Write,
    mut out2: Option<&mut dyn Write>,
    bytes: u64,
    mut progress: Option<&mut Progress>,
) -> u64 {
    let mut buf = vec![0u8; (bytes.min(XFER_SIZE as u64)) as usize];
    let mut written = 0u64;

    while written < bytes {
        let want = (bytes - written).min(XFER_SIZE as u64) as usize;
        let got = read_n(input, &mut buf[..want], None);
        let mut put = write_n(out1, &buf[..got], progress.as_deref_mut());
        if let Some(second) = out2.as_deref_mut() {
            put = put.min(write_n(second, &buf[..got], None));
        }
        written += put as u64;

        if got != want || put != got {
            break;
        }
    }

    if written != bytes {
        debug!("transfer of {} bytes stopped after {}", bytes, written);
    }
    written
}

/// Copy `bytes` bytes from `input` to `output` in `XFER_SIZE` chunks.
pub fn transfer_n(
    input: &mut dyn Read,
    output: &mut dyn Write,
    bytes: u64,
    progress: Option<&mut Progress>,
) -> u64 {
    transfer(input, output, None, bytes, progress)
}

/// Like [`transfer_n`], but every chunk is also written to `second`.
/// The count returned is what reached both destinations.
pub fn transfer_n_tee(
    input: &mut dyn Read,
    first: &mut dyn Write,
    second: &mut dyn Write,
    bytes: u64,
    progress: Option<&mut Progress>,
) -> u64 {
    transfer(input, first, Some(second), bytes, progress)
}

/// Read and discard `bytes` bytes.
pub fn skip_n(input: &mut dyn Read, bytes: u64, progress: Option<&mut Progress>) -> u64 {
    transfer(input, &mut io::sink(), None, bytes, progress)
}

/// Zero-fill less than one CD block of output. Returns 0 for larger requests.
pub fn write_padding(output: &mut dyn Write, bytes: u64, progress: Option<&mut Progress>) -> u64 {
    if bytes >= CD_BLOCK_SIZE {
        debug!("refusing to pad {} bytes, limit is {}", bytes, CD_BLOCK_SIZE - 1);
        return 0;
    }
    let zeros = [0u8; CD_BLOCK_SIZE as usize];
    write_n(output, &zeros[..bytes as usize], progress) as u64
}

/// Decode a 4-byte synchsafe integer (7 significant bits per byte).
pub fn synchsafe_to_u32(buf: [u8; 4]) -> u32 {
    ((buf[0] as u32 & 0x7f) << 21)
        | ((buf[1] as u32 & 0x7f) << 14)
        | ((buf[2] as u32 & 0x7f) << 7)
        | (buf[3] as u32 & 0x7f)
}

/// Encode the low 28 bits of `value` as a synchsafe integer.
pub fn u32_to_synchsafe(value: u32) -> [u8; 4] {
    [
        ((value >> 21) & 0x7f) as u8,
        ((value >> 14) & 0x7f) as u8,
        ((value >> 7) & 0x7f) as u8,
        (value & 0x7f) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Writer that accepts a fixed number of bytes and then reports 0.
    struct Limited {
        data: Vec<u8>,
        cap: usize,
    }

    impl Write for Limited {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.cap - self.data.len();
            let n = room.min(buf.len());
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_read_n_short_count() {
        let mut input = Cursor::new(vec![1u8, 2, 3]);
        let mut buf = [0u8; 8];
        assert_eq!(read_n(&mut input, &mut buf, None), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
    }

    #[test]
    fn test_transfer_n_spans_chunks() {
        let len = XFER_SIZE * 2 + 17;
        let src: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let mut input = Cursor::new(src.clone());
        let mut out = Vec::new();
        let mut progress = Progress::new(len as u64);

        let n = transfer_n(&mut input, &mut out, len as u64, Some(&mut progress));

        assert_eq!(n, len as u64);
        assert_eq!(out, src);
        assert_eq!(progress.percent(), 100);
    }

    #[test]
    fn test_transfer_stops_at_short_read() {
        let mut input = Cursor::new(vec![7u8; 100]);
        let mut out = Vec::new();
        assert_eq!(transfer_n(&mut input, &mut out, 500, None), 100);
        assert_eq!(out.len(), 100);
    }

    #[test]
    fn test_transfer_stops_at_short_write() {
        let mut input = Cursor::new(vec![7u8; 100]);
        let mut out = Limited {
            data: Vec::new(),
            cap: 40,
        };
        assert_eq!(transfer_n(&mut input, &mut out, 100, None), 40);
    }

    #[test]
    fn test_tee_writes_both() {
        let mut input = Cursor::new(b"leadin".to_vec());
        let mut a = Vec::new();
        let mut b = Vec::new();
        assert_eq!(transfer_n_tee(&mut input, &mut a, &mut b, 6, None), 6);
        assert_eq!(a, b"leadin");
        assert_eq!(b, b"leadin");
    }

    #[test]
    fn test_tee_counts_short_second_destination() {
        let mut input = Cursor::new(vec![3u8; 100]);
        let mut a = Vec::new();
        let mut b = Limited {
            data: Vec::new(),
            cap: 30,
        };
        assert_eq!(transfer_n_tee(&mut input, &mut a, &mut b, 100, None), 30);
        assert_eq!(b.data.len(), 30);
    }

    #[test]
    fn test_write_padding_limit() {
        let mut out = Vec::new();
        assert_eq!(write_padding(&mut out, 2351, None), 2351);
        assert!(out.iter().all(|&b| b == 0));
        assert_eq!(write_padding(&mut out, 2352, None), 0);
        assert_eq!(out.len(), 2351);
    }

    #[test]
    fn test_progress_percent() {
        let mut p = Progress::new(0);
        p.add(10);
        assert_eq!(p.percent(), 0);

        p.reset(200);
        p.add(50);
        assert_eq!(p.percent(), 25);
        p.add(500);
        assert_eq!(p.percent(), 100);

        p.reset(10);
        p.success();
        assert_eq!(p.bytes_written, 10);
    }

    #[test]
    fn test_synchsafe() {
        assert_eq!(synchsafe_to_u32([0x00, 0x00, 0x02, 0x01]), 257);
        assert_eq!(synchsafe_to_u32([0x7f, 0x7f, 0x7f, 0x7f]), 0x0fff_ffff);
        assert_eq!(synchsafe_to_u32(u32_to_synchsafe(123_456)), 123_456);
    }
}
