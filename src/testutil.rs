//! Helpers for building WAVE files in unit tests.

use std::fs;
use std::path::{Path, PathBuf};

use crate::header::make_canonical_header;
use crate::wave::WaveDescriptor;

/// Canonical CD-quality file around `data`, NULL-padded when odd.
pub fn write_wave(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let desc = WaveDescriptor::cd_quality(name, data.len() as u64);
    write_wave_as(dir, name, &desc, data)
}

/// Canonical file with the format of `desc` around `data`.
pub fn write_wave_as(dir: &Path, name: &str, desc: &WaveDescriptor, data: &[u8]) -> PathBuf {
    let desc = WaveDescriptor::with_format_of(name, desc, data.len() as u64);
    let mut bytes = make_canonical_header(&desc).to_vec();
    bytes.extend_from_slice(data);
    if data.len() % 2 == 1 {
        bytes.push(0);
    }
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

/// PCM payload of a file written by [`write_wave`].
pub fn read_payload(path: &Path) -> Vec<u8> {
    let bytes = fs::read(path).unwrap();
    let desc = WaveDescriptor::parse(&mut bytes.as_slice(), path).unwrap();
    let start = desc.header_size as usize;
    bytes[start..start + desc.data_size as usize].to_vec()
}
