//! MD5 and SHA1 fingerprints of PCM data, per file or over a whole
//! sequence of files as if their data were one stream.

use digest::Digest;
use log::{debug, info};
use std::io::Read;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::fileio::{read_n, Progress};
use crate::stream::{open_data, StreamOpener};
use crate::wave::WaveDescriptor;

/// Bytes handed to the digest per update.
pub const BLOCKSIZE: usize = 4096;

pub const COMPOSITE: &str = "composite";

/// The block-compression primitive behind a fingerprint.
pub trait BlockDigest {
    fn update_block(&mut self, block: &[u8]);
    fn finish_hex(self: Box<Self>) -> String;
}

impl<D: Digest> BlockDigest for D {
    fn update_block(&mut self, block: &[u8]) {
        Digest::update(self, block);
    }

    fn finish_hex(self: Box<Self>) -> String {
        (*self).finalize().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Md5,
    Sha1,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
        }
    }

    pub fn new_digest(&self) -> Box<dyn BlockDigest> {
        match self {
            HashAlgorithm::Md5 => Box::new(md5::Md5::new()),
            HashAlgorithm::Sha1 => Box::new(sha1::Sha1::new()),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" => Ok(HashAlgorithm::Sha1),
            other => Err(Error::user_input(format!("invalid hash algorithm: [{}]", other))),
        }
    }
}

/// Digest state plus the partial block left over from the last stream.
pub struct HashAccumulator {
    digest: Box<dyn BlockDigest>,
    carry: Vec<u8>,
    carry_len: usize,
}

impl HashAccumulator {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        HashAccumulator {
            digest: algorithm.new_digest(),
            carry: vec![0u8; BLOCKSIZE],
            carry_len: 0,
        }
    }

    /// Bytes waiting for a full block.
    pub fn carried(&self) -> usize {
        self.carry_len
    }

    /// Feed up to `bytes` bytes of `input`, topping up the carried partial
    /// block first. Returns how many bytes were read.
    pub fn feed(&mut self, input: &mut dyn Read, bytes: u64, mut progress: Option<&mut Progress>) -> u64 {
        let mut left = bytes;
        while left > 0 {
            let want = ((BLOCKSIZE - self.carry_len) as u64).min(left) as usize;
            let end = self.carry_len + want;
            let got = read_n(input, &mut self.carry[self.carry_len..end], progress.as_deref_mut());
            self.carry_len += got;
            left -= got as u64;
            if self.carry_len == BLOCKSIZE {
                self.digest.update_block(&self.carry);
                self.carry_len = 0;
            }
            if got < want {
                break;
            }
        }
        bytes - left
    }

    pub fn finish(mut self) -> String {
        if self.carry_len > 0 {
            self.digest.update_block(&self.carry[..self.carry_len]);
        }
        self.digest.finish_hex()
    }
}

fn feed_file(acc: &mut HashAccumulator, opener: &dyn StreamOpener, desc: &WaveDescriptor) -> Result<()> {
    let mut input = open_data(opener, desc)?;
    let mut progress = Progress::new(desc.data_size);
    let fed = acc.feed(&mut input, desc.data_size, Some(&mut progress));
    if fed != desc.data_size {
        return Err(Error::short(
            format!("hashing possibly truncated and/or corrupt file: [{}]", desc.name()),
            desc.data_size,
            fed,
        ));
    }
    progress.success();
    debug!("hashed {} bytes of [{}], {} carried", fed, desc.name(), acc.carried());
    Ok(())
}

/// Fingerprint of one file's PCM data.
pub fn hash_file(opener: &dyn StreamOpener, desc: &WaveDescriptor, algorithm: HashAlgorithm) -> Result<String> {
    let mut acc = HashAccumulator::new(algorithm);
    feed_file(&mut acc, opener, desc)?;
    Ok(acc.finish())
}

/// One fingerprint over the PCM data of every file, in order.
pub fn hash_composite(opener: &dyn StreamOpener, files: &[WaveDescriptor], algorithm: HashAlgorithm) -> Result<String> {
    if files.is_empty() {
        return Err(Error::user_input("need at least one valid file to process"));
    }
    let mut acc = HashAccumulator::new(algorithm);
    for desc in files {
        feed_file(&mut acc, opener, desc)?;
    }
    info!("computed {} fingerprint over {} files", algorithm.as_str(), files.len());
    Ok(acc.finish())
}

/// `<hex>  [wavekit]  <name>`
pub fn format_hash_line(hex: &str, name: &str) -> String {
    format!("{}  [wavekit]  {}", hex, name)
}
