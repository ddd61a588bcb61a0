//! Opening inputs and outputs, output naming, and cleanup of partial outputs.

use log::{debug, warn};
use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::fileio::{skip_n, synchsafe_to_u32};
use crate::wave::WaveDescriptor;

const ID3V2_MAGIC: &[u8; 3] = b"ID3";
const ID3V2_HEADER_SIZE: u64 = 10;

/// An opened input, positioned after any leading tag.
pub struct InputStream {
    pub reader: Box<dyn Read>,
    /// Bytes skipped before the RIFF header (tag header included)
    pub tag_size: u64,
    pub actual_size: Option<u64>,
}

/// Where bytes come from and go to.
///
/// The filesystem implementation is [`FileOpener`]; other implementations
/// may front decoders or encoders.
pub trait StreamOpener {
    fn open_input(&self, path: &Path) -> Result<InputStream>;

    fn open_output(&self, path: &Path) -> Result<Box<dyn Write>>;

    /// Correct `data_size`/`chunk_size` when the source cannot report them.
    fn header_kluge(&self, _desc: &mut WaveDescriptor) -> Result<()> {
        Ok(())
    }

    /// Remove a partially written output.
    fn remove_output(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            debug!("could not remove [{}]: {}", path.display(), e);
        }
    }
}

/// Size of the ID3v2 tag at the start of `header`, if there is one.
/// The returned size excludes the 10-byte tag header.
pub fn check_for_id3v2_tag(header: &[u8; 10]) -> Option<u64> {
    if &header[0..3] != ID3V2_MAGIC || header[3] == 0xff || header[4] == 0xff {
        return None;
    }
    let size = [header[6], header[7], header[8], header[9]];
    if size.iter().any(|&b| b >= 0x80) {
        return None;
    }
    Some(synchsafe_to_u32(size) as u64)
}

/// Plain files on disk.
#[derive(Debug, Clone, Default)]
pub struct FileOpener {
    pub clobber: bool,
}

impl FileOpener {
    pub fn new(clobber: bool) -> Self {
        FileOpener { clobber }
    }
}

impl StreamOpener for FileOpener {
    fn open_input(&self, path: &Path) -> Result<InputStream> {
        let context = || format!("could not open input file [{}]", path.display());
        let mut file = File::open(path).map_err(|e| Error::io(context(), e))?;
        let actual_size = file.metadata().map_err(|e| Error::io(context(), e))?.len();

        let mut probe = [0u8; ID3V2_HEADER_SIZE as usize];
        let mut tag_size = 0;
        if file.read_exact(&mut probe).is_ok() {
            if let Some(size) = check_for_id3v2_tag(&probe) {
                tag_size = size + ID3V2_HEADER_SIZE;
                debug!("discarding {}-byte ID3v2 tag at beginning of file: [{}]", tag_size, path.display());
            }
        }
        file.seek(SeekFrom::Start(tag_size)).map_err(|e| Error::io(context(), e))?;

        Ok(InputStream {
            reader: Box::new(BufReader::new(file)),
            tag_size,
            actual_size: Some(actual_size),
        })
    }

    fn open_output(&self, path: &Path) -> Result<Box<dyn Write>> {
        if !self.clobber && path.exists() {
            return Err(Error::io(
                format!("refusing to overwrite [{}]", path.display()),
                io::Error::new(io::ErrorKind::AlreadyExists, "output file exists"),
            ));
        }
        let file = File::create(path)
            .map_err(|e| Error::io(format!("could not open output file [{}]", path.display()), e))?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

/// Reopen the input of `desc` and read past its header, leaving the stream
/// at the first byte of PCM data.
pub fn open_data(opener: &dyn StreamOpener, desc: &WaveDescriptor) -> Result<Box<dyn Read>> {
    let mut stream = opener.open_input(&desc.path)?;
    let skipped = skip_n(&mut stream.reader, desc.header_size, None);
    if skipped != desc.header_size {
        return Err(Error::short(
            format!("discarding WAVE header of [{}]", desc.name()),
            desc.header_size,
            skipped,
        ));
    }
    Ok(stream.reader)
}

/// Read the raw header bytes of `desc` from a fresh stream, returning the
/// header and the stream positioned just after it.
pub fn open_with_header(opener: &dyn StreamOpener, desc: &WaveDescriptor) -> Result<(Vec<u8>, Box<dyn Read>)> {
    let mut stream = opener.open_input(&desc.path)?;
    let mut header = vec![0u8; desc.header_size as usize];
    let got = crate::fileio::read_n(&mut stream.reader, &mut header, None);
    if got != header.len() {
        return Err(Error::short(
            format!("reading WAVE header of [{}]", desc.name()),
            desc.header_size,
            got as u64,
        ));
    }
    Ok((header, stream.reader))
}

/// An output being written. Unless [`PendingOutput::commit`] is called the
/// file is removed when the guard goes away.
pub struct PendingOutput<'a> {
    opener: &'a dyn StreamOpener,
    path: Option<PathBuf>,
    writer: Option<Box<dyn Write>>,
}

impl<'a> PendingOutput<'a> {
    pub fn create(opener: &'a dyn StreamOpener, path: &Path) -> Result<Self> {
        let writer = opener.open_output(path)?;
        Ok(PendingOutput {
            opener,
            path: Some(path.to_path_buf()),
            writer: Some(writer),
        })
    }

    /// A sink that discards everything written to it.
    pub fn null(opener: &'a dyn StreamOpener) -> Self {
        PendingOutput {
            opener,
            path: None,
            writer: Some(Box::new(io::sink())),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn label(&self) -> String {
        match &self.path {
            Some(p) => p.display().to_string(),
            None => "null device".to_string(),
        }
    }

    pub fn writer(&mut self) -> &mut dyn Write {
        self.writer
            .get_or_insert_with(|| Box::new(io::sink()))
            .as_mut()
    }

    /// Flush and keep the output.
    pub fn commit(mut self) -> Result<()> {
        let label = self.label();
        if let Some(mut w) = self.writer.take() {
            w.flush()
                .map_err(|e| Error::io(format!("could not finish writing [{}]", label), e))?;
        }
        self.path = None;
        Ok(())
    }
}

impl Drop for PendingOutput<'_> {
    fn drop(&mut self) {
        self.writer.take();
        if let Some(path) = self.path.take() {
            warn!("removing partial output file: [{}]", path.display());
            self.opener.remove_output(&path);
        }
    }
}

/// Naming rules for output files.
#[derive(Debug, Clone, Default)]
pub struct OutputNaming {
    pub dir: Option<PathBuf>,
    pub prefix: Option<String>,
    pub postfix: Option<String>,
    pub extension: Option<String>,
}

impl OutputNaming {
    fn place(&self, file_name: String) -> PathBuf {
        match &self.dir {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        }
    }

    fn ext(&self) -> &str {
        self.extension.as_deref().unwrap_or("wav")
    }

    /// `<dir>/<prefix><input stem><postfix>.wav`, for modes that rewrite one file.
    pub fn derived(&self, input: &Path, default_postfix: &str) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let prefix = self.prefix.as_deref().unwrap_or("");
        let postfix = self.postfix.as_deref().unwrap_or(default_postfix);
        self.place(format!("{}{}{}.{}", prefix, stem, postfix, self.ext()))
    }

    /// `<dir>/<prefix><base><postfix>.wav`, for modes that create files from scratch.
    pub fn named(&self, base: &str, default_prefix: &str) -> PathBuf {
        let prefix = self.prefix.as_deref().unwrap_or(default_prefix);
        let postfix = self.postfix.as_deref().unwrap_or("");
        self.place(format!("{}{}{}.{}", prefix, base, postfix, self.ext()))
    }
}

/// Whether two paths name the same existing file.
pub fn files_are_identical(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}

/// Input ordering for multi-file modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileOrder {
    /// Keep the order given
    None,
    Ascii,
    /// Compare digit runs numerically ("track2" before "track10")
    #[default]
    Natural,
}

impl std::str::FromStr for FileOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(FileOrder::None),
            "ascii" => Ok(FileOrder::Ascii),
            "natural" => Ok(FileOrder::Natural),
            other => Err(Error::user_input(format!("invalid file ordering: [{}]", other))),
        }
    }
}

fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut x, mut y) = (a.as_bytes(), b.as_bytes());
    loop {
        match (x.first(), y.first()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(c), Some(d)) if c.is_ascii_digit() && d.is_ascii_digit() => {
                let xl = x.iter().take_while(|b| b.is_ascii_digit()).count();
                let yl = y.iter().take_while(|b| b.is_ascii_digit()).count();
                let xs = trim_zeros(&x[..xl]);
                let ys = trim_zeros(&y[..yl]);
                let ord = xs.len().cmp(&ys.len()).then_with(|| xs.cmp(ys));
                if ord != Ordering::Equal {
                    return ord;
                }
                x = &x[xl..];
                y = &y[yl..];
            }
            (Some(c), Some(d)) => {
                if c != d {
                    return c.cmp(d);
                }
                x = &x[1..];
                y = &y[1..];
            }
        }
    }
}

fn trim_zeros(digits: &[u8]) -> &[u8] {
    let n = digits.iter().take_while(|&&b| b == b'0').count();
    &digits[n..]
}

/// Sort descriptors by file name according to `order`.
pub fn reorder_files(files: &mut [WaveDescriptor], order: FileOrder) {
    match order {
        FileOrder::None => {}
        FileOrder::Ascii => files.sort_by(|a, b| a.name().cmp(&b.name())),
        FileOrder::Natural => files.sort_by(|a, b| natural_cmp(&a.name(), &b.name())),
    }
}
