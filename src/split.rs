//! Cutting one file into pieces at byte offsets, CUE sheet INDEX points or
//! a fixed repeat length, with optional overlapping lead-in and lead-out.

use log::{info, warn};
use std::path::PathBuf;

use crate::cuefile::{CueInfo, SplitPointReader};
use crate::error::{Error, Result};
use crate::fileio::{transfer_n, transfer_n_tee, write_padding, Progress};
use crate::header::make_canonical_header;
use crate::length::parse_length;
use crate::stream::{open_data, OutputNaming, PendingOutput, StreamOpener};
use crate::wave::{WaveDescriptor, CD_BLOCK_SIZE, CD_MIN_BURNABLE_SIZE};

pub const SPLIT_MAX_PIECES: usize = 256;
pub const SPLIT_PREFIX: &str = "split-track";

/// Where the split points come from.
#[derive(Debug, Clone, Copy)]
pub enum SplitPoints<'a> {
    /// One length per line, or a CUE sheet
    Text(&'a str),
    /// Pieces of this length, the last one taking the remainder
    Repeat(&'a str),
}

#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub leadin: Option<String>,
    pub leadout: Option<String>,
    /// Track list such as `1,3-5,7-`
    pub tracks: Option<String>,
    /// Output name template using %p %a %t %n (CUE input only)
    pub template: Option<String>,
    /// Character pairs: each first character is replaced by the second
    pub remap: Option<String>,
    pub number_width: usize,
    /// Number of the first piece
    pub offset: i64,
    pub naming: OutputNaming,
}

impl Default for SplitOptions {
    fn default() -> Self {
        SplitOptions {
            leadin: None,
            leadout: None,
            tracks: None,
            template: None,
            remap: None,
            number_width: 2,
            offset: 1,
            naming: OutputNaming::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SplitReport {
    /// Descriptors of every piece, extracted or not
    pub pieces: Vec<WaveDescriptor>,
    pub outputs: Vec<PathBuf>,
}

fn atoi(s: &str) -> i64 {
    let s = s.trim();
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// Which pieces to write, from a list such as `1,3-5,7-`.
pub fn parse_track_list(list: Option<&str>) -> Result<Vec<bool>> {
    let Some(list) = list else {
        return Ok(vec![true; SPLIT_MAX_PIECES]);
    };

    let max = SPLIT_MAX_PIECES as i64;
    let mut extract = vec![false; SPLIT_MAX_PIECES];
    for part in list.split(',').filter(|p| !p.is_empty()) {
        let (mut start, mut end) = match part.split_once('-') {
            Some((a, "")) => (atoi(a), max),
            Some((a, b)) => (atoi(a), atoi(b)),
            None => (atoi(part), atoi(part)),
        };
        if start > end {
            std::mem::swap(&mut start, &mut end);
        }
        for n in [start, end] {
            if n < 1 || n > max {
                return Err(Error::user_input(format!(
                    "track number to extract ({}) is not in range [1 .. {}]",
                    n, max
                )));
            }
        }
        for slot in &mut extract[(start - 1) as usize..end as usize] {
            *slot = true;
        }
    }
    Ok(extract)
}

/// Apply character pairs from `remap` to `name`, in order.
pub fn remap_chars(name: &str, remap: &str) -> String {
    let pairs: Vec<char> = remap.chars().collect();
    let mut out = name.to_string();
    for pair in pairs.chunks_exact(2) {
        out = out.replace(pair[0], &pair[1].to_string());
    }
    out
}

fn format_number(n: i64, width: usize) -> String {
    format!("{:0width$}", n, width = width)
}

/// Expand `%a` album, `%p` performer, `%t` title and `%n` number for track `index`.
pub fn expand_template(template: &str, cue: &CueInfo, index: usize, width: usize, offset: i64) -> String {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' {
            let expansion = match chars.peek() {
                Some('a') => Some(cue.album.clone()),
                Some('p') => Some(cue.track_artist(index).to_string()),
                Some('t') => Some(cue.title(index).to_string()),
                Some('n') => Some(format_number(index as i64 + offset, width)),
                _ => None,
            };
            if let Some(text) = expansion {
                out.push_str(&text);
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn warn_piece_bounds(index: usize, data_size: u64, extract: bool) {
    if !extract {
        return;
    }
    let bad_bound = data_size % CD_BLOCK_SIZE != 0;
    if data_size < CD_MIN_BURNABLE_SIZE {
        warn!(
            "file {} will be too short to be burned{}",
            index + 1,
            if bad_bound { ", and will not be cut on a sector boundary" } else { "" }
        );
    } else if bad_bound {
        warn!("file {} will not be cut on a sector boundary", index + 1);
    }
}

/// Sizes of every piece before lead-in/lead-out, plus CUE fields when the
/// points came from a CUE sheet.
struct PiecePlan {
    sizes: Vec<u64>,
    cue: Option<CueInfo>,
    offset: i64,
}

fn plan_pieces(desc: &WaveDescriptor, points: SplitPoints, extract: &[bool], offset: i64) -> Result<PiecePlan> {
    let cd = desc.is_cd_quality();
    let mut sizes = Vec::new();
    let mut ends: Vec<u64> = Vec::new();
    let mut offset = offset;
    let mut cue = None;

    match points {
        SplitPoints::Repeat(len) => {
            let len = parse_length(len, desc)?;
            if len == 0 {
                return Err(Error::user_input("repeated split size must be greater than zero"));
            }
            if len >= desc.data_size {
                return Err(Error::user_input(
                    "repeated split size is not less than data size of input file -- nothing to do",
                ));
            }
            let mut bytes_left = desc.data_size;
            while bytes_left > len {
                if sizes.len() == SPLIT_MAX_PIECES - 1 {
                    return Err(Error::user_input(format!(
                        "too many split files would be created -- maximum is {}",
                        SPLIT_MAX_PIECES
                    )));
                }
                if cd {
                    warn_piece_bounds(sizes.len(), len, extract[sizes.len()]);
                }
                sizes.push(len);
                ends.push(sizes.len() as u64 * len);
                bytes_left -= len;
            }
        }
        SplitPoints::Text(text) => {
            let mut reader = SplitPointReader::new(text);
            let mut previous = 0u64;
            while let Some(token) = reader.next() {
                let current = parse_length(&token, desc)?;
                if sizes.is_empty() && current == 0 {
                    warn!("discarding initial zero-valued split point");
                    continue;
                }
                if sizes.len() == SPLIT_MAX_PIECES - 1 {
                    return Err(Error::user_input(format!(
                        "too many split files would be created -- maximum is {}",
                        SPLIT_MAX_PIECES
                    )));
                }
                if current <= previous {
                    return Err(Error::user_input(format!(
                        "split point {} is not greater than previous split point {}",
                        current, previous
                    )));
                }
                let size = current - previous;
                if cd {
                    warn_piece_bounds(sizes.len(), size, extract[sizes.len()]);
                }
                sizes.push(size);
                ends.push(current);

                if reader.is_cue() && reader.cue.trackno == 1 {
                    reader.cue.insert_pregap();
                    offset -= 1;
                }
                previous = current;
            }
            if reader.is_cue() {
                cue = Some(reader.cue);
            }
        }
    }

    let Some(&last_end) = ends.last() else {
        return Err(Error::user_input("no split points given -- nothing to do"));
    };
    if last_end > desc.data_size {
        return Err(Error::user_input("split points go beyond input file's data size"));
    }
    if last_end < desc.data_size {
        let size = desc.data_size - last_end;
        if cd {
            warn_piece_bounds(sizes.len(), size, extract[sizes.len()]);
        }
        sizes.push(size);
    }

    Ok(PiecePlan { sizes, cue, offset })
}

fn piece_names(plan: &mut PiecePlan, opts: &SplitOptions, extract: &[bool]) -> Result<Vec<PathBuf>> {
    let count = plan.sizes.len();

    let template = match (&opts.template, plan.cue.as_mut()) {
        (Some(t), Some(cue)) => Some((t, cue)),
        _ => None,
    };

    let Some((template, cue)) = template else {
        if opts.template.is_some() {
            warn!("name template ignored: split points did not come from a CUE sheet");
        }
        return Ok((0..count)
            .map(|i| {
                let number = format_number(i as i64 + plan.offset, opts.number_width);
                opts.naming.named(&number, SPLIT_PREFIX)
            })
            .collect());
    };

    if cue.trackno < count {
        return Err(Error::user_input(
            "not enough TITLE keywords in CUE sheet to name each output file",
        ));
    }
    cue.fill_artists();

    let mut names = Vec::with_capacity(cue.trackno);
    for i in 0..cue.trackno {
        let mut name = expand_template(template, cue, i, opts.number_width, plan.offset);
        if let Some(remap) = &opts.remap {
            name = remap_chars(&name, remap);
        }
        if name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
            if extract.get(i).copied().unwrap_or(false) {
                warn!(
                    "converting illegal path character to '-' in CUE-originated filename: [{}]",
                    name
                );
            }
            name = name.replace(std::path::MAIN_SEPARATOR, "-").replace('/', "-");
        }
        names.push(name);
    }

    for (i, a) in names.iter().enumerate() {
        if names[i + 1..].contains(a) {
            return Err(Error::user_input(format!("detected duplicate filenames: [{}]", a)));
        }
    }

    let naming = OutputNaming {
        prefix: Some(opts.naming.prefix.clone().unwrap_or_default()),
        ..opts.naming.clone()
    };
    Ok(names[..count].iter().map(|n| naming.named(n, "")).collect())
}

/// Check lead lengths against the pieces and turn each size into a piece
/// descriptor whose `data_size` includes both overlaps and whose
/// `new_data_size` is the piece's own share of the input.
fn apply_leads(desc: &WaveDescriptor, sizes: &[u64], names: &[PathBuf], leadin: u64, leadout: u64) -> Result<Vec<WaveDescriptor>> {
    let last = sizes.len() - 1;

    for i in 0..sizes.len() {
        if i != 0 && sizes[i - 1] < leadin {
            return Err(Error::user_input("lead-in length exceeds length of one or more files"));
        }
        if i != last && sizes[i + 1] < leadout {
            return Err(Error::user_input("lead-out length exceeds length of one or more files"));
        }
        let taken = if i != 0 { leadout } else { 0 } + if i != last { leadin } else { 0 };
        if sizes[i] < taken {
            return Err(Error::user_input(format!(
                "piece {} is too short to hold both lead-in and lead-out",
                i + 1
            )));
        }
    }

    Ok(sizes
        .iter()
        .enumerate()
        .map(|(i, &size)| {
            let on_disk = size + if i != 0 { leadin } else { 0 } + if i != last { leadout } else { 0 };
            let mut piece = WaveDescriptor::with_format_of(&names[i], desc, on_disk);
            piece.new_data_size = size as i64;
            piece
        })
        .collect())
}

/// Split `desc` into pieces.
///
/// # Arguments
/// * `opener` - Source of input and output streams
/// * `desc` - Parsed descriptor of the file to split
/// * `points` - Split point text or a repeat length
/// * `opts` - Lead-in/out, track selection and naming
///
/// # Returns
/// Every planned piece and the paths that were written
pub fn split_file(
    opener: &dyn StreamOpener,
    desc: &WaveDescriptor,
    points: SplitPoints,
    opts: &SplitOptions,
) -> Result<SplitReport> {
    let extract = parse_track_list(opts.tracks.as_deref())?;
    let mut plan = plan_pieces(desc, points, &extract, opts.offset)?;
    let names = piece_names(&mut plan, opts, &extract)?;

    let leadin = match &opts.leadin {
        Some(s) => parse_length(s, desc)?,
        None => 0,
    };
    let leadout = match &opts.leadout {
        Some(s) => parse_length(s, desc)?,
        None => 0,
    };
    let pieces = apply_leads(desc, &plan.sizes, &names, leadin, leadout)?;

    let total: i64 = pieces.iter().map(|p| p.new_data_size).sum();
    if total != desc.data_size as i64 {
        return Err(Error::consistency(format!(
            "split pieces add up to {} bytes, input has {}",
            total, desc.data_size
        )));
    }

    let mut input = open_data(opener, desc)?;
    let last = pieces.len() - 1;
    let mut outputs = Vec::new();
    let mut previous: Option<PendingOutput> = None;

    for (i, piece) in pieces.iter().enumerate() {
        let mut current = if extract[i] {
            info!("Splitting [{}] --> [{}] ({})", desc.name(), piece.name(), piece.length_str(false));
            PendingOutput::create(opener, &piece.path)?
        } else {
            info!("Skipping piece {} ({})", i + 1, piece.length_str(false));
            PendingOutput::null(opener)
        };
        let mut progress = Progress::new(piece.total_size);

        let header = make_canonical_header(piece);
        current
            .writer()
            .write_all(&header)
            .map_err(|e| Error::io(format!("error while writing {}-byte WAVE header", header.len()), e))?;
        progress.add(header.len() as u64);

        if let Some(mut prev) = previous.take() {
            let overlap = leadin + leadout;
            let moved = transfer_n_tee(&mut input, current.writer(), prev.writer(), overlap, Some(&mut progress));
            if moved != overlap {
                return Err(Error::short("transferring lead-in/lead-out", overlap, moved));
            }
            if pieces[i - 1].is_odd_sized() && write_padding(prev.writer(), 1, None) != 1 {
                return Err(Error::short("NULL-padding odd-sized data chunk", 1, 0));
            }
            prev.commit()?;
        }

        let mut unique = piece.new_data_size as u64;
        if i != 0 {
            unique -= leadout;
        }
        if i != last {
            unique -= leadin;
        }
        let moved = transfer_n(&mut input, current.writer(), unique, Some(&mut progress));
        if moved != unique {
            return Err(Error::short(format!("transferring data of piece {}", i + 1), unique, moved));
        }

        if extract[i] {
            outputs.push(piece.path.clone());
        }

        if i == last {
            if piece.is_odd_sized() && write_padding(current.writer(), 1, None) != 1 {
                return Err(Error::short("NULL-padding odd-sized data chunk", 1, 0));
            }
            current.commit()?;
        } else {
            previous = Some(current);
        }
        progress.success();
    }

    Ok(SplitReport { pieces, outputs })
}
