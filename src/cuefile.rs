//! CUE sheet reading for split points and CUE sheet generation.
//!
//! Split points come either as raw length tokens, one per line, or from the
//! `INDEX 01` lines of a CUE sheet. The kind is decided from the first
//! non-blank line. While reading a CUE sheet the album, artist and per-track
//! TITLE/PERFORMER fields are collected for output naming.

use crate::error::{Error, Result};
use crate::length::cue_timestamp;
use crate::wave::{check_compatible, Problem, WaveDescriptor};

/// Keywords that mark the first line of a CUE sheet.
const CUE_KEYWORDS: [&str; 17] = [
    "FILE",
    "CATALOG",
    "CDTEXTFILE",
    "REM",
    "TITLE",
    "PERFORMER",
    "SONGWRITER",
    "COMPOSER",
    "ARRANGER",
    "MESSAGE",
    "DISC_ID",
    "GENRE",
    "TOC_INFO",
    "TOC_INFO2",
    "UPC_EAN",
    "ISRC",
    "SIZE_INFO",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitInputKind {
    Unknown,
    Raw,
    Cue,
}

/// Fields collected from a CUE sheet.
#[derive(Debug, Clone, Default)]
pub struct CueInfo {
    pub album: String,
    pub artist: String,
    /// Indexed by track number - 1
    pub titles: Vec<String>,
    pub artists: Vec<String>,
    pub trackno: usize,
    in_global_section: bool,
}

fn set_slot(slots: &mut Vec<String>, index: usize, value: String) {
    if slots.len() <= index {
        slots.resize(index + 1, String::new());
    }
    slots[index] = value;
}

impl CueInfo {
    fn new() -> Self {
        CueInfo {
            in_global_section: true,
            ..Default::default()
        }
    }

    pub fn title(&self, index: usize) -> &str {
        self.titles.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn track_artist(&self, index: usize) -> &str {
        self.artists.get(index).map(String::as_str).unwrap_or("")
    }

    /// A split point arriving while still in track 1 means track 1 starts
    /// after a pregap, which becomes a piece of its own.
    pub fn insert_pregap(&mut self) {
        let first = self.title(0).to_string();
        set_slot(&mut self.titles, 1, first);
        set_slot(&mut self.titles, 0, "pregap".to_string());
        self.trackno += 1;
    }

    /// Fill missing per-track artists from the global PERFORMER.
    pub fn fill_artists(&mut self) {
        for i in 0..self.trackno {
            if self.track_artist(i).is_empty() {
                let artist = self.artist.clone();
                set_slot(&mut self.artists, i, artist);
            }
        }
    }

    /// Returns true for lines that carry a split point.
    fn handle_keyword(&mut self, keyword: &str, line: &str) -> bool {
        match keyword {
            "REM" => false,
            "TRACK" => {
                self.in_global_section = false;
                self.trackno += 1;
                false
            }
            "TITLE" => {
                let value = cue_field(keyword, line);
                if self.in_global_section {
                    self.album = value;
                } else {
                    let slot = self.trackno.saturating_sub(1);
                    set_slot(&mut self.titles, slot, value);
                }
                false
            }
            "PERFORMER" => {
                let value = cue_field(keyword, line);
                if self.in_global_section {
                    self.artist = value;
                } else {
                    let slot = self.trackno.saturating_sub(1);
                    set_slot(&mut self.artists, slot, value);
                }
                false
            }
            "INDEX" => line.contains("INDEX 01"),
            _ => false,
        }
    }
}

/// First token of a CUE line, after any leading binary junk such as a BOM.
pub fn cue_keyword(line: &str) -> &str {
    line.trim_start_matches(|c: char| !(c.is_ascii_graphic() || c == ' '))
        .split(|c| c == ' ' || c == '\t')
        .find(|t| !t.is_empty())
        .unwrap_or("")
}

/// Value following `keyword` on `line`, with surrounding quotes removed.
fn cue_field(keyword: &str, line: &str) -> String {
    let line = line.trim();
    let rest = match line.find(keyword) {
        Some(pos) => &line[pos + keyword.len()..],
        None => return String::new(),
    };
    let rest = rest.trim_start_matches([' ', '\t']);
    let rest = rest.strip_prefix('"').unwrap_or(rest);
    let rest = rest.strip_suffix('"').unwrap_or(rest);
    rest.to_string()
}

fn is_length_char(c: char) -> bool {
    c.is_ascii_digit() || c == ':' || c == '.'
}

/// Pull the length token out of a raw line or an `INDEX 01` line.
///
/// The trailing run of digits, ':' and '.' is kept; CUE `m:ss:ff` becomes
/// `m:ss.ff`. Returns `None` for blank lines and for INDEX lines without a
/// timestamp.
pub fn extract_length(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line.contains("INDEX") && !line.contains(':') {
        return None;
    }

    let end = line.trim_end_matches(|c: char| !is_length_char(c));
    let start = end
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_length_char(*c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(end.len());
    let mut token = end[start..].to_string();
    if token.is_empty() {
        return Some(line.to_string());
    }

    if let (Some(first), Some(last)) = (token.find(':'), token.rfind(':')) {
        if first != last {
            token.replace_range(last..last + 1, ".");
        }
    }
    Some(token)
}

/// Streaming reader over split-point text.
pub struct SplitPointReader<'a> {
    lines: std::str::Lines<'a>,
    kind: SplitInputKind,
    pub cue: CueInfo,
}

impl<'a> SplitPointReader<'a> {
    pub fn new(text: &'a str) -> Self {
        SplitPointReader {
            lines: text.lines(),
            kind: SplitInputKind::Unknown,
            cue: CueInfo::new(),
        }
    }

    pub fn kind(&self) -> SplitInputKind {
        self.kind
    }

    pub fn is_cue(&self) -> bool {
        self.kind == SplitInputKind::Cue
    }
}

impl Iterator for SplitPointReader<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let line = self.lines.next()?;
            match self.kind {
                SplitInputKind::Unknown => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let keyword = cue_keyword(line);
                    if CUE_KEYWORDS.contains(&keyword) {
                        self.kind = SplitInputKind::Cue;
                        self.cue.handle_keyword(keyword, line);
                        continue;
                    }
                    self.kind = SplitInputKind::Raw;
                    if let Some(token) = extract_length(line) {
                        return Some(token);
                    }
                }
                SplitInputKind::Raw => {
                    if let Some(token) = extract_length(line) {
                        return Some(token);
                    }
                }
                SplitInputKind::Cue => {
                    let keyword = cue_keyword(line);
                    if self.cue.handle_keyword(keyword, line) {
                        if let Some(token) = extract_length(line) {
                            return Some(token);
                        }
                    }
                }
            }
        }
    }
}

fn check_cue_inputs(files: &[WaveDescriptor]) -> Result<()> {
    for f in files {
        if f.has(Problem::NotCdQuality) {
            return Err(Error::consistency(format!(
                "file is not CD-quality, CUE sheets require CD-quality input: [{}]",
                f.name()
            )));
        }
    }
    check_compatible(files)
}

/// Generate a CUE sheet for burning `files` back to back as `joined.wav`.
///
/// # Arguments
/// * `files` - CD-quality descriptors in track order
///
/// # Returns
/// CUE sheet text with one TRACK per file
pub fn generate_cue_sheet(files: &[WaveDescriptor]) -> Result<String> {
    if files.is_empty() {
        return Err(Error::user_input("need one or more files in order to generate CUE sheet"));
    }
    check_cue_inputs(files)?;

    let mut cue = String::new();
    cue.push_str("FILE \"joined.wav\" WAVE\n");

    let mut offset = 0u64;
    for (i, f) in files.iter().enumerate() {
        cue.push_str(&format!("  TRACK {:02} AUDIO\n", i + 1));
        cue.push_str(&format!("    INDEX 01 {}\n", cue_timestamp(offset)));
        offset += f.data_size;
    }
    Ok(cue)
}

/// Byte offsets at which the join of `files` would be split back apart.
pub fn generate_split_points(files: &[WaveDescriptor]) -> Result<String> {
    if files.len() < 2 {
        return Err(Error::user_input("need two or more files in order to generate split points"));
    }
    check_compatible(files)?;

    let mut points = String::new();
    let mut offset = 0u64;
    for f in files {
        if offset > 0 {
            points.push_str(&format!("{}\n", offset));
        }
        offset += f.data_size;
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = "\u{feff}REM GENRE Rock\n\
PERFORMER \"The Band\"\n\
TITLE \"Live Album\"\n\
FILE \"live.wav\" WAVE\n\
  TRACK 01 AUDIO\n\
    TITLE \"Opener\"\n\
    INDEX 00 00:00:00\n\
    INDEX 01 00:02:10\n\
  TRACK 02 AUDIO\n\
    TITLE \"Second Song\"\n\
    PERFORMER \"Guest\"\n\
    INDEX 01 03:15:42\n";

    #[test]
    fn test_extract_length() {
        assert_eq!(extract_length("  123456 \r").as_deref(), Some("123456"));
        assert_eq!(extract_length("    INDEX 01 03:15:42").as_deref(), Some("03:15.42"));
        assert_eq!(extract_length("4:05.500").as_deref(), Some("4:05.500"));
        assert_eq!(extract_length("INDEX 01"), None);
        assert_eq!(extract_length("   "), None);
    }

    #[test]
    fn test_keyword_skips_bom() {
        assert_eq!(cue_keyword("\u{feff}REM foo"), "REM");
        assert_eq!(cue_keyword("\tTRACK 01 AUDIO"), "TRACK");
        assert_eq!(cue_keyword(""), "");
    }

    #[test]
    fn test_reads_cue_sheet() {
        let mut reader = SplitPointReader::new(SHEET);
        let points: Vec<String> = reader.by_ref().collect();

        assert!(reader.is_cue());
        assert_eq!(points, vec!["00:02.10", "03:15.42"]);
        assert_eq!(reader.cue.album, "Live Album");
        assert_eq!(reader.cue.artist, "The Band");
        assert_eq!(reader.cue.trackno, 2);
        assert_eq!(reader.cue.title(0), "Opener");
        assert_eq!(reader.cue.title(1), "Second Song");
        assert_eq!(reader.cue.track_artist(1), "Guest");

        reader.cue.fill_artists();
        assert_eq!(reader.cue.track_artist(0), "The Band");
    }

    #[test]
    fn test_reads_raw_points() {
        let mut reader = SplitPointReader::new("\n1000\n\n2:00\n 3:00.50 \n");
        let points: Vec<String> = reader.by_ref().collect();
        assert_eq!(reader.kind(), SplitInputKind::Raw);
        assert_eq!(points, vec!["1000", "2:00", "3:00.50"]);
    }

    #[test]
    fn test_pregap_shifts_titles() {
        let mut cue = CueInfo::new();
        cue.handle_keyword("TRACK", "TRACK 01 AUDIO");
        cue.handle_keyword("TITLE", "TITLE \"First\"");
        cue.insert_pregap();
        assert_eq!(cue.title(0), "pregap");
        assert_eq!(cue.title(1), "First");
        assert_eq!(cue.trackno, 2);
    }

    #[test]
    fn test_generate_cue_sheet() {
        let files = vec![
            WaveDescriptor::cd_quality("a.wav", 176400 * 65 + 2352 * 3),
            WaveDescriptor::cd_quality("b.wav", 2352 * 75),
            WaveDescriptor::cd_quality("c.wav", 2352),
        ];
        let cue = generate_cue_sheet(&files).unwrap();
        assert_eq!(
            cue,
            "FILE \"joined.wav\" WAVE\n  TRACK 01 AUDIO\n    INDEX 01 0:00:00\n  TRACK 02 AUDIO\n    INDEX 01 1:05:03\n  TRACK 03 AUDIO\n    INDEX 01 1:06:03\n"
        );
    }

    #[test]
    fn test_generate_split_points() {
        let files = vec![
            WaveDescriptor::cd_quality("a.wav", 1000),
            WaveDescriptor::cd_quality("b.wav", 500),
            WaveDescriptor::cd_quality("c.wav", 7),
        ];
        assert_eq!(generate_split_points(&files).unwrap(), "1000\n1500\n");
        assert!(generate_split_points(&files[..1]).is_err());
    }

    #[test]
    fn test_cue_sheet_requires_cd_quality() {
        let mut desc = WaveDescriptor::cd_quality("a.wav", 1000);
        desc.samples_per_sec = 48000;
        desc.recompute();
        assert!(generate_cue_sheet(&[desc]).is_err());
        assert!(generate_cue_sheet(&[]).is_err());
    }
}
