//! Text reports: the `len` table and the detailed `info` listing.

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::length::length_to_str;
use crate::wave::{format_to_str, Problem, WaveDescriptor, CD_BLOCK_SIZE, CD_MIN_BURNABLE_SIZE};

const LEN_OK: &str = "-";
const LEN_NOT_APPLICABLE: &str = "x";
const INPUT_FORMAT: &str = "wav";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeUnit {
    #[default]
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
    Terabytes,
}

impl SizeUnit {
    fn level(&self) -> i32 {
        match self {
            SizeUnit::Bytes => 0,
            SizeUnit::Kilobytes => 1,
            SizeUnit::Megabytes => 2,
            SizeUnit::Gigabytes => 3,
            SizeUnit::Terabytes => 4,
        }
    }

    pub fn divisor(&self) -> f64 {
        1024f64.powi(self.level())
    }

    pub fn label(&self) -> &'static str {
        match self {
            SizeUnit::Bytes => "B ",
            SizeUnit::Kilobytes => "KB",
            SizeUnit::Megabytes => "MB",
            SizeUnit::Gigabytes => "GB",
            SizeUnit::Terabytes => "TB",
        }
    }

    fn format(&self, bytes: f64) -> String {
        match self {
            SizeUnit::Bytes => format!("{:14.0}", bytes),
            _ => format!("{:14.2}", bytes / self.divisor()),
        }
    }
}

impl FromStr for SizeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "b" => Ok(SizeUnit::Bytes),
            "kb" => Ok(SizeUnit::Kilobytes),
            "mb" => Ok(SizeUnit::Megabytes),
            "gb" => Ok(SizeUnit::Gigabytes),
            "tb" => Ok(SizeUnit::Terabytes),
            other => Err(Error::user_input(format!("unknown size unit: [{}]", other))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LenOptions {
    pub file_unit: SizeUnit,
    pub total_unit: SizeUnit,
    pub suppress_column_names: bool,
    pub suppress_totals: bool,
    pub show_hmmss: bool,
}

pub fn len_banner() -> &'static str {
    "    length     expanded size    cdr  WAVE problems  fmt   ratio  filename"
}

fn formatted_length(desc: &WaveDescriptor, show_hmmss: bool) -> String {
    let m_ss = length_to_str(desc, show_hmmss);
    if desc.is_cd_quality() {
        format!("{:>12} ", m_ss)
    } else {
        format!("{:>13}", m_ss)
    }
}

fn flag(set: bool, c: &'static str) -> &'static str {
    if set {
        c
    } else {
        LEN_OK
    }
}

fn ratio(desc: &WaveDescriptor) -> f64 {
    let actual = desc.actual_size.unwrap_or(desc.total_size);
    if desc.total_size == 0 {
        0.0
    } else {
        actual as f64 / desc.total_size as f64
    }
}

fn appended_bytes(desc: &WaveDescriptor) -> Option<i64> {
    desc.actual_size
        .map(|actual| actual as i64 - desc.total_size as i64 - desc.tag_size as i64)
}

/// One row of the `len` table.
pub fn len_line(desc: &WaveDescriptor, opts: &LenOptions) -> String {
    let mut line = formatted_length(desc, opts.show_hmmss);
    line.push_str(&opts.file_unit.format(desc.total_size as f64));
    line.push_str(&format!(" {}", opts.file_unit.label()));

    line.push_str("  ");
    if desc.has(Problem::NotCdQuality) {
        line.push_str(&format!("c{}{}", LEN_NOT_APPLICABLE, LEN_NOT_APPLICABLE));
    } else {
        line.push_str(LEN_OK);
        line.push_str(flag(desc.has(Problem::CdButBadBound), "b"));
        line.push_str(flag(desc.has(Problem::CdButTooShort), "s"));
    }

    line.push_str("   ");
    line.push_str(flag(desc.has(Problem::HeaderNotCanonical), "h"));
    line.push_str(flag(desc.has(Problem::ExtraChunks), "e"));

    line.push_str("   ");
    line.push_str(flag(desc.tag_size > 0, "3"));
    line.push_str(flag(desc.has(Problem::DataNotAligned), "a"));
    line.push_str(flag(desc.has(Problem::HeaderInconsistent), "i"));
    match appended_bytes(desc) {
        Some(appended) => {
            line.push_str(flag(desc.has(Problem::MayBeTruncated), "t"));
            line.push_str(flag(desc.has(Problem::JunkAppended) && appended > 0, "j"));
        }
        None => {
            line.push_str(LEN_NOT_APPLICABLE);
            line.push_str(LEN_NOT_APPLICABLE);
        }
    }

    line.push_str(&format!("  {:>5}", INPUT_FORMAT));
    line.push_str(&format!("  {:.4}", ratio(desc)));
    line.push_str(&format!("  {}", desc.name()));
    line
}

/// Running totals for the last line of the `len` table.
#[derive(Debug, Clone)]
pub struct LenTotals {
    total_size: f64,
    data_size: u64,
    disk_size: f64,
    length: f64,
    all_cd_quality: bool,
    count: usize,
}

impl Default for LenTotals {
    fn default() -> Self {
        LenTotals {
            total_size: 0.0,
            data_size: 0,
            disk_size: 0.0,
            length: 0.0,
            all_cd_quality: true,
            count: 0,
        }
    }
}

impl LenTotals {
    pub fn add(&mut self, desc: &WaveDescriptor) {
        self.total_size += desc.total_size as f64;
        self.data_size += desc.data_size;
        if desc.avg_bytes_per_sec > 0 {
            self.length += desc.data_size as f64 / desc.avg_bytes_per_sec as f64;
        }
        if !desc.is_cd_quality() {
            self.all_cd_quality = false;
        }
        self.disk_size += desc.actual_size.unwrap_or(desc.total_size) as f64;
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn line(&self, opts: &LenOptions) -> String {
        let summary = if self.all_cd_quality {
            WaveDescriptor::cd_quality("", self.data_size)
        } else {
            let mut d = WaveDescriptor::synthetic("");
            d.recompute();
            d.length = self.length as u64;
            d.exact_length = self.length;
            d
        };
        let ratio = if self.count > 0 && self.total_size > 0.0 {
            self.disk_size / self.total_size
        } else {
            0.0
        };

        let mut line = formatted_length(&summary, opts.show_hmmss);
        line.push_str(&opts.total_unit.format(self.total_size));
        line.push_str(&format!(
            " {}                           {:.4}  ({} file{})",
            opts.total_unit.label(),
            ratio,
            self.count,
            if self.count == 1 { "" } else { "s" }
        ));
        line
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

fn plural(n: impl Into<i64>) -> &'static str {
    if n.into() == 1 {
        ""
    } else {
        "s"
    }
}

/// The detailed per-file report.
pub fn info_report(desc: &WaveDescriptor, show_hmmss: bool) -> String {
    let not_cd = desc.has(Problem::NotCdQuality);
    let mut s = String::new();
    let mut line = |text: String| {
        s.push_str(&text);
        s.push('\n');
    };

    line("-".repeat(79));
    line(format!("File name:                    {}", desc.name()));
    line(format!("Handled by:                   {} format module", INPUT_FORMAT));
    line(format!("Length:                       {}", length_to_str(desc, show_hmmss)));
    line(format!(
        "WAVE format:                  0x{:04x} ({})",
        desc.format_code,
        format_to_str(desc.format_code)
    ));
    line(format!("Channels:                     {}", desc.channels));
    line(format!("Bits/sample:                  {}", desc.bits_per_sample));
    line(format!("Samples/sec:                  {}", desc.samples_per_sec));
    line(format!("Average bytes/sec:            {}", desc.avg_bytes_per_sec));
    line(format!("Rate (calculated):            {}", desc.rate));
    line(format!("Block align:                  {}", desc.block_align));
    line(format!("Header size:                  {} bytes", desc.header_size));
    line(format!(
        "Data size:                    {} byte{}",
        desc.data_size,
        plural(desc.data_size as i64)
    ));
    line(format!("Chunk size:                   {} bytes", desc.chunk_size));
    line(format!("Total size (chunk size + 8):  {} bytes", desc.total_size));
    match desc.actual_size {
        Some(actual) => line(format!("Actual file size:             {}", actual)),
        None => line("Actual file size:             unknown".to_string()),
    }
    line(format!("Compression ratio:            {:.4}", ratio(desc)));

    line("CD-quality properties:".to_string());
    line(format!("  CD quality:                 {}", yes_no(!not_cd)));
    if not_cd {
        line("  Cut on sector boundary:     n/a".to_string());
        line("  Sector misalignment:        n/a".to_string());
        line("  Long enough to be burned:   n/a".to_string());
    } else {
        let misalignment = desc.data_size % CD_BLOCK_SIZE;
        line(format!(
            "  Cut on sector boundary:     {}",
            yes_no(!desc.has(Problem::CdButBadBound))
        ));
        line(format!(
            "  Sector misalignment:        {} byte{}",
            misalignment,
            plural(misalignment as i64)
        ));
        if desc.has(Problem::CdButTooShort) {
            line(format!(
                "  Long enough to be burned:   no -- needs to be at least {} bytes",
                CD_MIN_BURNABLE_SIZE
            ));
        } else {
            line("  Long enough to be burned:   yes".to_string());
        }
    }

    line("WAVE properties:".to_string());
    line(format!(
        "  Non-canonical header:       {}",
        yes_no(desc.has(Problem::HeaderNotCanonical))
    ));
    if !desc.has(Problem::ExtraChunks) {
        line("  Extra RIFF chunks:          no".to_string());
    } else if desc.is_odd_sized() {
        line(format!(
            "  Extra RIFF chunks:          yes ({} or {} bytes)",
            desc.extra_riff_size,
            desc.extra_riff_size + 1
        ));
    } else {
        line(format!("  Extra RIFF chunks:          yes ({} bytes)", desc.extra_riff_size));
    }

    line("Possible problems:".to_string());
    if desc.tag_size > 0 {
        line(format!("  File contains ID3v2 tag:    yes ({} bytes)", desc.tag_size));
    } else {
        line("  File contains ID3v2 tag:    no".to_string());
    }
    line(format!(
        "  Data chunk block-aligned:   {}",
        yes_no(!desc.has(Problem::DataNotAligned))
    ));
    line(format!(
        "  Inconsistent header:        {}",
        yes_no(desc.has(Problem::HeaderInconsistent))
    ));
    match (desc.actual_size, appended_bytes(desc)) {
        (Some(actual), Some(appended)) => {
            if desc.has(Problem::MayBeTruncated) {
                let missing = desc.total_size as i64 - (actual as i64 - desc.tag_size as i64);
                line(format!(
                    "  File probably truncated:    yes (missing {} byte{})",
                    missing,
                    plural(missing)
                ));
            } else {
                line("  File probably truncated:    no".to_string());
            }
            if desc.has(Problem::JunkAppended) && appended > 0 {
                line(format!(
                    "  Junk appended to file:      yes ({} byte{})",
                    appended,
                    plural(appended)
                ));
            } else {
                line("  Junk appended to file:      no".to_string());
            }
        }
        _ => {
            line("  File probably truncated:    unknown".to_string());
            line("  Junk appended to file:      unknown".to_string());
        }
    }
    let pad = if !desc.is_odd_sized() {
        "n/a"
    } else {
        match desc.extra_riff_size {
            -1 => "no",
            0 => "yes",
            _ => "unknown",
        }
    };
    line(format!("  Odd data size has pad byte: {}", pad));

    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::FileOpener;
    use crate::testutil::write_wave;

    #[test]
    fn test_size_units() {
        assert_eq!("mb".parse::<SizeUnit>().unwrap(), SizeUnit::Megabytes);
        assert!("pb".parse::<SizeUnit>().is_err());
        assert_eq!(SizeUnit::Kilobytes.format(2048.0).trim(), "2.00");
        assert_eq!(SizeUnit::Bytes.format(2048.0).trim(), "2048");
    }

    #[test]
    fn test_len_line_flags() {
        let dir = tempfile::tempdir().unwrap();
        let opener = FileOpener::default();
        let path = write_wave(dir.path(), "short.wav", &vec![1u8; 2353]);
        let desc = WaveDescriptor::open(&opener, &path).unwrap();

        let line = len_line(&desc, &LenOptions::default());
        assert!(line.starts_with("     0:00.01           2398 B "));
        assert!(line.contains(" -bs   --   -a---    wav  1.0000  "));
        assert!(line.ends_with("short.wav"));
    }

    #[test]
    fn test_len_totals() {
        let mut totals = LenTotals::default();
        totals.add(&WaveDescriptor::cd_quality("a.wav", 176_400));
        totals.add(&WaveDescriptor::cd_quality("b.wav", 176_400 * 2));

        let line = totals.line(&LenOptions::default());
        assert!(line.starts_with("     0:03.00 "));
        assert!(line.ends_with("(2 files)"));
        assert_eq!(totals.count(), 2);
    }

    #[test]
    fn test_info_report() {
        let dir = tempfile::tempdir().unwrap();
        let opener = FileOpener::default();
        let path = write_wave(dir.path(), "odd.wav", &[1u8; 101]);
        let desc = WaveDescriptor::open(&opener, &path).unwrap();

        let report = info_report(&desc, false);
        assert!(report.contains("WAVE format:                  0x0001 (Microsoft PCM)\n"));
        assert!(report.contains("Data size:                    101 bytes\n"));
        assert!(report.contains("  Sector misalignment:        101 bytes\n"));
        assert!(report.contains("  Long enough to be burned:   no -- needs to be at least 705600 bytes\n"));
        assert!(report.contains("  Odd data size has pad byte: yes\n"));
        assert!(report.contains("  File probably truncated:    no\n"));
    }
}
