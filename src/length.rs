//! Length encodings: byte counts, `m:ss`, `m:ss.ff` and `m:ss.nnn`.

use log::warn;

use crate::error::{Error, Result};
use crate::wave::{WaveDescriptor, CD_BLOCKS_PER_SEC, CD_BLOCK_SIZE, CD_RATE};

/// Format the length of `desc` as `m:ss.ff` (CD-quality, frames) or
/// `m:ss.nnn` (milliseconds). With `show_hmmss`, lengths of an hour or more
/// are written as `h:mm:ss.xx`.
pub fn length_to_str(desc: &WaveDescriptor, show_hmmss: bool) -> String {
    let (mut seconds, fraction) = if desc.is_cd_quality() {
        let mut seconds = desc.length;
        let rem = desc.data_size % CD_RATE;
        let mut frames = rem / CD_BLOCK_SIZE;
        if rem % CD_BLOCK_SIZE >= CD_BLOCK_SIZE / 2 {
            frames += 1;
        }
        if frames == CD_BLOCKS_PER_SEC {
            frames = 0;
            seconds += 1;
        }
        (seconds, format!("{:02}", frames))
    } else {
        let mut seconds = desc.exact_length.trunc() as u64;
        let mut ms = (desc.exact_length.fract() * 1000.0 + 0.5) as u64;
        if ms == 1000 {
            ms = 0;
            seconds += 1;
        }
        (seconds, format!("{:03}", ms))
    };

    let hours = seconds / 3600;
    seconds -= hours * 3600;
    let mut minutes = seconds / 60;
    seconds -= minutes * 60;

    if show_hmmss && hours > 0 {
        return format!("{}:{:02}:{:02}.{}", hours, minutes, seconds, fraction);
    }
    minutes += hours * 60;
    format!("{}:{:02}.{}", minutes, seconds, fraction)
}

/// CUE-style `mm:ss:ff` timestamp for a CD-quality byte offset.
pub fn cue_timestamp(offset: u64) -> String {
    let desc = WaveDescriptor::cd_quality("", offset);
    length_to_str(&desc, false).replacen('.', ":", 1)
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn number(s: &str, text: &str) -> Result<u64> {
    if s.is_empty() {
        return Ok(0);
    }
    s.parse::<u64>()
        .map_err(|_| Error::user_input(format!("value out of range: [{}]", text)))
}

/// Split `text` as `<digits>:<2 digits>` with an optional `.<n digits>` suffix.
fn split_time(text: &str, frac_len: Option<usize>) -> Option<(&str, &str, Option<&str>)> {
    let tail = 3 + frac_len.map_or(0, |n| n + 1);
    if text.len() < tail + 1 || !text.is_ascii() {
        return None;
    }
    let colon = text.len() - tail;
    if text.as_bytes()[colon] != b':' {
        return None;
    }
    let minutes = &text[..colon];
    let seconds = &text[colon + 1..colon + 3];
    let fraction = match frac_len {
        Some(_) => {
            if text.as_bytes()[colon + 3] != b'.' {
                return None;
            }
            Some(&text[colon + 4..])
        }
        None => None,
    };
    if !all_digits(minutes) || !all_digits(seconds) || !fraction.map_or(true, all_digits) {
        return None;
    }
    Some((minutes, seconds, fraction))
}

/// Convert any accepted length encoding to a byte count against `desc`.
pub fn parse_length(text: &str, desc: &WaveDescriptor) -> Result<u64> {
    let text = text.trim();

    if all_digits(text) {
        return number(text, text);
    }

    let rate = desc.rate;

    if let Some((m, s, _)) = split_time(text, None) {
        let (min, sec) = (number(m, text)?, number(s, text)?);
        if sec >= 60 {
            return Err(Error::user_input(format!("invalid value for seconds: [{}]", sec)));
        }
        return Ok(min * rate * 60 + sec * rate);
    }

    if let Some((m, s, Some(f))) = split_time(text, Some(2)) {
        if !desc.is_cd_quality() {
            return Err(Error::user_input(
                "m:ss.ff format can only be used with CD-quality files",
            ));
        }
        let (min, sec, frames) = (number(m, text)?, number(s, text)?, number(f, text)?);
        if sec >= 60 {
            return Err(Error::user_input(format!("invalid value for seconds: [{}]", sec)));
        }
        if frames >= CD_BLOCKS_PER_SEC {
            return Err(Error::user_input(format!("invalid value for frames: [{}]", frames)));
        }
        return Ok(min * CD_RATE * 60 + sec * CD_RATE + frames * CD_BLOCK_SIZE);
    }

    if let Some((m, s, Some(f))) = split_time(text, Some(3)) {
        let (min, sec, ms) = (number(m, text)?, number(s, text)?, number(f, text)?);
        if sec >= 60 {
            return Err(Error::user_input(format!("invalid value for seconds: [{}]", sec)));
        }

        let nearest_byte = ((ms as f64 * rate as f64) / 1000.0 + 0.5) as u64;
        let bytes = min * rate * 60 + sec * rate;

        if !desc.is_cd_quality() {
            return Ok(bytes + nearest_byte);
        }

        let mut nearest_frame = (ms as f64 * 0.075 + 0.5) as u64 * CD_BLOCK_SIZE;
        if nearest_frame == 0 && bytes == 0 {
            warn!(
                "closest sector boundary to {}:{:02}.{:03} is the beginning of the file -- rounding up to first sector boundary",
                min, sec, ms
            );
            nearest_frame = CD_BLOCK_SIZE;
        }
        if nearest_frame != nearest_byte {
            warn!(
                "rounding {}:{:02}.{:03} (offset: {}) to nearest sector boundary (offset: {})",
                min,
                sec,
                ms,
                bytes + nearest_byte,
                bytes + nearest_frame
            );
        }
        return Ok(bytes + nearest_frame);
    }

    Err(Error::user_input(format!(
        "value not in bytes, m:ss, m:ss.ff, or m:ss.nnn format: [{}]",
        text
    )))
}
