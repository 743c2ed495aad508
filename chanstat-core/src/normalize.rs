//! Line normalization
//!
//! IRC logs are byte streams written by clients with wildly different ideas
//! about encodings. Every raw line goes through [`normalize`] before a format
//! grammar looks at it:
//!
//! 1. **Repair**: lines that are not valid UTF-8 are decoded one sequence at a
//!    time. Well-formed sequences are copied, stray bytes `0x80..=0xFF` are read
//!    as Latin-1, anything else becomes U+FFFD.
//! 2. **Strip**: C0 controls (except TAB and the color byte), DEL and the C1
//!    range are removed, as are mIRC color codes (`^C`, `^C4`, `^C04,12`).
//! 3. **Whitespace**: runs of space, tab and no-break space collapse into a
//!    single space; one leading and one trailing space are dropped.
//!
//! The result is stable: normalizing an already normalized line returns it
//! unchanged.

use std::borrow::Cow;

/// mIRC color control byte.
const COLOR_CODE: char = '\u{03}';

/// Normalize one raw log line (line terminator included or not).
pub fn normalize(raw: &[u8]) -> String {
    let repaired = match std::str::from_utf8(raw) {
        Ok(line) => Cow::Borrowed(line),
        Err(_) => Cow::Owned(repair_utf8(raw)),
    };

    let stripped = strip_control_codes(&repaired);
    collapse_whitespace(&stripped)
}

/// Decode the sequence at the start of `bytes`.
///
/// Returns the decoded character (if the longest well-formed sequence starting
/// here is valid) and the number of bytes consumed. Invalid positions consume a
/// single byte.
fn decode_step(bytes: &[u8]) -> (Option<char>, usize) {
    let Some(&lead) = bytes.first() else {
        return (None, 0);
    };

    let cont = |i: usize, lo: u8, hi: u8| matches!(bytes.get(i), Some(b) if (lo..=hi).contains(b));
    let tail = |i: usize| cont(i, 0x80, 0xBF);

    let len = match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF if tail(1) => 2,
        0xE0 if cont(1, 0xA0, 0xBF) && tail(2) => 3,
        0xE1..=0xEC | 0xEE | 0xEF if tail(1) && tail(2) => 3,
        0xED if cont(1, 0x80, 0x9F) && tail(2) => 3,
        0xF0 if cont(1, 0x90, 0xBF) && tail(2) && tail(3) => 4,
        0xF1..=0xF3 if tail(1) && tail(2) && tail(3) => 4,
        0xF4 if cont(1, 0x80, 0x8F) && tail(2) && tail(3) => 4,
        _ => return (None, 1),
    };

    let payload = |i: usize| u32::from(bytes[i] & 0x3F);
    let code_point = match len {
        1 => u32::from(lead),
        2 => (u32::from(lead & 0x1F) << 6) | payload(1),
        3 => (u32::from(lead & 0x0F) << 12) | (payload(1) << 6) | payload(2),
        _ => (u32::from(lead & 0x07) << 18) | (payload(1) << 12) | (payload(2) << 6) | payload(3),
    };

    match char::from_u32(code_point) {
        Some(c) => (Some(c), len),
        None => (None, 1),
    }
}

/// Rebuild a line that failed UTF-8 validation.
fn repair_utf8(raw: &[u8]) -> String {
    let mut line = String::with_capacity(raw.len() * 2);
    let mut pos = 0;

    while pos < raw.len() {
        let (decoded, consumed) = decode_step(&raw[pos..]);
        match decoded {
            Some(c) => line.push(c),
            // Latin-1 maps bytes 0x80..=0xFF onto U+0080..=U+00FF
            None if raw[pos] >= 0x80 => line.push(char::from(raw[pos])),
            None => line.push(char::REPLACEMENT_CHARACTER),
        }
        pos += consumed.max(1);
    }

    line
}

fn is_stripped_control(c: char) -> bool {
    matches!(
        c,
        '\u{00}'..='\u{02}' | '\u{04}'..='\u{08}' | '\u{0A}'..='\u{1F}' | '\u{7F}'..='\u{9F}'
    )
}

/// Number of leading ASCII digits, at most `max`.
fn leading_digits(bytes: &[u8], max: usize) -> usize {
    bytes
        .iter()
        .take(max)
        .take_while(|b| b.is_ascii_digit())
        .count()
}

/// Length of the color arguments following a color byte: `NN` or `NN,NN`.
fn color_arguments_len(rest: &[u8]) -> usize {
    let foreground = leading_digits(rest, 2);
    if foreground == 0 {
        return 0;
    }

    if rest.get(foreground) == Some(&b',') {
        let background = leading_digits(&rest[foreground + 1..], 2);
        if background > 0 {
            return foreground + 1 + background;
        }
    }

    foreground
}

fn strip_control_codes(line: &str) -> String {
    let bytes = line.as_bytes();
    let mut stripped = String::with_capacity(line.len());
    let mut chars = line.char_indices();

    while let Some((idx, c)) = chars.next() {
        if c == COLOR_CODE {
            // Color arguments are ASCII, one byte per char
            for _ in 0..color_arguments_len(&bytes[idx + 1..]) {
                chars.next();
            }
        } else if !is_stripped_control(c) {
            stripped.push(c);
        }
    }

    stripped
}

fn collapse_whitespace(line: &str) -> String {
    let mut collapsed = String::with_capacity(line.len());
    let mut in_run = false;

    for c in line.chars() {
        if matches!(c, ' ' | '\t' | '\u{A0}') {
            if !in_run {
                collapsed.push(' ');
                in_run = true;
            }
        } else {
            collapsed.push(c);
            in_run = false;
        }
    }

    let trimmed = collapsed.strip_prefix(' ').unwrap_or(&collapsed);
    let trimmed = trimmed.strip_suffix(' ').unwrap_or(trimmed);
    trimmed.to_string()
}
