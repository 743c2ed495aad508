//! Stream reader
//!
//! Drives a [`LineParser`] over a plain or gzip-compressed log file, starting
//! at a 1-based resume line, and reports where the next run should continue.

use super::parser::{LineContext, LineParser};
use crate::aggregate::Aggregator;
use crate::error::{Error, Result};
use crate::normalize::normalize;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Where a parse run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOutcome {
    /// First line to process on the next run
    pub next_line: u64,
    /// Lines read from the stream, including skipped ones
    pub lines_read: u64,
    /// Lines normalized and handed to the parser
    pub lines_parsed: u64,
}

/// Whether `path` is read through the gzip decoder.
pub fn is_gzip(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Open a log for line-wise reading, decompressing `.gz` files on the fly.
pub fn open_log(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|source| {
        tracing::error!(path = %path.display(), error = %source, "Failed to open log file");
        Error::LogOpen {
            path: path.to_path_buf(),
            source,
        }
    })?;

    if is_gzip(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Parse `path` from `first_line` into `stats`.
pub fn parse_log(
    path: &Path,
    first_line: u64,
    parser: &mut dyn LineParser,
    stats: &mut Aggregator,
) -> Result<ParseOutcome> {
    let reader = open_log(path)?;

    tracing::info!(
        path = %path.display(),
        first_line,
        format = parser.name(),
        "Parsing log file"
    );

    let outcome = parse_stream(reader, first_line, parser, stats)?;

    tracing::info!(
        path = %path.display(),
        next_line = outcome.next_line,
        lines_parsed = outcome.lines_parsed,
        "Parsing completed"
    );

    Ok(outcome)
}

/// Parse an already opened stream.
///
/// A read that hits end of file counts as a line even when it returns
/// nothing, so a file ending in a newline has a trailing empty line. The
/// next run resumes after the last line when it had content, or on it when
/// it was empty (the writer may still append to it).
pub fn parse_stream<R: BufRead>(
    mut reader: R,
    first_line: u64,
    parser: &mut dyn LineParser,
    stats: &mut Aggregator,
) -> Result<ParseOutcome> {
    let date = stats.date();
    let mut buf = Vec::new();
    let mut line_number = 0u64;
    let mut lines_parsed = 0u64;
    let mut prev_line = String::new();
    let mut last_was_empty;

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf)?;
        line_number += 1;

        if line_number < first_line {
            last_was_empty = buf.is_empty();
        } else {
            let line = normalize(&buf);
            stats.set_line_number(line_number);
            let ctx = LineContext {
                line: &line,
                prev_line: &prev_line,
                line_number,
                date,
            };
            parser.parse_line(&ctx, stats);
            lines_parsed += 1;
            last_was_empty = line.is_empty();
            prev_line = line;
        }

        if read == 0 || buf.last() != Some(&b'\n') {
            break;
        }
    }

    let next_line = if last_was_empty {
        line_number
    } else {
        line_number + 1
    };

    Ok(ParseOutcome {
        next_line: next_line.max(first_line),
        lines_read: line_number,
        lines_parsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;
    use crate::ingest::formats::IrssiParser;
    use crate::ingest::parser::EventHandler;
    use chrono::NaiveDate;
    use std::io::{Cursor, Write};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2011, 3, 14).unwrap()
    }

    fn run(input: &[u8], first_line: u64) -> (ParseOutcome, Aggregator) {
        let mut stats = Aggregator::new(&ParserConfig::default(), date());
        let mut parser = IrssiParser::new();
        let outcome =
            parse_stream(Cursor::new(input.to_vec()), first_line, &mut parser, &mut stats).unwrap();
        (outcome, stats)
    }

    /// Records the lookback line seen with every parsed line.
    struct Lookback(Vec<(u64, String, String)>);

    impl LineParser for Lookback {
        fn name(&self) -> &'static str {
            "lookback"
        }

        fn parse_line(&mut self, ctx: &LineContext<'_>, _events: &mut dyn EventHandler) {
            self.0
                .push((ctx.line_number, ctx.prev_line.to_string(), ctx.line.to_string()));
        }
    }

    #[test]
    fn test_trailing_newline_counts_empty_line() {
        let (outcome, stats) = run(b"10:00 <alice> one\n10:01 <bob> two\n", 1);
        assert_eq!(outcome.lines_read, 3);
        assert_eq!(outcome.lines_parsed, 3);
        assert_eq!(outcome.next_line, 3);
        assert_eq!(stats.messages(), 2);
    }

    #[test]
    fn test_unterminated_last_line() {
        let (outcome, stats) = run(b"10:00 <alice> one\n10:01 <bob> two", 1);
        assert_eq!(outcome.lines_read, 2);
        assert_eq!(outcome.next_line, 3);
        assert_eq!(stats.messages(), 2);
    }

    #[test]
    fn test_empty_stream() {
        let (outcome, stats) = run(b"", 1);
        assert_eq!(outcome.lines_read, 1);
        assert_eq!(outcome.next_line, 1);
        assert_eq!(stats.messages(), 0);
    }

    #[test]
    fn test_resume_skips_processed_lines() {
        let input = b"10:00 <alice> one\n10:01 <bob> two\n";
        let (first, _) = run(input, 1);

        let (second, stats) = run(input, first.next_line);
        assert_eq!(second.next_line, first.next_line);
        assert_eq!(second.lines_parsed, 1);
        assert_eq!(stats.messages(), 0);
        assert!(stats.nicks().is_empty());
    }

    #[test]
    fn test_resume_past_end_keeps_offset() {
        let input = b"10:00 <alice> one\n10:01 <bob> two";
        let (first, _) = run(input, 1);
        assert_eq!(first.next_line, 3);

        let (second, stats) = run(input, first.next_line);
        assert_eq!(second.next_line, 3);
        assert_eq!(second.lines_parsed, 0);
        assert_eq!(stats.messages(), 0);
    }

    #[test]
    fn test_appended_lines_picked_up() {
        let mut log = b"10:00 <alice> one\n".to_vec();
        let (first, _) = run(&log, 1);
        assert_eq!(first.next_line, 2);

        log.extend_from_slice(b"10:05 <bob> two\n");
        let (second, stats) = run(&log, first.next_line);
        assert_eq!(stats.messages(), 1);
        assert!(stats.nick("bob").is_some());
        assert!(stats.nick("alice").is_none());
        assert_eq!(second.next_line, 3);
    }

    #[test]
    fn test_lookback_is_normalized_and_skips_unprocessed() {
        let mut stats = Aggregator::new(&ParserConfig::default(), date());
        let mut parser = Lookback(Vec::new());
        parse_stream(
            Cursor::new(b"skip\nfirst\t\tline\nsecond\n".to_vec()),
            2,
            &mut parser,
            &mut stats,
        )
        .unwrap();

        assert_eq!(
            parser.0,
            vec![
                (2, String::new(), "first line".to_string()),
                (3, "first line".to_string(), "second".to_string()),
                (4, "second".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_gzip_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("#chan.20110314.log.gz");
        let file = File::create(&path).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(b"10:00 <alice> hello\n").unwrap();
        encoder.finish().unwrap();

        let mut stats = Aggregator::new(&ParserConfig::default(), date());
        let outcome = parse_log(&path, 1, &mut IrssiParser::new(), &mut stats).unwrap();
        assert_eq!(outcome.next_line, 2);
        assert_eq!(stats.messages(), 1);
    }

    #[test]
    fn test_missing_file_is_log_open_error() {
        let mut stats = Aggregator::new(&ParserConfig::default(), date());
        let result = parse_log(
            Path::new("/nonexistent/chanstat/log.txt"),
            1,
            &mut IrssiParser::new(),
            &mut stats,
        );
        assert!(matches!(result, Err(Error::LogOpen { .. })));
    }
}
