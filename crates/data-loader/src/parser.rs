//! Parser for delimited interaction logs.
//!
//! Each record is one line:
//!
//! ```text
//! user_id<delim>item_id[<delim>timestamp]
//! ```
//!
//! Blank lines are skipped and every field is trimmed. The optional third
//! column is only validated, never interpreted; counting is done downstream.

use crate::error::{DataLoadError, Result};
use crate::types::*;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use tracing::{debug, instrument, warn};

const MAX_FIELDS: usize = 3;

/// Read a whole file as text
fn read_text(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DataLoadError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => DataLoadError::IoError(e),
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(decode_text(bytes))
}

/// UTF-8 when the whole buffer is valid, otherwise ISO-8859-1
///
/// The fallback applies to the whole file and maps each byte to its own
/// code point, so distinct raw identifiers stay distinct.
fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            let bytes = err.into_bytes();
            warn!("Log is not valid UTF-8, decoding as ISO-8859-1");
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}

/// Parse an event log file
#[instrument(skip(format), fields(delimiter = %format.delimiter))]
pub fn parse_events(path: &Path, format: &LogFormat) -> Result<Vec<RawEvent>> {
    let text = read_text(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse_events_from_str(&name, &text, format)
}

/// Parse an in-memory event log
///
/// `file` is only used to label errors.
pub fn parse_events_from_str(file: &str, text: &str, format: &LogFormat) -> Result<Vec<RawEvent>> {
    if format.delimiter.is_empty() {
        return Err(DataLoadError::ParseError {
            file: file.to_string(),
            line: 0,
            reason: "Empty delimiter".to_string(),
        });
    }

    let mut events = Vec::new();
    let mut header_pending = format.has_header;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line_trimmed = line.trim();
        if line_trimmed.is_empty() {
            continue; // Skip empty lines
        }
        if header_pending {
            header_pending = false;
            continue;
        }

        events.push(parse_line(file, line_no, line_trimmed, &format.delimiter)?);
    }

    debug!("Parsed {} events from {}", events.len(), file);
    Ok(events)
}

fn parse_line(file: &str, line_no: usize, line: &str, delimiter: &str) -> Result<RawEvent> {
    let parts: Vec<&str> = line.split(delimiter).map(str::trim).collect();
    if parts.len() > MAX_FIELDS {
        return Err(DataLoadError::FieldCountMismatch {
            expected: MAX_FIELDS,
            found: parts.len(),
            line: line_no,
        });
    }

    let mut parts = parts.into_iter();
    let user_id = required_identifier(parts.next(), file, line_no, "user_id")?;
    let item_id = required_identifier(parts.next(), file, line_no, "item_id")?;

    let mut event = RawEvent::new(user_id, item_id);
    if let Some(raw) = parts.next().filter(|s| !s.is_empty()) {
        let timestamp = raw.parse::<Timestamp>().map_err(|e| DataLoadError::ParseError {
            file: file.to_string(),
            line: line_no,
            reason: format!("Invalid timestamp: {}", e),
        })?;
        event = event.with_timestamp(timestamp);
    }
    Ok(event)
}

fn required_identifier(field: Option<&str>, file: &str, line: usize, name: &str) -> Result<String> {
    field
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DataLoadError::MissingIdentifier {
            file: file.to_string(),
            line,
            field: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_header() -> LogFormat {
        LogFormat::default().with_header(false)
    }

    #[test]
    fn test_parse_basic_lines() {
        let text = "u1,i1\nu1,i2,978300760\n\nu2 , i1\n";
        let events = parse_events_from_str("log.csv", text, &no_header()).unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], RawEvent::new("u1", "i1"));
        assert_eq!(events[1].timestamp, Some(978300760));
        assert_eq!(events[2].user_id, "u2");
        assert_eq!(events[2].item_id, "i1");
    }

    #[test]
    fn test_header_is_skipped() {
        let text = "user,item,ts\nu1,i1,1\n";
        let events = parse_events_from_str("log.csv", text, &LogFormat::default()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].user_id, "u1");
    }

    #[test]
    fn test_custom_delimiter() {
        let format = no_header().with_delimiter("::");
        let events = parse_events_from_str("plays.dat", "1::1193::978300760", &format).unwrap();
        assert_eq!(events[0].user_id, "1");
        assert_eq!(events[0].item_id, "1193");
        assert_eq!(events[0].timestamp, Some(978300760));
    }

    #[test]
    fn test_missing_item_is_error() {
        let err = parse_events_from_str("log.csv", "u1,i1\nu2,\n", &no_header()).unwrap_err();
        match err {
            DataLoadError::MissingIdentifier { line, field, .. } => {
                assert_eq!(line, 2);
                assert_eq!(field, "item_id");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_user_is_error() {
        let err = parse_events_from_str("log.csv", ",i1\n", &no_header()).unwrap_err();
        assert!(matches!(err, DataLoadError::MissingIdentifier { .. }));
    }

    #[test]
    fn test_bad_timestamp_is_error() {
        let err = parse_events_from_str("log.csv", "u1,i1,yesterday\n", &no_header()).unwrap_err();
        assert!(matches!(err, DataLoadError::ParseError { line: 1, .. }));
    }

    #[test]
    fn test_too_many_fields() {
        let err = parse_events_from_str("log.csv", "u1,i1,1,extra\n", &no_header()).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::FieldCountMismatch {
                expected: 3,
                found: 4,
                line: 1
            }
        ));
    }

    #[test]
    fn test_utf8_log_is_kept_as_is() {
        assert_eq!(decode_text("caf\u{e9},i1".as_bytes().to_vec()), "caf\u{e9},i1");
    }

    #[test]
    fn test_invalid_bytes_keep_identifiers_distinct() {
        let name = format!("data-loader-latin1-{}.csv", std::process::id());
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, b"a\xff,i1\na\xfe,i1\n").unwrap();
        let events = parse_events(&path, &no_header());
        std::fs::remove_file(&path).unwrap();

        let events = events.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].user_id, "a\u{ff}");
        assert_eq!(events[1].user_id, "a\u{fe}");
        assert_ne!(events[0].user_id, events[1].user_id);
    }

    #[test]
    fn test_missing_file() {
        let err = parse_events(Path::new("does/not/exist.csv"), &LogFormat::default()).unwrap_err();
        assert!(matches!(err, DataLoadError::FileNotFound { .. }));
    }
}
