//! candump log format.
//!
//! One frame per line: `(seconds.micros) <iface> <id>#<data>`. A three digit
//! identifier is standard, an eight digit one extended (or an error frame when
//! the error flag is set). `R` in place of data marks a remote request,
//! optionally followed by the requested length.

use std::fmt::Write as _;
use std::time::Duration;

use crate::error::{FrameError, Result};
use crate::frame::{Frame, MAX_DLEN};
use crate::id::{CanId, EFF_MASK, ERR_FLAG, ERR_MASK, SFF_MASK};

/// One parsed log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp: Option<Duration>,
    pub interface: String,
    pub frame: Frame,
}

/// Parse a single log line.
///
/// Returns `Ok(None)` for blank lines and `;` comments.
pub fn parse_log_line(line: &str) -> Result<Option<LogRecord>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(';') {
        return Ok(None);
    }

    let invalid = |reason| FrameError::InvalidLogLine {
        line: trimmed.to_string(),
        reason,
    };

    let mut fields = trimmed.split_whitespace();
    let mut field = fields.next().ok_or_else(|| invalid("empty line"))?;

    let timestamp = match field.strip_prefix('(') {
        Some(rest) => {
            let ts = rest
                .strip_suffix(')')
                .ok_or_else(|| invalid("unterminated timestamp"))?;
            field = fields.next().ok_or_else(|| invalid("missing interface"))?;
            Some(parse_timestamp(ts).ok_or_else(|| invalid("bad timestamp"))?)
        }
        None => None,
    };

    let interface = field.to_string();
    let frame_text = fields.next().ok_or_else(|| invalid("missing frame"))?;
    let frame = parse_frame(frame_text).map_err(invalid)?;

    Ok(Some(LogRecord {
        timestamp,
        interface,
        frame,
    }))
}

/// Format a record the way candump writes it.
pub fn format_log_line(record: &LogRecord) -> String {
    let mut line = String::new();
    if let Some(ts) = record.timestamp {
        let _ = write!(line, "({}.{:06}) ", ts.as_secs(), ts.subsec_micros());
    }
    let _ = write!(line, "{} {}", record.interface, record.frame);
    line
}

/// Parse the `<id>#<data>` part of a log line.
pub fn parse_frame(text: &str) -> std::result::Result<Frame, &'static str> {
    let (id_text, data_text) = text.split_once('#').ok_or("missing '#'")?;
    if !id_text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err("identifier is not hex");
    }

    let id = match id_text.len() {
        3 => {
            let value = u16::from_str_radix(id_text, 16).map_err(|_| "bad identifier")?;
            if u32::from(value) > SFF_MASK {
                return Err("standard identifier out of range");
            }
            CanId::standard(value)
        }
        8 => {
            let value = u32::from_str_radix(id_text, 16).map_err(|_| "bad identifier")?;
            if value & ERR_FLAG != 0 {
                CanId::error(value & ERR_MASK)
            } else {
                CanId::extended(value & EFF_MASK)
            }
        }
        _ => return Err("identifier must have 3 or 8 hex digits"),
    };

    if let Some(len_text) = data_text.strip_prefix('R') {
        let len = match len_text {
            "" => 0,
            text => text.parse::<u8>().map_err(|_| "bad remote length")?,
        };
        if usize::from(len) > MAX_DLEN {
            return Err("remote length above 8");
        }
        return Ok(Frame::remote(id, len));
    }

    let digits: Vec<u8> = data_text.bytes().filter(|b| *b != b'.').collect();
    if !digits.iter().all(u8::is_ascii_hexdigit) {
        return Err("data is not hex");
    }
    if digits.len() % 2 != 0 {
        return Err("odd number of data digits");
    }
    if digits.len() / 2 > MAX_DLEN {
        return Err("more than 8 data bytes");
    }

    let mut payload = [0u8; MAX_DLEN];
    for (slot, pair) in payload.iter_mut().zip(digits.chunks(2)) {
        let text = std::str::from_utf8(pair).map_err(|_| "data is not hex")?;
        *slot = u8::from_str_radix(text, 16).map_err(|_| "data is not hex")?;
    }

    Frame::new(id, &payload[..digits.len() / 2]).map_err(|_| "more than 8 data bytes")
}

fn parse_timestamp(text: &str) -> Option<Duration> {
    let (secs, frac) = text.split_once('.').unwrap_or((text, "0"));
    let secs = secs.parse::<u64>().ok()?;
    if frac.is_empty() || frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let nanos = frac.parse::<u32>().ok()? * 10u32.pow(9 - frac.len() as u32);
    Some(Duration::new(secs, nanos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::error_class;

    #[test]
    fn parses_standard_frame_with_timestamp() {
        let record = parse_log_line("(1436509052.249713) vcan0 044#2A366C2BBA")
            .unwrap()
            .unwrap();
        assert_eq!(record.interface, "vcan0");
        assert_eq!(
            record.timestamp,
            Some(Duration::new(1_436_509_052, 249_713_000))
        );
        assert_eq!(record.frame.id, CanId::standard(0x44));
        assert_eq!(record.frame.payload(), &[0x2A, 0x36, 0x6C, 0x2B, 0xBA]);
    }

    #[test]
    fn parses_extended_and_error_ids() {
        let ext = parse_frame("1F334455#11.22").unwrap();
        assert_eq!(ext.id, CanId::extended(0x1F33_4455));
        assert_eq!(ext.payload(), &[0x11, 0x22]);

        let err = parse_frame("20000040#").unwrap();
        assert!(err.id.is_error());
        assert_eq!(err.id.value(), error_class::BUS_OFF);
    }

    #[test]
    fn parses_remote_requests() {
        let plain = parse_frame("123#R").unwrap();
        assert!(plain.id.is_remote());
        assert_eq!(plain.len, 0);

        let sized = parse_frame("123#R3").unwrap();
        assert_eq!(sized.len, 3);
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        assert!(parse_log_line("").unwrap().is_none());
        assert!(parse_log_line("   ").unwrap().is_none());
        assert!(parse_log_line("; recorded on bench").unwrap().is_none());
    }

    #[test]
    fn line_without_timestamp() {
        let record = parse_log_line("can1 7FF#").unwrap().unwrap();
        assert_eq!(record.timestamp, None);
        assert_eq!(record.interface, "can1");
        assert!(record.frame.payload().is_empty());
    }

    #[test]
    fn rejects_malformed_lines() {
        for line in [
            "(12.5 can0 123#00",
            "(abc) can0 123#00",
            "can0",
            "can0 123",
            "can0 12#00",
            "can0 800#00",
            "can0 123#0",
            "can0 123#001122334455667788",
            "can0 123#R9",
            "can0 12G#00",
        ] {
            assert!(
                matches!(parse_log_line(line), Err(FrameError::InvalidLogLine { .. })),
                "{line} should be rejected"
            );
        }
    }

    #[test]
    fn format_matches_candump() {
        let record = LogRecord {
            timestamp: Some(Duration::new(10, 5_000)),
            interface: "can0".to_string(),
            frame: Frame::new(CanId::standard(0x123), &[0xDE, 0xAD]).unwrap(),
        };
        let line = format_log_line(&record);
        assert_eq!(line, "(10.000005) can0 123#DEAD");
        assert_eq!(parse_log_line(&line).unwrap(), Some(record));
    }
}
