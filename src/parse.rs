//! Multi-strategy parsers for content-provider dumps.
//!
//! Output of `content query` differs between vendors and Android versions,
//! so each record kind has an ordered list of strategies. A parser returns
//! the records of the first strategy that produces any and never combines
//! strategies. Lines starting with `#` (dump headers) are ignored.
//!
//! Numeric fields stay strings. Parsers never fail: text they do not
//! recognise yields an empty list.

use chrono::{Local, TimeZone};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::models::{CallRecord, ContactRecord, ParsedRecord, SmsRecord};
use crate::query::RecordKind;

macro_rules! regex {
    ($re:literal) => {{
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new($re).expect("valid regex"))
    }};
}

/// Placeholder for a record without a date.
pub const UNKNOWN_DATE: &str = "Unknown";

/// Format an epoch value as local `%Y-%m-%d %H:%M:%S`.
///
/// Values above 10^12 are read as milliseconds, anything else as seconds.
/// Returns `raw` unchanged when it is not an integer or out of range.
pub fn epoch_ms_to_str(raw: &str) -> String {
    let Ok(value) = raw.trim().parse::<i64>() else {
        return raw.to_string();
    };
    let dt = if value > 1_000_000_000_000 {
        Local.timestamp_millis_opt(value).single()
    } else {
        Local.timestamp_opt(value, 0).single()
    };
    match dt {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => raw.to_string(),
    }
}

fn display_date(epoch: &str) -> String {
    if epoch.is_empty() {
        UNKNOWN_DATE.to_string()
    } else {
        epoch_ms_to_str(epoch)
    }
}

fn strip_comments(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}

fn group(caps: &regex::Captures<'_>, name: &str) -> String {
    caps.name(name)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Split `key=value, key=value` pairs, dropping a leading `Row: N` marker.
///
/// Values run up to the next `, key=` so commas inside values survive
/// unless they are followed by something that looks like a key.
fn key_values(line: &str, lowercase_keys: bool) -> HashMap<String, String> {
    let line = regex!(r"^\s*Row:\s*\d+\s*").replace(line, "");
    let line = line.trim_start();
    let keys: Vec<_> = regex!(r"(?:^|,)\s*(\w+)=").captures_iter(line).collect();

    let mut pairs = HashMap::new();
    for (i, caps) in keys.iter().enumerate() {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = keys
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(line.len());
        let key = if lowercase_keys {
            key.as_str().to_lowercase()
        } else {
            key.as_str().to_string()
        };
        pairs.insert(key, line[whole.end()..end].trim().to_string());
    }
    pairs
}

fn first_alias(pairs: &HashMap<String, String>, aliases: &[&str]) -> String {
    aliases
        .iter()
        .filter_map(|k| pairs.get(*k))
        .find(|v| !v.is_empty())
        .cloned()
        .unwrap_or_default()
}

/// Parse the raw text of a dump of `kind`.
pub fn parse(kind: RecordKind, raw: &str) -> Vec<ParsedRecord> {
    match kind {
        RecordKind::Sms => parse_sms(raw).into_iter().map(Into::into).collect(),
        RecordKind::Contacts => parse_contacts(raw).into_iter().map(Into::into).collect(),
        RecordKind::Calls => parse_calls(raw).into_iter().map(Into::into).collect(),
    }
}

// ---------------------------------------------------------------------------
// SMS
// ---------------------------------------------------------------------------

fn sms(address: String, date_epoch_ms: String, body: String) -> SmsRecord {
    SmsRecord {
        date: display_date(&date_epoch_ms),
        address,
        date_epoch_ms,
        body,
    }
}

pub fn parse_sms(raw: &str) -> Vec<SmsRecord> {
    let text = strip_comments(raw);
    if text.trim().is_empty() {
        return Vec::new();
    }

    let strategies: [fn(&str) -> Vec<SmsRecord>; 4] =
        [sms_row_blocks, sms_single_line, sms_alternate_columns, sms_key_values];
    for strategy in strategies {
        let records = strategy(&text);
        if !records.is_empty() {
            return records;
        }
    }
    Vec::new()
}

/// Chunks of `text` that each begin at a `\nRow` marker.
fn row_segments(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    for (i, _) in text.match_indices("\nRow") {
        segments.push(&text[start..i]);
        start = i;
    }
    segments.push(&text[start..]);
    segments
}

/// `address=…, date=…, body=…` where the body runs to the next row.
fn sms_row_blocks(text: &str) -> Vec<SmsRecord> {
    let re = regex!(r"(?s)address=(?P<address>.*?),\s*date=(?P<date>\d+),\s*body=(?P<body>.*)");
    row_segments(text)
        .into_iter()
        .filter_map(|segment| re.captures(segment))
        .map(|caps| {
            (
                group(&caps, "address"),
                group(&caps, "date"),
                group(&caps, "body"),
            )
        })
        .filter(|(address, _, body)| !address.is_empty() || !body.is_empty())
        .map(|(address, date, body)| sms(address, date, body))
        .collect()
}

/// One message per line, other columns allowed between date and body.
fn sms_single_line(text: &str) -> Vec<SmsRecord> {
    let re = regex!(
        r"(?s)address=(?P<addr>.*?),\s*date=(?P<date>\d+).*?body=(?P<body>.*?)(?:,\s*type=|$)"
    );
    text.lines()
        .filter(|l| l.contains("address=") && l.contains("date=") && l.contains("body="))
        .filter_map(|l| re.captures(l))
        .map(|caps| sms(group(&caps, "addr"), group(&caps, "date"), group(&caps, "body")))
        .collect()
}

/// Vendor column names, tried one naming scheme at a time.
fn sms_alternate_columns(text: &str) -> Vec<SmsRecord> {
    let schemes: [&Regex; 3] = [
        regex!(r"(?s)phone_number=(?P<addr>.*?),\s*date=(?P<date>\d+).*?message=(?P<body>.*?)(?:,|$)"),
        regex!(r"(?s)sender=(?P<addr>.*?),\s*timestamp=(?P<date>\d+).*?text=(?P<body>.*?)(?:,|$)"),
        regex!(r"(?s)number=(?P<addr>.*?),\s*date_sent=(?P<date>\d+).*?body=(?P<body>.*?)(?:,|$)"),
    ];
    for re in schemes {
        let records: Vec<SmsRecord> = text
            .lines()
            .filter_map(|l| re.captures(l))
            .map(|caps| sms(group(&caps, "addr"), group(&caps, "date"), group(&caps, "body")))
            .collect();
        if !records.is_empty() {
            return records;
        }
    }
    Vec::new()
}

// `Row: N` lines are parsed here too, after the prefix is stripped.
fn sms_key_values(text: &str) -> Vec<SmsRecord> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| {
            let pairs = key_values(l, false);
            let address = first_alias(&pairs, &["address", "phone_number", "sender", "number"]);
            let body = first_alias(&pairs, &["body", "message", "text"]);
            if address.is_empty() && body.is_empty() {
                return None;
            }
            let date = first_alias(&pairs, &["date", "timestamp", "date_sent"]);
            Some(sms(address, date, body))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

pub fn parse_contacts(raw: &str) -> Vec<ContactRecord> {
    let text = strip_comments(raw);
    let re = regex!(r"(?i)Row:\s*\d+\s+display_name=(?P<name>.*?),\s*data1=(?P<number>[\+\d\s\(\)-]+)");
    re.captures_iter(&text)
        .map(|caps| ContactRecord {
            name: group(&caps, "name"),
            number: group(&caps, "number"),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Call log
// ---------------------------------------------------------------------------

fn call(name: String, number: String, duration: String, date_epoch_ms: String) -> CallRecord {
    CallRecord {
        date: display_date(&date_epoch_ms),
        name,
        number,
        duration_seconds: duration,
        date_epoch_ms,
    }
}

fn call_from_caps(caps: &regex::Captures<'_>) -> CallRecord {
    call(
        group(caps, "name"),
        group(caps, "number"),
        group(caps, "duration"),
        group(caps, "date"),
    )
}

pub fn parse_calls(raw: &str) -> Vec<CallRecord> {
    let text = strip_comments(raw);
    if text.trim().is_empty() {
        return Vec::new();
    }

    let strategies: [fn(&str) -> Vec<CallRecord>; 4] =
        [calls_standard, calls_per_field, calls_alternate_columns, calls_key_values];
    for strategy in strategies {
        let records = strategy(&text);
        if !records.is_empty() {
            return records;
        }
    }
    Vec::new()
}

fn calls_standard(text: &str) -> Vec<CallRecord> {
    let re = regex!(
        r"(?i)(?:name|cached_name)=(?P<name>.*?),\s*number=(?P<number>.*?),\s*duration=(?P<duration>\d+),\s*date=(?P<date>\d+)"
    );
    re.captures_iter(text).map(|c| call_from_caps(&c)).collect()
}

/// Each field searched on its own so column order does not matter.
fn calls_per_field(text: &str) -> Vec<CallRecord> {
    let capture = |re: &Regex, line: &str| {
        re.captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    };

    text.lines()
        .filter(|l| l.contains("duration=") && l.contains("date="))
        .map(|l| {
            call(
                capture(regex!(r"(?i)(?:name|cached_name)=(.*?)(?:,|$)"), l).unwrap_or_default(),
                capture(regex!(r"(?i)number=(.*?)(?:,|$)"), l).unwrap_or_default(),
                capture(regex!(r"(?i)duration=(\d+)"), l).unwrap_or_else(|| "0".to_string()),
                capture(regex!(r"(?i)date=(\d+)"), l).unwrap_or_default(),
            )
        })
        .collect()
}

fn calls_alternate_columns(text: &str) -> Vec<CallRecord> {
    let schemes: [&Regex; 2] = [
        regex!(
            r"(?i)caller_name=(?P<name>.*?),\s*phone_number=(?P<number>.*?),\s*call_duration=(?P<duration>\d+),\s*timestamp=(?P<date>\d+)"
        ),
        regex!(
            r"(?i)contact=(?P<name>.*?),\s*number=(?P<number>.*?),\s*duration=(?P<duration>\d+),\s*time=(?P<date>\d+)"
        ),
    ];
    for re in schemes {
        let records: Vec<CallRecord> = re.captures_iter(text).map(|c| call_from_caps(&c)).collect();
        if !records.is_empty() {
            return records;
        }
    }
    Vec::new()
}

// `Row: N` lines are parsed here too, after the prefix is stripped.
fn calls_key_values(text: &str) -> Vec<CallRecord> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| {
            let pairs = key_values(l, true);
            let name = first_alias(&pairs, &["name", "cached_name", "caller_name", "contact"]);
            let number = first_alias(&pairs, &["number", "phone_number", "phone"]);
            if name.is_empty() && number.is_empty() {
                return None;
            }
            let mut duration = first_alias(&pairs, &["duration", "call_duration"]);
            if duration.is_empty() {
                duration = "0".to_string();
            }
            let date = first_alias(&pairs, &["date", "timestamp", "time"]);
            Some(call(name, number, duration, date))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sms_rows_literal() {
        let raw = "Row: 0 address=+15551234567, date=1700000000000, body=Hello there\n\
                   Row: 1 address=+15559876543, date=1700000100000, body=See you soon";
        let records = parse_sms(raw);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].address, "+15551234567");
        assert_eq!(records[0].date_epoch_ms, "1700000000000");
        assert_eq!(records[0].body, "Hello there");
        assert_eq!(records[1].address, "+15559876543");
        assert_eq!(records[1].date_epoch_ms, "1700000100000");
        assert_eq!(records[1].body, "See you soon");
        for r in &records {
            assert_ne!(r.date, UNKNOWN_DATE);
            assert_eq!(r.date, epoch_ms_to_str(&r.date_epoch_ms));
        }
    }

    #[test]
    fn test_sms_multiline_body() {
        let raw = "Row: 0 address=555, date=1700000000000, body=first line\nsecond line\nRow: 1 address=556, date=1700000000001, body=x";
        let records = parse_sms(raw);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].body, "first line\nsecond line");
    }

    #[test]
    fn test_sms_header_lines_ignored() {
        let raw = "# Device: Xiaomi M2012\n# URI: content://sms/inbox\n# Success: true\n\n\
                   Row: 0 address=555, date=1700000000000, body=Hi";
        let records = parse_sms(raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, "555");
    }

    #[test]
    fn test_sms_single_line_with_extra_columns() {
        let raw = "address=555, date=1700000000, read=1, body=Hi, type=1";
        let records = parse_sms(raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].body, "Hi");
        assert_eq!(records[0].date_epoch_ms, "1700000000");
    }

    #[test]
    fn test_sms_alternate_columns() {
        let raw = "phone_number=555, date=1700000000000, message=Yo, read=1";
        let records = parse_sms(raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, "555");
        assert_eq!(records[0].body, "Yo");
    }

    #[test]
    fn test_sms_key_values_fallback() {
        let raw = "Row: 3 body=hello, sender_id=x, address=777";
        let records = parse_sms(raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, "777");
        assert_eq!(records[0].body, "hello");
        assert_eq!(records[0].date, UNKNOWN_DATE);
    }

    #[test]
    fn test_contacts() {
        let raw = "Row: 0 display_name=Alice Smith, data1=+1 (555) 123-4567\n\
                   Row: 1 display_name=Bob, data1=5550000";
        let records = parse_contacts(raw);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Alice Smith");
        assert_eq!(records[0].number, "+1 (555) 123-4567");
        assert_eq!(records[1].number, "5550000");
    }

    #[test]
    fn test_contacts_have_no_fallback() {
        assert!(parse_contacts("name=Alice, number=555").is_empty());
    }

    #[test]
    fn test_calls_standard() {
        let raw = "Row: 0 name=Alice, number=555, duration=30, date=1700000000000";
        let records = parse_calls(raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Alice");
        assert_eq!(records[0].duration_seconds, "30");
        assert_ne!(records[0].date, UNKNOWN_DATE);
    }

    #[test]
    fn test_calls_any_column_order() {
        let raw = "Row: 0 date=1700000000000, number=555, duration=12, name=Bob";
        let records = parse_calls(raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Bob");
        assert_eq!(records[0].number, "555");
        assert_eq!(records[0].duration_seconds, "12");
    }

    #[test]
    fn test_calls_alternate_columns() {
        let raw = "caller_name=Eve, phone_number=999, call_duration=5, timestamp=1700000000";
        let records = parse_calls(raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Eve");
        assert_eq!(records[0].number, "999");
        assert_eq!(records[0].duration_seconds, "5");
    }

    #[test]
    fn test_calls_key_values_fallback() {
        let raw = "Row: 1 PHONE=123, Contact=Zed, time=1700000000";
        let records = parse_calls(raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Zed");
        assert_eq!(records[0].number, "123");
        assert_eq!(records[0].duration_seconds, "0");
    }

    #[test]
    fn test_degradation() {
        for raw in ["", "   \n", "The quick brown fox.", "# only a header"] {
            assert!(parse_sms(raw).is_empty());
            assert!(parse_contacts(raw).is_empty());
            assert!(parse_calls(raw).is_empty());
        }
    }

    #[test]
    fn test_epoch_seconds_vs_millis() {
        assert_eq!(epoch_ms_to_str("1700000000"), epoch_ms_to_str("1700000000000"));
        assert_eq!(epoch_ms_to_str("not a number"), "not a number");
        assert_eq!(epoch_ms_to_str("").as_str(), "");
    }

    #[test]
    fn test_parse_dispatch() {
        let records = parse(RecordKind::Contacts, "Row: 0 display_name=A, data1=1");
        assert_eq!(records.len(), 1);
        assert!(matches!(records[0], ParsedRecord::Contact(_)));
    }
}
