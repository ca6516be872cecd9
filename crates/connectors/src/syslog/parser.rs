// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RFC5424 / RFC3164 syslog parsing.
//!
//! `<pri>` is stripped first (facility = pri / 8, severity = pri % 8), then
//! RFC5424 is attempted, then RFC3164 (year inferred from the current UTC
//! date). On a double miss the raw message is kept with defaults. A parse
//! failure never tears down the listener.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

/// Default PRI when the prefix is absent: user-level notice (13).
const DEFAULT_PRI: u16 = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyslogFormat {
    Rfc5424,
    Rfc3164,
    Raw,
}

sentra_core::simple_display! {
    SyslogFormat {
        Rfc5424 => "rfc5424",
        Rfc3164 => "rfc3164",
        Raw => "raw",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSyslog {
    pub facility: u8,
    pub severity: u8,
    pub timestamp: Option<DateTime<Utc>>,
    pub hostname: Option<String>,
    pub app: Option<String>,
    pub procid: Option<String>,
    pub msgid: Option<String>,
    pub structured_data: Option<String>,
    pub message: String,
    pub format: SyslogFormat,
}

/// Parse one framed syslog message. `now` supplies the year for RFC3164
/// timestamps.
pub fn parse_message(line: &str, now: DateTime<Utc>) -> ParsedSyslog {
    let line = line.trim_end_matches(['\r', '\n']);
    let (pri, rest) = strip_pri(line);
    let facility = (pri / 8) as u8;
    let severity = (pri % 8) as u8;

    if let Some(parsed) = parse_rfc5424(rest, facility, severity) {
        return parsed;
    }
    if let Some(parsed) = parse_rfc3164(rest, facility, severity, now) {
        return parsed;
    }

    ParsedSyslog {
        facility,
        severity,
        timestamp: None,
        hostname: None,
        app: None,
        procid: None,
        msgid: None,
        structured_data: None,
        message: rest.to_string(),
        format: SyslogFormat::Raw,
    }
}

fn strip_pri(line: &str) -> (u16, &str) {
    let Some(rest) = line.strip_prefix('<') else {
        return (DEFAULT_PRI, line);
    };
    let Some(close) = rest.find('>') else {
        return (DEFAULT_PRI, line);
    };
    match rest[..close].parse::<u16>() {
        Ok(pri) if pri <= 191 => (pri, &rest[close + 1..]),
        _ => (DEFAULT_PRI, line),
    }
}

fn nil(field: &str) -> Option<String> {
    (field != "-").then(|| field.to_string())
}

/// `1 TIMESTAMP HOSTNAME APP-NAME PROCID MSGID [SD] MSG`
fn parse_rfc5424(rest: &str, facility: u8, severity: u8) -> Option<ParsedSyslog> {
    let rest = rest.strip_prefix("1 ")?;
    let mut parts = rest.splitn(6, ' ');
    let timestamp_raw = parts.next()?;
    let hostname = parts.next()?;
    let app = parts.next()?;
    let procid = parts.next()?;
    let msgid = parts.next()?;
    let tail = parts.next().unwrap_or("");

    let timestamp = if timestamp_raw == "-" {
        None
    } else {
        Some(
            DateTime::parse_from_rfc3339(timestamp_raw)
                .ok()?
                .with_timezone(&Utc),
        )
    };

    let (structured_data, message) = split_structured_data(tail);

    Some(ParsedSyslog {
        facility,
        severity,
        timestamp,
        hostname: nil(hostname),
        app: nil(app),
        procid: nil(procid),
        msgid: nil(msgid),
        structured_data,
        message,
        format: SyslogFormat::Rfc5424,
    })
}

/// Split `[SD]...[SD] MSG` or `- MSG` into structured data and message.
fn split_structured_data(tail: &str) -> (Option<String>, String) {
    if let Some(message) = tail.strip_prefix("- ") {
        return (None, message.to_string());
    }
    if tail == "-" {
        return (None, String::new());
    }
    if !tail.starts_with('[') {
        return (None, tail.to_string());
    }

    // Consume bracket groups; escaped `\]` inside param values is honored.
    let bytes = tail.as_bytes();
    let mut i = 0;
    let mut escaped = false;
    let mut depth = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if !escaped => escaped = true,
            b'[' if !escaped && depth == 0 => depth += 1,
            b']' if !escaped => {
                depth = depth.saturating_sub(1);
                if depth == 0 && bytes.get(i + 1) != Some(&b'[') {
                    let sd = &tail[..=i];
                    let message = tail[i + 1..].trim_start().to_string();
                    return (Some(sd.to_string()), message);
                }
            }
            _ => escaped = false,
        }
        i += 1;
    }
    (Some(tail.to_string()), String::new())
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// `Mmm dd HH:MM:SS HOSTNAME TAG: MSG`
fn parse_rfc3164(
    rest: &str,
    facility: u8,
    severity: u8,
    now: DateTime<Utc>,
) -> Option<ParsedSyslog> {
    let month_name = rest.get(0..3)?;
    let month = MONTHS.iter().position(|m| *m == month_name)? as u32 + 1;

    // Day may be space-padded ("Oct  1").
    let after_month = rest.get(4..)?;
    let day_raw = after_month.get(0..2)?;
    let day: u32 = day_raw.trim().parse().ok()?;
    let time_raw = after_month.get(3..11)?;
    let mut clock = time_raw.split(':');
    let hour: u32 = clock.next()?.parse().ok()?;
    let minute: u32 = clock.next()?.parse().ok()?;
    let second: u32 = clock.next()?.parse().ok()?;

    let date = NaiveDate::from_ymd_opt(now.year(), month, day)?;
    let naive = date.and_hms_opt(hour, minute, second)?;
    let timestamp = Utc.from_utc_datetime(&naive);

    let mut remainder = after_month.get(11..)?.trim_start().splitn(2, ' ');
    let hostname = remainder.next()?;
    if hostname.is_empty() {
        return None;
    }
    let tail = remainder.next().unwrap_or("");

    // TAG: message, where TAG may carry a pid suffix ("app[123]").
    let (app, procid, message) = match tail.split_once(':') {
        Some((tag, msg)) if !tag.contains(' ') && !tag.is_empty() => {
            let (app, procid) = match tag.find('[') {
                Some(open) if tag.ends_with(']') => (
                    tag[..open].to_string(),
                    Some(tag[open + 1..tag.len() - 1].to_string()),
                ),
                _ => (tag.to_string(), None),
            };
            (Some(app), procid, msg.trim_start().to_string())
        }
        _ => (None, None, tail.to_string()),
    };

    Some(ParsedSyslog {
        facility,
        severity,
        timestamp: Some(timestamp),
        hostname: Some(hostname.to_string()),
        app,
        procid,
        msgid: None,
        structured_data: None,
        message,
        format: SyslogFormat::Rfc3164,
    })
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
