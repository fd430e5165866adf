//! Last-modified aggregation.
//!
//! A chunk's `last_updated` is the most recent timestamp among its own
//! block and the heading blocks currently giving it context. Candidates
//! that are empty or fail to parse are skipped; the winner is returned in
//! its original string form. Ties keep the earliest candidate, which is
//! always the block's own timestamp.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::TimestampParseFailure;
use crate::heading::HeadingTracker;
use crate::models::Block;

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 (`2024-06-01T12:00:00.000Z`, `…+02:00`), offset-less
/// date-times (taken as UTC) and bare dates (midnight UTC).
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, TimestampParseFailure> {
    let v = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(v) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    match NaiveDate::parse_from_str(v, "%Y-%m-%d") {
        Ok(date) => date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| TimestampParseFailure {
                value: value.to_string(),
                reason: "date out of range".to_string(),
            }),
        Err(e) => Err(TimestampParseFailure {
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Return the most recent of `candidates`, unchanged, or `""` if none parse.
pub fn latest<'a, I>(candidates: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(DateTime<Utc>, &str)> = None;
    for raw in candidates {
        if raw.trim().is_empty() {
            continue;
        }
        let parsed = match parse_timestamp(raw) {
            Ok(dt) => dt,
            Err(e) => {
                tracing::debug!("skipping timestamp: {}", e);
                continue;
            }
        };
        match best {
            Some((current, _)) if parsed <= current => {}
            _ => best = Some((parsed, raw)),
        }
    }
    best.map(|(_, raw)| raw.to_string()).unwrap_or_default()
}

/// `last_updated` for `block` given the headings currently in scope.
pub fn aggregate_last_updated(block: &Block, headings: &HeadingTracker) -> String {
    let candidates = std::iter::once(block.last_modified.as_str())
        .chain(headings.active().map(|h| h.last_modified.as_str()));
    latest(candidates)
}
