//! Extracts transaction intents from free-text calendar event titles.
//!
//! Matching is pure: the same title + start time always yields the same
//! `ParsedIntent`, so re-parsing after a restart is safe.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::model::{IntentKind, ParsedIntent};

/// How far in the past an event may start and still validate. Covers
/// clock skew and polling latency without accepting long-stale events.
pub const PAST_DUE_GRACE_SECS: i64 = 60;

// Swap matchers, tried in priority order. First hit wins.
static SWAP_VERB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:swap|trade|exchange|convert)\s+(\d+(?:\.\d+)?)\s+([A-Za-z]{2,10})\s+(?:to|for|->)\s+([A-Za-z]{2,10})\s*$",
    )
    .expect("swap verb pattern")
});

static SWAP_ARROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*([A-Za-z]{2,10})\s*->\s*([A-Za-z]{2,10})\s*$")
        .expect("swap arrow pattern")
});

static SWAP_TO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s+([A-Za-z]{2,10})\s+to\s+([A-Za-z]{2,10})\s*$")
        .expect("swap to pattern")
});

// Transfer matcher. The destination must be a 0x-prefixed 40-hex-char
// address; anything else falls through to Unknown.
static TRANSFER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:send|transfer)\s+(\d+(?:\.\d+)?)\s+([A-Za-z]{2,10})\s+to\s+(0x[0-9a-fA-F]{40})\s*$",
    )
    .expect("transfer pattern")
});

/// Parse one calendar event into a `ParsedIntent`.
pub fn parse_event(event_id: &str, title: &str, start_time: DateTime<Utc>) -> ParsedIntent {
    for pattern in [&*SWAP_VERB, &*SWAP_ARROW, &*SWAP_TO] {
        if let Some(caps) = pattern.captures(title) {
            return ParsedIntent {
                valid: true,
                kind: IntentKind::Swap,
                from_asset: caps[2].to_uppercase(),
                to_target: caps[3].to_uppercase(),
                amount: caps[1].to_string(),
                due_at: start_time,
                source_event_id: event_id.to_string(),
                source_title: title.to_string(),
                error: None,
            };
        }
    }

    if let Some(caps) = TRANSFER.captures(title) {
        return ParsedIntent {
            valid: true,
            kind: IntentKind::Transfer,
            from_asset: caps[2].to_uppercase(),
            to_target: caps[3].to_string(),
            amount: caps[1].to_string(),
            due_at: start_time,
            source_event_id: event_id.to_string(),
            source_title: title.to_string(),
            error: None,
        };
    }

    ParsedIntent::unknown(
        event_id,
        title,
        start_time,
        format!("Title does not match any transaction pattern: \"{}\"", title),
    )
}

/// Validate a parsed intent against `now`. Rejects non-positive or
/// unparseable amounts, empty asset fields, and events whose start time
/// is more than the grace buffer in the past.
pub fn validate(intent: &ParsedIntent, now: DateTime<Utc>) -> Result<(), String> {
    if !intent.valid || intent.kind == IntentKind::Unknown {
        return Err(intent
            .error
            .clone()
            .unwrap_or_else(|| "Unknown intent".to_string()));
    }

    let amount = Decimal::from_str(&intent.amount)
        .map_err(|e| format!("Amount \"{}\" is not a number: {}", intent.amount, e))?;
    if amount <= Decimal::ZERO {
        return Err(format!("Amount must be positive, got {}", amount));
    }

    if intent.from_asset.is_empty() || intent.to_target.is_empty() {
        return Err("Source and destination must both be present".to_string());
    }

    let cutoff = now - Duration::seconds(PAST_DUE_GRACE_SECS);
    if intent.due_at < cutoff {
        return Err(format!(
            "Event start {} is more than {}s in the past",
            intent.due_at, PAST_DUE_GRACE_SECS
        ));
    }

    Ok(())
}

/// Parse and validate in one step.
pub fn parse_and_validate(
    event_id: &str,
    title: &str,
    start_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> ParsedIntent {
    let mut intent = parse_event(event_id, title, start_time);
    if intent.valid {
        if let Err(reason) = validate(&intent, now) {
            intent.valid = false;
            intent.error = Some(reason);
        }
    }
    intent
}
