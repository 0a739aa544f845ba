//! Combat and progression sub-parsers: damage, misses, experience and
//! influence gains.
//!
//! Damage lines are matched against strict patterns; anything that starts
//! like a hit but fits neither shape is a [`ParseError::Shape`].

use once_cell::sync::Lazy;
use regex::Regex;

use super::event::{Event, StatEvent};
use super::parsers::ParseError;

static HIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^You hit (?P<target>.+?) with your (?P<power>.+?) for (?P<amount>[\d,]+(?:\.\d+)?) points? of (?P<dtype>.+?) damage(?P<dot> over time)?(?:\s*\((?P<special>[^)]+)\))?[.!]?$",
    )
    .expect("valid regex")
});

static REDUCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^You hit (?P<target>.+?) with your (?P<power>.+?) reducing ").expect("valid regex")
});

static MISS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^You MISSED (?P<target>.+?) with your (?P<power>[^!.]+)").expect("valid regex")
});

// ---------------------------------------------------------------------------
// Damage
// ---------------------------------------------------------------------------

/// Parse a `You hit …` line.
///
/// * full damage shape → one [`StatEvent::Damage`]
/// * `… reducing …` debuff application → no events
/// * anything else → [`ParseError::Shape`]
pub fn parse_hit(rest: &str) -> Result<Vec<Event>, ParseError> {
    if let Some(caps) = HIT_RE.captures(rest) {
        let amount = parse_amount(&caps["amount"]).ok_or_else(|| ParseError::Shape {
            parser: "hit",
            body: rest.to_string(),
        })?;
        return Ok(vec![StatEvent::Damage {
            target: caps["target"].to_string(),
            power: caps["power"].to_string(),
            amount,
            damage_type: caps["dtype"].to_string(),
            over_time: caps.name("dot").is_some(),
            special: caps.name("special").map(|m| title_case(m.as_str())),
        }
        .into()]);
    }

    if REDUCE_RE.is_match(rest) {
        return Ok(Vec::new());
    }

    Err(ParseError::Shape {
        parser: "hit",
        body: rest.to_string(),
    })
}

/// `You MISSED <target> with your <power>!! …`
pub fn parse_miss(rest: &str) -> Result<Vec<Event>, ParseError> {
    let caps = MISS_RE.captures(rest).ok_or_else(|| ParseError::Shape {
        parser: "miss",
        body: rest.to_string(),
    })?;
    Ok(vec![StatEvent::Miss {
        target: caps["target"].to_string(),
        power: caps["power"].trim().to_string(),
    }
    .into()])
}

// ---------------------------------------------------------------------------
// Gains
// ---------------------------------------------------------------------------

/// `You gain 1,250 experience and 3,000 influence.`
///
/// Quantities are read from the token immediately before each currency word.
/// A line mentioning neither yields no events.
pub fn parse_gain(tokens: &[&str]) -> Vec<Event> {
    let mut events = Vec::new();
    for (i, token) in tokens.iter().enumerate().skip(1) {
        let word = token
            .trim_end_matches(|c: char| !c.is_alphanumeric())
            .to_ascii_lowercase();
        let Some(amount) = parse_count(tokens[i - 1]) else {
            continue;
        };
        match word.as_str() {
            "experience" => events.push(StatEvent::XpGain(amount).into()),
            "influence" | "information" | "infamy" => {
                events.push(StatEvent::InfGain(amount).into())
            }
            _ => {}
        }
    }
    events
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `"1,234.6"` → `1235`.
fn parse_amount(raw: &str) -> Option<u64> {
    let value: f64 = raw.replace(',', "").parse().ok()?;
    (value.is_finite() && value >= 0.0).then(|| value.round() as u64)
}

/// Whole counts with optional thousands separators.
fn parse_count(raw: &str) -> Option<u64> {
    raw.replace(',', "").parse().ok()
}

/// `"CRITICAL HIT"` → `"Critical Hit"`.
pub fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
