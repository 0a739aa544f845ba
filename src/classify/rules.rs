//! Ordered prefix / keyword rules for lines without a channel tag.
//!
//! [`PREFIX_RULES`] is evaluated top to bottom; the first rule whose
//! predicate accepts the line parses it.  Adding a rule means adding a row,
//! not touching the classifier loop.

use super::combat::{parse_gain, parse_hit, parse_miss};
use super::event::{Event, RosterChange, SpeechEvent, StateEvent};
use super::parsers::ParseError;
use crate::config::SpeechConfig;

// ---------------------------------------------------------------------------
// LogLine / RuleContext
// ---------------------------------------------------------------------------

/// A log line split into its fixed fields.
#[derive(Debug, Clone)]
pub struct LogLine<'a> {
    pub date: &'a str,
    pub time: &'a str,
    /// Everything after the timestamp, sentence-terminal periods removed.
    pub rest: &'a str,
    pub tokens: Vec<&'a str>,
}

impl<'a> LogLine<'a> {
    /// Split `DATE TIME REST` on the first two whitespace runs.
    pub fn split(raw: &'a str) -> Result<Self, ParseError> {
        let malformed = || ParseError::MalformedLine(raw.to_string());

        let line = raw.trim();
        let (date, after_date) = line.split_once(char::is_whitespace).ok_or_else(malformed)?;
        let (time, rest) = after_date
            .trim_start()
            .split_once(char::is_whitespace)
            .ok_or_else(malformed)?;

        let looks_like_stamp = date.starts_with(|c: char| c.is_ascii_digit()) && time.contains(':');
        if !looks_like_stamp {
            return Err(malformed());
        }

        let rest = rest.trim().trim_end_matches('.').trim_end();
        if rest.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            date,
            time,
            rest,
            tokens: rest.split_whitespace().collect(),
        })
    }

    fn starts_with(&self, words: &[&str]) -> bool {
        self.tokens.len() >= words.len() && self.tokens.iter().zip(words).all(|(t, w)| t == w)
    }
}

/// Read-only context handed to every rule.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub speech: &'a SpeechConfig,
    /// Logged-in character, once known.
    pub character: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// PrefixRule
// ---------------------------------------------------------------------------

type Predicate = fn(&LogLine<'_>) -> bool;
type RuleParser = fn(&LogLine<'_>, &RuleContext<'_>) -> Result<Vec<Event>, ParseError>;

pub struct PrefixRule {
    pub name: &'static str,
    pub matches: Predicate,
    pub parse: RuleParser,
}

/// Rules in priority order.
pub static PREFIX_RULES: &[PrefixRule] = &[
    PrefixRule {
        name: "login",
        matches: is_login,
        parse: rule_login,
    },
    PrefixRule {
        name: "badge",
        matches: is_badge,
        parse: rule_badge,
    },
    PrefixRule {
        name: "hit",
        matches: is_hit,
        parse: rule_hit,
    },
    PrefixRule {
        name: "miss",
        matches: is_miss,
        parse: rule_miss,
    },
    PrefixRule {
        name: "gain",
        matches: is_gain,
        parse: rule_gain,
    },
    PrefixRule {
        name: "you-are",
        matches: is_you_are,
        parse: rule_you_are,
    },
    PrefixRule {
        name: "you-have",
        matches: is_you_have,
        parse: rule_you_have,
    },
    PrefixRule {
        name: "level-up",
        matches: is_level_up,
        parse: rule_level_up,
    },
    PrefixRule {
        name: "recharged",
        matches: is_recharged,
        parse: rule_recharged,
    },
    PrefixRule {
        name: "team-roster",
        matches: is_roster_change,
        parse: rule_roster_change,
    },
];

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

const LOGIN_MARKERS: &[&str] = &["Welcome to ", "Now entering "];

fn is_login(line: &LogLine<'_>) -> bool {
    LOGIN_MARKERS.iter().any(|m| line.rest.starts_with(m))
}

/// Character name from a `Welcome to City of Heroes, <Name>!` style marker:
/// the trailing words after the last comma.
pub fn login_name(rest: &str) -> Option<String> {
    if !LOGIN_MARKERS.iter().any(|m| rest.starts_with(m)) {
        return None;
    }
    let (_, tail) = rest.rsplit_once(',')?;
    let name = tail.trim().trim_end_matches(['!', '.']).trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn rule_login(line: &LogLine<'_>, _: &RuleContext<'_>) -> Result<Vec<Event>, ParseError> {
    let name = login_name(line.rest).ok_or_else(|| ParseError::Shape {
        parser: "login",
        body: line.rest.to_string(),
    })?;
    Ok(vec![StateEvent::CharacterLogin { name }.into()])
}

// ---------------------------------------------------------------------------
// Badges
// ---------------------------------------------------------------------------

fn is_badge(line: &LogLine<'_>) -> bool {
    line.tokens.first() == Some(&"Congratulations!")
}

fn rule_badge(line: &LogLine<'_>, ctx: &RuleContext<'_>) -> Result<Vec<Event>, ParseError> {
    Ok(narrate_if(ctx.speech.speak_badges, line.rest))
}

// ---------------------------------------------------------------------------
// Combat / gains
// ---------------------------------------------------------------------------

fn is_hit(line: &LogLine<'_>) -> bool {
    line.starts_with(&["You", "hit"])
}

fn rule_hit(line: &LogLine<'_>, _: &RuleContext<'_>) -> Result<Vec<Event>, ParseError> {
    parse_hit(line.rest)
}

fn is_miss(line: &LogLine<'_>) -> bool {
    line.starts_with(&["You", "MISSED"])
}

fn rule_miss(line: &LogLine<'_>, _: &RuleContext<'_>) -> Result<Vec<Event>, ParseError> {
    parse_miss(line.rest)
}

fn is_gain(line: &LogLine<'_>) -> bool {
    line.starts_with(&["You", "gain"])
}

fn rule_gain(line: &LogLine<'_>, _: &RuleContext<'_>) -> Result<Vec<Event>, ParseError> {
    Ok(parse_gain(&line.tokens))
}

// ---------------------------------------------------------------------------
// Buffs / debuffs
// ---------------------------------------------------------------------------

fn is_you_are(line: &LogLine<'_>) -> bool {
    line.starts_with(&["You", "are"])
}

fn is_you_have(line: &LogLine<'_>) -> bool {
    line.starts_with(&["You", "have"])
}

/// Conditions that count as debuffs.  Everything else is a buff.
const DEBUFF_CONDITIONS: &[&str] = &[
    "held",
    "stunned",
    "slept",
    "asleep",
    "immobilized",
    "terrorized",
    "afraid",
    "confused",
    "disoriented",
    "knocked",
    "slowed",
    "interrupted",
    "taunted",
    "placated",
    "blinded",
];

fn is_debuff(words: &[&str]) -> bool {
    words.first().is_some_and(|w| {
        let w = w
            .trim_end_matches(|c: char| !c.is_alphanumeric())
            .to_ascii_lowercase();
        DEBUFF_CONDITIONS.contains(&w.as_str())
    })
}

fn condition(line: &LogLine<'_>, ctx: &RuleContext<'_>, words: &[&str]) -> Vec<Event> {
    let enabled = if is_debuff(words) {
        ctx.speech.speak_debuffs
    } else {
        ctx.speech.speak_buffs
    };
    narrate_if(enabled, line.rest)
}

fn rule_you_are(line: &LogLine<'_>, ctx: &RuleContext<'_>) -> Result<Vec<Event>, ParseError> {
    Ok(condition(line, ctx, &line.tokens[2..]))
}

fn rule_you_have(line: &LogLine<'_>, ctx: &RuleContext<'_>) -> Result<Vec<Event>, ParseError> {
    match line.tokens.get(2) {
        Some(&"been") => Ok(condition(line, ctx, &line.tokens[3..])),
        Some(&"defeated") => Ok(Vec::new()),
        _ => Ok(condition(line, ctx, &line.tokens[2..])),
    }
}

// ---------------------------------------------------------------------------
// Level-up
// ---------------------------------------------------------------------------

fn is_level_up(line: &LogLine<'_>) -> bool {
    line.tokens.first() == Some(&"Your") && line.rest.contains(" improves to level ")
}

/// `Your combat improves to level 23! Seek a trainer…`
fn rule_level_up(line: &LogLine<'_>, ctx: &RuleContext<'_>) -> Result<Vec<Event>, ParseError> {
    let shape = || ParseError::Shape {
        parser: "level-up",
        body: line.rest.to_string(),
    };
    let (announcement, _) = line.rest.split_once(" improves to level ").ok_or_else(shape)?;
    let after = &line.rest[announcement.len() + " improves to level ".len()..];
    let digits: String = after.chars().take_while(char::is_ascii_digit).collect();
    let level: u32 = digits.parse().map_err(|_| shape())?;

    let sentence = line.rest.split('!').next().unwrap_or(line.rest).trim();

    let mut events: Vec<Event> = vec![StateEvent::LevelUp { level }.into()];
    events.extend(narrate_if(ctx.speech.speak_level_ups, sentence));
    Ok(events)
}

// ---------------------------------------------------------------------------
// Power recharge
// ---------------------------------------------------------------------------

fn is_recharged(line: &LogLine<'_>) -> bool {
    line.tokens.len() >= 3 && line.tokens.ends_with(&["is", "recharged"])
}

fn rule_recharged(line: &LogLine<'_>, ctx: &RuleContext<'_>) -> Result<Vec<Event>, ParseError> {
    let words = &line.tokens[..line.tokens.len() - 2];
    let words = match words.first() {
        Some(&"Your") => &words[1..],
        _ => words,
    };
    if words.is_empty() {
        return Err(ParseError::Shape {
            parser: "recharged",
            body: line.rest.to_string(),
        });
    }
    let power = words.join(" ");
    let mut events: Vec<Event> = vec![StateEvent::PowerRecharged {
        power: power.clone(),
    }
    .into()];
    events.extend(narrate_if(
        ctx.speech.speak_recharges,
        &format!("{power} is recharged"),
    ));
    Ok(events)
}

// ---------------------------------------------------------------------------
// Team roster
// ---------------------------------------------------------------------------

fn roster_verb(word: &str) -> Option<RosterChange> {
    match word {
        "joined" => Some(RosterChange::Joined),
        "quit" | "left" => Some(RosterChange::Quit),
        _ => None,
    }
}

fn is_roster_change(line: &LogLine<'_>) -> bool {
    let n = line.tokens.len();
    n >= 4 && line.tokens.ends_with(&["the", "team"]) && roster_verb(line.tokens[n - 3]).is_some()
}

/// `Sparky has joined the team` / `Sparky has quit the team`
fn rule_roster_change(line: &LogLine<'_>, _: &RuleContext<'_>) -> Result<Vec<Event>, ParseError> {
    let n = line.tokens.len();
    let change = roster_verb(line.tokens[n - 3]).ok_or_else(|| ParseError::Shape {
        parser: "team-roster",
        body: line.rest.to_string(),
    })?;
    let mut name_words = &line.tokens[..n - 3];
    if name_words.last() == Some(&"has") {
        name_words = &name_words[..name_words.len() - 1];
    }
    if name_words.is_empty() {
        return Err(ParseError::Shape {
            parser: "team-roster",
            body: line.rest.to_string(),
        });
    }
    Ok(vec![StateEvent::TeamChange {
        name: name_words.join(" "),
        change,
    }
    .into()])
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn narrate_if(enabled: bool, text: &str) -> Vec<Event> {
    let text = text.trim().trim_end_matches(['!', '.']).trim();
    if !enabled || text.is_empty() {
        return Vec::new();
    }
    vec![SpeechEvent::narration(text).into()]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn run(
        raw: &str,
        speech: &SpeechConfig,
    ) -> Option<(&'static str, Result<Vec<Event>, ParseError>)> {
        let line = LogLine::split(raw).ok()?;
        let ctx = RuleContext {
            speech,
            character: None,
        };
        PREFIX_RULES
            .iter()
            .find(|r| (r.matches)(&line))
            .map(|r| (r.name, (r.parse)(&line, &ctx)))
    }

    #[test]
    fn split_line_fields() {
        let line = LogLine::split("2024-04-01 20:04:17 You are held!").unwrap();
        assert_eq!(line.date, "2024-04-01");
        assert_eq!(line.time, "20:04:17");
        assert_eq!(line.rest, "You are held!");
        assert_eq!(line.tokens, vec!["You", "are", "held!"]);
    }

    #[test]
    fn split_strips_terminal_periods_only() {
        let line = LogLine::split("2024-04-01 20:04:17 Mr. Smith waits...").unwrap();
        assert_eq!(line.rest, "Mr. Smith waits");
    }

    #[test]
    fn split_rejects_malformed() {
        assert!(LogLine::split("").is_err());
        assert!(LogLine::split("hello world").is_err());
        assert!(LogLine::split("2024-04-01 20:04:17").is_err());
        assert!(LogLine::split("2024-04-01 noon something").is_err());
        assert!(LogLine::split("2024-04-01 20:04:17 ...").is_err());
    }

    #[test]
    fn login_name_extraction() {
        assert_eq!(
            login_name("Welcome to City of Heroes, Captain Zed!"),
            Some("Captain Zed".into())
        );
        assert_eq!(
            login_name("Now entering the Rogue Isles, Dark Mistress!"),
            Some("Dark Mistress".into())
        );
        assert_eq!(login_name("Welcome to the team"), None);
        assert_eq!(login_name("Hello, world"), None);
    }

    #[test]
    fn debuff_respects_toggle() {
        let mut speech = SpeechConfig::default();
        speech.speak_debuffs = false;
        let (name, events) = run("2024-04-01 20:04:17 You are held!", &speech).unwrap();
        assert_eq!(name, "you-are");
        assert!(events.unwrap().is_empty());

        speech.speak_debuffs = true;
        let (_, events) = run("2024-04-01 20:04:17 You are held!", &speech).unwrap();
        assert_eq!(events.unwrap(), vec![Event::Speech(SpeechEvent::narration("You are held"))]);
    }

    #[test]
    fn buff_uses_buff_toggle() {
        let mut speech = SpeechConfig::default();
        speech.speak_buffs = true;
        speech.speak_debuffs = false;
        let (_, events) = run("2024-04-01 20:04:17 You are hasted", &speech).unwrap();
        assert_eq!(events.unwrap().len(), 1);
        let (_, events) = run("2024-04-01 20:04:17 You have been stunned!", &speech).unwrap();
        assert!(events.unwrap().is_empty());
    }

    #[test]
    fn defeated_is_recognised_but_silent() {
        let mut speech = SpeechConfig::default();
        speech.speak_buffs = true;
        let (name, events) =
            run("2024-04-01 20:04:17 You have defeated Hellion Gunner", &speech).unwrap();
        assert_eq!(name, "you-have");
        assert!(events.unwrap().is_empty());
    }

    #[test]
    fn level_up_emits_state_and_speech() {
        let speech = SpeechConfig::default();
        let (_, events) = run(
            "2024-07-26 19:01:05 Your combat improves to level 23! Seek a trainer...",
            &speech,
        )
        .unwrap();
        assert_eq!(
            events.unwrap(),
            vec![
                Event::State(StateEvent::LevelUp { level: 23 }),
                Event::Speech(SpeechEvent::narration("Your combat improves to level 23")),
            ]
        );
    }

    #[test]
    fn recharge_names_the_power() {
        let speech = SpeechConfig::default();
        let (name, events) = run("2024-07-26 19:01:05 Your Hasten is recharged.", &speech).unwrap();
        assert_eq!(name, "recharged");
        assert_eq!(
            events.unwrap(),
            vec![Event::State(StateEvent::PowerRecharged {
                power: "Hasten".into()
            })]
        );
    }

    #[test]
    fn roster_join_and_quit() {
        let speech = SpeechConfig::default();
        let (_, events) =
            run("2024-07-26 19:01:05 Sparky Jr has joined the team", &speech).unwrap();
        assert_eq!(
            events.unwrap(),
            vec![Event::State(StateEvent::TeamChange {
                name: "Sparky Jr".into(),
                change: RosterChange::Joined
            })]
        );
        let (_, events) = run("2024-07-26 19:01:05 Sparky has quit the team.", &speech).unwrap();
        assert!(matches!(
            events.unwrap().as_slice(),
            [Event::State(StateEvent::TeamChange {
                change: RosterChange::Quit,
                ..
            })]
        ));
    }

    #[test]
    fn badge_is_narrated() {
        let speech = SpeechConfig::default();
        let (name, events) = run(
            "2024-07-26 19:01:05 Congratulations! You earned the Ghost Widow badge.",
            &speech,
        )
        .unwrap();
        assert_eq!(name, "badge");
        assert_eq!(
            events.unwrap(),
            vec![Event::Speech(SpeechEvent::narration(
                "Congratulations! You earned the Ghost Widow badge"
            ))]
        );
    }

    #[test]
    fn unmatched_line_has_no_rule() {
        let speech = SpeechConfig::default();
        assert!(run("2024-07-26 19:01:05 The wind howls", &speech).is_none());
    }
}
