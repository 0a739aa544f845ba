//! Channel sub-parsers: turn the body of a `[Tag] …` line into a speaker and
//! an utterance.
//!
//! Each [`ParserKind`] maps to one function here.  All of them strip chat
//! markup before returning text.

use thiserror::Error;

use super::caption::CaptionState;
use super::markup::{bgcolor, strip_markup};
use super::router::ParserKind;

// ---------------------------------------------------------------------------
// ParseError
// ---------------------------------------------------------------------------

/// Recoverable classification failures.  Never leave the classifier: they
/// are logged and the line is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The line does not split into `date time rest`.
    #[error("malformed line: {0:?}")]
    MalformedLine(String),

    /// A bracket tag or leading-token rule that nothing recognises.
    #[error("unclassified tag: {0:?}")]
    UnclassifiedTag(String),

    /// A sub-parser's expected shape did not match.
    #[error("{parser}: unexpected shape: {body:?}")]
    Shape { parser: &'static str, body: String },
}

impl ParseError {
    fn shape(parser: &'static str, body: &str) -> Self {
        ParseError::Shape {
            parser,
            body: body.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsed
// ---------------------------------------------------------------------------

/// What a channel parser extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    Speech {
        speaker: Option<String>,
        text: String,
    },
    /// Structured `key=value` pairs from an outbound self-report.
    SelfReport(Vec<(String, String)>),
    /// Recognised, but nothing to emit.
    Nothing,
}

/// Run the parser selected by `kind` over `body`.
///
/// `me` is the logged-in character, used to attribute outbound tells.
pub fn parse_channel(
    kind: ParserKind,
    body: &str,
    me: Option<&str>,
    caption: &mut CaptionState,
) -> Result<Parsed, ParseError> {
    match kind {
        ParserKind::Direct => parse_direct(body),
        ParserKind::PrivateMessage => parse_private(body, me),
        ParserKind::Caption => Ok(parse_caption(body, caption)),
    }
}

// ---------------------------------------------------------------------------
// Direct
// ---------------------------------------------------------------------------

/// `Speaker: text`: the speaker is everything before the first colon.
pub fn parse_direct(body: &str) -> Result<Parsed, ParseError> {
    let (speaker, text) = split_speaker(body).ok_or_else(|| ParseError::shape("direct", body))?;
    Ok(Parsed::Speech {
        speaker: Some(speaker.to_string()),
        text: strip_markup(text),
    })
}

fn split_speaker(body: &str) -> Option<(&str, &str)> {
    let (speaker, text) = body.split_once(':')?;
    let speaker = speaker.trim();
    if speaker.is_empty() {
        return None;
    }
    Some((speaker, text.trim()))
}

// ---------------------------------------------------------------------------
// Private message
// ---------------------------------------------------------------------------

const OUTBOUND_PREFIX: &str = "-->";

/// `[Tell]` bodies.  Inbound tells speak as the sender; outbound tells speak
/// as the logged-in character unless they carry a self-report payload.
pub fn parse_private(body: &str, me: Option<&str>) -> Result<Parsed, ParseError> {
    let Some(outbound) = body.strip_prefix(OUTBOUND_PREFIX) else {
        return parse_direct(body);
    };

    let (_recipient, text) =
        split_speaker(outbound).ok_or_else(|| ParseError::shape("tell", body))?;
    let text = strip_markup(text);

    if let Some(pairs) = parse_self_report(&text) {
        return Ok(Parsed::SelfReport(pairs));
    }

    match me {
        Some(name) => Ok(Parsed::Speech {
            speaker: Some(name.to_string()),
            text,
        }),
        None => {
            log::debug!("tell: outbound message before login identified, dropping");
            Ok(Parsed::Nothing)
        }
    }
}

/// `key=value;key=value` → pairs.  Every non-empty segment must be a pair with
/// a non-empty key, otherwise this is ordinary chat.
pub fn parse_self_report(text: &str) -> Option<Vec<(String, String)>> {
    if !text.contains('=') {
        return None;
    }
    let mut pairs = Vec::new();
    for segment in text.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let (key, value) = segment.split_once('=')?;
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return None;
        }
        pairs.push((key.to_string(), value.trim().to_string()));
    }
    (!pairs.is_empty()).then_some(pairs)
}

// ---------------------------------------------------------------------------
// Caption
// ---------------------------------------------------------------------------

/// `[Caption]` bodies.  Asterisks are removed outright: the synthesiser reads
/// them aloud otherwise.
pub fn parse_caption(body: &str, caption: &mut CaptionState) -> Parsed {
    let color = bgcolor(body);
    let text = strip_markup(&body.replace('*', ""));
    let speaker = caption.identify(color.as_deref(), &text);
    Parsed::Speech { speaker, text }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
