//! Line-level tokenizer for the LRC format.
//!
//! Each input line is classified independently as a timed lyric line
//! (one or more leading `[mm:ss.ff]` tags followed by text), a metadata
//! tag (`[key: value]`), or noise. Enhanced LRC word timing
//! (`<mm:ss.ff>word`) is only recognized when karaoke parsing is enabled.

use crate::time::{Timestamp, LINE_TAG_FRACTION_DIGITS, WORD_TAG_FRACTION_DIGITS};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::debug;

const LOG_TARGET: &str = "lyrica::lrc";

/// How inline `<mm:ss.ff>` word tags are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KaraokeMode {
    /// Word tags are not recognized and stay in the lyric text verbatim.
    #[default]
    Disabled,
    /// Word tags are stripped; the lyric is the concatenated word text.
    Merged,
    /// Word tags become sub-segments with their own boundary markers.
    Tracked,
}

impl KaraokeMode {
    #[must_use]
    pub const fn parses_word_tags(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// One timed piece of a karaoke line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubSegment {
    /// Time of the word tag that introduced this segment.
    pub start: Timestamp,
    pub text: String,
}

/// Text carried by a lyric line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LyricText {
    Plain(String),
    Segments(Vec<SubSegment>),
}

impl LyricText {
    /// Text as it would be shown without word highlighting.
    #[must_use]
    pub fn display_text(&self) -> Cow<'_, str> {
        match self {
            Self::Plain(text) => Cow::Borrowed(text),
            Self::Segments(segments) => {
                Cow::Owned(segments.iter().map(|s| s.text.as_str()).collect())
            }
        }
    }

    #[must_use]
    pub fn segments(&self) -> &[SubSegment] {
        match self {
            Self::Plain(_) => &[],
            Self::Segments(segments) => segments,
        }
    }
}

impl From<&str> for LyricText {
    fn from(text: &str) -> Self {
        Self::Plain(text.to_string())
    }
}

/// Classification of a single input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineToken {
    /// A lyric repeated at every leading timestamp.
    Timed {
        times: Vec<Timestamp>,
        text: LyricText,
    },
    Metadata {
        key: String,
        value: String,
    },
    /// Empty or unrecognized content; silently ignored.
    Noise,
}

impl LineToken {
    #[must_use]
    pub const fn has_time_tags(&self) -> bool {
        matches!(self, Self::Timed { .. })
    }
}

/// Split input on `\n`, `\r\n` and lone `\r` line endings.
pub fn split_lines(input: &str) -> impl Iterator<Item = &str> {
    input.lines().flat_map(|line| line.split('\r'))
}

/// Classify one line of LRC text.
#[must_use]
pub fn tokenize_line(line: &str, karaoke: KaraokeMode) -> LineToken {
    if line.trim().is_empty() {
        return LineToken::Noise;
    }

    let mut times = Vec::new();
    let mut saw_malformed_time = false;
    let mut remaining = line.trim_start();

    // Extract all timestamps at the beginning
    while let Some(after_open) = remaining.strip_prefix('[') {
        let Some(end) = after_open.find(']') else {
            break;
        };
        let body = &after_open[..end];

        if let Some(time) = Timestamp::parse_tag_body(body, &LINE_TAG_FRACTION_DIGITS) {
            times.push(time);
        } else if looks_like_time(body) {
            debug!(target: LOG_TARGET, "Skipping malformed timestamp tag [{}]", body);
            saw_malformed_time = true;
        } else {
            break;
        }
        remaining = &after_open[end + 1..];
    }

    if times.is_empty() {
        if saw_malformed_time {
            return LineToken::Noise;
        }
        return parse_metadata_tag(line.trim()).map_or(LineToken::Noise, |(key, value)| {
            LineToken::Metadata { key, value }
        });
    }

    // Lyric text is the remainder verbatim
    let text = if karaoke.parses_word_tags() {
        match parse_word_segments(remaining) {
            Some(segments) if karaoke == KaraokeMode::Tracked => LyricText::Segments(segments),
            Some(segments) => LyricText::Plain(segments.into_iter().map(|s| s.text).collect()),
            None => LyricText::from(remaining),
        }
    } else {
        LyricText::from(remaining)
    };

    LineToken::Timed { times, text }
}

/// A bracket body that was clearly meant as a timestamp.
fn looks_like_time(body: &str) -> bool {
    body.starts_with(|c: char| c.is_ascii_digit()) && body.contains(':')
}

/// Parse an ID tag like `[ti: Title]`. The key must be alphanumeric and the
/// value non-empty.
fn parse_metadata_tag(line: &str) -> Option<(String, String)> {
    let content = line.strip_prefix('[')?;
    let end = content.find(']')?;
    let (key, value) = content[..end].split_once(':')?;

    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    Some((key.to_string(), value.to_string()))
}

/// Split text on `<mm:ss.ff>` word tags.
///
/// Text before the first tag joins the first segment and a malformed tag
/// stays literal. Returns `None` when there is no valid tag at all.
fn parse_word_segments(text: &str) -> Option<Vec<SubSegment>> {
    let mut segments: Vec<SubSegment> = Vec::new();
    let mut pending = String::new();
    let mut remaining = text;

    while let Some(open) = remaining.find('<') {
        pending.push_str(&remaining[..open]);
        let after_open = &remaining[open + 1..];

        let tag = after_open.find('>').and_then(|end| {
            Timestamp::parse_tag_body(&after_open[..end], &WORD_TAG_FRACTION_DIGITS)
                .map(|start| (start, end))
        });

        if let Some((start, end)) = tag {
            if let Some(last) = segments.last_mut() {
                last.text.push_str(&pending);
                pending.clear();
            }
            segments.push(SubSegment {
                start,
                text: std::mem::take(&mut pending),
            });
            remaining = &after_open[end + 1..];
        } else {
            pending.push('<');
            remaining = after_open;
        }
    }

    pending.push_str(remaining);
    let last = segments.last_mut()?;
    last.text.push_str(&pending);
    Some(segments)
}
