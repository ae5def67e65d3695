//! Time-ordered lyric timeline built from tokenized LRC lines.

use crate::lrc::{split_lines, tokenize_line, KaraokeMode, LineToken, LyricText, SubSegment};
use crate::metadata::Metadata;
use crate::time::Timestamp;
use serde::Serialize;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "lyrica::timeline";

/// Number of flat timeline entries owned by one lyric line in tracked
/// karaoke mode, and how many entries precede it.
///
/// `count` includes the line's own head entry, so a line with three word
/// tags owns four entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SegmentCount {
    pub count: usize,
    pub offset: usize,
}

/// Where a flat timeline index lands inside the lyric lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KaraokePosition {
    pub line: usize,
    /// Sub-segment reached so far; `None` when only the line head has
    /// been reached.
    pub sub: Option<usize>,
}

/// Immutable lyric timeline.
///
/// `times` holds every timed entry (line heads and, in tracked karaoke
/// mode, word boundary markers) in non-decreasing order. `lyrics` holds one
/// entry per lyric line.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    times: Vec<Timestamp>,
    lyrics: Vec<LyricText>,
    segment_counts: Option<Vec<SegmentCount>>,
    metadata: Metadata,
    offset_ms: i64,
    karaoke: KaraokeMode,
}

/// Serializable snapshot of a [`Timeline`] for inspection or export.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineData<'a> {
    pub lyrics: &'a [LyricText],
    pub times: &'a [Timestamp],
    pub metadata: &'a Metadata,
    pub offset_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_counts: Option<&'a [SegmentCount]>,
}

impl Timeline {
    /// Parse LRC text into a timeline.
    ///
    /// `offset_ms` overrides any `[offset:]` tag found in the text.
    #[must_use]
    pub fn parse(input: &str, karaoke: KaraokeMode, offset_ms: Option<i64>) -> Self {
        let mut builder = TimelineBuilder::new(karaoke).with_offset(offset_ms);
        for line in split_lines(input) {
            builder.push_line(line);
        }
        builder.build()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Number of flat entries, boundary markers included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Number of lyric lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lyrics.len()
    }

    #[must_use]
    pub fn times(&self) -> &[Timestamp] {
        &self.times
    }

    #[must_use]
    pub fn lyrics(&self) -> &[LyricText] {
        &self.lyrics
    }

    #[must_use]
    pub fn segment_counts(&self) -> Option<&[SegmentCount]> {
        self.segment_counts.as_deref()
    }

    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Effective offset: configured value, else the `[offset:]` tag, else 0.
    #[must_use]
    pub const fn offset_ms(&self) -> i64 {
        self.offset_ms
    }

    #[must_use]
    pub const fn karaoke(&self) -> KaraokeMode {
        self.karaoke
    }

    #[must_use]
    pub fn lyric(&self, line: usize) -> Option<&LyricText> {
        self.lyrics.get(line)
    }

    /// Flat index of the entry that starts `line`.
    #[must_use]
    pub fn line_head(&self, line: usize) -> Option<usize> {
        match &self.segment_counts {
            Some(counts) => counts.get(line).map(|c| c.offset),
            None => (line < self.lyrics.len()).then_some(line),
        }
    }

    /// Start time of `line`.
    #[must_use]
    pub fn line_time(&self, line: usize) -> Option<Timestamp> {
        self.line_head(line).and_then(|flat| self.times.get(flat).copied())
    }

    /// Map a flat index back to its lyric line and sub-segment.
    #[must_use]
    pub fn karaoke_match_index(&self, flat_index: usize) -> Option<KaraokePosition> {
        self.karaoke_match_index_from(flat_index, 0)
    }

    /// Like [`karaoke_match_index`](Self::karaoke_match_index), but starts
    /// walking from `hint_line` when that line does not lie past
    /// `flat_index`. The tracker passes its current line so steady playback
    /// resolves in a step or two.
    #[must_use]
    pub fn karaoke_match_index_from(
        &self,
        flat_index: usize,
        hint_line: usize,
    ) -> Option<KaraokePosition> {
        let Some(counts) = &self.segment_counts else {
            return (flat_index < self.lyrics.len()).then_some(KaraokePosition {
                line: flat_index,
                sub: None,
            });
        };

        let start = match counts.get(hint_line) {
            Some(c) if c.offset <= flat_index => hint_line,
            _ => 0,
        };

        counts
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, c)| flat_index < c.offset + c.count)
            .map(|(line, c)| KaraokePosition {
                line,
                sub: (flat_index - c.offset).checked_sub(1),
            })
    }

    /// Bulk snapshot for external inspection.
    #[must_use]
    pub fn data(&self) -> TimelineData<'_> {
        TimelineData {
            lyrics: &self.lyrics,
            times: &self.times,
            metadata: &self.metadata,
            offset_ms: self.offset_ms,
            segment_counts: self.segment_counts(),
        }
    }
}

/// A lyric line waiting to be sorted into the timeline.
#[derive(Debug, Clone)]
struct PendingLine {
    time: Timestamp,
    text: LyricText,
}

/// Accumulates tokenized lines in document order and sorts them into a
/// [`Timeline`].
#[derive(Debug, Default)]
pub struct TimelineBuilder {
    karaoke: KaraokeMode,
    offset_override: Option<i64>,
    lines: Vec<PendingLine>,
    metadata: Metadata,
}

impl TimelineBuilder {
    #[must_use]
    pub fn new(karaoke: KaraokeMode) -> Self {
        Self {
            karaoke,
            ..Self::default()
        }
    }

    /// Use a fixed offset instead of the `[offset:]` tag.
    #[must_use]
    pub const fn with_offset(mut self, offset_ms: Option<i64>) -> Self {
        self.offset_override = offset_ms;
        self
    }

    /// Tokenize and record one line. Returns whether it carried time tags.
    pub fn push_line(&mut self, line: &str) -> bool {
        let token = tokenize_line(line, self.karaoke);
        let has_time_tags = token.has_time_tags();
        self.push_token(token);
        has_time_tags
    }

    pub fn push_token(&mut self, token: LineToken) {
        match token {
            LineToken::Timed { times, text } => {
                let Some(&first) = times.first() else {
                    return;
                };
                for time in times {
                    self.lines.push(PendingLine {
                        time,
                        text: shift_segments(&text, first, time),
                    });
                }
            }
            LineToken::Metadata { key, value } => {
                debug!(target: LOG_TARGET, "Metadata tag {} = {}", key, value);
                self.metadata.insert(key, value);
            }
            LineToken::Noise => {}
        }
    }

    #[must_use]
    pub fn build(self) -> Timeline {
        let Self {
            karaoke,
            offset_override,
            mut lines,
            metadata,
        } = self;

        // Stable: equal times keep document order
        lines.sort_by_key(|line| line.time);

        let offset_ms = offset_override.or_else(|| metadata.offset()).unwrap_or(0);

        let (times, lyrics, segment_counts) = if karaoke == KaraokeMode::Tracked {
            flatten_tracked(lines)
        } else {
            let times = lines.iter().map(|l| l.time).collect();
            let lyrics = lines.into_iter().map(|l| l.text).collect();
            (times, lyrics, None)
        };

        let timeline = Timeline {
            times,
            lyrics,
            segment_counts,
            metadata,
            offset_ms,
            karaoke,
        };

        if timeline.is_empty() {
            warn!(target: LOG_TARGET, "No valid lyrics found in the provided LRC text");
        } else {
            info!(
                target: LOG_TARGET,
                "Built timeline with {} line(s), {} timed entries, offset {} ms",
                timeline.line_count(),
                timeline.len(),
                offset_ms
            );
        }

        timeline
    }
}

/// Move word timings of a repeated line so they keep their distance from
/// the line start.
fn shift_segments(text: &LyricText, first: Timestamp, time: Timestamp) -> LyricText {
    match text {
        LyricText::Segments(segments) if time != first => {
            let delta = i128::from(time.as_millis()) - i128::from(first.as_millis());
            let delta = i64::try_from(delta).unwrap_or(0);
            LyricText::Segments(
                segments
                    .iter()
                    .map(|s| SubSegment {
                        start: s.start.shifted(delta),
                        text: s.text.clone(),
                    })
                    .collect(),
            )
        }
        _ => text.clone(),
    }
}

/// Lay out sorted lines as head entry plus boundary markers, keeping
/// marker times between their own head and the next line's head.
fn flatten_tracked(
    lines: Vec<PendingLine>,
) -> (Vec<Timestamp>, Vec<LyricText>, Option<Vec<SegmentCount>>) {
    let mut times = Vec::with_capacity(lines.len());
    let mut lyrics = Vec::with_capacity(lines.len());
    let mut counts = Vec::with_capacity(lines.len());
    let mut offset = 0;

    let next_heads: Vec<Option<Timestamp>> = lines
        .iter()
        .skip(1)
        .map(|l| Some(l.time))
        .chain(std::iter::once(None))
        .collect();

    for (line, next_head) in lines.into_iter().zip(next_heads) {
        let PendingLine { time: head, mut text } = line;
        times.push(head);

        let mut floor = head;
        if let LyricText::Segments(segments) = &mut text {
            for segment in segments.iter_mut() {
                let mut start = segment.start.max(floor);
                if let Some(limit) = next_head {
                    start = start.min(limit);
                }
                segment.start = start;
                times.push(start);
                floor = start;
            }
        }

        let count = 1 + text.segments().len();
        counts.push(SegmentCount { count, offset });
        offset += count;
        lyrics.push(text);
    }

    (times, lyrics, Some(counts))
}
