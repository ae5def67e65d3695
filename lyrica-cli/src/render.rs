//! Terminal output for print and sync modes.

use lyrica_core::{ActiveChange, AnimationConfig, LyricText, SyncEvent, Timeline};
use std::io::{self, Write};
use std::sync::Arc;
use tracing::debug;

const LOG_TARGET: &str = "lyrica::cli::render";

/// Clear the screen and move the cursor home
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Write every lyric line once, headed by the title and artist if known.
pub fn print_all(timeline: &Timeline, container: &str, out: &mut impl Write) -> io::Result<()> {
    let metadata = timeline.metadata();
    match (metadata.title(), metadata.artist()) {
        (Some(title), Some(artist)) => writeln!(out, "{container} {artist} - {title}")?,
        (Some(title), None) => writeln!(out, "{container} {title}")?,
        _ => {}
    }

    for line in 0..timeline.line_count() {
        let (Some(time), Some(lyric)) = (timeline.line_time(line), timeline.lyric(line)) else {
            continue;
        };
        writeln!(out, "[{time}] {}", lyric.display_text())?;
    }
    Ok(())
}

/// Renders sync events as either the active line alone or a sliding window.
pub struct Renderer<W: Write> {
    timeline: Arc<Timeline>,
    animation: AnimationConfig,
    container: String,
    out: W,
}

impl<W: Write> Renderer<W> {
    pub fn new(
        timeline: Arc<Timeline>,
        animation: AnimationConfig,
        container: impl Into<String>,
        out: W,
    ) -> Self {
        Self {
            timeline,
            animation,
            container: container.into(),
            out,
        }
    }

    pub fn handle(&mut self, event: &SyncEvent) -> io::Result<()> {
        match event {
            SyncEvent::ActiveChanged(change) => self.render_active(change),
            SyncEvent::Cleared => {
                writeln!(self.out, "{}", self.container)?;
                self.out.flush()
            }
            SyncEvent::TimelineReplaced { lines } => {
                debug!(target: LOG_TARGET, "Rendering new timeline ({} lines)", lines);
                Ok(())
            }
            SyncEvent::Attached | SyncEvent::Detached => Ok(()),
        }
    }

    pub fn replace_timeline(&mut self, timeline: Arc<Timeline>) {
        self.timeline = timeline;
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn render_active(&mut self, change: &ActiveChange) -> io::Result<()> {
        match self.animation {
            AnimationConfig::Normal => {
                writeln!(
                    self.out,
                    "{} [{}] {}",
                    self.container,
                    change.time,
                    sung_text(&change.lyric, change.sub)
                )?;
            }
            AnimationConfig::Slide {
                auto_scroll,
                window,
            } => {
                if auto_scroll {
                    write!(self.out, "{CLEAR_SCREEN}")?;
                }
                writeln!(self.out, "{}", self.container)?;

                let first = change.line.saturating_sub(window);
                let last = change
                    .line
                    .saturating_add(window)
                    .min(self.timeline.line_count().saturating_sub(1));
                for line in first..=last {
                    let Some(lyric) = self.timeline.lyric(line) else {
                        continue;
                    };
                    if line == change.line {
                        writeln!(self.out, "> {}", sung_text(&change.lyric, change.sub))?;
                    } else {
                        writeln!(self.out, "  {}", lyric.display_text())?;
                    }
                }
                if !auto_scroll {
                    writeln!(self.out)?;
                }
            }
        }
        self.out.flush()
    }
}

/// Line text with the sung karaoke segments bracketed.
fn sung_text(lyric: &LyricText, sub: Option<usize>) -> String {
    let Some(sub) = sub else {
        return lyric.display_text().into_owned();
    };
    let segments = lyric.segments();
    let split = (sub + 1).min(segments.len());
    let sung: String = segments[..split].iter().map(|s| s.text.as_str()).collect();
    let rest: String = segments[split..].iter().map(|s| s.text.as_str()).collect();
    format!("[{sung}]{rest}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyrica_core::{ChangeKind, KaraokeMode, Timestamp};

    fn change(timeline: &Timeline, line: usize, sub: Option<usize>) -> ActiveChange {
        ActiveChange {
            line,
            sub,
            flat_index: line,
            time: timeline.line_time(line).unwrap(),
            lyric: timeline.lyric(line).unwrap().clone(),
            kind: ChangeKind::Advance,
        }
    }

    fn output(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_print_all_lists_lines() {
        let timeline = Timeline::parse(
            "[ti:Song]\n[ar:Band]\n[00:01.00]one\n[00:02.50]two",
            KaraokeMode::Disabled,
            None,
        );
        let mut out = Vec::new();
        print_all(&timeline, "#lyrics", &mut out).unwrap();
        assert_eq!(
            output(out),
            "#lyrics Band - Song\n[00:01.00] one\n[00:02.50] two\n"
        );
    }

    #[test]
    fn test_normal_animation_prints_active_line() {
        let timeline = Arc::new(Timeline::parse(
            "[00:01.00]one\n[00:02.00]two",
            KaraokeMode::Disabled,
            None,
        ));
        let mut renderer = Renderer::new(
            Arc::clone(&timeline),
            AnimationConfig::Normal,
            "#lyrics",
            Vec::new(),
        );
        renderer
            .handle(&SyncEvent::ActiveChanged(change(&timeline, 1, None)))
            .unwrap();
        renderer.handle(&SyncEvent::Attached).unwrap();
        assert_eq!(output(renderer.into_inner()), "#lyrics [00:02.00] two\n");
    }

    #[test]
    fn test_slide_animation_prints_window() {
        let timeline = Arc::new(Timeline::parse(
            "[00:01.00]a\n[00:02.00]b\n[00:03.00]c\n[00:04.00]d",
            KaraokeMode::Disabled,
            None,
        ));
        let mut renderer = Renderer::new(
            Arc::clone(&timeline),
            AnimationConfig::Slide {
                auto_scroll: false,
                window: 1,
            },
            ".lyrics",
            Vec::new(),
        );
        renderer
            .handle(&SyncEvent::ActiveChanged(change(&timeline, 3, None)))
            .unwrap();
        assert_eq!(output(renderer.into_inner()), ".lyrics\n  c\n> d\n\n");
    }

    #[test]
    fn test_karaoke_progress_is_bracketed() {
        let timeline = Timeline::parse(
            "[00:01.00]<00:01.00>Hel<00:01.50>lo<00:01.80> world",
            KaraokeMode::Tracked,
            None,
        );
        let lyric = timeline.lyric(0).unwrap();
        assert_eq!(sung_text(lyric, None), "Hello world");
        assert_eq!(sung_text(lyric, Some(0)), "[Hel]lo world");
        assert_eq!(sung_text(lyric, Some(2)), "[Hello world]");
        assert_eq!(Timestamp::from_millis(1000).to_string(), "00:01.00");
    }
}
