//! Interactive commands read from stdin while syncing.

use lyrica_core::{GoTo, TimeQuery, Timestamp};
use std::str::FromStr;

pub const HELP: &str = "\
commands:
  n [k]          next line (k lines ahead)
  p [k]          previous line
  l              return to the previously active line
  g <mm:ss.xx>   go to the line active at a time
  g #<index>     go to a line index
  g <text> [@k]  go to the k-th line with this text
  f <text>       list lines with this text
  c              show the active line
  play | pause   control the clock
  r              reload lyrics from the source
  q              quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Next(usize),
    Previous(usize),
    Last,
    GoTo(GoTo),
    Find(String),
    Current,
    Play,
    Pause,
    Reload,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let (word, rest) = input
            .split_once(char::is_whitespace)
            .map_or((input, ""), |(w, r)| (w, r.trim()));

        match word {
            "n" | "next" => Ok(Self::Next(distance(rest)?)),
            "p" | "prev" | "previous" => Ok(Self::Previous(distance(rest)?)),
            "l" | "last" => Ok(Self::Last),
            "g" | "goto" => parse_goto(rest).map(Self::GoTo),
            "f" | "find" if !rest.is_empty() => Ok(Self::Find(rest.to_string())),
            "c" | "current" => Ok(Self::Current),
            "play" => Ok(Self::Play),
            "pause" => Ok(Self::Pause),
            "r" | "reload" => Ok(Self::Reload),
            "h" | "help" | "?" => Ok(Self::Help),
            "q" | "quit" => Ok(Self::Quit),
            _ => Err(format!("unknown command {input:?} (h for help)")),
        }
    }
}

fn distance(arg: &str) -> Result<usize, String> {
    if arg.is_empty() {
        return Ok(1);
    }
    arg.parse()
        .map_err(|_| format!("expected a line count, got {arg:?}"))
}

fn parse_goto(arg: &str) -> Result<GoTo, String> {
    if arg.is_empty() {
        return Err("g needs a time, #index or lyric text".into());
    }
    if let Some(index) = arg.strip_prefix('#') {
        return index
            .parse()
            .map(GoTo::Index)
            .map_err(|_| format!("expected a line index, got {index:?}"));
    }
    if let Ok(time) = arg.parse::<Timestamp>() {
        return Ok(GoTo::Time(TimeQuery::from(time)));
    }

    let (text, occurrence) = match arg.rsplit_once(" @") {
        Some((text, n)) => match n.parse() {
            Ok(n) => (text.trim(), n),
            Err(_) => (arg, 0),
        },
        None => (arg, 0),
    };
    Ok(GoTo::Lyric {
        text: text.to_string(),
        occurrence,
    })
}
