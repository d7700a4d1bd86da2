//! The only SDP edits this protocol performs: flipping media directions for
//! the provisional-answer admission flow. Everything else in a description is
//! passed through untouched.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl Direction {
    fn parse(line: &str) -> Option<Self> {
        match line.trim_end() {
            "a=sendrecv" => Some(Direction::SendRecv),
            "a=sendonly" => Some(Direction::SendOnly),
            "a=recvonly" => Some(Direction::RecvOnly),
            "a=inactive" => Some(Direction::Inactive),
            _ => None,
        }
    }

    pub fn receives(self) -> bool {
        matches!(self, Direction::SendRecv | Direction::RecvOnly)
    }

    /// Same sending behaviour, with receiving switched off.
    fn without_receive(self) -> Self {
        match self {
            Direction::SendRecv => Direction::SendOnly,
            Direction::RecvOnly => Direction::Inactive,
            other => other,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attr = match self {
            Direction::SendRecv => "a=sendrecv",
            Direction::SendOnly => "a=sendonly",
            Direction::RecvOnly => "a=recvonly",
            Direction::Inactive => "a=inactive",
        };
        f.write_str(attr)
    }
}

/// A media section whose receive direction was withheld.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithheldSection {
    pub index: usize,
    pub mid: Option<String>,
    pub original: Direction,
}

impl WithheldSection {
    fn matches(&self, index: usize, mid: Option<&str>) -> bool {
        match (&self.mid, mid) {
            (Some(a), Some(b)) => a == b,
            _ => self.index == index,
        }
    }
}

struct MediaLine {
    section: usize,
    line: usize,
    mid: Option<String>,
    direction: Direction,
}

fn split_lines(sdp: &str) -> (Vec<&str>, &'static str) {
    let eol = if sdp.contains("\r\n") { "\r\n" } else { "\n" };
    (sdp.split(eol).collect(), eol)
}

fn media_lines(lines: &[&str]) -> Vec<MediaLine> {
    let mut found = Vec::new();
    let mut section: Option<usize> = None;
    let mut mid: Option<String> = None;
    let mut pending: Option<(usize, Direction)> = None;

    let mut flush = |section: Option<usize>,
                     mid: &Option<String>,
                     pending: &mut Option<(usize, Direction)>| {
        if let (Some(section), Some((line, direction))) = (section, pending.take()) {
            found.push(MediaLine {
                section,
                line,
                mid: mid.clone(),
                direction,
            });
        }
    };

    for (i, line) in lines.iter().enumerate() {
        if line.starts_with("m=") {
            flush(section, &mid, &mut pending);
            section = Some(section.map_or(0, |s| s + 1));
            mid = None;
            continue;
        }
        // Session-level attributes precede the first m= line.
        if section.is_none() {
            continue;
        }
        if let Some(value) = line.strip_prefix("a=mid:") {
            mid = Some(value.trim_end().to_owned());
        } else if let Some(direction) = Direction::parse(line) {
            pending = Some((i, direction));
        }
    }
    flush(section, &mid, &mut pending);

    found
}

/// Direction of every media section that declares one, in order.
pub fn media_directions(sdp: &str) -> Vec<Direction> {
    let (lines, _) = split_lines(sdp);
    media_lines(&lines).into_iter().map(|m| m.direction).collect()
}

/// Switch off receiving on every receive-capable media section
/// (`recvonly` becomes `inactive`, `sendrecv` becomes `sendonly`).
///
/// Returns the rewritten description and the sections that were changed, so
/// that [`restore_receive`] can undo exactly those.
pub fn withhold_receive(sdp: &str) -> (String, Vec<WithheldSection>) {
    let mut rewritten: Vec<(usize, String)> = Vec::new();
    let mut withheld = Vec::new();
    let (mut lines, eol) = split_lines(sdp);

    for media in media_lines(&lines) {
        if !media.direction.receives() {
            continue;
        }
        rewritten.push((media.line, media.direction.without_receive().to_string()));
        withheld.push(WithheldSection {
            index: media.section,
            mid: media.mid,
            original: media.direction,
        });
    }

    for (line, replacement) in &rewritten {
        lines[*line] = replacement.as_str();
    }
    (lines.join(eol), withheld)
}

/// Re-enable receiving on the sections previously withheld. Sections that
/// were not withheld, or that already receive, are left alone.
pub fn restore_receive(sdp: &str, withheld: &[WithheldSection]) -> String {
    let mut rewritten: Vec<(usize, String)> = Vec::new();
    let (mut lines, eol) = split_lines(sdp);

    for media in media_lines(&lines) {
        let Some(section) = withheld
            .iter()
            .find(|w| w.matches(media.section, media.mid.as_deref()))
        else {
            continue;
        };
        if media.direction == section.original.without_receive() {
            rewritten.push((media.line, section.original.to_string()));
        }
    }

    for (line, replacement) in &rewritten {
        lines[*line] = replacement.as_str();
    }
    lines.join(eol)
}
