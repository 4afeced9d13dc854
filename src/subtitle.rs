use std::fmt;
use std::path::Path;
use std::time::Duration;

use tokio::fs;
use tracing::info;

use crate::error::{Result, SubcastError};

/// One SubRip cue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub index: u32,
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

/// Ordered sequence of cues, serialized as SubRip text.
///
/// Cues may overlap; indices start at 1 and strictly increase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitleDocument {
    cues: Vec<Cue>,
}

impl SubtitleDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cue numbered after the last one.
    pub fn push<S: Into<String>>(&mut self, start: Duration, end: Duration, text: S) -> Result<()> {
        if start >= end {
            return Err(SubcastError::InvalidSubtitle(format!(
                "cue starts at {} but ends at {}",
                format_srt_time(start),
                format_srt_time(end)
            )));
        }
        let index = self.cues.last().map(|cue| cue.index + 1).unwrap_or(1);
        self.cues.push(Cue {
            index,
            start,
            end,
            text: text.into(),
        });
        Ok(())
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Parse SubRip text. CRLF line endings and a leading BOM are accepted.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        let normalized = input.replace("\r\n", "\n");

        let mut cues: Vec<Cue> = Vec::new();
        let mut lines = normalized.lines().peekable();

        loop {
            while lines.peek().is_some_and(|line| line.trim().is_empty()) {
                lines.next();
            }
            let Some(index_line) = lines.next() else {
                break;
            };

            let index: u32 = index_line.trim().parse().map_err(|_| {
                SubcastError::InvalidSubtitle(format!("expected cue index, got {:?}", index_line))
            })?;
            let expected = cues.last().map(|cue| cue.index + 1).unwrap_or(1);
            if cues.is_empty() && index != 1 {
                return Err(SubcastError::InvalidSubtitle(format!(
                    "first cue index is {}, expected 1",
                    index
                )));
            }
            if index < expected {
                return Err(SubcastError::InvalidSubtitle(format!(
                    "cue index {} does not increase",
                    index
                )));
            }

            let timing = lines.next().ok_or_else(|| {
                SubcastError::InvalidSubtitle(format!("cue {} has no timing line", index))
            })?;
            let (start, end) = parse_timing(timing)?;
            if start >= end {
                return Err(SubcastError::InvalidSubtitle(format!(
                    "cue {} starts at or after its end",
                    index
                )));
            }

            let mut text_lines = Vec::new();
            while let Some(line) = lines.peek() {
                if line.trim().is_empty() {
                    break;
                }
                text_lines.push(*line);
                lines.next();
            }

            cues.push(Cue {
                index,
                start,
                end,
                text: text_lines.join("\n"),
            });
        }

        Ok(Self { cues })
    }

    /// Serialize to SubRip text
    pub fn to_srt(&self) -> String {
        self.to_string()
    }

    pub async fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!("Writing SRT file: {}", path.display());
        fs::write(path, self.to_srt()).await?;
        Ok(())
    }
}

impl fmt::Display for SubtitleDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cue in &self.cues {
            write!(
                f,
                "{}\n{} --> {}\n{}\n\n",
                cue.index,
                format_srt_time(cue.start),
                format_srt_time(cue.end),
                cue.text
            )?;
        }
        Ok(())
    }
}

/// Format a duration in SRT time format (HH:MM:SS,mmm)
pub fn format_srt_time(time: Duration) -> String {
    let total_milliseconds = time.as_millis();
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Parse an SRT timestamp. A `.` millisecond separator is tolerated.
pub fn parse_srt_time(value: &str) -> Result<Duration> {
    let invalid = || SubcastError::InvalidSubtitle(format!("invalid timestamp {:?}", value));

    let value = value.trim();
    let (clock, millis) = value
        .split_once(',')
        .or_else(|| value.split_once('.'))
        .ok_or_else(invalid)?;

    let mut parts = clock.split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    let hours: u64 = h.parse().map_err(|_| invalid())?;
    let minutes: u64 = m.parse().map_err(|_| invalid())?;
    let seconds: u64 = s.parse().map_err(|_| invalid())?;
    let millis: u64 = millis.parse().map_err(|_| invalid())?;
    if minutes >= 60 || seconds >= 60 || millis >= 1000 {
        return Err(invalid());
    }

    let total = hours
        .checked_mul(3_600_000)
        .and_then(|ms| ms.checked_add(minutes * 60_000 + seconds * 1_000 + millis))
        .ok_or_else(invalid)?;
    Ok(Duration::from_millis(total))
}

fn parse_timing(line: &str) -> Result<(Duration, Duration)> {
    let (start, end) = line.split_once("-->").ok_or_else(|| {
        SubcastError::InvalidSubtitle(format!("expected timing line, got {:?}", line))
    })?;
    // Position hints may follow the end timestamp
    let end = end.split_whitespace().next().unwrap_or_default();
    Ok((parse_srt_time(start)?, parse_srt_time(end)?))
}
