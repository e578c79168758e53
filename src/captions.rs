//! WebVTT caption validation.
//!
//! Captions are burned in by ffmpeg's `subtitles` filter, which silently produces an uncaptioned
//! video for a malformed file. Checking the track up front turns that into a clear error.

use crate::engine::progress::timestamp_to_secs;
use crate::foundation::error::{AudiogramError, AudiogramResult};

/// One caption cue.
#[derive(Clone, Debug, PartialEq)]
pub struct Cue {
    pub id: Option<String>,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    pub text: String,
}

/// Parse and validate a WebVTT document.
pub fn parse_vtt(text: &str) -> AudiogramResult<Vec<Cue>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut blocks = normalized.split("\n\n").map(|b| b.trim_matches('\n'));

    let header = blocks.next().unwrap_or_default();
    let first = header.lines().next().unwrap_or_default();
    if !(first == "WEBVTT" || first.starts_with("WEBVTT ") || first.starts_with("WEBVTT\t")) {
        return Err(AudiogramError::validation(
            "captions must be a WebVTT file starting with 'WEBVTT'",
        ));
    }

    let mut cues = Vec::new();
    for block in blocks.filter(|b| !b.trim().is_empty()) {
        let mut lines = block.lines();
        let Some(first) = lines.next() else {
            continue;
        };
        if first.starts_with("NOTE") || first == "STYLE" || first == "REGION" {
            continue;
        }

        let (id, timing) = if first.contains("-->") {
            (None, first)
        } else {
            let timing = lines.next().ok_or_else(|| {
                AudiogramError::validation(format!("caption cue '{first}' has no timing line"))
            })?;
            (Some(first.to_string()), timing)
        };

        let (start, end) = parse_timing(timing)?;
        let text = lines.collect::<Vec<_>>().join("\n");
        cues.push(Cue {
            id,
            start,
            end,
            text,
        });
    }

    if cues.is_empty() {
        tracing::warn!("caption track contains no cues");
    }
    Ok(cues)
}

fn parse_timing(line: &str) -> AudiogramResult<(f64, f64)> {
    let invalid = || AudiogramError::validation(format!("invalid caption timing line '{line}'"));
    let (start, rest) = line.split_once("-->").ok_or_else(invalid)?;
    let end = rest.split_whitespace().next().ok_or_else(invalid)?;
    let start = parse_cue_timestamp(start.trim()).ok_or_else(invalid)?;
    let end = parse_cue_timestamp(end).ok_or_else(invalid)?;
    if end < start {
        return Err(AudiogramError::validation(format!(
            "caption cue ends before it starts: '{line}'"
        )));
    }
    Ok((start, end))
}

/// `[HH:]MM:SS.mmm`; WebVTT requires the millisecond part and at least minutes.
fn parse_cue_timestamp(ts: &str) -> Option<f64> {
    let (clock, millis) = ts.split_once('.')?;
    if millis.len() != 3 || !millis.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let fields = clock.split(':').count();
    if !(2..=3).contains(&fields) {
        return None;
    }
    timestamp_to_secs(ts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "WEBVTT - episode 12\n\nNOTE written by hand\n\n1\n00:00:00.000 --> 00:00:02.500 align:start\nHello there\n\n00:02.500 --> 00:04.000\nSecond line\nwraps\n";

    #[test]
    fn parses_cues_with_and_without_ids() {
        let cues = parse_vtt(SAMPLE).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].id.as_deref(), Some("1"));
        assert_eq!(cues[0].end, 2.5);
        assert_eq!(cues[1].id, None);
        assert_eq!(cues[1].start, 2.5);
        assert_eq!(cues[1].text, "Second line\nwraps");
    }

    #[test]
    fn accepts_bom_and_crlf() {
        let text = "\u{feff}WEBVTT\r\n\r\n00:00:01.000 --> 00:00:02.000\r\nHi\r\n";
        assert_eq!(parse_vtt(text).unwrap().len(), 1);
    }

    #[test]
    fn rejects_missing_header() {
        let err = parse_vtt("1\n00:00:01,000 --> 00:00:02,000\nsrt\n").unwrap_err();
        assert!(err.to_string().contains("WEBVTT"));
        assert!(parse_vtt("WEBVTTX\n").is_err());
    }

    #[test]
    fn rejects_bad_timings() {
        assert!(parse_vtt("WEBVTT\n\n00:00:01,000 --> 00:00:02,000\nx\n").is_err());
        assert!(parse_vtt("WEBVTT\n\n00:00:03.000 --> 00:00:02.000\nx\n").is_err());
        assert!(parse_vtt("WEBVTT\n\ncue-id\n").is_err());
    }

    #[test]
    fn empty_track_is_accepted() {
        assert!(parse_vtt("WEBVTT\n").unwrap().is_empty());
    }
}
