/// Progress update derived from ffmpeg log output.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Progress {
    /// Fraction of the input processed, `0.0..=1.0` once a duration is known.
    pub ratio: f64,
    /// Input duration in seconds, reported when a `Duration:` line is seen.
    pub duration: Option<f64>,
    /// Output timestamp in seconds, reported on `frame=`/`size=` status lines.
    pub time: Option<f64>,
}

/// Stateful parser turning ffmpeg log lines into [`Progress`] updates.
#[derive(Clone, Debug, Default)]
pub struct ProgressParser {
    duration: f64,
    ratio: f64,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse_line(&mut self, line: &str) -> Option<Progress> {
        if let Some(rest) = line.strip_prefix("  Duration: ") {
            let ts = rest.split(", ").next()?;
            let d = timestamp_to_secs(ts)?;
            // Several inputs each print a duration; the shortest one bounds `-shortest` output.
            if d > 0.0 && (self.duration == 0.0 || self.duration > d) {
                self.duration = d;
            }
            return Some(Progress {
                ratio: self.ratio,
                duration: Some(d),
                time: None,
            });
        }

        if line.starts_with("frame") || line.starts_with("size") {
            let ts = line.split("time=").nth(1)?.split_whitespace().next()?;
            let t = timestamp_to_secs(ts)?;
            if self.duration > 0.0 {
                self.ratio = (t / self.duration).clamp(0.0, 1.0);
            }
            return Some(Progress {
                ratio: self.ratio,
                duration: None,
                time: Some(t),
            });
        }

        if strip_log_context(line).starts_with("video:") {
            self.ratio = 0.0;
            self.duration = 0.0;
            return Some(Progress {
                ratio: 1.0,
                duration: None,
                time: None,
            });
        }

        None
    }
}

/// Drop a leading `[out#0/mp4 @ 0x...] ` context tag added by newer ffmpeg builds.
fn strip_log_context(line: &str) -> &str {
    match line.strip_prefix('[').and_then(|rest| rest.split_once("] ")) {
        Some((_, body)) => body,
        None => line,
    }
}

/// Parse `HH:MM:SS.ss` (hours and minutes optional) into seconds.
pub(crate) fn timestamp_to_secs(ts: &str) -> Option<f64> {
    let mut secs = 0.0f64;
    let mut parts = 0;
    for part in ts.trim().split(':') {
        let v: f64 = part.parse().ok()?;
        if !v.is_finite() || v < 0.0 {
            return None;
        }
        secs = secs * 60.0 + v;
        parts += 1;
    }
    if parts == 0 || parts > 3 {
        return None;
    }
    Some(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_parse_with_optional_fields() {
        assert_eq!(timestamp_to_secs("00:01:02.50"), Some(62.5));
        assert_eq!(timestamp_to_secs("01:02.5"), Some(62.5));
        assert_eq!(timestamp_to_secs("N/A"), None);
        assert_eq!(timestamp_to_secs("1:2:3:4"), None);
    }

    #[test]
    fn ratio_follows_shortest_duration() {
        let mut p = ProgressParser::new();
        let first = p
            .parse_line("  Duration: 00:00:10.00, start: 0.000000, bitrate: 128 kb/s")
            .unwrap();
        assert_eq!(first.duration, Some(10.0));
        p.parse_line("  Duration: 00:00:04.00, start: 0.000000, bitrate: N/A");

        let status = p
            .parse_line("frame=   25 fps=0.0 q=28.0 size=       0kB time=00:00:01.00 bitrate=0.4kbits/s")
            .unwrap();
        assert_eq!(status.time, Some(1.0));
        assert!((status.ratio - 0.25).abs() < 1e-9);
    }

    #[test]
    fn summary_line_completes_and_resets() {
        let mut p = ProgressParser::new();
        p.parse_line("  Duration: 00:00:02.00, start: 0.000000");
        let done = p
            .parse_line("video:12kB audio:30kB subtitle:0kB other streams:0kB")
            .unwrap();
        assert_eq!(done.ratio, 1.0);

        let after = p.parse_line("size=  1kB time=00:00:01.00 bitrate=1kbits/s").unwrap();
        assert_eq!(after.ratio, 0.0);
    }

    #[test]
    fn tagged_summary_line_completes() {
        let mut p = ProgressParser::new();
        let done = p
            .parse_line("[out#0/mp4 @ 0x5581] video:12KiB audio:30KiB subtitle:0KiB")
            .unwrap();
        assert_eq!(done.ratio, 1.0);
        assert!(p.parse_line("[libx264 @ 0x5582] frame I:1").is_none());
    }

    #[test]
    fn unrelated_lines_are_ignored() {
        let mut p = ProgressParser::new();
        assert!(p.parse_line("Input #0, png_pipe, from 'bg.png':").is_none());
        assert!(p.parse_line("frame=1 fps=0").is_none());
    }
}
