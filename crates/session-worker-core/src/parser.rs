//! Parsing of benchmark tool output: metric extraction, ANSI stripping and tail capture.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::result::Metrics;

/// Lines of stdout kept on a successful run.
pub const SUCCESS_TAIL_LINES: usize = 12;
/// Lines of stdout kept when the tool exits nonzero.
pub const FAILURE_TAIL_LINES: usize = 20;
/// Characters of stderr kept when the tool exits nonzero.
pub const STDERR_EXCERPT_CHARS: usize = 500;

static ANSI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1B\[[0-?]*[ -/]*[@-~]").expect("ansi pattern is valid"));
static FPS_HW_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"FPS\s*\(hw_only\)\s*=\s*([0-9.]+)").expect("hw_only pattern is valid"));
static FPS_STREAMING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(streaming\)\s*=\s*([0-9.]+)").expect("streaming pattern is valid"));
static LATENCY_HW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Latency\s*\(hw\)\s*=\s*([0-9.]+)\s*ms").expect("latency pattern is valid")
});

fn capture_number(pattern: &Regex, text: &str) -> Option<f64> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Extract the metrics the benchmark tool prints. Absent or malformed values are `None`.
pub fn parse_metrics(text: &str) -> Metrics {
    Metrics {
        fps_hw_only: capture_number(&FPS_HW_ONLY, text),
        fps_streaming: capture_number(&FPS_STREAMING, text),
        latency_ms: capture_number(&LATENCY_HW, text),
    }
}

/// Remove terminal control sequences (`ESC [ ... final`).
pub fn strip_ansi(text: &str) -> String {
    ANSI.replace_all(text, "").into_owned()
}

/// Last `n` lines of the trimmed text joined with `\n`. Empty input gives an empty string.
pub fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim().lines().collect();
    let skip = lines.len().saturating_sub(n);
    lines[skip..].join("\n")
}

/// Tail followed by ANSI stripping, as stored in `raw_tail`.
pub fn clean_tail(text: &str, n: usize) -> String {
    strip_ansi(&tail(text, n))
}

/// First `max_chars` characters of `text`.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Running streaming benchmark (hw_only)
=======
Summary
=======
Net: yolov8s/yolov8s
FPS     (hw_only)                 = 123.4
        (streaming)               = 98.7
Latency (hw)                      = 5.6 ms
Device 0000:01:00.0:
Power in streaming mode (average) = 1.9 W
";

    #[test]
    fn parses_all_three_metrics() {
        let metrics = parse_metrics(SAMPLE);
        assert_eq!(metrics.fps_hw_only, Some(123.4));
        assert_eq!(metrics.fps_streaming, Some(98.7));
        assert_eq!(metrics.latency_ms, Some(5.6));
    }

    #[test]
    fn missing_label_yields_none_for_that_field_only() {
        let text = "FPS (hw_only) = 123.4\nLatency (hw) = 5.6 ms\n";
        let metrics = parse_metrics(text);
        assert_eq!(metrics.fps_hw_only, Some(123.4));
        assert_eq!(metrics.fps_streaming, None);
        assert_eq!(metrics.latency_ms, Some(5.6));
    }

    #[test]
    fn malformed_number_is_none() {
        let metrics = parse_metrics("FPS (hw_only) = 1.2.3");
        assert_eq!(metrics.fps_hw_only, None);
        assert!(parse_metrics("").is_empty());
    }

    #[test]
    fn strip_ansi_removes_color_and_cursor_codes() {
        let raw = "\x1b[1;32mFPS\x1b[0m (hw_only) = 10\x1b[2K\x1b[1A";
        assert_eq!(strip_ansi(raw), "FPS (hw_only) = 10");
    }

    #[test]
    fn metrics_parse_after_stripping() {
        let raw = "\x1b[33mFPS (hw_only) = 42.0\x1b[0m";
        assert_eq!(parse_metrics(&strip_ansi(raw)).fps_hw_only, Some(42.0));
    }

    #[test]
    fn tail_keeps_last_lines() {
        let text = (1..=30).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let t = tail(&text, SUCCESS_TAIL_LINES);
        assert_eq!(t.lines().count(), 12);
        assert!(t.starts_with("19\n"));
        assert!(t.ends_with("30"));
        assert_eq!(tail(&text, FAILURE_TAIL_LINES).lines().count(), 20);
    }

    #[test]
    fn tail_of_short_or_empty_text() {
        assert_eq!(tail("a\nb\n\n", 12), "a\nb");
        assert_eq!(tail("", 12), "");
        assert_eq!(tail("   \n  ", 20), "");
        assert_eq!(clean_tail("", 20), "");
    }

    #[test]
    fn excerpt_is_char_bounded() {
        let text = "é".repeat(600);
        let cut = excerpt(&text, STDERR_EXCERPT_CHARS);
        assert_eq!(cut.chars().count(), 500);
        assert_eq!(excerpt("short", 500), "short");
    }
}
