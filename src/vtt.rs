//! WebVTT rendering and parsing.

use std::fmt::Write;
use std::sync::LazyLock;

use regex::Regex;

use crate::CaptionEntry;

static TIMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?:\d+:)?\d{1,2}:\d{2}[.,]\d{3})\s+-->\s+((?:\d+:)?\d{1,2}:\d{2}[.,]\d{3})").unwrap()
});

static INLINE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Format seconds as `HH:MM:SS.mmm`
pub fn format_timestamp(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let s = (total_ms / 1000) % 60;
    let m = (total_ms / 60_000) % 60;
    let h = total_ms / 3_600_000;
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

/// Parse `HH:MM:SS.mmm` or `MM:SS.mmm` (comma separator accepted)
pub fn parse_timestamp(ts: &str) -> Option<f64> {
    let (clock, frac) = ts.trim().split_once(['.', ','])?;
    if frac.len() != 3 {
        return None;
    }
    let ms: u64 = frac.parse().ok()?;
    let parts = clock
        .split(':')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    let (h, m, s) = match parts.as_slice() {
        [m, s] => (0, *m, *s),
        [h, m, s] => (*h, *m, *s),
        _ => return None,
    };
    if m >= 60 || s >= 60 {
        return None;
    }
    let total_ms = h
        .checked_mul(3600)?
        .checked_add(m * 60 + s)?
        .checked_mul(1000)?
        .checked_add(ms)?;
    Some(total_ms as f64 / 1000.0)
}

/// End time used when rendering: own end, else next start, else own start
pub(crate) fn effective_end(entries: &[CaptionEntry], i: usize) -> f64 {
    let entry = &entries[i];
    entry
        .end
        .or_else(|| entries.get(i + 1).map(|next| next.start))
        .unwrap_or(entry.start)
}

/// Render entries as a WebVTT document
pub fn render_vtt(entries: &[CaptionEntry]) -> String {
    let mut out = String::from("WEBVTT\n");
    for (i, entry) in entries.iter().enumerate() {
        let _ = write!(
            out,
            "\n{} --> {}\n{}\n",
            format_timestamp(entry.start),
            format_timestamp(effective_end(entries, i)),
            escape_cue_text(&entry.text)
        );
    }
    out
}

fn escape_cue_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Parse a WebVTT document into caption entries.
///
/// Header metadata, `NOTE`/`STYLE`/`REGION` blocks and cue identifiers are
/// skipped. Inline markup such as `<c>` or `<00:00:01.000>` is stripped and
/// entities are decoded. Cues without text are dropped.
pub fn parse_vtt(content: &str) -> Result<Vec<CaptionEntry>, String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");

    let mut blocks = normalized.split("\n\n").map(|b| b.trim_matches('\n'));

    let header = blocks.next().unwrap_or_default();
    if !header.starts_with("WEBVTT") {
        return Err("missing WEBVTT header".to_string());
    }

    let mut entries = Vec::new();
    for block in blocks {
        let mut lines = block.lines();
        let Some(first) = lines.next() else { continue };

        let timing_line = if TIMING.is_match(first) {
            first
        } else {
            match lines.next() {
                Some(second) if TIMING.is_match(second) => second,
                // NOTE, STYLE, REGION or stray text
                _ => continue,
            }
        };

        let caps = TIMING
            .captures(timing_line)
            .ok_or_else(|| format!("bad cue timing: {timing_line}"))?;
        let start = parse_timestamp(&caps[1]).ok_or_else(|| format!("bad timestamp: {}", &caps[1]))?;
        let end = parse_timestamp(&caps[2]).ok_or_else(|| format!("bad timestamp: {}", &caps[2]))?;

        let text = lines
            .map(|l| html_escape::decode_html_entities(&INLINE_TAG.replace_all(l, "")).to_string())
            .collect::<Vec<_>>()
            .join("\n");

        let entry = CaptionEntry::new(start, Some(end), &text);
        if !entry.text.is_empty() {
            entries.push(entry);
        }
    }

    Ok(entries)
}

/// Drop lines that repeat the previous cue's lines.
///
/// Auto-generated tracks "roll": each cue repeats the line shown by the one
/// before it and appends a new one.
pub fn collapse_rolling(entries: Vec<CaptionEntry>) -> Vec<CaptionEntry> {
    let mut out: Vec<CaptionEntry> = Vec::with_capacity(entries.len());
    let mut previous_lines: Vec<String> = Vec::new();

    for entry in entries {
        let lines: Vec<String> = entry.text.lines().map(str::to_string).collect();
        let fresh = lines
            .iter()
            .filter(|l| !previous_lines.contains(l))
            .cloned()
            .collect::<Vec<_>>();
        previous_lines = lines;

        if fresh.is_empty() {
            // Pure repeat: stretch the previous cue instead
            if let (Some(last), Some(end)) = (out.last_mut(), entry.end) {
                last.end = Some(last.end.map_or(end, |e| e.max(end)));
            }
            continue;
        }
        out.push(CaptionEntry::new(entry.start, entry.end, &fresh.join("\n")));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00:00.000");
        assert_eq!(format_timestamp(3661.5), "01:01:01.500");
        assert_eq!(format_timestamp(0.21), "00:00:00.210");
    }

    #[test]
    fn test_parse_timestamp() {
        assert!(close(parse_timestamp("01:01:01.500").unwrap(), 3661.5));
        assert!(close(parse_timestamp("02:03.250").unwrap(), 123.25));
        assert!(close(parse_timestamp("00:00:01,000").unwrap(), 1.0));
        assert!(parse_timestamp("00:61:00.000").is_none());
        assert!(parse_timestamp("garbage").is_none());
    }

    #[test]
    fn test_render_vtt() {
        let entries = vec![
            CaptionEntry::new(0.0, Some(1.5), "Hello world"),
            CaptionEntry::new(1.5, None, "This is a test"),
        ];
        let vtt = render_vtt(&entries);
        assert_eq!(
            vtt,
            "WEBVTT\n\n00:00:00.000 --> 00:00:01.500\nHello world\n\n00:00:01.500 --> 00:00:01.500\nThis is a test\n"
        );
    }

    #[test]
    fn test_render_vtt_missing_end_uses_next_start() {
        let entries = vec![
            CaptionEntry::new(0.0, None, "one"),
            CaptionEntry::new(2.0, Some(3.0), "two"),
        ];
        assert!(render_vtt(&entries).contains("00:00:00.000 --> 00:00:02.000\none"));
    }

    #[test]
    fn test_round_trip_preserves_timing_and_text() {
        let original = vec![
            CaptionEntry::new(0.21, Some(2.55), "नमस्ते दोस्तों"),
            CaptionEntry::new(2.55, Some(4.1), "first line\nsecond line"),
            CaptionEntry::new(3725.007, Some(3730.0), "Tom & Jerry"),
        ];

        let parsed = parse_vtt(&render_vtt(&original)).unwrap();
        assert_eq!(parsed.len(), original.len());
        for (a, b) in original.iter().zip(&parsed) {
            assert!(close(a.start, b.start), "{} vs {}", a.start, b.start);
            assert!(close(a.end.unwrap(), b.end.unwrap()));
            assert_eq!(a.text, b.text);
        }
    }

    #[test]
    fn test_parse_vtt_with_metadata_and_cue_ids() {
        let vtt = "WEBVTT\nKind: captions\nLanguage: hi\n\nNOTE produced by hand\n\n1\n00:00:01.000 --> 00:00:02.000 align:start position:0%\nFirst\n\nintro\n00:02.000 --> 00:03.000\nSecond\n";
        let entries = parse_vtt(vtt).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "First");
        assert!(close(entries[1].start, 2.0));
        assert_eq!(entries[1].text, "Second");
    }

    #[test]
    fn test_parse_vtt_strips_inline_tags() {
        let vtt = "WEBVTT\r\n\r\n00:00:00.000 --> 00:00:02.000\r\nhello<00:00:00.500><c> there</c><c> friend</c>&amp;co\r\n";
        let entries = parse_vtt(vtt).unwrap();
        assert_eq!(entries[0].text, "hello there friend&co");
    }

    #[test]
    fn test_parse_vtt_rejects_missing_header() {
        assert!(parse_vtt("00:00:00.000 --> 00:00:01.000\nhi\n").is_err());
    }

    #[test]
    fn test_parse_vtt_rejects_huge_hours() {
        assert!(parse_timestamp("99999999999999999:00:00.000").is_none());
        let vtt = "WEBVTT\n\n99999999999999999:00:00.000 --> 99999999999999999:00:01.000\nhi\n";
        let err = parse_vtt(vtt).unwrap_err();
        assert!(err.contains("bad timestamp"));
    }

    #[test]
    fn test_parse_vtt_skips_empty_cues() {
        let vtt = "WEBVTT\n\n00:00:00.000 --> 00:00:01.000\n \n\n00:00:01.000 --> 00:00:02.000\ntext\n";
        let entries = parse_vtt(vtt).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "text");
    }

    #[test]
    fn test_collapse_rolling() {
        let entries = vec![
            CaptionEntry::new(0.0, Some(2.0), "good morning"),
            CaptionEntry::new(2.0, Some(2.01), "good morning"),
            CaptionEntry::new(2.01, Some(4.0), "good morning\ntoday we talk"),
            CaptionEntry::new(4.0, Some(6.0), "today we talk\nabout rust"),
        ];
        let collapsed = collapse_rolling(entries);
        let texts: Vec<_> = collapsed.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["good morning", "today we talk", "about rust"]);
        assert!(close(collapsed[0].end.unwrap(), 2.01));
    }
}
