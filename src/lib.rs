pub mod config;
pub mod error;
pub mod output;
pub mod providers;
pub mod resolver;
pub mod server;
pub mod summarize;
pub mod vtt;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use error::{Attempt, CaptionError, FailureKind, InvalidIdentifier, ResolutionFailure};

static BARE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").unwrap());

static URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // youtube.com/watch?v=ID, v anywhere in the query
        r"(?:^|[/.])youtube\.com/watch\?(?:[^#]*&)?v=([a-zA-Z0-9_-]{11})(?:[^a-zA-Z0-9_-]|$)",
        // youtu.be/ID
        r"(?:^|[/.])youtu\.be/([a-zA-Z0-9_-]{11})(?:[^a-zA-Z0-9_-]|$)",
        // youtube.com/{embed,v,e,shorts,live}/ID
        r"(?:^|[/.])youtube(?:-nocookie)?\.com/(?:embed|v|e|shorts|live)/([a-zA-Z0-9_-]{11})(?:[^a-zA-Z0-9_-]|$)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Canonical 11-character YouTube video ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Parse a URL or bare ID; `None` when nothing recognizable matches
    pub fn parse(input: &str) -> Option<Self> {
        extract_video_id(input)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract video ID from various YouTube URL formats
pub fn extract_video_id(input: &str) -> Option<VideoId> {
    let input = input.trim();

    if BARE_ID.is_match(input) {
        return Some(VideoId(input.to_string()));
    }

    URL_PATTERNS
        .iter()
        .find_map(|re| re.captures(input))
        .map(|caps| VideoId(caps[1].to_string()))
}

/// Ordered list of language codes to try, most preferred first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguagePreference(Vec<String>);

impl LanguagePreference {
    /// Build from codes in order, dropping blanks and repeats
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for code in codes {
            let code = code.as_ref().trim();
            if !code.is_empty() && !out.iter().any(|c| c.eq_ignore_ascii_case(code)) {
                out.push(code.to_string());
            }
        }
        Self(out)
    }

    /// `primary` first (if given), then the configured defaults
    pub fn with_primary(primary: Option<&str>, defaults: &[String]) -> Self {
        Self::new(primary.into_iter().chain(defaults.iter().map(String::as_str)))
    }

    pub fn codes(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A caption track a provider has available
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageTrack {
    pub code: String,
    pub name: String,
    pub is_auto_generated: bool,
}

impl LanguageTrack {
    pub fn new(code: impl Into<String>, name: impl Into<String>, is_auto_generated: bool) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            is_auto_generated,
        }
    }
}

/// A single timed caption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionEntry {
    pub start: f64,
    pub end: Option<f64>,
    pub text: String,
}

impl CaptionEntry {
    /// Normalizes whitespace: lines trimmed, inner runs collapsed, blank lines dropped
    pub fn new(start: f64, end: Option<f64>, text: &str) -> Self {
        let text = text
            .lines()
            .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            start: start.max(0.0),
            end: end.map(|e| e.max(start.max(0.0))),
            text,
        }
    }

    pub fn duration(&self) -> Option<f64> {
        self.end.map(|e| e - self.start)
    }
}

/// Which tier of the fallback policy produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Preferred,
    Fallback,
    Auto,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Preferred => write!(f, "preferred"),
            Provenance::Fallback => write!(f, "fallback"),
            Provenance::Auto => write!(f, "auto"),
        }
    }
}

/// Resolved transcript for a video
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptResult {
    pub video_id: VideoId,
    pub language: String,
    pub provenance: Provenance,
    pub source: String,
    pub entries: Vec<CaptionEntry>,
    #[serde(skip)]
    pub skipped: Vec<Attempt>,
}

impl TranscriptResult {
    /// Entry texts joined with spaces, as fed to the summarizer
    pub fn full_text(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.text.replace('\n', " "))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
