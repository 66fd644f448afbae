use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde::de::{Deserializer, MapAccess, Visitor};
use tokio::process::Command;

use super::CaptionProvider;
use crate::vtt::{collapse_rolling, parse_vtt};
use crate::{CaptionEntry, CaptionError, LanguageTrack, VideoId};

/// Subset of `yt-dlp --dump-json` output we care about
#[derive(Debug, Default, Deserialize)]
struct YtDlpInfo {
    #[serde(default)]
    subtitles: TrackMap,
    #[serde(default)]
    automatic_captions: TrackMap,
}

#[derive(Debug, Deserialize)]
struct SubtitleFormat {
    name: Option<String>,
    url: Option<String>,
}

/// Language key to formats, in the order yt-dlp printed them
#[derive(Debug, Default)]
struct TrackMap(Vec<(String, Vec<SubtitleFormat>)>);

impl<'de> Deserialize<'de> for TrackMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TrackMapVisitor;

        impl<'de> Visitor<'de> for TrackMapVisitor {
            type Value = TrackMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of language code to subtitle formats")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<TrackMap, A::Error> {
                let mut entries = Vec::new();
                while let Some(entry) = map.next_entry::<String, Vec<SubtitleFormat>>()? {
                    entries.push(entry);
                }
                Ok(TrackMap(entries))
            }

            fn visit_unit<E>(self) -> Result<TrackMap, E> {
                Ok(TrackMap::default())
            }
        }

        deserializer.deserialize_any(TrackMapVisitor)
    }
}

/// Suffix yt-dlp gives the speech-recognition track in the spoken language
const ORIGINAL_SUFFIX: &str = "-orig";

/// Automatic captions also carry one machine translation per target
/// language; those have `tlang=` in their URL
fn is_translation(formats: &[SubtitleFormat]) -> bool {
    formats
        .iter()
        .filter_map(|f| f.url.as_deref())
        .any(|url| url.contains("tlang="))
}

/// Lists and downloads subtitles by shelling out to yt-dlp
#[derive(Debug, Clone)]
pub struct YtDlpProvider {
    binary: PathBuf,
}

impl YtDlpProvider {
    pub fn new(binary: Option<PathBuf>) -> Self {
        Self {
            binary: binary.unwrap_or_else(|| PathBuf::from("yt-dlp")),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, CaptionError> {
        debug!("Running {} {}", self.binary.display(), args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await;

        let output = match output {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CaptionError::ProviderUnavailable(format!(
                    "{} not found. Install it to use the yt-dlp caption source:\n  \
                     pip install yt-dlp\n  \
                     or: brew install yt-dlp",
                    self.binary.display()
                )));
            }
            Err(e) => return Err(CaptionError::ProviderUnavailable(format!("failed to run yt-dlp: {e}"))),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .rev()
                .find(|l| l.starts_with("ERROR"))
                .unwrap_or_else(|| stderr.trim());
            return Err(CaptionError::ProviderUnavailable(format!(
                "yt-dlp exited with {}: {message}",
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Manual subtitles first, then original-language automatic captions, in
/// listed order
fn tracks_from_info(info: &YtDlpInfo) -> Vec<LanguageTrack> {
    let track = |code: &str, formats: &[SubtitleFormat], is_auto: bool| {
        let name = formats
            .iter()
            .find_map(|f| f.name.clone())
            .unwrap_or_else(|| code.to_string());
        LanguageTrack::new(code, name, is_auto)
    };

    let mut tracks: Vec<LanguageTrack> = info
        .subtitles
        .0
        .iter()
        .filter(|(code, _)| code.as_str() != "live_chat")
        .map(|(code, formats)| track(code, formats, false))
        .collect();

    for (key, formats) in &info.automatic_captions.0 {
        let code = match key.strip_suffix(ORIGINAL_SUFFIX) {
            Some(base) => base,
            None if is_translation(formats) => continue,
            None => key.as_str(),
        };
        if tracks.iter().any(|t| t.code == code) {
            continue;
        }
        tracks.push(track(code, formats, true));
    }
    tracks
}

fn find_vtt(dir: &Path) -> Result<Option<PathBuf>, CaptionError> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("vtt"))
        .collect();
    found.sort();
    Ok(found.into_iter().next())
}

#[async_trait]
impl CaptionProvider for YtDlpProvider {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn list_languages(&self, video_id: &VideoId) -> Result<Vec<LanguageTrack>, CaptionError> {
        let url = video_id.watch_url();
        let json = self
            .run(&["--dump-json", "--skip-download", "--no-playlist", "--no-warnings", url.as_str()])
            .await?;
        let info: YtDlpInfo = serde_json::from_str(&json)
            .map_err(|e| CaptionError::MalformedResponse(format!("yt-dlp metadata: {e}")))?;
        Ok(tracks_from_info(&info))
    }

    async fn fetch(&self, video_id: &VideoId, language: &str) -> Result<Vec<CaptionEntry>, CaptionError> {
        if let Some(entries) = self.download(video_id, language, false).await? {
            return Ok(entries);
        }

        let original = format!("{language}{ORIGINAL_SUFFIX}");
        for key in [original.as_str(), language] {
            if let Some(entries) = self.download(video_id, key, true).await? {
                return Ok(collapse_rolling(entries));
            }
        }

        Err(CaptionError::NoCaptionsInLanguage(language.to_string()))
    }
}

impl YtDlpProvider {
    /// Download one subtitle track as WebVTT; `None` when yt-dlp wrote nothing
    async fn download(
        &self,
        video_id: &VideoId,
        key: &str,
        automatic: bool,
    ) -> Result<Option<Vec<CaptionEntry>>, CaptionError> {
        let workdir = tempfile::Builder::new().prefix("ytcap-").tempdir()?;
        let template = workdir.path().join("%(id)s.%(ext)s");
        let template = template.to_string_lossy();
        let url = video_id.watch_url();
        let write_flag = if automatic { "--write-auto-subs" } else { "--write-subs" };

        self.run(&[
            "--skip-download",
            write_flag,
            "--sub-langs",
            key,
            "--sub-format",
            "vtt",
            "--no-playlist",
            "--no-warnings",
            "-o",
            template.as_ref(),
            url.as_str(),
        ])
        .await?;

        let Some(path) = find_vtt(workdir.path())? else {
            debug!("yt-dlp wrote no {} subtitles for '{key}'", if automatic { "automatic" } else { "manual" });
            return Ok(None);
        };
        debug!("Reading subtitles from {}", path.display());

        let content = tokio::fs::read_to_string(&path).await?;
        parse_vtt(&content).map(Some).map_err(CaptionError::MalformedResponse)
    }
}
