use std::path::{Path, PathBuf};

use eyre::Result;
use log::debug;

use crate::summarize::StructuredReview;
use crate::vtt::{effective_end, render_vtt};
use crate::{CaptionEntry, TranscriptResult, VideoId};

/// Render transcript as plain text (one entry per line, no timestamps)
pub fn render_text(entries: &[CaptionEntry]) -> String {
    entries
        .iter()
        .map(|e| e.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_json(result: &TranscriptResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

fn srt_timestamp(secs: f64) -> String {
    crate::vtt::format_timestamp(secs).replacen('.', ",", 1)
}

pub fn render_srt(entries: &[CaptionEntry]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            format!(
                "{}\n{} --> {}\n{}\n",
                i + 1,
                srt_timestamp(e.start),
                srt_timestamp(effective_end(entries, i)),
                e.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `{id}.{lang}.{ext}`
pub fn transcript_filename(video_id: &VideoId, language: &str, ext: &str) -> String {
    format!("{video_id}.{language}.{ext}")
}

pub fn analysis_filename(video_id: &VideoId) -> String {
    format!("{video_id}.analysis.json")
}

/// Write the plain-text, WebVTT and JSON renditions, replacing earlier runs
pub fn save_transcript(dir: &Path, result: &TranscriptResult) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let renditions = [
        ("txt", render_text(&result.entries)),
        ("vtt", render_vtt(&result.entries)),
        ("json", render_json(result)?),
    ];

    let mut paths = Vec::with_capacity(renditions.len());
    for (ext, content) in renditions {
        let path = dir.join(transcript_filename(&result.video_id, &result.language, ext));
        std::fs::write(&path, content)?;
        debug!("Saved {}", path.display());
        paths.push(path);
    }
    Ok(paths)
}

pub fn save_analysis(dir: &Path, video_id: &VideoId, review: &StructuredReview) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(analysis_filename(video_id));
    std::fs::write(&path, serde_json::to_string_pretty(review)?)?;
    debug!("Saved review: {}", path.display());
    Ok(path)
}
