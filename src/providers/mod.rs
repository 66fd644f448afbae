//! Caption backends.
//!
//! Every backend answers two questions for a video: which caption tracks
//! exist, and what the timed entries of one track are. The resolver only
//! talks to [`CaptionProvider`], so a deployment picks one backend through
//! configuration and nothing else changes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, ProviderKind};
use crate::{CaptionEntry, CaptionError, LanguageTrack, VideoId};

pub mod innertube;
#[cfg(test)]
pub(crate) mod mock;
pub mod ytdlp;

pub use innertube::InnerTubeProvider;
pub use ytdlp::YtDlpProvider;

/// A source of caption tracks for YouTube videos
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    /// Short name used in diagnostics
    fn name(&self) -> &str;

    /// Tracks available for the video, in the order the source publishes them
    async fn list_languages(&self, video_id: &VideoId) -> Result<Vec<LanguageTrack>, CaptionError>;

    /// Timed entries of one track
    async fn fetch(&self, video_id: &VideoId, language: &str) -> Result<Vec<CaptionEntry>, CaptionError>;
}

/// Build the backend selected in configuration
pub fn from_config(config: &Config, client: reqwest::Client) -> Arc<dyn CaptionProvider> {
    match config.provider {
        ProviderKind::InnerTube => Arc::new(InnerTubeProvider::new(client)),
        ProviderKind::YtDlp => Arc::new(YtDlpProvider::new(config.yt_dlp_path.clone())),
    }
}
