use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::CaptionProvider;
use crate::{CaptionEntry, CaptionError, LanguageTrack, VideoId};

/// In-memory provider that records every call it receives
#[derive(Debug, Default)]
pub struct MockProvider {
    listing: Option<Vec<LanguageTrack>>,
    listing_error: Option<CaptionError>,
    tracks: HashMap<String, Result<Vec<CaptionEntry>, CaptionError>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockProvider {
    /// Provider listing `codes`, each returning one entry naming its language
    pub fn with_languages(codes: &[&str]) -> Self {
        let mut mock = Self {
            listing: Some(codes.iter().map(|c| LanguageTrack::new(*c, *c, false)).collect()),
            ..Self::default()
        };
        for code in codes {
            mock.tracks.insert(
                code.to_string(),
                Ok(vec![CaptionEntry::new(0.0, Some(1.0), &format!("text in {code}"))]),
            );
        }
        mock
    }

    pub fn unreachable(error: CaptionError) -> Self {
        Self {
            listing_error: Some(error),
            ..Self::default()
        }
    }

    /// Make a listed track fail when fetched
    pub fn failing(mut self, code: &str, error: CaptionError) -> Self {
        self.tracks.insert(code.to_string(), Err(error));
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| c.strip_prefix("fetch:").map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl CaptionProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_languages(&self, _video_id: &VideoId) -> Result<Vec<LanguageTrack>, CaptionError> {
        self.calls.lock().unwrap().push("list".to_string());
        if let Some(e) = &self.listing_error {
            return Err(e.clone());
        }
        Ok(self.listing.clone().unwrap_or_default())
    }

    async fn fetch(&self, _video_id: &VideoId, language: &str) -> Result<Vec<CaptionEntry>, CaptionError> {
        self.calls.lock().unwrap().push(format!("fetch:{language}"));
        self.tracks
            .get(language)
            .cloned()
            .unwrap_or_else(|| Err(CaptionError::NoCaptionsInLanguage(language.to_string())))
    }
}
