use log::{debug, info, warn};

use crate::providers::CaptionProvider;
use crate::{
    Attempt, CaptionError, LanguagePreference, LanguageTrack, Provenance, ResolutionFailure, TranscriptResult,
    VideoId,
};

/// Resolve captions for a video, degrading from the requested languages to
/// whatever the source lists first.
///
/// Calls are issued one at a time. The provider is queried for its track
/// list once; a listing failure ends resolution immediately.
pub async fn resolve(
    provider: &dyn CaptionProvider,
    video_id: &VideoId,
    preference: &LanguagePreference,
) -> Result<TranscriptResult, ResolutionFailure> {
    let source = provider.name().to_string();
    let attempt = |language: Option<&str>, error: CaptionError| Attempt {
        source: source.clone(),
        language: language.map(str::to_string),
        error,
    };

    let available = match provider.list_languages(video_id).await {
        Ok(tracks) => tracks,
        Err(e) => {
            warn!("Listing captions for {video_id} via {source} failed: {e}");
            return Err(ResolutionFailure {
                video_id: video_id.clone(),
                attempts: vec![attempt(None, e)],
                available: Vec::new(),
            });
        }
    };
    debug!(
        "{source} lists {} track(s) for {video_id}: {:?}",
        available.len(),
        available.iter().map(|t| t.code.as_str()).collect::<Vec<_>>()
    );

    let mut attempts: Vec<Attempt> = Vec::new();
    let mut tried: Vec<&str> = Vec::new();

    for (index, requested) in preference.codes().iter().enumerate() {
        let Some(track) = match_track(&available, requested) else {
            debug!("No '{requested}' track listed for {video_id}");
            attempts.push(attempt(
                Some(requested.as_str()),
                CaptionError::NoCaptionsInLanguage(requested.clone()),
            ));
            continue;
        };
        if tried.contains(&track.code.as_str()) {
            debug!("'{requested}' maps to already tried track '{}'", track.code);
            attempts.push(attempt(
                Some(requested.as_str()),
                CaptionError::NoCaptionsInLanguage(requested.clone()),
            ));
            continue;
        }
        tried.push(&track.code);

        match fetch_nonempty(provider, video_id, &track.code).await {
            Ok(entries) => {
                let provenance = if index == 0 {
                    Provenance::Preferred
                } else {
                    Provenance::Fallback
                };
                info!("Resolved {video_id} in '{}' ({provenance})", track.code);
                return Ok(TranscriptResult {
                    video_id: video_id.clone(),
                    language: track.code.clone(),
                    provenance,
                    source: provider.name().to_string(),
                    entries,
                    skipped: attempts,
                });
            }
            Err(e) => {
                debug!("Fetching '{}' for {video_id} failed: {e}", track.code);
                attempts.push(attempt(Some(requested.as_str()), e));
            }
        }
    }

    if let Some(track) = available.iter().find(|t| !tried.contains(&t.code.as_str())) {
        match fetch_nonempty(provider, video_id, &track.code).await {
            Ok(entries) => {
                info!("Resolved {video_id} in first listed language '{}' (auto)", track.code);
                return Ok(TranscriptResult {
                    video_id: video_id.clone(),
                    language: track.code.clone(),
                    provenance: Provenance::Auto,
                    source: provider.name().to_string(),
                    entries,
                    skipped: attempts,
                });
            }
            Err(e) => attempts.push(attempt(Some(track.code.as_str()), e)),
        }
    }

    if attempts.is_empty() {
        attempts.push(attempt(None, CaptionError::NoCaptionsAtAll));
    }

    Err(ResolutionFailure {
        video_id: video_id.clone(),
        attempts,
        available,
    })
}

async fn fetch_nonempty(
    provider: &dyn CaptionProvider,
    video_id: &VideoId,
    language: &str,
) -> Result<Vec<crate::CaptionEntry>, CaptionError> {
    let entries = provider.fetch(video_id, language).await?;
    if entries.is_empty() {
        return Err(CaptionError::NoCaptionsInLanguage(language.to_string()));
    }
    Ok(entries)
}

fn primary_subtag(code: &str) -> &str {
    code.split(['-', '_']).next().unwrap_or(code)
}

/// Exact code, then a regional variant of the code, then a shared primary subtag
fn match_track<'a>(tracks: &'a [LanguageTrack], requested: &str) -> Option<&'a LanguageTrack> {
    tracks
        .iter()
        .find(|t| t.code.eq_ignore_ascii_case(requested))
        .or_else(|| {
            tracks
                .iter()
                .find(|t| primary_subtag(&t.code).eq_ignore_ascii_case(requested))
        })
        .or_else(|| {
            let base = primary_subtag(requested);
            tracks
                .iter()
                .find(|t| primary_subtag(&t.code).eq_ignore_ascii_case(base))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FailureKind;
    use crate::providers::mock::MockProvider;

    fn vid() -> VideoId {
        VideoId::parse("-PAD2MYt0B0").unwrap()
    }

    fn pref(codes: &[&str]) -> LanguagePreference {
        LanguagePreference::new(codes.iter().copied())
    }

    fn pairs(attempts: &[Attempt]) -> Vec<(Option<&str>, FailureKind)> {
        attempts
            .iter()
            .map(|a| (a.language.as_deref(), a.error.kind()))
            .collect()
    }

    #[tokio::test]
    async fn test_preferred_language_available() {
        let provider = MockProvider::with_languages(&["en", "hi"]);
        let result = resolve(&provider, &vid(), &pref(&["hi", "en"])).await.unwrap();

        assert_eq!(result.provenance, Provenance::Preferred);
        assert_eq!(result.language, "hi");
        assert_eq!(result.entries[0].text, "text in hi");
        assert!(result.skipped.is_empty());
        assert_eq!(provider.fetched(), ["hi"]);
    }

    #[tokio::test]
    async fn test_fallback_language() {
        let provider = MockProvider::with_languages(&["en", "es"]);
        let result = resolve(&provider, &vid(), &pref(&["hi", "en"])).await.unwrap();

        assert_eq!(result.provenance, Provenance::Fallback);
        assert_eq!(result.language, "en");
        assert_eq!(pairs(&result.skipped), [(Some("hi"), FailureKind::NoCaptionsInLanguage)]);
        assert_eq!(provider.fetched(), ["en"]);
    }

    #[tokio::test]
    async fn test_fallback_skips_failed_fetch() {
        let provider = MockProvider::with_languages(&["hi", "en"])
            .failing("hi", CaptionError::MalformedResponse("bad xml".to_string()));
        let result = resolve(&provider, &vid(), &pref(&["hi", "en"])).await.unwrap();

        assert_eq!(result.provenance, Provenance::Fallback);
        assert_eq!(result.language, "en");
        assert_eq!(pairs(&result.skipped), [(Some("hi"), FailureKind::MalformedResponse)]);
        assert_eq!(provider.fetched(), ["hi", "en"]);
    }

    #[tokio::test]
    async fn test_auto_uses_first_listed_language() {
        let provider = MockProvider::with_languages(&["fr"]);
        let result = resolve(&provider, &vid(), &pref(&["hi", "en"])).await.unwrap();

        assert_eq!(result.provenance, Provenance::Auto);
        assert_eq!(result.language, "fr");
        assert_eq!(
            pairs(&result.skipped),
            [
                (Some("hi"), FailureKind::NoCaptionsInLanguage),
                (Some("en"), FailureKind::NoCaptionsInLanguage),
            ]
        );
    }

    #[tokio::test]
    async fn test_auto_picks_first_of_several() {
        let provider = MockProvider::with_languages(&["de", "fr", "ja"]);
        let result = resolve(&provider, &vid(), &pref(&["hi"])).await.unwrap();
        assert_eq!(result.language, "de");
        assert_eq!(provider.fetched(), ["de"]);
    }

    #[tokio::test]
    async fn test_empty_preference_accepts_any() {
        let provider = MockProvider::with_languages(&["es", "en"]);
        let result = resolve(&provider, &vid(), &LanguagePreference::default()).await.unwrap();
        assert_eq!(result.provenance, Provenance::Auto);
        assert_eq!(result.language, "es");
    }

    #[tokio::test]
    async fn test_no_languages_at_all() {
        let provider = MockProvider::with_languages(&[]);
        let failure = resolve(&provider, &vid(), &pref(&["hi", "en"])).await.unwrap_err();

        assert_eq!(
            pairs(&failure.attempts),
            [
                (Some("hi"), FailureKind::NoCaptionsInLanguage),
                (Some("en"), FailureKind::NoCaptionsInLanguage),
            ]
        );
        assert_eq!(failure.kind(), FailureKind::NoCaptionsAtAll);
        assert!(provider.fetched().is_empty());
        assert!(failure.to_string().contains("has no captions"));
    }

    #[tokio::test]
    async fn test_no_languages_and_no_preference() {
        let provider = MockProvider::with_languages(&[]);
        let failure = resolve(&provider, &vid(), &LanguagePreference::default())
            .await
            .unwrap_err();
        assert_eq!(pairs(&failure.attempts), [(None, FailureKind::NoCaptionsAtAll)]);
    }

    #[tokio::test]
    async fn test_listing_failure_stops_immediately() {
        let provider = MockProvider::unreachable(CaptionError::ProviderUnavailable("timed out".to_string()));
        let failure = resolve(&provider, &vid(), &pref(&["hi", "en"])).await.unwrap_err();

        assert_eq!(pairs(&failure.attempts), [(None, FailureKind::ProviderUnavailable)]);
        assert!(failure.is_transport_failure());
        assert_eq!(*provider.calls.lock().unwrap(), ["list"]);
        assert!(failure.to_string().contains("could not reach caption source"));
        assert!(failure.last_error().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_malformed_listing_is_not_reported_as_no_captions() {
        let provider =
            MockProvider::unreachable(CaptionError::MalformedResponse("yt-dlp metadata: EOF".to_string()));
        let failure = resolve(&provider, &vid(), &pref(&["hi", "en"])).await.unwrap_err();

        assert_eq!(pairs(&failure.attempts), [(None, FailureKind::MalformedResponse)]);
        assert_eq!(failure.kind(), FailureKind::MalformedResponse);
        assert!(!failure.is_transport_failure());
        let message = failure.to_string();
        assert!(message.contains("could not read caption list"));
        assert!(!message.contains("has no captions"));
        assert!(message.contains("yt-dlp metadata: EOF"));
    }

    #[tokio::test]
    async fn test_codes_sharing_a_track_are_all_recorded() {
        let provider = MockProvider::with_languages(&["en", "fr"])
            .failing("en", CaptionError::MalformedResponse("bad xml".to_string()));
        let result = resolve(&provider, &vid(), &pref(&["en-US", "en-GB", "fr"])).await.unwrap();

        assert_eq!(result.provenance, Provenance::Fallback);
        assert_eq!(result.language, "fr");
        assert_eq!(
            pairs(&result.skipped),
            [
                (Some("en-US"), FailureKind::MalformedResponse),
                (Some("en-GB"), FailureKind::NoCaptionsInLanguage),
            ]
        );
        assert_eq!(provider.fetched(), ["en", "fr"]);
    }

    #[tokio::test]
    async fn test_auto_fetch_failure_is_recorded() {
        let provider =
            MockProvider::with_languages(&["fr"]).failing("fr", CaptionError::ProviderUnavailable("403".to_string()));
        let failure = resolve(&provider, &vid(), &pref(&["hi"])).await.unwrap_err();

        assert_eq!(
            pairs(&failure.attempts),
            [
                (Some("hi"), FailureKind::NoCaptionsInLanguage),
                (Some("fr"), FailureKind::ProviderUnavailable),
            ]
        );
        assert_eq!(failure.available.len(), 1);
    }

    #[tokio::test]
    async fn test_requested_but_failed_track_not_retried_as_auto() {
        let provider = MockProvider::with_languages(&["en"])
            .failing("en", CaptionError::NoCaptionsInLanguage("en".to_string()));
        let failure = resolve(&provider, &vid(), &pref(&["en"])).await.unwrap_err();
        assert_eq!(provider.fetched(), ["en"]);
        assert_eq!(failure.kind(), FailureKind::NoCaptionsInLanguage);
    }

    #[tokio::test]
    async fn test_regional_variant_matches() {
        let provider = MockProvider::with_languages(&["en-GB", "hi"]);
        let result = resolve(&provider, &vid(), &pref(&["en"])).await.unwrap();
        assert_eq!(result.provenance, Provenance::Preferred);
        assert_eq!(result.language, "en-GB");
    }

    #[test]
    fn test_match_track_prefers_exact() {
        let tracks = vec![
            LanguageTrack::new("en-US", "English (US)", false),
            LanguageTrack::new("en", "English", true),
        ];
        assert_eq!(match_track(&tracks, "en").unwrap().code, "en");
        assert_eq!(match_track(&tracks, "en-IN").unwrap().code, "en-US");
        assert!(match_track(&tracks, "hi").is_none());
    }
}
