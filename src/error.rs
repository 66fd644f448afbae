use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::{LanguageTrack, VideoId};

/// Coarse classification of every failure the crate reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    InvalidIdentifier,
    ProviderUnavailable,
    NoCaptionsInLanguage,
    NoCaptionsAtAll,
    MalformedResponse,
}

/// Input could not be turned into a video ID
#[derive(Debug, Clone, Error)]
#[error("could not extract a video ID from: {0}")]
pub struct InvalidIdentifier(pub String);

impl InvalidIdentifier {
    pub fn kind(&self) -> FailureKind {
        FailureKind::InvalidIdentifier
    }
}

/// Failure reported by a caption provider for a single call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptionError {
    #[error("caption source unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("no captions in language '{0}'")]
    NoCaptionsInLanguage(String),

    #[error("video has no captions")]
    NoCaptionsAtAll,

    #[error("malformed caption data: {0}")]
    MalformedResponse(String),
}

impl CaptionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CaptionError::ProviderUnavailable(_) => FailureKind::ProviderUnavailable,
            CaptionError::NoCaptionsInLanguage(_) => FailureKind::NoCaptionsInLanguage,
            CaptionError::NoCaptionsAtAll => FailureKind::NoCaptionsAtAll,
            CaptionError::MalformedResponse(_) => FailureKind::MalformedResponse,
        }
    }
}

impl From<reqwest::Error> for CaptionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            CaptionError::MalformedResponse(e.to_string())
        } else {
            CaptionError::ProviderUnavailable(e.to_string())
        }
    }
}

impl From<std::io::Error> for CaptionError {
    fn from(e: std::io::Error) -> Self {
        CaptionError::ProviderUnavailable(e.to_string())
    }
}

/// One failed (source, language) combination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub source: String,
    /// `None` when the failure happened while listing languages
    pub language: Option<String>,
    pub error: CaptionError,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.language {
            Some(lang) => write!(f, "{}[{lang}]: {}", self.source, self.error),
            None => write!(f, "{}: {}", self.source, self.error),
        }
    }
}

/// Terminal outcome when no source/language combination produced captions
#[derive(Debug, Clone)]
pub struct ResolutionFailure {
    pub video_id: VideoId,
    /// Never empty; in attempt order
    pub attempts: Vec<Attempt>,
    /// Tracks the provider listed; empty if listing itself failed
    pub available: Vec<LanguageTrack>,
}

impl ResolutionFailure {
    /// Message of the last underlying error
    pub fn last_error(&self) -> Option<String> {
        self.attempts.last().map(|a| a.error.to_string())
    }

    /// True when the caption source itself could not be reached
    pub fn is_transport_failure(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| a.error.kind() == FailureKind::ProviderUnavailable)
    }

    /// Error recorded without a language: a failed or empty track listing
    pub fn listing_error(&self) -> Option<&CaptionError> {
        self.attempts.iter().find(|a| a.language.is_none()).map(|a| &a.error)
    }

    pub fn kind(&self) -> FailureKind {
        if let Some(error) = self.listing_error() {
            error.kind()
        } else if self.is_transport_failure() {
            FailureKind::ProviderUnavailable
        } else if self.available.is_empty() {
            FailureKind::NoCaptionsAtAll
        } else if self
            .attempts
            .iter()
            .any(|a| a.error.kind() == FailureKind::MalformedResponse)
        {
            FailureKind::MalformedResponse
        } else {
            FailureKind::NoCaptionsInLanguage
        }
    }
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            FailureKind::ProviderUnavailable => {
                write!(f, "could not reach caption source for video {}", self.video_id)?
            }
            FailureKind::NoCaptionsAtAll => write!(f, "video {} has no captions", self.video_id)?,
            FailureKind::MalformedResponse if self.listing_error().is_some() => {
                write!(f, "could not read caption list for video {}", self.video_id)?
            }
            _ => {
                let requested = self
                    .attempts
                    .iter()
                    .filter_map(|a| a.language.as_deref())
                    .collect::<Vec<_>>()
                    .join(", ");
                let available = self
                    .available
                    .iter()
                    .map(|t| t.code.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "no usable captions for video {} in: {requested} (available: {available})",
                    self.video_id
                )?
            }
        }
        if let Some(last) = self.last_error() {
            write!(f, "; last error: {last}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ResolutionFailure {}

/// Failure of the generative-AI review call
#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("request to {provider} failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} API returned {status}: {body}")]
    Api {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed review response: {0}")]
    MalformedResponse(String),
}

impl SummarizeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SummarizeError::MalformedResponse(_) => FailureKind::MalformedResponse,
            _ => FailureKind::ProviderUnavailable,
        }
    }
}

/// Problems found while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0} is not set (required for model '{1}')")]
    MissingApiKey(&'static str, String),

    #[error("invalid language code: '{0}'")]
    InvalidLanguage(String),

    #[error("unknown caption provider: '{0}' (expected innertube or yt-dlp)")]
    UnknownProvider(String),
}
