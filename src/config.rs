use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Which caption backend a deployment uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
pub enum ProviderKind {
    #[default]
    #[serde(rename = "innertube")]
    #[value(name = "innertube")]
    InnerTube,
    #[serde(rename = "yt-dlp")]
    #[value(name = "yt-dlp")]
    YtDlp,
}

impl std::str::FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "innertube" => Ok(ProviderKind::InnerTube),
            "yt-dlp" | "ytdlp" => Ok(ProviderKind::YtDlp),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Languages tried after the one given on the command line, in order
    pub languages: Vec<String>,
    pub provider: ProviderKind,
    pub yt_dlp_path: Option<PathBuf>,
    /// Model used for the structured review
    pub model: String,
    /// Where `--save` writes transcripts and reviews
    pub output_dir: PathBuf,
    pub bind: String,
    pub gemini_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            languages: vec!["en".to_string()],
            provider: ProviderKind::default(),
            yt_dlp_path: None,
            model: DEFAULT_MODEL.to_string(),
            output_dir: PathBuf::from("."),
            bind: DEFAULT_BIND.to_string(),
            gemini_api_key: None,
            anthropic_api_key: None,
            openai_api_key: None,
        }
    }
}

impl Config {
    /// Load config from ~/.config/ytcap/config.toml if it exists, then apply
    /// environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            debug!("No config file found at {}", path.display());
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading config from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Environment variables win over the file
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("GEMINI_API_KEY") {
            self.gemini_api_key = Some(v);
        }
        if let Some(v) = non_empty("ANTHROPIC_API_KEY") {
            self.anthropic_api_key = Some(v);
        }
        if let Some(v) = non_empty("OPENAI_API_KEY") {
            self.openai_api_key = Some(v);
        }
        if let Some(v) = non_empty("YTCAP_LANGUAGES") {
            self.languages = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Some(v) = non_empty("YTCAP_MODEL") {
            self.model = v;
        }
        if let Some(v) = non_empty("YTCAP_PROVIDER") {
            match v.parse() {
                Ok(kind) => self.provider = kind,
                Err(e) => log::warn!("Ignoring YTCAP_PROVIDER: {e}"),
            }
        }
    }

    /// Checks that do not depend on what the run will do
    pub fn validate(&self) -> Result<(), ConfigError> {
        for lang in &self.languages {
            validate_language(lang)?;
        }
        Ok(())
    }

    /// API key for the configured model, or an error naming the missing variable
    pub fn summarizer_key(&self) -> Result<String, ConfigError> {
        let (var, key) = match crate::summarize::Backend::for_model(&self.model) {
            crate::summarize::Backend::Gemini => ("GEMINI_API_KEY", &self.gemini_api_key),
            crate::summarize::Backend::Anthropic => ("ANTHROPIC_API_KEY", &self.anthropic_api_key),
            crate::summarize::Backend::OpenAi => ("OPENAI_API_KEY", &self.openai_api_key),
        };
        key.clone()
            .ok_or_else(|| ConfigError::MissingApiKey(var, self.model.clone()))
    }
}

/// Language codes look like `en`, `hi`, `en-GB`, `zh-Hans`
pub fn validate_language(code: &str) -> Result<(), ConfigError> {
    let mut parts = code.split('-');
    let primary = parts.next().unwrap_or_default();
    let primary_ok = (2..=3).contains(&primary.len()) && primary.chars().all(|c| c.is_ascii_alphabetic());
    let rest_ok = parts.all(|p| (1..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()));
    if primary_ok && rest_ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidLanguage(code.to_string()))
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("ytcap")
        .join("config.toml")
}
