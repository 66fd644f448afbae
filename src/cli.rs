use clap::Parser;
use std::path::PathBuf;

use ytcap::config::ProviderKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Srt,
    Vtt,
}

#[derive(Parser)]
#[command(
    name = "ytcap",
    about = "YouTube caption resolver with language fallback",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// YouTube video URL or video ID (reads from stdin if omitted)
    pub url: Option<String>,

    /// Preferred caption language, tried before the configured defaults
    pub lang: Option<String>,

    /// Output format: text (default), json, srt, vtt
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Write output to file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Save .txt and .vtt files (and the review) named after the video and language
    #[arg(long)]
    pub save: bool,

    /// Directory used by --save (overrides config output_dir)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Caption source (overrides config provider)
    #[arg(long, value_enum)]
    pub provider: Option<ProviderKind>,

    /// Review the transcript via an LLM
    #[arg(short, long)]
    pub summarize: bool,

    /// LLM model for the review (overrides config model)
    #[arg(long)]
    pub model: Option<String>,

    /// Parse a local WebVTT file instead of fetching captions
    #[arg(long, value_name = "FILE", conflicts_with_all = ["url", "serve"])]
    pub vtt: Option<PathBuf>,

    /// Run the HTTP transcript service
    #[arg(long, conflicts_with = "url")]
    pub serve: bool,

    /// Address for --serve (overrides config bind)
    #[arg(long, requires = "serve")]
    pub bind: Option<String>,

    /// Show source, language and provenance
    #[arg(short, long)]
    pub verbose: bool,
}
