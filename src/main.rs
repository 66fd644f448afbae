use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};
use std::sync::Arc;

use eyre::{Result, WrapErr};
use log::{debug, info, warn};

mod cli;

use cli::{Cli, OutputFormat};
use ytcap::config::{Config, validate_language};
use ytcap::output::{self, render_srt, render_text};
use ytcap::providers::{self, CaptionProvider};
use ytcap::resolver::resolve;
use ytcap::server::{self, AppState};
use ytcap::summarize::{StructuredReview, Summarizer};
use ytcap::vtt::{parse_vtt, render_vtt};
use ytcap::{CaptionEntry, InvalidIdentifier, LanguagePreference, TranscriptResult, VideoId};

/// How a run ended; the worst outcome across inputs decides the exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Outcome {
    Success,
    Failed,
    InvalidInput,
}

impl Outcome {
    fn exit_code(self) -> ExitCode {
        match self {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::Failed => ExitCode::from(1),
            Outcome::InvalidInput => ExitCode::from(2),
        }
    }
}

/// Load `.env` (from `env_file`, else the working directory) and build a
/// logger from the resulting environment, so RUST_LOG may come from either
fn log_builder(env_file: Option<&Path>) -> env_logger::Builder {
    let loaded = match env_file {
        Some(path) => dotenvy::from_path(path),
        None => dotenvy::dotenv().map(|_| ()),
    };
    if let Err(e) = loaded
        && !e.not_found()
    {
        eprintln!("warning: could not load .env: {e}");
    }
    env_logger::Builder::from_default_env()
}

fn setup_logging() -> Result<()> {
    let mut builder = log_builder(None);

    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("ytcap.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytcap")
        .join("logs")
}

fn tool_version(name: &str) -> Option<String> {
    Command::new(name)
        .arg("--version")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| {
            String::from_utf8_lossy(&o.stdout)
                .trim()
                .lines()
                .next()
                .unwrap_or("")
                .to_string()
        })
}

fn build_after_help() -> String {
    let yt_dlp_line = match tool_version("yt-dlp") {
        Some(v) => format!("  \x1b[32m✅\x1b[0m yt-dlp     {v}"),
        None => "  \x1b[31m❌\x1b[0m yt-dlp     (not found; needed for --provider yt-dlp)".to_string(),
    };

    format!(
        "\nOPTIONAL TOOLS:\n{yt_dlp_line}\n\nEXIT CODES:\n  0 success, 1 no captions resolved, 2 invalid input\n\nConfig: {}\nLogs are written to: {}",
        ytcap::config::config_path().display(),
        log_dir().join("ytcap.log").display()
    )
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = setup_logging() {
        eprintln!("warning: file logging disabled: {e}");
    }

    let cmd = <Cli as clap::CommandFactory>::command().after_help(build_after_help());
    let matches = cmd.get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return Outcome::InvalidInput.exit_code();
        }
    };

    match run(cli, config).await {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            eprintln!("Error: {e:?}");
            Outcome::Failed.exit_code()
        }
    }
}

/// Config file, then environment, then command-line flags; validated once
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load()?;

    if let Some(provider) = cli.provider {
        config.provider = provider;
    }
    if let Some(ref model) = cli.model {
        config.model = model.clone();
    }
    if let Some(ref dir) = cli.out_dir {
        config.output_dir = dir.clone();
    }
    if let Some(ref bind) = cli.bind {
        config.bind = bind.clone();
    }
    if let Some(ref lang) = cli.lang {
        validate_language(lang)?;
    }
    config.validate()?;

    debug!("Effective config: {config:?}");
    Ok(config)
}

async fn run(cli: Cli, config: Config) -> Result<Outcome> {
    if let Some(ref path) = cli.vtt {
        return convert_vtt_file(&cli, path);
    }

    let client = reqwest::Client::new();

    if cli.serve {
        let summarizer = match Summarizer::from_config(&config, client.clone()) {
            Ok(s) => Some(Arc::new(s)),
            Err(e) => {
                info!("Analysis endpoint disabled: {e}");
                None
            }
        };
        let state = AppState {
            provider: providers::from_config(&config, client),
            languages: Arc::new(config.languages.clone()),
            summarizer,
        };
        eprintln!("Serving on http://{}", config.bind);
        server::serve(state, &config.bind).await?;
        return Ok(Outcome::Success);
    }

    let summarizer = if cli.summarize {
        match Summarizer::from_config(&config, client.clone()) {
            Ok(s) => Some(s),
            Err(e) => {
                eprintln!("Error: {e}");
                return Ok(Outcome::InvalidInput);
            }
        }
    } else {
        None
    };

    let provider = providers::from_config(&config, client);
    let preference = LanguagePreference::with_primary(cli.lang.as_deref(), &config.languages);

    // Collect URLs: from arg or stdin
    let urls = if let Some(ref url) = cli.url {
        vec![url.clone()]
    } else {
        let stdin = io::stdin();
        stdin.lock().lines().collect::<Result<Vec<_>, _>>()?
    };

    if urls.iter().all(|u| u.trim().is_empty()) {
        eprintln!("no URL or video ID provided\n\nUsage: ytcap <URL> [LANG]\n       echo <URL> | ytcap");
        return Ok(Outcome::InvalidInput);
    }

    let (cli, config, preference) = (&cli, &config, &preference);
    let provider = provider.as_ref();
    let summarizer = summarizer.as_ref();
    let worst = process_batch(&urls, move |url_input| async move {
        process_video(cli, config, provider, summarizer, preference, &url_input).await
    })
    .await;

    Ok(worst)
}

/// Run every non-blank input; an error on one input counts as a failure and
/// the rest still run
async fn process_batch<F, Fut>(inputs: &[String], mut process: F) -> Outcome
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Outcome>>,
{
    let mut worst = Outcome::Success;
    for input in inputs {
        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        let outcome = match process(input.to_string()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Processing {input} failed: {e:?}");
                eprintln!("Error: {input}: {e:#}");
                Outcome::Failed
            }
        };
        worst = worst.max(outcome);
    }
    worst
}

async fn process_video(
    cli: &Cli,
    config: &Config,
    provider: &dyn CaptionProvider,
    summarizer: Option<&Summarizer>,
    preference: &LanguagePreference,
    url_input: &str,
) -> Result<Outcome> {
    let Some(video_id) = VideoId::parse(url_input) else {
        eprintln!(
            "{}\n\nSupported formats:\n  https://www.youtube.com/watch?v=ID\n  https://youtu.be/ID\n  https://www.youtube.com/embed/ID\n  https://www.youtube.com/shorts/ID\n  <11-character video ID>",
            InvalidIdentifier(url_input.to_string())
        );
        return Ok(Outcome::InvalidInput);
    };

    if cli.verbose {
        eprintln!(
            "Video: {video_id}\nSource: {}\nLanguages: {}",
            provider.name(),
            preference.codes().join(", ")
        );
    }

    let transcript = match resolve(provider, &video_id, preference).await {
        Ok(t) => t,
        Err(failure) => {
            eprintln!("Error: {failure}");
            if cli.verbose {
                for attempt in &failure.attempts {
                    eprintln!("  tried {attempt}");
                }
            }
            return Ok(Outcome::Failed);
        }
    };

    if cli.verbose {
        for attempt in &transcript.skipped {
            eprintln!("  skipped {attempt}");
        }
        eprintln!(
            "Language: {} ({})\nEntries: {}",
            transcript.language,
            transcript.provenance,
            transcript.entries.len(),
        );
    }

    let rendered = match cli.format {
        OutputFormat::Text => render_text(&transcript.entries),
        OutputFormat::Json => output::render_json(&transcript)?,
        OutputFormat::Srt => render_srt(&transcript.entries),
        OutputFormat::Vtt => render_vtt(&transcript.entries),
    };
    emit(cli, &rendered)?;

    if cli.save {
        for path in output::save_transcript(&config.output_dir, &transcript)? {
            eprintln!("Saved {}", path.display());
        }
    }

    if let Some(summarizer) = summarizer {
        return review(cli, config, summarizer, &transcript).await;
    }

    Ok(Outcome::Success)
}

async fn review(
    cli: &Cli,
    config: &Config,
    summarizer: &Summarizer,
    transcript: &TranscriptResult,
) -> Result<Outcome> {
    if cli.verbose {
        eprintln!("Analyzing content with {}...", summarizer.model());
    }

    let review = match summarizer.summarize(&transcript.full_text()).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error analyzing transcript: {e}");
            return Ok(Outcome::Failed);
        }
    };

    println!("\n--- Review ---\n{}", format_review(&review));

    if cli.save {
        let path = output::save_analysis(&config.output_dir, &transcript.video_id, &review)
            .wrap_err("could not save review")?;
        eprintln!("Saved {}", path.display());
    }

    Ok(Outcome::Success)
}

fn format_review(review: &StructuredReview) -> String {
    let v = &review.final_verdict;
    let s = &review.video_summary;
    let bullets = |items: &[String]| {
        items
            .iter()
            .map(|i| format!("- {i}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Clarity {}/5, Emotional impact {}/5, Structure {}/5, Retention {}/5, Commercial balance {}/5\n\nOverview: {}\n\nPositive Points:\n{}\n\nAreas for Improvement:\n{}\n\nSuggestions:\n{}",
        v.clarity_of_content,
        v.emotional_impact,
        v.video_structure,
        v.retention_power,
        v.commercial_balance,
        s.overview,
        bullets(&s.positive_points),
        bullets(&s.negative_points),
        bullets(&s.suggestions),
    )
}

fn emit(cli: &Cli, rendered: &str) -> Result<()> {
    if let Some(ref path) = cli.output {
        std::fs::write(path, rendered).wrap_err_with(|| format!("could not write {}", path.display()))?;
        if cli.verbose {
            eprintln!("Output written to: {}", path.display());
        }
    } else {
        println!("{rendered}");
    }
    Ok(())
}

fn convert_vtt_file(cli: &Cli, path: &Path) -> Result<Outcome> {
    let entries: Vec<CaptionEntry> = match std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| parse_vtt(&content))
    {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Error: could not parse {}: {e}", path.display());
            return Ok(Outcome::InvalidInput);
        }
    };

    if cli.verbose {
        eprintln!("Parsed {} entries from {}", entries.len(), path.display());
    }

    let rendered = match cli.format {
        OutputFormat::Text => render_text(&entries),
        OutputFormat::Json => serde_json::to_string_pretty(&entries)?,
        OutputFormat::Srt => render_srt(&entries),
        OutputFormat::Vtt => render_vtt(&entries),
    };
    emit(cli, &rendered)?;
    Ok(Outcome::Success)
}
