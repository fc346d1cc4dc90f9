mod config;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{fmt, EnvFilter};

use transcript_core::{
    build_fetcher, video_id_from_url, CancellationToken, ChatCompletionsModel, FetchError,
    Outcome, ResourceId, StrategyKind, Summarizer, Transcript,
};

use crate::config::AppConfig;

const EXIT_CONFIG: u8 = 1;
const EXIT_EXHAUSTED: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

/// Process status for a finished fetch: 0 found, 1 misconfigured,
/// 2 every strategy failed, 130 interrupted.
fn exit_status<P>(result: &Result<Outcome<P>, FetchError>) -> u8 {
    match result {
        Ok(Outcome::Success { .. }) => 0,
        Ok(Outcome::Exhausted { .. }) => EXIT_EXHAUSTED,
        Err(FetchError::Configuration(_)) => EXIT_CONFIG,
        Err(FetchError::Cancelled { .. }) => EXIT_CANCELLED,
    }
}

fn version_string() -> &'static str {
    static VERSION: OnceLock<String> = OnceLock::new();
    VERSION.get_or_init(|| {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            env!("CARGO_PKG_VERSION").to_string()
        } else {
            format!("{} ({})", env!("CARGO_PKG_VERSION"), hash)
        }
    })
}

/// Fetch video transcripts through an ordered chain of fallback strategies.
#[derive(Parser)]
#[command(name = "transcript-fetcher", version = version_string(), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve {
        /// Listen address (e.g. 0.0.0.0:8080). Overrides config file.
        #[arg(short, long)]
        listen: Option<SocketAddr>,

        /// Path to TOML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Fetch one transcript and print it to stdout.
    Fetch {
        /// Video URL or bare video id.
        input: String,

        /// Path to TOML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Strategy to try, in order. Repeat to build a chain.
        #[arg(short, long = "strategy", value_name = "NAME")]
        strategies: Vec<StrategyKind>,
    },
    /// Fetch a transcript and summarize it with a hosted model.
    Summarize {
        /// Video URL or bare video id.
        input: String,

        /// Path to TOML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// API key for the chat-completions endpoint.
        #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
        api_key: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { listen, config } => run_serve(listen, config.as_deref()).await,
        Commands::Fetch {
            input,
            config,
            strategies,
        } => run_fetch(&input, config.as_deref(), strategies).await,
        Commands::Summarize {
            input,
            config,
            api_key,
        } => run_summarize(&input, config.as_deref(), api_key).await,
    }
}

/// Load config and install tracing with the configured format. Config
/// errors are logged and turned into exit status 1.
fn load_config(path: Option<&Path>, default_level: &str) -> Result<AppConfig, ExitCode> {
    match AppConfig::load_or_default(path) {
        Ok(c) => {
            init_tracing(&c.server.log_format, default_level);
            if let Some(path) = path {
                tracing::info!(path = %path.display(), "Loaded config file");
            }
            Ok(c)
        }
        Err(e) => {
            init_tracing("pretty", default_level);
            tracing::error!("{}", e);
            Err(ExitCode::FAILURE)
        }
    }
}

fn parse_input(input: &str) -> Result<ResourceId, ExitCode> {
    video_id_from_url(input).ok_or_else(|| {
        eprintln!(
            "{} not a video URL or id: {}",
            style("error:").red().bold(),
            input
        );
        ExitCode::FAILURE
    })
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        transcript_api::shutdown_signal().await;
        child.cancel();
    });
    token
}

async fn run_serve(listen_override: Option<SocketAddr>, config_path: Option<&Path>) -> ExitCode {
    let app_config = match load_config(config_path, "info") {
        Ok(c) => c,
        Err(code) => return code,
    };
    let fetcher_config = match app_config.fetcher.to_fetcher_config() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let listen = listen_override.unwrap_or(app_config.server.listen);
    let state = transcript_api::state::AppState::with_fetcher(build_fetcher(&fetcher_config))
        .with_record_limit(app_config.server.record_limit);

    tracing::info!(%listen, "Starting transcript fetcher API server");
    if let Err(e) =
        transcript_api::serve_with_state(listen, state, transcript_api::shutdown_signal()).await
    {
        tracing::error!(error = %e, "Server failed");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}

/// Shared by `fetch` and `summarize`: resolve input, run the chain with a
/// spinner, report exhaustion on stderr.
async fn fetch_transcript(
    input: &str,
    app_config: &AppConfig,
    strategies: Vec<StrategyKind>,
) -> Result<(Transcript, String), ExitCode> {
    let video_id = parse_input(input)?;

    let mut fetcher_config = app_config.fetcher.to_fetcher_config().map_err(|e| {
        tracing::error!("{}", e);
        ExitCode::FAILURE
    })?;
    if !strategies.is_empty() {
        fetcher_config = fetcher_config.with_strategies(strategies);
    }
    let fetcher = build_fetcher(&fetcher_config);

    let spinner = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!(
        "Fetching transcript for {} ({})",
        style(&video_id).bold(),
        style(fetcher.strategy_names().join(" → ")).dim()
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = fetcher.fetch_with_cancel(&video_id, &cancel_on_ctrl_c()).await;
    spinner.finish_and_clear();

    let status = ExitCode::from(exit_status(&result));
    match result {
        Ok(Outcome::Success { payload, source }) => Ok((payload, source)),
        Ok(Outcome::Exhausted { attempts }) => {
            eprintln!(
                "{} no transcript for {} after {} attempt(s)",
                style("error:").red().bold(),
                video_id,
                attempts.len()
            );
            for attempt in &attempts {
                eprintln!(
                    "  {:<12} {:<18} {}",
                    style(&attempt.strategy).bold(),
                    style(attempt.failure.kind).red(),
                    style(&attempt.failure.message).dim()
                );
            }
            Err(status)
        }
        Err(e @ FetchError::Configuration(_)) => {
            tracing::error!(error = %e, "Fetcher misconfigured");
            Err(status)
        }
        Err(e @ FetchError::Cancelled { .. }) => {
            eprintln!("{}", style(e.to_string()).dim());
            Err(status)
        }
    }
}

fn print_source(transcript: &Transcript, source: &str) {
    eprintln!(
        "{} {} {} {}",
        style("source:").dim(),
        style(source).green().bold(),
        style(transcript.language.as_deref().unwrap_or("unknown language")).dim(),
        if transcript.generated {
            style("(auto-generated)").yellow().to_string()
        } else {
            String::new()
        }
    );
}

async fn run_fetch(input: &str, config_path: Option<&Path>, strategies: Vec<StrategyKind>) -> ExitCode {
    let app_config = match load_config(config_path, "warn") {
        Ok(c) => c,
        Err(code) => return code,
    };

    match fetch_transcript(input, &app_config, strategies).await {
        Ok((transcript, source)) => {
            print_source(&transcript, &source);
            println!("{}", transcript.text);
            ExitCode::SUCCESS
        }
        Err(code) => code,
    }
}

async fn run_summarize(input: &str, config_path: Option<&Path>, api_key: String) -> ExitCode {
    let app_config = match load_config(config_path, "warn") {
        Ok(c) => c,
        Err(code) => return code,
    };

    let (transcript, source) = match fetch_transcript(input, &app_config, Vec::new()).await {
        Ok(found) => found,
        Err(code) => return code,
    };
    print_source(&transcript, &source);

    let summarizer_config = app_config.summarizer.to_summarizer_config();
    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!(
        "Summarizing {} characters with {}",
        transcript.char_count(),
        summarizer_config.model
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let model = ChatCompletionsModel::new(summarizer_config, api_key);
    let result = Summarizer::new(Arc::new(model)).summarize(&transcript).await;
    spinner.finish_and_clear();

    match result {
        Ok(summary) => {
            println!("{}", summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_format: &str, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_format {
        "json" => {
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .json()
                .init();
        }
        _ => {
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
