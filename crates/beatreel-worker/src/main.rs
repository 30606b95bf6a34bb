//! beatreel command-line runner.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use beatreel_models::{AudioSource, ExecutionReport, MediaRequest, QualityTier, Urgency, VisualStyle};
use beatreel_text::{HttpTextClient, TextClientConfig};
use beatreel_worker::{
    init_tracing, ArtistCatalog, JsonCatalog, RetentionSweeper, StaticCatalog, WorkerConfig,
    WorkflowExecutor,
};

#[derive(Parser, Debug)]
#[command(name = "beatreel", version, about = "Render music videos from artist requests")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one request (or a JSON list of requests) and print the reports.
    Run(RunArgs),
    /// Print the workflow plan for a request without running it.
    Plan(RequestArgs),
}

#[derive(Args, Debug)]
struct RequestArgs {
    /// JSON file holding one request or a list of requests. Overrides the flags below.
    #[arg(long = "request")]
    request_file: Option<PathBuf>,

    /// Artist name, or "random".
    #[arg(long, default_value = "random")]
    artist: String,

    /// Clip length in seconds.
    #[arg(long, default_value_t = 30.0)]
    duration: f64,

    #[arg(long, default_value = "classic")]
    style: VisualStyle,

    /// Remote audio URL. Without it (and without --audio-file) the catalog track's URL is used.
    #[arg(long)]
    audio_url: Option<String>,

    /// Local audio file.
    #[arg(long, conflicts_with = "audio_url")]
    audio_file: Option<PathBuf>,

    #[arg(long, default_value_t = 2.0)]
    fade_in: f64,

    #[arg(long, default_value_t = 2.0)]
    fade_out: f64,

    #[arg(long, default_value = "medium")]
    quality: QualityTier,

    #[arg(long, default_value = "normal")]
    urgency: Urgency,

    /// Clip start inside the source, in seconds (random when omitted).
    #[arg(long)]
    start: Option<f64>,

    /// Volume multiplier.
    #[arg(long)]
    gain: Option<f64>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    request: RequestArgs,

    /// Artist catalog JSON. Falls back to the built-in catalog.
    #[arg(long, env = "BEATREEL_CATALOG")]
    catalog: Option<PathBuf>,

    /// Font file for label text. Falls back to common system fonts.
    #[arg(long, env = "BEATREEL_FONT")]
    font: Option<PathBuf>,

    /// Root for output/ and scratch/ (overrides BEATREEL_OUTPUT_DIR / BEATREEL_SCRATCH_DIR).
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Report failures without substituting a placeholder.
    #[arg(long, default_value_t = false)]
    no_fallback: bool,

    /// Do not start the retention sweeper.
    #[arg(long, default_value_t = false)]
    no_sweep: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RequestFile {
    Many(Vec<MediaRequest>),
    One(Box<MediaRequest>),
}

impl RequestArgs {
    async fn into_requests(self) -> anyhow::Result<Vec<MediaRequest>> {
        if let Some(path) = &self.request_file {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let parsed: RequestFile = serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing {}", path.display()))?;
            return Ok(match parsed {
                RequestFile::Many(requests) => requests,
                RequestFile::One(request) => vec![*request],
            });
        }

        let source = match (self.audio_file, self.audio_url) {
            (Some(path), _) => AudioSource::uploaded(path),
            (None, url) => AudioSource::Remote { url },
        };
        let mut request = MediaRequest::new(self.artist, self.duration)
            .with_style(self.style)
            .with_audio_source(source)
            .with_fades(self.fade_in, self.fade_out)
            .with_quality(self.quality)
            .with_urgency(self.urgency);
        if let Some(start) = self.start {
            request = request.with_start_time(start);
        }
        if let Some(gain) = self.gain {
            request = request.with_volume_gain(gain);
        }
        Ok(vec![request])
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("beatreel=info");

    let cli = Cli::parse();
    match cli.cmd {
        Command::Plan(args) => cmd_plan(args).await,
        Command::Run(args) => cmd_run(args).await,
    }
}

async fn cmd_plan(args: RequestArgs) -> anyhow::Result<()> {
    let planner = beatreel_worker::WorkflowPlanner::new();
    let plans: Vec<_> = args
        .into_requests()
        .await?
        .iter()
        .map(|request| planner.plan(request))
        .collect();
    println!("{}", serde_json::to_string_pretty(&plans)?);
    Ok(())
}

async fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = WorkerConfig::from_env();
    if let Some(base) = &args.base_dir {
        config = config.with_base_dir(base);
    }
    if args.catalog.is_some() {
        config.catalog_path = args.catalog.clone();
    }
    if args.font.is_some() {
        config.label_font = args.font.clone();
    }
    if args.no_fallback {
        config.fallback_enabled = false;
    }
    config
        .ensure_dirs()
        .await
        .context("creating output and scratch directories")?;
    info!(
        output = %config.output_dir.display(),
        scratch = %config.scratch_dir.display(),
        max_jobs = config.max_concurrent_jobs,
        "Starting beatreel"
    );

    let catalog: Arc<dyn ArtistCatalog> = match &config.catalog_path {
        Some(path) => Arc::new(JsonCatalog::load(path).await?),
        None => Arc::new(StaticCatalog::builtin()),
    };

    let mut executor = WorkflowExecutor::new(config.clone(), catalog)?;
    match TextClientConfig::from_env()? {
        Some(text_config) => {
            info!(endpoint = %text_config.endpoint, "Text service configured");
            executor = executor.with_text_client(Arc::new(HttpTextClient::new(text_config)?));
        }
        None => info!("No text service configured; AI enrichment steps will fail"),
    }
    let executor = Arc::new(executor);

    let requests = args.request.into_requests().await?;
    let cancel = CancellationToken::new();

    let sweeper = (!args.no_sweep).then(|| RetentionSweeper::from_config(&config).spawn(cancel.child_token()));

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling jobs");
            signal_cancel.cancel();
        }
    });

    let results = executor.run_many(requests, &cancel).await;
    cancel.cancel();
    if let Some(handle) = sweeper {
        handle.await.ok();
    }

    let mut reports: Vec<ExecutionReport> = Vec::with_capacity(results.len());
    let mut rejected = 0usize;
    for result in results {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => {
                rejected += 1;
                warn!(error = %e, "Request rejected");
            }
        }
    }
    println!("{}", serde_json::to_string_pretty(&reports)?);

    let failed = reports.iter().filter(|r| r.artifact.is_none()).count() + rejected;
    if failed > 0 {
        anyhow::bail!("{} of {} requests produced no artifact", failed, reports.len() + rejected);
    }
    Ok(())
}
