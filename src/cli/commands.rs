//! CLI command definitions for reelforge.
//!
//! Operator commands for inspecting and salvaging jobs, trying the music
//! selector against a catalog file, and dumping metrics.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use crate::jobs::{
    InMemoryJobRepository, JobPatch, JobRepository, JobStore, PostgresJobRepository,
    RedisJobRepository,
};
use crate::metrics::{export_metrics, init_metrics};
use crate::pipeline::PipelineConfig;
use crate::retry::Retrier;
use crate::selection::{InMemoryCatalog, MusicSelector, SelectionRequest};

/// Default number of jobs printed by `list`.
const DEFAULT_LIST_LIMIT: usize = 20;

/// Operator tool for the reelforge video job pipeline.
#[derive(Parser)]
#[command(name = "reelforge")]
#[command(about = "Inspect, salvage and troubleshoot reelforge video jobs")]
#[command(version)]
#[command(
    long_about = "reelforge drives short-form video jobs through a resumable multi-stage pipeline.\n\nThis tool inspects jobs in the configured store, applies manual salvage patches so a failed job can be re-run, and exercises the music selector against a local catalog.\n\nExample usage:\n  reelforge --store redis://localhost:6379 salvage 3f2a --video-url https://cdn.example.com/recovered.mp4 --clear-error"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Job store URL: `memory`, `redis://...` or `postgres://...`.
    #[arg(long, env = "REELFORGE_STORE_URL", global = true)]
    pub store: Option<String>,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Print a job as JSON.
    Show {
        /// Job identifier.
        id: String,
    },

    /// List the most recently updated jobs.
    #[command(alias = "ls")]
    List {
        /// Maximum number of jobs to print.
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,
    },

    /// Patch recovered outputs into a job so a re-run skips those stages.
    Salvage(SalvageArgs),

    /// Delete a job.
    Delete {
        /// Job identifier.
        id: String,
    },

    /// Run the music selector against a JSON or YAML catalog file.
    SelectMusic(SelectMusicArgs),

    /// Print the Prometheus metrics exposition.
    Metrics,
}

/// Arguments for `reelforge salvage`.
#[derive(Parser, Debug)]
pub struct SalvageArgs {
    /// Job identifier.
    pub id: String,

    /// Recovered generated video URL; satisfies the visuals stage.
    #[arg(long)]
    pub video_url: Option<String>,

    /// Recovered voiceover URL.
    #[arg(long, requires = "voiceover_duration")]
    pub voiceover_url: Option<String>,

    /// Duration of the recovered voiceover in seconds.
    #[arg(long)]
    pub voiceover_duration: Option<f64>,

    /// Recovered subtitles URL.
    #[arg(long)]
    pub subtitles_url: Option<String>,

    /// Recovered final video URL; satisfies the render stage.
    #[arg(long)]
    pub final_video_url: Option<String>,

    /// Drop the stored error message.
    #[arg(long)]
    pub clear_error: bool,
}

impl SalvageArgs {
    fn into_patch(self) -> JobPatch {
        let mut patch = JobPatch::new();
        if let Some(url) = self.video_url {
            patch = patch.video_url(url);
        }
        if let (Some(url), Some(duration_seconds)) = (self.voiceover_url, self.voiceover_duration) {
            patch = patch.voiceover(crate::jobs::Voiceover {
                url,
                duration_seconds,
            });
        }
        if let Some(url) = self.subtitles_url {
            patch = patch.subtitles(crate::jobs::Subtitles { url, text: None });
        }
        if let Some(url) = self.final_video_url {
            patch = patch.final_video_url(url);
        }
        if self.clear_error {
            patch = patch.clear_error();
        }
        patch
    }
}

/// Arguments for `reelforge select-music`.
#[derive(Parser, Debug)]
pub struct SelectMusicArgs {
    /// Catalog file (.json, .yaml or .yml).
    #[arg(short, long)]
    pub catalog: String,

    /// Comma-separated mood/genre tags.
    #[arg(short, long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Target duration in seconds.
    #[arg(short, long, default_value_t = 60.0)]
    pub duration: f64,

    /// Free-text description of the wanted track.
    #[arg(long)]
    pub description: Option<String>,

    /// Seed for a reproducible pick.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with already-parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let mut config = PipelineConfig::from_env().context("Invalid REELFORGE_* configuration")?;
    if let Some(store) = cli.store {
        config = config.with_store_url(store);
    }

    match cli.command {
        Commands::Show { id } => {
            let store = open_store(&config).await?;
            let job = store.get_job(&id).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Commands::List { limit } => {
            let store = open_store(&config).await?;
            let jobs = store.list_jobs(limit).await?;
            if jobs.is_empty() {
                println!("No jobs found.");
            }
            for job in jobs {
                println!(
                    "{:<38} {:<24} {} {}",
                    job.id,
                    job.status,
                    job.updated_at.to_rfc3339(),
                    job.error.as_deref().unwrap_or_default()
                );
            }
        }
        Commands::Salvage(args) => run_salvage_command(&config, args).await?,
        Commands::Delete { id } => {
            let store = open_store(&config).await?;
            if store.delete_job(&id).await? {
                println!("Deleted {}", id);
            } else {
                println!("No job {}", id);
            }
        }
        Commands::SelectMusic(args) => run_select_music_command(&config, args).await?,
        Commands::Metrics => {
            init_metrics().context("Failed to register metrics")?;
            print!("{}", export_metrics());
        }
    }
    Ok(())
}

async fn run_salvage_command(config: &PipelineConfig, args: SalvageArgs) -> anyhow::Result<()> {
    let id = args.id.clone();
    let patch = args.into_patch();
    if patch.is_empty() {
        anyhow::bail!("Nothing to salvage: pass at least one of the --*-url flags or --clear-error");
    }

    let store = open_store(config).await?;
    let job = store.update_job(&id, patch).await?;
    info!(job_id = %job.id, status = %job.status, "Salvage patch applied");

    match job.next_pending_stage() {
        Some(stage) => println!("Patched {}; a re-run resumes at {}", job.id, stage),
        None => println!("Patched {}; every stage output is present", job.id),
    }
    Ok(())
}

async fn run_select_music_command(
    config: &PipelineConfig,
    args: SelectMusicArgs,
) -> anyhow::Result<()> {
    let catalog = InMemoryCatalog::from_file(&args.catalog)
        .with_context(|| format!("Failed to load catalog {}", args.catalog))?;
    if catalog.is_empty() {
        warn!(catalog = %args.catalog, "Catalog has no tracks");
    }

    let mut selector = MusicSelector::new(Retrier::new(config.retry.clone()))
        .with_internal_catalog(Arc::new(catalog));
    if let Some(seed) = args.seed.or(config.music_seed) {
        selector = selector.with_seed(seed);
    }

    let mut request = SelectionRequest::new(args.duration).with_tags(args.tags);
    if let Some(description) = args.description {
        request = request.with_description(description);
    }

    match selector.select(&request).await {
        Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        None => println!("No track selected; the video would have no music."),
    }
    Ok(())
}

/// Opens the job store named by `config.store_url`.
pub async fn open_store(config: &PipelineConfig) -> anyhow::Result<JobStore> {
    let url = config.store_url.trim();
    let repository: Arc<dyn JobRepository> = if url.is_empty() || url == "memory" {
        warn!("Using the in-memory job store; jobs are not shared between invocations");
        Arc::new(InMemoryJobRepository::new())
    } else if url.starts_with("redis://") || url.starts_with("rediss://") {
        let mut repo = RedisJobRepository::connect(url, &config.redis_prefix)
            .await
            .context("Failed to connect to Redis")?;
        if let Some(ttl) = config.job_ttl {
            repo = repo.with_ttl(ttl);
        }
        Arc::new(repo)
    } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        Arc::new(
            PostgresJobRepository::connect(url)
                .await
                .context("Failed to connect to Postgres")?,
        )
    } else {
        anyhow::bail!("Unsupported store URL '{}': expected memory, redis:// or postgres://", url);
    };

    Ok(JobStore::new(repository, config.duration_limits))
}
