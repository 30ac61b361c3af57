//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use blogsmith_core::{
    BlogDeps, Capabilities, Orchestrator, ProgressReporter, RunOutcome, RunReport, blog_pipeline,
    create_blog, summarize,
};
use blogsmith_fetch::{FetchOptions, HttpFetcher};
use blogsmith_generation::OpenRouterGenerator;
use blogsmith_shared::{
    AppConfig, PipelineOptions, RunInput, expand_home, init_config, load_config,
};
use blogsmith_storage::Storage;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Blogsmith: research, write, edit and publish a blog post for a website.
#[derive(Parser)]
#[command(
    name = "blogsmith",
    version,
    about = "Research, write, edit and publish an SEO blog post for a website.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full pipeline for a website and publish the post.
    Create {
        /// Website to write for.
        url: String,

        /// Topic to write about instead of the one gap analysis picks.
        #[arg(short, long)]
        topic: Option<String>,

        /// Keyword to target (repeatable).
        #[arg(short = 'k', long = "keyword")]
        keywords: Vec<String>,

        /// Write the full JSON result to this file.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the stage cache for this run.
        #[arg(long)]
        no_cache: bool,
    },

    /// Serve `POST /create-blog` over HTTP.
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on.
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Show recent runs, or one stored run report.
    History {
        /// Number of runs to list.
        #[arg(short, long, default_value = "20")]
        limit: u32,

        /// Print the stored report of this run instead.
        #[arg(long)]
        run: Option<String>,
    },

    /// Print the stage order, dependencies and pipeline validation.
    Stages,

    /// Stage cache management.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Cache subcommands.
#[derive(Subcommand)]
pub(crate) enum CacheAction {
    /// Drop cached stage output.
    Clear {
        /// Only clear entries of this stage.
        #[arg(long)]
        stage: Option<String>,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "blogsmith=info",
        1 => "blogsmith=debug",
        _ => "blogsmith=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Create {
            url,
            topic,
            keywords,
            output,
            no_cache,
        } => {
            let input = RunInput {
                url,
                selected_topic: topic,
                target_keywords: keywords,
            };
            cmd_create(input, output.as_deref(), no_cache).await
        }
        Command::Serve { host, port } => cmd_serve(&host, port).await,
        Command::History { limit, run } => cmd_history(limit, run.as_deref()).await,
        Command::Stages => cmd_stages(),
        Command::Cache { action } => match action {
            CacheAction::Clear { stage } => cmd_cache_clear(stage.as_deref()).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

fn database_path(config: &AppConfig) -> PathBuf {
    expand_home(&config.storage.database_path)
}

/// Build the capabilities, orchestrator and run history from config.
pub(crate) async fn build_deps(config: &AppConfig, use_cache: bool) -> Result<BlogDeps> {
    let caps = Capabilities {
        generator: Arc::new(OpenRouterGenerator::from_config(config)?),
        fetcher: Arc::new(HttpFetcher::new(FetchOptions::from(&config.fetch))?),
        publisher: blogsmith_publish::from_config(config)?,
    };

    let mut options = PipelineOptions::from(config);
    options.use_cache &= use_cache;

    let storage = Arc::new(Storage::open(&database_path(config)).await?);
    let mut orchestrator = Orchestrator::new(caps, options);
    if orchestrator.options().use_cache {
        orchestrator = orchestrator.with_cache(storage.clone());
    }

    Ok(BlogDeps::new(orchestrator).with_history(storage))
}

/// Install a Ctrl-C handler that cancels `token`.
fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            token.cancel();
        }
    });
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_create(input: RunInput, output: Option<&Path>, no_cache: bool) -> Result<()> {
    let config = load_config()?;
    let deps = build_deps(&config, !no_cache).await?;

    info!(
        url = %input.url,
        topic = input.selected_topic.as_deref().unwrap_or("(auto)"),
        keywords = input.target_keywords.len(),
        "creating blog post"
    );

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(&cancel);
    let reporter = CliProgress::new();

    let outcome = create_blog(input, &deps, &reporter, &cancel).await?;

    if let Some(path) = output {
        let path = resolve_output(&config, path);
        write_result(&path, &outcome)?;
        println!("  Full result written to {}", path.display());
    }

    let report = &outcome.report;
    let elapsed = report.total_duration_ms as f64 / 1000.0;
    match &report.failure {
        None => {
            let summary = summarize(&outcome);
            let post = &summary.blog_created;
            println!();
            println!("  Blog post published!");
            println!("  Title:    {}", post.title);
            println!("  Slug:     {}", post.slug);
            println!("  Words:    {}", post.word_count);
            println!("  SEO:      {}/100", post.seo_score);
            println!("  Document: {}", post.document_id);
            println!("  URL:      {}", post.url);
            if summary.pipeline.fallback_stages > 0 {
                println!(
                    "  Degraded: {} stage(s) used fallback extraction",
                    summary.pipeline.fallback_stages
                );
            }
            println!("  Time:     {elapsed:.1}s");
            println!();
            Ok(())
        }
        Some(failure) => {
            println!();
            println!("  Pipeline failed.");
            println!(
                "  Stage:     {} ({}/{})",
                failure.failed_stage,
                failure.failed_at_index + 1,
                report.total_stages
            );
            println!("  Completed: {}", report.steps_completed.join(", "));
            println!("  Error:     {}", failure.error_message);
            println!("  Time:      {elapsed:.1}s");
            println!();
            Err(eyre!(
                "pipeline failed at stage `{}` after {elapsed:.1}s",
                failure.failed_stage
            ))
        }
    }
}

/// Bare file names land in the configured output directory.
fn resolve_output(config: &AppConfig, path: &Path) -> PathBuf {
    let bare = path
        .parent()
        .is_none_or(|parent| parent.as_os_str().is_empty());
    if bare {
        expand_home(&config.defaults.output_dir).join(path)
    } else {
        path.to_path_buf()
    }
}

fn write_result(path: &Path, outcome: &RunOutcome) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = if outcome.report.is_success() {
        json!({
            "summary": summarize(outcome),
            "report": outcome.report,
            "fullResults": outcome.context,
        })
    } else {
        json!({
            "report": outcome.report,
            "fullResults": outcome.context,
        })
    };
    std::fs::write(path, serde_json::to_string_pretty(&body)?)?;
    Ok(())
}

async fn cmd_serve(host: &str, port: u16) -> Result<()> {
    let config = load_config()?;
    let deps = build_deps(&config, true).await?;
    crate::server::serve(host, port, deps).await
}

async fn cmd_history(limit: u32, run: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let path = database_path(&config);
    if !path.exists() {
        println!("No runs recorded yet.");
        return Ok(());
    }
    let storage = Storage::open_readonly(&path).await?;

    if let Some(id) = run {
        let report = storage
            .get_run_report(id)
            .await?
            .ok_or_else(|| eyre!("no stored report for run '{id}'"))?;
        let value: serde_json::Value = serde_json::from_str(&report)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let runs = storage.list_runs(limit).await?;
    if runs.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }

    for row in runs {
        let duration = row
            .total_duration_ms
            .map(|ms| format!("{:.1}s", ms as f64 / 1000.0))
            .unwrap_or_else(|| "-".into());
        println!(
            "{}  {:<9}  {:>2} steps  {:>7}  {}  {}",
            row.id,
            row.status.as_str(),
            row.steps_completed,
            duration,
            row.url,
            row.topic.as_deref().unwrap_or("")
        );
        if let Some(stage) = row.failed_stage {
            println!(
                "    failed at {stage}: {}",
                row.error_message.as_deref().unwrap_or("")
            );
        }
    }
    Ok(())
}

fn cmd_stages() -> Result<()> {
    let pipeline = blog_pipeline();

    for (i, stage) in pipeline.stages().iter().enumerate() {
        let mut flags = vec![stage.role.as_str()];
        if !stage.required {
            flags.push("optional");
        }
        if !stage.cacheable {
            flags.push("uncached");
        }
        if !stage.retryable {
            flags.push("no retry");
        }
        println!("{:>2}. {:<28} [{}]", i + 1, stage.name, flags.join(", "));
        if !stage.requires.is_empty() {
            println!("      requires: {}", stage.requires.join(", "));
        }
        for decision in pipeline.decisions_after(stage.name) {
            println!("      then decides: {}", decision.key);
        }
    }

    let report = pipeline.validate();
    println!();
    if report.is_ok() {
        println!("Pipeline is valid.");
        Ok(())
    } else {
        for issue in &report.issues {
            println!("  - {issue}");
        }
        Err(eyre!("pipeline has {} problem(s)", report.issues.len()))
    }
}

async fn cmd_cache_clear(stage: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let path = database_path(&config);
    if !path.exists() {
        println!("Stage cache is empty.");
        return Ok(());
    }
    let storage = Storage::open(&path).await?;
    let removed = storage.clear_stage_cache(stage).await?;
    println!("Removed {removed} cached stage result(s).");
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, name: &str, index: usize, total: usize) {
        self.spinner
            .set_message(format!("[{}/{total}] {name}", index + 1));
    }

    fn stage_completed(&self, name: &str, duration_ms: u64, fallback: bool) {
        let note = if fallback { " (fallback extraction)" } else { "" };
        self.spinner.println(format!(
            "  ✓ {name} in {:.1}s{note}",
            duration_ms as f64 / 1000.0
        ));
    }

    fn stage_failed(&self, name: &str, error: &str) {
        self.spinner.println(format!("  ✗ {name}: {error}"));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_accepts_repeated_keywords() {
        let cli = Cli::try_parse_from([
            "blogsmith",
            "create",
            "https://leafandkettle.com",
            "--topic",
            "Cold Brew at Home",
            "-k",
            "cold brew",
            "--keyword",
            "iced tea",
            "--no-cache",
        ])
        .unwrap();

        let Command::Create {
            url,
            topic,
            keywords,
            output,
            no_cache,
        } = cli.command
        else {
            panic!("expected create");
        };
        assert_eq!(url, "https://leafandkettle.com");
        assert_eq!(topic.as_deref(), Some("Cold Brew at Home"));
        assert_eq!(keywords, vec!["cold brew", "iced tea"]);
        assert!(output.is_none());
        assert!(no_cache);
    }

    #[test]
    fn serve_defaults() {
        let cli = Cli::try_parse_from(["blogsmith", "serve"]).unwrap();
        let Command::Serve { host, port } = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(host, "127.0.0.1");
        assert_eq!(port, 3000);
    }

    #[test]
    fn bare_output_names_use_the_output_dir() {
        let mut config = AppConfig::default();
        config.defaults.output_dir = "/tmp/blogsmith-runs".into();

        assert_eq!(
            resolve_output(&config, Path::new("run.json")),
            PathBuf::from("/tmp/blogsmith-runs/run.json")
        );
        assert_eq!(
            resolve_output(&config, Path::new("out/run.json")),
            PathBuf::from("out/run.json")
        );
    }

    #[test]
    fn shipped_stages_print_as_valid() {
        assert!(cmd_stages().is_ok());
    }
}
