use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use tribunal_core::{
    ChangeSetInfo, OutputFormat, RunStatus, Severity, StageConfig, StageStatus, TribunalConfig,
};
use tribunal_difflens::parser::{
    parse_files, split_unified_diff, FileRecord, ParseOptions, SkippedFile,
};
use tribunal_difflens::summary::{render, summarize, DiffSummary};
use tribunal_review::aggregate::{aggregate, AggregatedReview};
use tribunal_review::llm::LlmProvider;
use tribunal_review::pipeline::{cancel_pair, AnalysisPipeline};
use tribunal_review::prompt::{build_change_set_context, default_stages};
use tribunal_review::report::ReportFormatter;

#[derive(Parser)]
#[command(
    name = "tribunal",
    version,
    about = "Multi-lens AI review of a change set",
    long_about = "Tribunal runs an ordered series of analysis stages over a change set.\n\n\
                   Each stage sees the change-set digest plus the findings of every stage\n\
                   before it. The results are combined into one severity-ranked report.\n\n\
                   Examples:\n  \
                     git diff main | tribunal review        Review a diff from stdin\n  \
                     tribunal review --file pr.json         Review a JSON change set\n  \
                     tribunal review --stage security       Run a single lens\n  \
                     tribunal digest --diff changes.patch   Show what the stages will see\n  \
                     tribunal init                          Create a .tribunal.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .tribunal.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Short human-readable summary (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  The full Markdown report"
    )]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(clap::Args)]
struct InputArgs {
    /// Read a JSON change set ({"info": {...}, "files": [...]})
    #[arg(long, conflicts_with = "diff")]
    file: Option<PathBuf>,

    /// Read a unified diff from a file instead of stdin
    #[arg(long)]
    diff: Option<PathBuf>,

    /// Title for a change set read from a diff
    #[arg(long)]
    title: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the analysis stages and print the review
    #[command(long_about = "Run the analysis stages and print the review.\n\n\
        Reads a unified diff from stdin or --diff, or a JSON change set from --file.\n\
        Stages come from [[stages]] in .tribunal.toml, or the built-in logic,\n\
        readability, performance and security lenses. Ctrl-C stops the run and\n\
        prints the partial review.\n\n\
        Examples:\n  git diff | tribunal review\n  tribunal review --file pr.json --format markdown\n  tribunal review --diff changes.patch --fail-on high")]
    Review {
        #[command(flatten)]
        input: InputArgs,

        /// Exit with non-zero code if the overall severity meets this threshold
        #[arg(
            long,
            long_help = "Exit with code 1 if the overall severity is at or above this level.\n\n\
                Severity ranking: critical > high > medium > low > info.\n\
                Useful in CI pipelines to block merges on serious findings."
        )]
        fail_on: Option<Severity>,

        /// Per-stage timeout in seconds (overrides the config file)
        #[arg(long)]
        stage_timeout: Option<u64>,

        /// Maximum files included in the digest (overrides the config file)
        #[arg(long)]
        max_files: Option<usize>,

        /// Run only the named stages, in configured order (repeatable)
        #[arg(long = "stage")]
        stages: Vec<String>,
    },
    /// Print the change-set digest without calling any provider
    #[command(long_about = "Print the change-set digest without calling any provider.\n\n\
        Shows exactly the context every analysis stage receives.\n\n\
        Examples:\n  git diff | tribunal digest\n  tribunal digest --file pr.json --format json")]
    Digest {
        #[command(flatten)]
        input: InputArgs,

        /// Maximum files included in the digest (overrides the config file)
        #[arg(long)]
        max_files: Option<usize>,
    },
    /// Create a default .tribunal.toml configuration file
    #[command(long_about = "Create a default .tribunal.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .tribunal.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

/// JSON change-set input, as exported from a host API.
#[derive(Deserialize)]
struct ChangeSetInput {
    #[serde(default)]
    info: ChangeSetInfo,
    files: Vec<FileRecord>,
}

struct LoadedChangeSet {
    info: ChangeSetInfo,
    summary: DiffSummary,
    skipped: Vec<SkippedFile>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewOutput<'a> {
    review: &'a AggregatedReview,
    skipped_files: &'a [SkippedFile],
    elapsed_seconds: u64,
    model: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DigestOutput<'a> {
    info: &'a ChangeSetInfo,
    summary: &'a DiffSummary,
    skipped_files: &'a [SkippedFile],
    digest: String,
}

const DEFAULT_CONFIG: &str = r#"# Tribunal Configuration

[llm]
# OpenAI-compatible provider: "gemini", "openai", "anthropic", "ollama", or any host via base_url
# provider = "gemini"
# model = "gemini-2.5-flash"
# base_url = "https://generativelanguage.googleapis.com/v1beta/openai"
# temperature = 0.1
# When api_key is unset it is read from GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY.

[pipeline]
# stage_timeout_secs = 120

[digest]
# max_files = 10
# max_patch_lines = 100

# Analysis stages, run in order. Leave them all commented out to use the
# built-in logic, readability, performance and security lenses.
# [[stages]]
# name = "docs"
# title = "Documentation"
# prompt = "Review documentation changes for accuracy and completeness."
"#;

fn init_tracing(verbose: bool, use_color: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(use_color)
                .with_target(false),
        )
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<TribunalConfig> {
    let config = match path {
        Some(path) => TribunalConfig::from_file(path)?,
        None => {
            let default_path = Path::new(".tribunal.toml");
            if default_path.exists() {
                TribunalConfig::from_file(default_path)?
            } else {
                TribunalConfig::default()
            }
        }
    };
    Ok(config)
}

fn read_text(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err(format!("reading {}", path.display())),
        None => {
            if std::io::stdin().is_terminal() {
                miette::bail!(miette::miette!(
                    help = "Pipe a diff to tribunal, e.g.: git diff main | tribunal review\n       Or use --diff <path> or --file <change-set.json>",
                    "No change set given"
                ));
            }
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .into_diagnostic()
                .wrap_err("reading stdin")?;
            Ok(input)
        }
    }
}

fn saturating_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn load_change_set(input: &InputArgs) -> Result<LoadedChangeSet> {
    let (mut info, records) = match &input.file {
        Some(path) => {
            let text = read_text(Some(path.as_path()))?;
            let parsed: ChangeSetInput = serde_json::from_str(&text)
                .into_diagnostic()
                .wrap_err(format!("parsing change set {}", path.display()))?;
            (parsed.info, parsed.files)
        }
        None => {
            let text = read_text(input.diff.as_deref())?;
            (ChangeSetInfo::default(), split_unified_diff(&text))
        }
    };

    if let Some(title) = &input.title {
        info.title = Some(title.clone());
    }

    let parsed = parse_files(&records, ParseOptions::default());
    if parsed.files.is_empty() && parsed.skipped.is_empty() {
        miette::bail!(miette::miette!(
            help = "Check that the input is a unified diff (git diff) or a JSON change set with a non-empty \"files\" list",
            "Empty change set"
        ));
    }

    let summary = summarize(parsed.files);

    // Host descriptors carry their own totals; diffs do not.
    if info.changed_files == 0 {
        info.changed_files = saturating_u32(summary.total_files() as u64);
    }
    if info.additions == 0 && info.deletions == 0 {
        info.additions = saturating_u32(summary.total_additions());
        info.deletions = saturating_u32(summary.total_deletions());
    }

    Ok(LoadedChangeSet {
        info,
        summary,
        skipped: parsed.skipped,
    })
}

fn select_stages(config: &TribunalConfig, only: &[String]) -> Result<Vec<StageConfig>> {
    let stages = if config.stages.is_empty() {
        default_stages()
    } else {
        config.stages.clone()
    };

    if only.is_empty() {
        return Ok(stages);
    }

    for name in only {
        if !stages.iter().any(|s| &s.name == name) {
            let known: Vec<&str> = stages.iter().map(|s| s.name.as_str()).collect();
            miette::bail!(miette::miette!(
                help = format!("Configured stages: {}", known.join(", ")),
                "Unknown stage '{name}'"
            ));
        }
    }
    Ok(stages.into_iter().filter(|s| only.contains(&s.name)).collect())
}

fn severity_badge(severity: Severity, use_color: bool) -> String {
    if !use_color {
        return severity.label().to_string();
    }
    let code = match severity {
        Severity::Critical => "31",
        Severity::High => "33",
        Severity::Medium => "93",
        Severity::Low => "32",
        Severity::Info => "34",
    };
    format!("\x1b[1;{code}m{}\x1b[0m", severity.label())
}

fn print_text_review(
    review: &AggregatedReview,
    skipped: &[SkippedFile],
    elapsed: Duration,
    use_color: bool,
) {
    println!(
        "Severity: {} {}",
        review.severity.emoji(),
        severity_badge(review.severity, use_color)
    );
    println!();
    println!("Stages:");
    for output in &review.stage_outputs {
        match output.status {
            StageStatus::Done => println!("  \u{2705} {}", output.stage_name),
            StageStatus::Failed => println!(
                "  \u{274c} {}: {}",
                output.stage_name,
                output.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
    for name in &review.skipped_stages {
        println!("  \u{23f9}\u{fe0f} {name}: not run");
    }
    if !skipped.is_empty() {
        println!();
        println!("Skipped files:");
        for file in skipped {
            println!("  {file}");
        }
    }
    println!();
    println!("Recommendations:");
    for (i, recommendation) in review.recommendations.iter().enumerate() {
        println!("  {}. {recommendation}", i + 1);
    }
    println!();
    println!(
        "Run {} in {}s. Use --format markdown for the full report.",
        review.run_status,
        elapsed.as_secs()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };
    init_tracing(cli.verbose, use_color);

    let mut config = load_config(cli.config.as_deref())?;
    tracing::debug!(format = %cli.format, stages = config.stages.len(), "configuration loaded");

    match cli.command {
        None => {
            Cli::command().print_help().into_diagnostic()?;
        }
        Some(Command::Review {
            ref input,
            fail_on,
            stage_timeout,
            max_files,
            ref stages,
        }) => {
            if let Some(secs) = stage_timeout {
                config.pipeline.stage_timeout_secs = secs;
            }
            if let Some(max) = max_files {
                config.digest.max_files = max;
            }
            config.validate()?;

            let stages = select_stages(&config, stages)?;
            let change_set = load_change_set(input)?;
            let digest = render(&change_set.summary, config.digest);
            let context = build_change_set_context(&change_set.info, &digest);

            if config.llm.api_key.is_none() {
                config.llm.api_key = std::env::var(config.llm.api_key_env_var()).ok();
            }
            if config.llm.api_key.is_none() && config.llm.provider != "ollama" {
                let var = config.llm.api_key_env_var();
                miette::bail!(miette::miette!(
                    help = format!("Set {var} or add api_key in your .tribunal.toml under [llm]"),
                    "No API key configured for LLM provider '{}'",
                    config.llm.provider
                ));
            }

            let provider = LlmProvider::new(&config.llm)?;
            let model = provider.model().to_string();
            let pipeline = AnalysisPipeline::new(Arc::new(provider), &config.pipeline);

            let (canceller, signal) = cancel_pair();
            let ctrl_c = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, cancelling review");
                    canceller.cancel();
                }
            });

            let spinner = if std::io::stderr().is_terminal() {
                let pb = indicatif::ProgressBar::new_spinner();
                pb.set_style(
                    indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
                        .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner()),
                );
                pb.set_message(format!("Running {} analysis stages...", stages.len()));
                pb.enable_steady_tick(Duration::from_millis(120));
                Some(pb)
            } else {
                None
            };

            let started = Instant::now();
            let run = pipeline.run(&context, &stages, signal).await;
            let elapsed = started.elapsed();
            ctrl_c.abort();

            if let Some(pb) = spinner {
                match run.status {
                    RunStatus::Cancelled => pb.finish_with_message("Cancelled"),
                    RunStatus::Failed => pb.finish_with_message("All stages failed"),
                    _ => pb.finish_with_message("Done"),
                }
            }

            let review = aggregate(&run)?;

            match cli.format {
                OutputFormat::Json => {
                    let output = ReviewOutput {
                        review: &review,
                        skipped_files: &change_set.skipped,
                        elapsed_seconds: elapsed.as_secs(),
                        model: &model,
                    };
                    println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
                }
                OutputFormat::Markdown => {
                    print!("{}", ReportFormatter::with_titles(&stages).format(&review, elapsed));
                }
                OutputFormat::Text => {
                    print_text_review(&review, &change_set.skipped, elapsed, use_color);
                }
            }

            if review.run_status == RunStatus::Cancelled {
                std::process::exit(130);
            }
            if let Some(threshold) = fail_on {
                if review.severity.meets_threshold(threshold) {
                    std::process::exit(1);
                }
            }
        }
        Some(Command::Digest {
            ref input,
            max_files,
        }) => {
            if let Some(max) = max_files {
                config.digest.max_files = max;
            }
            config.validate()?;

            let change_set = load_change_set(input)?;
            let digest = render(&change_set.summary, config.digest);

            match cli.format {
                OutputFormat::Json => {
                    let output = DigestOutput {
                        info: &change_set.info,
                        summary: &change_set.summary,
                        skipped_files: &change_set.skipped,
                        digest,
                    };
                    println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
                }
                OutputFormat::Markdown | OutputFormat::Text => {
                    print!("{}", build_change_set_context(&change_set.info, &digest));
                    for file in &change_set.skipped {
                        eprintln!("skipped: {file}");
                    }
                }
            }
        }
        Some(Command::Init) => {
            let path = Path::new(".tribunal.toml");
            if path.exists() {
                miette::bail!(".tribunal.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .tribunal.toml with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "tribunal", &mut std::io::stdout());
        }
    }

    Ok(())
}
