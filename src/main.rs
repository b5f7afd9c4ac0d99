use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use postsmith::{
    composer::ComposeContext,
    critique::{render_report, CritiqueAgent, ScoreTolerance},
    AppConfig, Draft, OpenAiClient, PostComposer, Researcher, StyleAnalyzer, StyleGuide,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "postsmith", about = "Analyze a post corpus and compose new posts in its style")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import posts from a platform data export into the corpus directory
    Ingest {
        /// Path to the extracted export directory
        archive: PathBuf,
    },
    /// Analyze the corpus and produce a writing style guide
    Analyze,
    /// Compose a draft post from input/instructions.txt
    Compose {
        /// Feedback to apply to the previous draft instead of starting fresh
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Score the current draft against the instructions and style guide
    Critique {
        /// Keep recommendations even when the scores come back unusable
        #[arg(long)]
        lenient: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("failed to load configuration")?;

    match cli.command {
        Command::Ingest { archive } => run_ingest(&config, &archive),
        Command::Analyze => run_analyze(&config).await,
        Command::Compose { feedback } => run_compose(&config, feedback.as_deref()).await,
        Command::Critique { lenient } => run_critique(&config, lenient).await,
    }
}

fn run_ingest(config: &AppConfig, archive: &Path) -> anyhow::Result<()> {
    let report = postsmith::ingest_export(archive, &config.posts_dir)?;
    info!(
        "Ingest complete: {} posts imported, {} records skipped",
        report.imported, report.skipped
    );
    println!(
        "Imported {} posts into {} ({} skipped)",
        report.imported,
        config.posts_dir.display(),
        report.skipped
    );
    Ok(())
}

async fn run_analyze(config: &AppConfig) -> anyhow::Result<()> {
    let posts = postsmith::load_posts(&config.posts_dir)?;
    let llm = OpenAiClient::new(config)?;

    let analyzer = StyleAnalyzer::new(config, &llm);
    let run = analyzer.analyze_corpus(&posts).await?;
    if !run.failed_batches.is_empty() {
        warn!(
            "{} of {} batches failed and are missing from the guide: {:?}",
            run.failed_batches.len(),
            run.total_batches,
            run.failed_batches
        );
    }

    let guide = postsmith::synthesize_style_guide(config, &llm, &run.findings).await?;

    fs::create_dir_all(&config.input_dir)?;
    fs::write(config.input_dir.join("style_guide.txt"), &guide.text)?;
    fs::write(
        config.input_dir.join("style_analysis.json"),
        serde_json::to_string_pretty(&run)?,
    )?;

    println!(
        "Style guide written to {} ({} of {} batches analyzed)",
        config.input_dir.join("style_guide.txt").display(),
        run.findings.len(),
        run.total_batches
    );
    Ok(())
}

async fn run_compose(config: &AppConfig, feedback: Option<&str>) -> anyhow::Result<()> {
    let instruction = read_required(
        &config.input_dir.join("instructions.txt"),
        "write input/instructions.txt describing the post you want",
    )?;
    let guide = StyleGuide {
        text: read_required(
            &config.input_dir.join("style_guide.txt"),
            "run `postsmith analyze` first to produce a style guide",
        )?,
    };

    let llm = OpenAiClient::new(config)?;
    let composer = PostComposer::new(config, &llm);

    let draft = match feedback {
        Some(feedback) => {
            let prior = load_draft(&config.output_dir)
                .context("no previous draft to refine; run `postsmith compose` without --feedback first")?;
            composer.refine(&prior, feedback, &instruction, &guide).await?
        }
        None => {
            let researcher = Researcher::new(config, &llm)?;
            let research = match researcher.gather_context(&instruction).await {
                Ok(context) => context,
                Err(e) => {
                    warn!("Research failed, composing without it: {}", e);
                    None
                }
            };

            let examples = match postsmith::load_posts(&config.posts_dir) {
                Ok(posts) => postsmith::select_examples(&posts, &mut rand::thread_rng()),
                Err(e) => {
                    warn!("No example posts available: {}", e);
                    Vec::new()
                }
            };

            composer
                .compose(&instruction, &guide, &ComposeContext { research, examples })
                .await?
        }
    };

    fs::create_dir_all(&config.output_dir)?;
    fs::write(config.output_dir.join("draft.txt"), &draft.text)?;
    fs::write(
        config.output_dir.join("draft.json"),
        serde_json::to_string_pretty(&draft)?,
    )?;

    println!(
        "Draft round {} written to {}",
        draft.round_number,
        config.output_dir.join("draft.txt").display()
    );
    Ok(())
}

async fn run_critique(config: &AppConfig, lenient: bool) -> anyhow::Result<()> {
    let draft = load_draft(&config.output_dir)
        .context("no draft to critique; run `postsmith compose` first")?;
    let instruction = read_required(
        &config.input_dir.join("instructions.txt"),
        "write input/instructions.txt describing the post you want",
    )?;
    let guide = StyleGuide {
        text: read_required(
            &config.input_dir.join("style_guide.txt"),
            "run `postsmith analyze` first to produce a style guide",
        )?,
    };

    let llm = OpenAiClient::new(config)?;
    let tolerance = if lenient {
        ScoreTolerance::Lenient
    } else {
        ScoreTolerance::Strict
    };
    let agent = CritiqueAgent::new(config, &llm, tolerance);
    let report = agent.critique(&draft, &instruction, &guide).await?;

    fs::create_dir_all(&config.output_dir)?;
    fs::write(config.output_dir.join("critique.txt"), render_report(&report))?;
    fs::write(
        config.output_dir.join("critique.json"),
        serde_json::to_string_pretty(&report)?,
    )?;

    print!("{}", render_report(&report));
    println!(
        "Critique written to {}",
        config.output_dir.join("critique.txt").display()
    );
    Ok(())
}

fn read_required(path: &Path, hint: &str) -> anyhow::Result<String> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("{} is missing; {}", path.display(), hint))?;
    if text.trim().is_empty() {
        bail!("{} is empty; {}", path.display(), hint);
    }
    Ok(text.trim().to_string())
}

fn load_draft(output_dir: &Path) -> anyhow::Result<Draft> {
    let path = output_dir.join("draft.json");
    let raw = fs::read_to_string(&path)?;
    let draft = serde_json::from_str(&raw)?;
    Ok(draft)
}
