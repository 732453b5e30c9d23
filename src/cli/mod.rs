//! Command-line interface for storyreel.
//!
//! Provides commands for creating the ledger, selecting content,
//! assembling the video and inspecting completion state.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{
    FfmpegRenderer, FfprobeProbe, GoogleTranslator, RedditClient, RedditCredentials,
};
use crate::config::{self, ResolvedConfig};
use crate::core::{
    AssemblyPipeline, AssetLayout, BackgroundConfig, ContentSelector, FilenameBuilder,
    SegmentFilter, SelectRequest,
};
use crate::domain::{Job, Mode, UnitRef};
use crate::ledger::{Ledger, RecordOutcome};

/// storyreel - Narrated short videos from discussion threads
#[derive(Parser, Debug)]
#[command(name = "storyreel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create empty ledger documents (never overwrites)
    Init,

    /// Pick the next unit(s) and write the job manifest
    Select {
        /// Subreddit (overrides reddit.thread.subreddit)
        #[arg(short, long)]
        subreddit: Option<String>,

        /// Story mode: one video from a batch of posts
        #[arg(long)]
        story: bool,

        /// Explicit post id(s) or URL(s), "+"-separated; skips the done check
        #[arg(short, long)]
        post_id: Option<String>,
    },

    /// Assemble the video for the current manifest and record it
    Assemble {
        /// Manifest path (defaults to <assets>/temp/manifest.json)
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },

    /// Summarize the ledger
    Status,

    /// Check whether a unit id is already done
    Done {
        /// Unit id
        unit_id: String,
    },

    /// Remove intermediate assets
    Cleanup,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Init => init_ledger(),
            Commands::Select {
                subreddit,
                story,
                post_id,
            } => select(subreddit, story, post_id).await,
            Commands::Assemble { manifest } => assemble(manifest).await,
            Commands::Status => show_status(),
            Commands::Done { unit_id } => show_done(&unit_id),
            Commands::Cleanup => cleanup(),
            Commands::Config => show_config(),
        }
    }
}

fn open_ledger(cfg: &ResolvedConfig) -> Ledger {
    Ledger::in_dir(&cfg.home)
}

/// Create the ledger documents
fn init_ledger() -> Result<()> {
    let cfg = config::config()?;
    std::fs::create_dir_all(&cfg.home)
        .with_context(|| format!("Failed to create {}", cfg.home.display()))?;

    let created = open_ledger(cfg).init()?;
    if created == 0 {
        println!("Ledger already present in {}", cfg.home.display());
    } else {
        println!("Created {} ledger document(s) in {}", created, cfg.home.display());
    }
    Ok(())
}

/// Run the selector and write the manifest
async fn select(
    subreddit: Option<String>,
    story: bool,
    post_id: Option<String>,
) -> Result<()> {
    let cfg = config::config()?;

    let group = match subreddit.or_else(|| cfg.subreddit.clone()) {
        Some(s) => subreddit_from_input(&s),
        None => prompt_subreddit()?,
    };
    let mode = if story { Mode::Story } else { cfg.mode };
    let explicit = match post_id {
        Some(ids) => UnitRef::parse_list(&ids),
        None => cfg.explicit_refs(),
    };

    let creds = credentials(cfg)?;
    let source = RedditClient::connect(&creds)
        .await
        .context("Failed to connect to Reddit")?;

    let selector = ContentSelector::new(Arc::new(source), open_ledger(cfg))
        .with_filter(SegmentFilter::new(cfg.max_comment_length))
        .with_min_comments(cfg.min_comments);

    let request = SelectRequest::new(&group, mode)
        .with_rank(cfg.rank)
        .with_explicit(explicit);
    let job = selector.prepare_job(&request).await?;

    if job.units.is_empty() {
        println!("Nothing new in r/{}", group);
        return Ok(());
    }

    let manifest = AssetLayout::new(&cfg.assets).manifest();
    job.save(&manifest).await?;

    println!("Job:      {}", job.id);
    println!("Mode:     {}", job.mode);
    println!("Label:    {}", job.label);
    if job.pinned {
        println!("Pinned:   yes (explicit selection)");
    }
    for unit in &job.units {
        println!("  {}  {}", unit.id, unit.title);
    }
    println!("Segments: {}", job.segments.len());
    println!("Manifest: {}", manifest.display());
    Ok(())
}

const DEFAULT_SUBREDDIT: &str = "AskReddit";

/// Ask on stdin when neither the flag nor the config names a subreddit
fn prompt_subreddit() -> Result<String> {
    print!("What subreddit would you like to pull from? ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin()
        .lock()
        .read_line(&mut input)
        .context("Failed to read subreddit")?;
    Ok(subreddit_from_input(&input))
}

/// "r/tifu" → "tifu"; blank input falls back to AskReddit
fn subreddit_from_input(input: &str) -> String {
    let name = crate::adapters::reddit::strip_prefix_ci(input, "r/").trim();
    if name.is_empty() {
        DEFAULT_SUBREDDIT.to_string()
    } else {
        name.to_string()
    }
}

/// Build credentials from config, prompting for a 2FA code if enabled
fn credentials(cfg: &ResolvedConfig) -> Result<RedditCredentials> {
    let reddit = &cfg.reddit;
    let missing = |field: &str, var: &str| {
        format!("Missing reddit.creds.{} (or {} env var)", field, var)
    };

    let client_id = reddit
        .client_id
        .clone()
        .with_context(|| missing("client_id", "REDDIT_CLIENT_ID"))?;
    let client_secret = reddit
        .client_secret
        .clone()
        .with_context(|| missing("client_secret", "REDDIT_CLIENT_SECRET"))?;
    let username = reddit
        .username
        .clone()
        .with_context(|| missing("username", "REDDIT_USERNAME"))?;
    let password = reddit
        .password
        .clone()
        .with_context(|| missing("password", "REDDIT_PASSWORD"))?;

    let passkey = if reddit.two_factor {
        print!("Enter your two-factor authentication code: ");
        io::stdout().flush()?;
        let mut code = String::new();
        io::stdin()
            .lock()
            .read_line(&mut code)
            .context("Failed to read 2FA code")?;
        format!("{}:{}", password, code.trim())
    } else {
        password
    };

    Ok(RedditCredentials {
        client_id,
        client_secret,
        username,
        passkey,
    })
}

/// Assemble the manifest's video
async fn assemble(manifest: Option<PathBuf>) -> Result<()> {
    let cfg = config::config()?;
    let manifest = manifest.unwrap_or_else(|| AssetLayout::new(&cfg.assets).manifest());
    let job = Job::load(&manifest).await?;

    let mut namer = FilenameBuilder::new();
    if let Some(lang) = &cfg.post_lang {
        namer = namer.with_translation(Arc::new(GoogleTranslator::new()), lang);
    }

    let pipeline = AssemblyPipeline::new(
        &cfg.assets,
        &cfg.results,
        open_ledger(cfg),
        Arc::new(FfprobeProbe::new()),
        Arc::new(FfmpegRenderer::new()),
    )
    .with_namer(namer)
    .with_opacity(cfg.opacity);

    let background = BackgroundConfig {
        path: cfg.background_path(),
        credit: cfg.background.credit.clone(),
        position: cfg.background.position,
    };

    let output = pipeline.assemble(&job, &background).await?;

    println!("Video:    {}", output.path.display());
    println!("Duration: {:.2}s", output.duration);
    match output.outcome {
        RecordOutcome::Recorded { part: Some(part) } => println!("Recorded: part {}", part),
        RecordOutcome::Recorded { part: None } => println!("Recorded: yes"),
        RecordOutcome::AlreadyRecorded => println!("Recorded: already done, ledger unchanged"),
    }
    Ok(())
}

/// Print a ledger summary
fn show_status() -> Result<()> {
    let cfg = config::config()?;
    let snapshot = open_ledger(cfg).snapshot()?;

    println!("Completed units: {}", snapshot.done_count());
    println!("Single videos:   {}", snapshot.videos().len());

    if snapshot.groups().is_empty() {
        println!("No story groups yet");
        return Ok(());
    }

    println!();
    println!("{:<30} {:>12} {:>8}", "GROUP", "LATEST PART", "ITEMS");
    println!("{}", "-".repeat(52));
    for (group, entry) in snapshot.groups() {
        println!(
            "{:<30} {:>12} {:>8}",
            group,
            entry.latest_part,
            entry.items.len()
        );
    }
    Ok(())
}

fn show_done(unit_id: &str) -> Result<()> {
    let cfg = config::config()?;
    if open_ledger(cfg).is_done(unit_id)? {
        println!("{}: done", unit_id);
    } else {
        println!("{}: not done", unit_id);
    }
    Ok(())
}

/// Remove `<assets>/temp`
fn cleanup() -> Result<()> {
    let cfg = config::config()?;
    let temp = AssetLayout::new(&cfg.assets).temp_dir().to_path_buf();

    if !temp.exists() {
        println!("Nothing to clean");
        return Ok(());
    }

    let count = count_files(&temp)?;
    std::fs::remove_dir_all(&temp)
        .with_context(|| format!("Failed to remove {}", temp.display()))?;
    println!("Removed {} temporary file(s)", count);
    Ok(())
}

fn count_files(dir: &Path) -> Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            count += count_files(&entry.path())?;
        } else {
            count += 1;
        }
    }
    Ok(count)
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("storyreel configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home (ledger): {}", cfg.home.display());
    println!("  Assets:        {}", cfg.assets.display());
    println!("  Results:       {}", cfg.results.display());
    println!("  Background:    {}", cfg.background_path().display());
    println!();
    println!("Selection:");
    println!(
        "  Subreddit:          {}",
        cfg.subreddit.as_deref().unwrap_or("(unset)")
    );
    println!("  Mode:               {}", cfg.mode);
    println!(
        "  Ranking:            {}{}",
        cfg.rank.listing(),
        cfg.rank
            .time_filter()
            .map(|t| format!(" / {}", t.as_str()))
            .unwrap_or_default()
    );
    println!(
        "  Explicit ids:       {}",
        cfg.post_id.as_deref().unwrap_or("(none)")
    );
    println!("  Max comment length: {}", cfg.max_comment_length);
    println!("  Min comments:       {}", cfg.min_comments);
    println!();
    println!("Output:");
    println!(
        "  Opacity:    {}",
        cfg.opacity
            .map(|o| o.to_string())
            .unwrap_or_else(|| "1 (default)".to_string())
    );
    println!(
        "  Translate:  {}",
        cfg.post_lang.as_deref().unwrap_or("(off)")
    );
    println!("  Credit:     {}", cfg.background.credit);
    println!();
    println!("Reddit:");
    println!(
        "  Username:   {}",
        cfg.reddit.username.as_deref().unwrap_or("(unset)")
    );
    println!(
        "  Client id:  {}",
        if cfg.reddit.client_id.is_some() { "set" } else { "(unset)" }
    );
    println!("  Two-factor: {}", cfg.reddit.two_factor);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subreddit_from_input() {
        assert_eq!(subreddit_from_input("r/tifu"), "tifu");
        assert_eq!(subreddit_from_input("R/NoSleep"), "NoSleep");
        assert_eq!(subreddit_from_input("  NoSleep\n"), "NoSleep");
        assert_eq!(subreddit_from_input(""), "AskReddit");
        assert_eq!(subreddit_from_input("\n"), "AskReddit");
        assert_eq!(subreddit_from_input("r/"), "AskReddit");
    }
}
