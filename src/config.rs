//! Configuration for storyreel.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (STORYREEL_HOME, STORYREEL_ASSETS,
//!    STORYREEL_RESULTS, REDDIT_CLIENT_ID, REDDIT_CLIENT_SECRET,
//!    REDDIT_USERNAME, REDDIT_PASSWORD)
//! 2. Config file (.storyreel/config.yaml)
//! 3. Defaults (./video_creation/data, ./assets, ./results)
//!
//! Config file discovery:
//! - Searches current directory and parents for .storyreel/config.yaml
//! - Paths in config file are relative to the project root (the parent of
//!   .storyreel/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::reddit::strip_prefix_ci;
use crate::adapters::ClipPosition;
use crate::core::filter::DEFAULT_MAX_COMMENT_LENGTH;
use crate::domain::{Mode, RankMode, TimeFilter, UnitRef};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".storyreel";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub reddit: RedditSection,
    #[serde(default)]
    pub settings: SettingsSection,
    #[serde(default)]
    pub background: BackgroundSection,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedditSection {
    #[serde(default)]
    pub creds: CredsConfig,
    #[serde(default)]
    pub thread: ThreadConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredsConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub two_factor: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadConfig {
    pub subreddit: Option<String>,
    /// One id or URL, or several joined with "+"
    pub post_id: Option<String>,
    pub max_comment_length: Option<usize>,
    /// Target language for filename translation
    pub post_lang: Option<String>,
    pub min_comments: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsSection {
    #[serde(default)]
    pub storymode: bool,
    pub opacity: Option<f64>,
    /// top | hot | controversial
    pub post_type: Option<String>,
    /// hour | day | week | month | year | all
    pub time_filter: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackgroundSection {
    pub path: Option<String>,
    pub credit: Option<String>,
    #[serde(default)]
    pub position: ClipPosition,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Ledger state directory
    pub home: Option<String>,
    /// Intermediate assets (temp/mp3, temp/png, background)
    pub assets: Option<String>,
    /// Output root; videos land in <results>/<subreddit>/
    pub results: Option<String>,
}

/// Reddit credentials after env overrides
#[derive(Debug, Clone, Default)]
pub struct RedditSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub two_factor: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BackgroundSettings {
    /// Defaults to <assets>/temp/background.mp4
    pub path: Option<PathBuf>,
    pub credit: String,
    pub position: ClipPosition,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Ledger state directory (videos.json, stories.json)
    pub home: PathBuf,
    pub assets: PathBuf,
    pub results: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,

    pub reddit: RedditSettings,

    /// Group name without `r/`
    pub subreddit: Option<String>,
    pub post_id: Option<String>,
    pub mode: Mode,
    pub rank: RankMode,
    pub max_comment_length: usize,
    pub min_comments: u64,
    pub post_lang: Option<String>,
    pub opacity: Option<f64>,
    pub background: BackgroundSettings,
}

impl ResolvedConfig {
    /// Explicit unit override from `post_id`, if any
    pub fn explicit_refs(&self) -> Vec<UnitRef> {
        self.post_id
            .as_deref()
            .map(UnitRef::parse_list)
            .unwrap_or_default()
    }

    pub fn background_path(&self) -> PathBuf {
        self.background
            .path
            .clone()
            .unwrap_or_else(|| self.assets.join("temp").join("background.mp4"))
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`; a leading `~` is the
/// user's home directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }

    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;

    let config_file = find_config_file();
    let file = match config_file {
        Some(ref path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    // Base directory is the parent of .storyreel/ (the project root)
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or(cwd);

    resolve(file, config_file, &base_dir, |key| std::env::var(key).ok())
}

/// Merge file values, env overrides and defaults
fn resolve(
    file: ConfigFile,
    config_file: Option<PathBuf>,
    base_dir: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let dir = |var: &str, configured: &Option<String>, default: &str| -> PathBuf {
        if let Some(value) = env(var) {
            PathBuf::from(value)
        } else {
            resolve_path(base_dir, configured.as_deref().unwrap_or(default))
        }
    };

    let home = dir("STORYREEL_HOME", &file.paths.home, "video_creation/data");
    let assets = dir("STORYREEL_ASSETS", &file.paths.assets, "assets");
    let results = dir("STORYREEL_RESULTS", &file.paths.results, "results");

    let creds = file.reddit.creds;
    let reddit = RedditSettings {
        client_id: env("REDDIT_CLIENT_ID").or(creds.client_id),
        client_secret: env("REDDIT_CLIENT_SECRET").or(creds.client_secret),
        username: env("REDDIT_USERNAME")
            .or(creds.username)
            .map(|u| strip_prefix_ci(u.trim(), "u/").to_string()),
        password: env("REDDIT_PASSWORD").or(creds.password),
        two_factor: creds.two_factor,
    };

    let thread = file.reddit.thread;
    let settings = file.settings;

    let time_filter = match settings.time_filter.as_deref() {
        Some(tf) => tf.parse::<TimeFilter>()?,
        None => TimeFilter::default(),
    };
    let rank = match settings.post_type.as_deref() {
        Some(post_type) => RankMode::from_parts(post_type, time_filter),
        None => RankMode::Top(time_filter),
    };

    let background = BackgroundSettings {
        path: file
            .background
            .path
            .as_deref()
            .map(|p| resolve_path(base_dir, p)),
        credit: file.background.credit.unwrap_or_default(),
        position: file.background.position,
    };

    Ok(ResolvedConfig {
        home,
        assets,
        results,
        config_file,
        reddit,
        subreddit: thread
            .subreddit
            .map(|s| strip_prefix_ci(s.trim(), "r/").to_string())
            .filter(|s| !s.is_empty()),
        post_id: thread.post_id.filter(|p| !p.trim().is_empty()),
        mode: if settings.storymode {
            Mode::Story
        } else {
            Mode::Single
        },
        rank,
        max_comment_length: thread
            .max_comment_length
            .unwrap_or(DEFAULT_MAX_COMMENT_LENGTH),
        min_comments: thread.min_comments.unwrap_or(1),
        post_lang: thread.post_lang.filter(|l| !l.trim().is_empty()),
        opacity: settings.opacity,
        background,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_file() {
        let base = PathBuf::from("/work");
        let config = resolve(ConfigFile::default(), None, &base, no_env).unwrap();

        assert_eq!(config.home, PathBuf::from("/work/video_creation/data"));
        assert_eq!(config.assets, PathBuf::from("/work/assets"));
        assert_eq!(config.results, PathBuf::from("/work/results"));
        assert_eq!(config.mode, Mode::Single);
        assert_eq!(config.rank, RankMode::Top(TimeFilter::Year));
        assert_eq!(config.max_comment_length, 500);
        assert_eq!(config.min_comments, 1);
        assert!(config.opacity.is_none());
        assert!(config.explicit_refs().is_empty());
        assert_eq!(
            config.background_path(),
            PathBuf::from("/work/assets/temp/background.mp4")
        );
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();

        let config_path = config_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
reddit:
  creds:
    client_id: abc
    client_secret: xyz
    username: u/someone
    password: hunter2
    two_factor: true
  thread:
    subreddit: r/AskReddit
    post_id: abc123+def456
    max_comment_length: 400
    post_lang: de
settings:
  storymode: true
  opacity: 0.9
  post_type: controversial
  time_filter: week
background:
  credit: bbswitzer
  position:
    y: 200
paths:
  results: ./out
"#
        )
        .unwrap();

        let parsed = load_config_file(&config_path).unwrap();
        let config = resolve(parsed, Some(config_path), temp.path(), no_env).unwrap();

        assert_eq!(config.subreddit.as_deref(), Some("AskReddit"));
        assert_eq!(config.reddit.username.as_deref(), Some("someone"));
        assert!(config.reddit.two_factor);
        assert_eq!(config.mode, Mode::Story);
        assert_eq!(config.rank, RankMode::Controversial(TimeFilter::Week));
        assert_eq!(config.max_comment_length, 400);
        assert_eq!(config.post_lang.as_deref(), Some("de"));
        assert_eq!(config.opacity, Some(0.9));
        assert_eq!(config.background.credit, "bbswitzer");
        assert_eq!(config.background.position.y, Some(200));
        assert_eq!(config.background.position.x, None);
        assert_eq!(config.results, temp.path().join("out"));
        assert_eq!(
            config.explicit_refs(),
            vec![
                UnitRef::Id("abc123".to_string()),
                UnitRef::Id("def456".to_string())
            ]
        );
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = ConfigFile::default();
        file.paths.home = Some("state".to_string());
        file.reddit.creds.client_id = Some("from-file".to_string());

        let env: HashMap<&str, &str> = [
            ("STORYREEL_HOME", "/var/storyreel"),
            ("REDDIT_CLIENT_ID", "from-env"),
        ]
        .into_iter()
        .collect();

        let config = resolve(file, None, Path::new("/work"), |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.home, PathBuf::from("/var/storyreel"));
        assert_eq!(config.reddit.client_id.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_invalid_time_filter_is_an_error() {
        let mut file = ConfigFile::default();
        file.settings.time_filter = Some("fortnight".to_string());

        assert!(resolve(file, None, Path::new("/work"), no_env).is_err());
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
