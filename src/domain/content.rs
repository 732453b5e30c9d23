//! Content units and comments as fetched from the platform.
//!
//! These are plain values; nothing here talks to the network.

use serde::{Deserialize, Serialize};

/// One discussion thread. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentUnit {
    /// Platform id (base36, no kind prefix)
    pub id: String,

    /// Group the unit was fetched from
    pub group: String,

    pub title: String,

    /// Self text; empty for link posts
    #[serde(default)]
    pub body: String,

    /// Canonical URL of the thread
    pub permalink: String,

    #[serde(default)]
    pub score: i64,

    /// Upvote ratio in 0.0..=1.0
    #[serde(default)]
    pub upvote_ratio: f64,

    #[serde(default)]
    pub num_comments: u64,
}

impl ContentUnit {
    /// Create a unit with no engagement stats
    pub fn new(
        id: impl Into<String>,
        group: impl Into<String>,
        title: impl Into<String>,
        permalink: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            group: group.into(),
            title: title.into(),
            body: String::new(),
            permalink: permalink.into(),
            score: 0,
            upvote_ratio: 0.0,
            num_comments: 0,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_comments(mut self, num_comments: u64) -> Self {
        self.num_comments = num_comments;
        self
    }
}

/// A top-level comment as returned by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawComment {
    pub id: String,
    pub body: String,

    /// `None` when the account was deleted
    pub author: Option<String>,

    #[serde(default)]
    pub stickied: bool,

    #[serde(default)]
    pub permalink: String,
}

/// A node in the ordered top-level comment listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommentNode {
    /// A real comment
    Comment(RawComment),

    /// Placeholder for collapsed replies ("load more comments")
    More { count: u64 },
}

/// How a caller pins a unit explicitly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitRef {
    /// Bare platform id
    Id(String),

    /// Full thread URL
    Url(String),
}

impl UnitRef {
    /// URLs always contain "http"; anything else is treated as an id
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.contains("http") {
            Self::Url(raw.to_string())
        } else {
            Self::Id(raw.to_string())
        }
    }

    /// Parse a "+"-joined list of references
    pub fn parse_list(raw: &str) -> Vec<Self> {
        raw.split('+')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::parse)
            .collect()
    }
}

impl std::fmt::Display for UnitRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitRef::Id(id) => write!(f, "{}", id),
            UnitRef::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Selection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// One thread narrated with its top comments
    #[default]
    Single,

    /// A batch of threads narrated title-by-title ("story mode")
    Story,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Single => write!(f, "single"),
            Mode::Story => write!(f, "story"),
        }
    }
}

/// Period used by score/controversy rankings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFilter {
    Hour,
    Day,
    Week,
    Month,
    #[default]
    Year,
    All,
}

impl TimeFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFilter::Hour => "hour",
            TimeFilter::Day => "day",
            TimeFilter::Week => "week",
            TimeFilter::Month => "month",
            TimeFilter::Year => "year",
            TimeFilter::All => "all",
        }
    }
}

impl std::str::FromStr for TimeFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "hour" => Ok(TimeFilter::Hour),
            "day" => Ok(TimeFilter::Day),
            "week" => Ok(TimeFilter::Week),
            "month" => Ok(TimeFilter::Month),
            "year" => Ok(TimeFilter::Year),
            "all" => Ok(TimeFilter::All),
            _ => anyhow::bail!("Unknown time filter: {}", s),
        }
    }
}

/// Ranking used to draw units from a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMode {
    /// Highest score within a period
    Top(TimeFilter),

    /// Current activity
    Hot,

    /// Most controversial within a period
    Controversial(TimeFilter),
}

impl Default for RankMode {
    fn default() -> Self {
        Self::Top(TimeFilter::Year)
    }
}

impl RankMode {
    /// Build from the config's `post_type` + `time_filter` pair.
    /// Unknown post types fall back to controversial.
    pub fn from_parts(post_type: &str, time_filter: TimeFilter) -> Self {
        match post_type.to_lowercase().as_str() {
            "top" => RankMode::Top(time_filter),
            "hot" => RankMode::Hot,
            _ => RankMode::Controversial(time_filter),
        }
    }

    /// Listing path segment
    pub fn listing(&self) -> &'static str {
        match self {
            RankMode::Top(_) => "top",
            RankMode::Hot => "hot",
            RankMode::Controversial(_) => "controversial",
        }
    }

    pub fn time_filter(&self) -> Option<TimeFilter> {
        match self {
            RankMode::Top(t) | RankMode::Controversial(t) => Some(*t),
            RankMode::Hot => None,
        }
    }
}
