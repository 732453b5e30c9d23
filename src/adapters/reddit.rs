//! Reddit content source over the OAuth API.
//!
//! Authentication uses the password grant of a "script" app; the bearer
//! token is fetched once when the client connects.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::{ContentSource, SourceError};
use crate::domain::{CommentNode, ContentUnit, RankMode, RawComment, UnitRef};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";
const USER_AGENT: &str = "storyreel/0.1 (accessing reddit threads)";

/// Script-app credentials
#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,

    /// Password, or `password:code` when two-factor is on
    pub passkey: String,
}

/// Authenticated Reddit client
pub struct RedditClient {
    http: Client,
    token: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct PostData {
    id: String,
    subreddit: String,
    title: String,
    #[serde(default)]
    selftext: String,
    permalink: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    upvote_ratio: f64,
    #[serde(default)]
    num_comments: u64,
}

#[derive(Debug, Deserialize)]
struct CommentData {
    id: String,
    #[serde(default)]
    body: String,
    author: Option<String>,
    #[serde(default)]
    stickied: bool,
    #[serde(default)]
    permalink: String,
}

#[derive(Debug, Deserialize)]
struct MoreData {
    #[serde(default)]
    count: u64,
}

impl RedditClient {
    /// Authenticate and return a ready client
    pub async fn connect(creds: &RedditCredentials) -> Result<Self, SourceError> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;

        let username = strip_prefix_ci(&creds.username, "u/");
        let response: TokenResponse = http
            .post(TOKEN_URL)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", username),
                ("password", creds.passkey.as_str()),
            ])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| SourceError::Auth(e.to_string()))?
            .json()
            .await?;

        let token = match (response.access_token, response.error) {
            (Some(token), _) => token,
            (None, Some(error)) => return Err(SourceError::Auth(error)),
            (None, None) => return Err(SourceError::Auth("no access token returned".into())),
        };

        info!(user = %username, "Logged in to Reddit");
        Ok(Self {
            http,
            token,
            api_base: API_BASE.to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let url = format!("{}{}", self.api_base, path);
        debug!(%url, "GET");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .query(&[("raw_json", "1")])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(path.to_string()));
        }

        Ok(response.error_for_status()?.json().await?)
    }

    /// Fetch `/comments/{id}`: [post listing, comment listing]
    async fn thread(&self, id: &str) -> Result<(ContentUnit, Vec<CommentNode>), SourceError> {
        let listings: Vec<Listing> = self
            .get_json(&format!("/comments/{}", id), &[("limit", "500".to_string())])
            .await?;

        let mut listings = listings.into_iter();
        let post = listings
            .next()
            .and_then(|l| l.data.children.into_iter().next())
            .ok_or_else(|| SourceError::NotFound(id.to_string()))?;
        let unit = parse_post(post)?;

        let comments = listings
            .next()
            .map(|l| parse_comments(l.data.children))
            .transpose()?
            .unwrap_or_default();

        Ok((unit, comments))
    }
}

#[async_trait]
impl ContentSource for RedditClient {
    fn name(&self) -> &str {
        "reddit"
    }

    async fn ranked(
        &self,
        group: &str,
        rank: RankMode,
        limit: usize,
    ) -> Result<Vec<ContentUnit>, SourceError> {
        let group = strip_prefix_ci(group, "r/");
        let mut query = vec![("limit", limit.to_string())];
        if let Some(t) = rank.time_filter() {
            query.push(("t", t.as_str().to_string()));
        }

        let listing: Listing = self
            .get_json(&format!("/r/{}/{}", group, rank.listing()), &query)
            .await?;

        listing
            .data
            .children
            .into_iter()
            .filter(|t| t.kind == "t3")
            .map(parse_post)
            .collect()
    }

    async fn lookup(&self, reference: &UnitRef) -> Result<ContentUnit, SourceError> {
        let id = match reference {
            UnitRef::Id(id) => id.clone(),
            UnitRef::Url(url) => thread_id_from_url(url)
                .ok_or_else(|| SourceError::NotFound(url.clone()))?,
        };
        let (unit, _) = self.thread(&id).await?;
        Ok(unit)
    }

    async fn comments(&self, unit: &ContentUnit) -> Result<Vec<CommentNode>, SourceError> {
        let (_, comments) = self.thread(&unit.id).await?;
        Ok(comments)
    }
}

fn parse_post(thing: Thing) -> Result<ContentUnit, SourceError> {
    let post: PostData = serde_json::from_value(thing.data)
        .map_err(|e| SourceError::Decode(format!("post: {}", e)))?;

    Ok(ContentUnit {
        id: post.id,
        group: post.subreddit,
        title: post.title,
        body: post.selftext,
        permalink: format!("https://reddit.com{}", post.permalink),
        score: post.score,
        upvote_ratio: post.upvote_ratio,
        num_comments: post.num_comments,
    })
}

fn parse_comments(children: Vec<Thing>) -> Result<Vec<CommentNode>, SourceError> {
    let mut nodes = Vec::with_capacity(children.len());
    for thing in children {
        match thing.kind.as_str() {
            "t1" => {
                let c: CommentData = serde_json::from_value(thing.data)
                    .map_err(|e| SourceError::Decode(format!("comment: {}", e)))?;
                nodes.push(CommentNode::Comment(RawComment {
                    id: c.id,
                    body: c.body,
                    // deleted accounts come back as "[deleted]"
                    author: c.author.filter(|a| a != "[deleted]"),
                    stickied: c.stickied,
                    permalink: c.permalink,
                }));
            }
            "more" => {
                let m: MoreData = serde_json::from_value(thing.data)
                    .map_err(|e| SourceError::Decode(format!("more: {}", e)))?;
                nodes.push(CommentNode::More { count: m.count });
            }
            _ => {}
        }
    }
    Ok(nodes)
}

static COMMENTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/comments/([A-Za-z0-9]+)").unwrap());
static SHORT_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"redd\.it/([A-Za-z0-9]+)").unwrap());

/// Pull the base36 thread id out of a permalink
pub fn thread_id_from_url(url: &str) -> Option<String> {
    if let Some(caps) = COMMENTS_RE.captures(url) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }

    // short links: https://redd.it/<id>
    SHORT_LINK_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Strip a case-insensitive prefix like "r/" or "u/"
pub fn strip_prefix_ci<'a>(value: &'a str, prefix: &str) -> &'a str {
    let value = value.trim();
    if value.len() >= prefix.len()
        && value.is_char_boundary(prefix.len())
        && value[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        &value[prefix.len()..]
    } else {
        value
    }
}
