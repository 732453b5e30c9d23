//! Per-comment eligibility rules.
//!
//! The filter is a pure predicate; callers keep the platform's comment
//! order and number the survivors contiguously.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::domain::{CommentNode, ContentUnit, Segment};

/// Bodies the platform substitutes for moderated or deleted comments
pub const REMOVED_SENTINELS: [&str; 2] = ["[removed]", "[deleted]"];

/// Default `max_comment_length`
pub const DEFAULT_MAX_COMMENT_LENGTH: usize = 500;

/// Why a comment was left out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// "load more comments" placeholder
    Placeholder,
    Removed,
    Stickied,
    /// Nothing speakable left after sanitizing
    EmptyAfterSanitize,
    TooLong,
    NoAuthor,
}

/// Decides which comments become segments
#[derive(Debug, Clone)]
pub struct SegmentFilter {
    max_comment_length: usize,
    sanitizer: fn(&str) -> String,
}

impl Default for SegmentFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COMMENT_LENGTH)
    }
}

impl SegmentFilter {
    pub fn new(max_comment_length: usize) -> Self {
        Self {
            max_comment_length,
            sanitizer: sanitize_text,
        }
    }

    /// Replace the sanitizer (the TTS front-end's text cleaner)
    pub fn with_sanitizer(mut self, sanitizer: fn(&str) -> String) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn max_comment_length(&self) -> usize {
        self.max_comment_length
    }

    /// Check one node; `Ok` carries nothing, `Err` says why it was dropped
    pub fn check(&self, node: &CommentNode) -> Result<(), Rejection> {
        let comment = match node {
            CommentNode::More { .. } => return Err(Rejection::Placeholder),
            CommentNode::Comment(c) => c,
        };

        if REMOVED_SENTINELS.contains(&comment.body.as_str()) {
            return Err(Rejection::Removed);
        }
        if comment.stickied {
            return Err(Rejection::Stickied);
        }
        if (self.sanitizer)(&comment.body).trim().is_empty() {
            return Err(Rejection::EmptyAfterSanitize);
        }
        if comment.body.chars().count() > self.max_comment_length {
            return Err(Rejection::TooLong);
        }
        if comment.author.is_none() {
            return Err(Rejection::NoAuthor);
        }

        Ok(())
    }

    pub fn accepts(&self, node: &CommentNode) -> bool {
        self.check(node).is_ok()
    }

    /// Accepted comments as segments numbered 0.. in platform order
    pub fn segments(&self, comments: &[CommentNode]) -> Vec<Segment> {
        comments
            .iter()
            .filter_map(|node| match (node, self.check(node)) {
                (CommentNode::Comment(c), Ok(())) => Some(c),
                (CommentNode::Comment(c), Err(reason)) => {
                    debug!(comment = %c.id, ?reason, "Comment rejected");
                    None
                }
                (CommentNode::More { .. }, _) => None,
            })
            .enumerate()
            .map(|(index, c)| Segment {
                index,
                source_unit_id: c.id.clone(),
                accepted_body: c.body.clone(),
            })
            .collect()
    }

    /// Story-mode rule for a whole unit: it needs a speakable title and a
    /// body that was not removed
    pub fn accepts_unit(&self, unit: &ContentUnit) -> bool {
        if REMOVED_SENTINELS.contains(&unit.body.as_str()) {
            return false;
        }
        !(self.sanitizer)(&unit.title).trim().is_empty()
    }

    /// One segment per kept unit, indexed by its batch position
    pub fn story_segments(&self, units: &[ContentUnit]) -> Vec<Segment> {
        units
            .iter()
            .enumerate()
            .filter(|(_, unit)| {
                let keep = self.accepts_unit(unit);
                if !keep {
                    debug!(unit = %unit.id, "Story unit skipped");
                }
                keep
            })
            .map(|(index, unit)| Segment {
                index,
                source_unit_id: unit.id.clone(),
                accepted_body: if unit.body.is_empty() {
                    unit.title.clone()
                } else {
                    format!("{}\n\n{}", unit.title, unit.body)
                },
            })
            .collect()
    }
}

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"((http|https)://)?[a-zA-Z0-9./?:@\-_=#]+\.([a-zA-Z]){2,6}([a-zA-Z0-9.&/?:@\-_=#])*")
        .unwrap()
});
static MARKUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s['’]|['’]\s|[\^_~@!;#:\-%—“”‘"*/{}\[\]()\\|<>=]"#).unwrap()
});
static EMOJI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{Extended_Pictographic}|\x{FE0F}|\x{200D}").unwrap());

/// Strip URLs, markup punctuation and emoji so only speakable text is left
pub fn sanitize_text(text: &str) -> String {
    let result = URL_RE.replace_all(text, " ");
    let result = MARKUP_RE.replace_all(&result, " ");
    let result = EMOJI_RE.replace_all(&result, " ");
    let result = result.replace('+', "plus").replace('&', "and");

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RawComment;

    fn comment(body: &str) -> CommentNode {
        CommentNode::Comment(RawComment {
            id: "c1".to_string(),
            body: body.to_string(),
            author: Some("alice".to_string()),
            stickied: false,
            permalink: String::new(),
        })
    }

    #[test]
    fn test_deleted_body_rejected() {
        let filter = SegmentFilter::default();
        assert_eq!(filter.check(&comment("[deleted]")), Err(Rejection::Removed));
        assert_eq!(filter.check(&comment("[removed]")), Err(Rejection::Removed));
    }

    #[test]
    fn test_empty_after_sanitize_rejected() {
        let filter = SegmentFilter::default().with_sanitizer(|_| String::new());
        assert_eq!(
            filter.check(&comment("plenty of raw text")),
            Err(Rejection::EmptyAfterSanitize)
        );

        // markup-only body with the real sanitizer
        let filter = SegmentFilter::default();
        assert!(!filter.accepts(&comment("*** -- ***")));
    }

    #[test]
    fn test_length_limit() {
        let filter = SegmentFilter::new(400);
        let long = "a".repeat(500);
        assert_eq!(filter.check(&comment(&long)), Err(Rejection::TooLong));

        let exact = "a".repeat(400);
        assert!(filter.accepts(&comment(&exact)));
    }

    #[test]
    fn test_stickied_rejected_regardless_of_body() {
        let filter = SegmentFilter::default();
        let node = CommentNode::Comment(RawComment {
            id: "mod".to_string(),
            body: "A perfectly fine comment".to_string(),
            author: Some("automoderator".to_string()),
            stickied: true,
            permalink: String::new(),
        });
        assert_eq!(filter.check(&node), Err(Rejection::Stickied));
    }

    #[test]
    fn test_missing_author_and_placeholder_rejected() {
        let filter = SegmentFilter::default();
        let orphan = CommentNode::Comment(RawComment {
            id: "c9".to_string(),
            body: "still here".to_string(),
            author: None,
            stickied: false,
            permalink: String::new(),
        });
        assert_eq!(filter.check(&orphan), Err(Rejection::NoAuthor));
        assert_eq!(
            filter.check(&CommentNode::More { count: 3 }),
            Err(Rejection::Placeholder)
        );
    }

    #[test]
    fn test_segments_are_contiguous_and_ordered() {
        let filter = SegmentFilter::default();
        let nodes = vec![
            comment("first"),
            comment("[deleted]"),
            CommentNode::More { count: 2 },
            comment("second"),
        ];

        let segments = filter.segments(&nodes);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].index, 0);
        assert_eq!(segments[0].accepted_body, "first");
        assert_eq!(segments[1].index, 1);
        assert_eq!(segments[1].accepted_body, "second");
    }

    #[test]
    fn test_story_segments_keep_batch_positions() {
        let filter = SegmentFilter::default();
        let units = vec![
            ContentUnit::new("a", "g", "First story", "u"),
            ContentUnit::new("b", "g", "🙂", "u"),
            ContentUnit::new("c", "g", "Third story", "u").with_body("body"),
        ];

        let segments = filter.story_segments(&units);
        let indices: Vec<usize> = segments.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 2]);
        assert_eq!(segments[1].accepted_body, "Third story\n\nbody");
    }

    #[test]
    fn test_sanitize_text() {
        assert_eq!(
            sanitize_text("Check https://example.com/page now!"),
            "Check now"
        );
        assert_eq!(sanitize_text("salt & pepper + lime"), "salt and pepper plus lime");
        assert_eq!(sanitize_text("I'm fine"), "I'm fine");
        assert_eq!(sanitize_text("🔥🔥"), "");
    }
}
