//! `If-Match` / `If-None-Match` handling

use crate::store::EntityTag;
use serde::{Deserialize, Serialize};

/// Parsed value of an `If-Match` or `If-None-Match` header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagSet {
    /// `*`: any current representation
    Any,
    Tags(Vec<EntityTag>),
}

impl TagSet {
    /// Parse a header value: `*` or a comma separated list of (optionally
    /// weak) quoted tags
    pub fn parse(header: &str) -> Self {
        let header = header.trim();
        if header == "*" {
            return TagSet::Any;
        }

        let tags = header
            .split(',')
            .map(|tag| tag.trim())
            .map(|tag| tag.strip_prefix("W/").unwrap_or(tag))
            .map(|tag| tag.trim_matches('"'))
            .filter(|tag| !tag.is_empty())
            .map(EntityTag::new)
            .collect();
        TagSet::Tags(tags)
    }

    pub fn tags(tags: &[&EntityTag]) -> Self {
        TagSet::Tags(tags.iter().map(|tag| (*tag).clone()).collect())
    }

    /// Whether the document's current tag (absent when it does not exist)
    /// is in the set
    pub fn matches(&self, current: Option<&EntityTag>) -> bool {
        match (self, current) {
            (_, None) => false,
            (TagSet::Any, Some(_)) => true,
            (TagSet::Tags(tags), Some(current)) => tags.contains(current),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionOutcome {
    Pass,
    /// `If-Match` did not match
    MatchFailed,
    /// `If-None-Match` matched
    NoneMatchHit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preconditions {
    pub if_match: Option<TagSet>,
    pub if_none_match: Option<TagSet>,
}

impl Preconditions {
    pub fn if_match(tag: &EntityTag) -> Self {
        Self {
            if_match: Some(TagSet::tags(&[tag])),
            if_none_match: None,
        }
    }

    pub fn if_none_match(set: TagSet) -> Self {
        Self {
            if_match: None,
            if_none_match: Some(set),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.if_match.is_none() && self.if_none_match.is_none()
    }

    pub fn evaluate(&self, current: Option<&EntityTag>) -> PreconditionOutcome {
        if let Some(set) = &self.if_match {
            if !set.matches(current) {
                return PreconditionOutcome::MatchFailed;
            }
        }
        if let Some(set) = &self.if_none_match {
            if set.matches(current) {
                return PreconditionOutcome::NoneMatchHit;
            }
        }
        PreconditionOutcome::Pass
    }
}
