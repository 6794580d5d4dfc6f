//! Backend-neutral predicate tree
//!
//! Leaves test one property of an image; interior nodes combine them.
//! Compiling [`FilterCriteria`] always yields the same shape:
//!
//! ```text
//! And[ HasTag(t1), HasTag(t2), ...,
//!      Not(Or[HasTag(x1), ...]),
//!      CapturedAfter(since),
//!      Or[PathContains(p1), PathContains(p1 stripped), ...] ]
//! ```
//!
//! with absent conditions left out and a lone clause unwrapped.

use super::FilterCriteria;
use crate::index::{to_epoch, Epoch, ImageRecord};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Every image
    All,
    /// Image has this tag value under some category
    HasTag(String),
    /// Capture time strictly after this instant; undated images fail
    CapturedAfter(Epoch),
    /// Path contains this literal substring
    PathContains(String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Compile criteria into a predicate
    ///
    /// `index_dir` is the directory of the index file. Each path substring
    /// is also tried with that directory prefix removed, so users can paste
    /// either a stored relative path or the absolute form the tool prints.
    #[must_use]
    pub fn compile(criteria: &FilterCriteria, index_dir: Option<&Path>) -> Self {
        let mut clauses: Vec<Self> = criteria
            .required_tags
            .iter()
            .map(|tag| Self::HasTag(tag.clone()))
            .collect();

        if !criteria.excluded_tags.is_empty() {
            let excluded = criteria
                .excluded_tags
                .iter()
                .map(|tag| Self::HasTag(tag.clone()))
                .collect();
            clauses.push(Self::Not(Box::new(Self::Or(excluded))));
        }

        if let Some(since) = criteria.since {
            clauses.push(Self::CapturedAfter(to_epoch(since)));
        }

        if !criteria.path_substrings.is_empty() {
            let prefix = index_dir.and_then(Path::to_str).filter(|p| !p.is_empty());
            let mut variants: Vec<Self> = Vec::new();
            for substring in &criteria.path_substrings {
                for variant in path_variants(substring, prefix) {
                    let leaf = Self::PathContains(variant);
                    if !variants.contains(&leaf) {
                        variants.push(leaf);
                    }
                }
            }
            clauses.push(Self::Or(variants));
        }

        match clauses.len() {
            0 => Self::All,
            1 => clauses.remove(0),
            _ => Self::And(clauses),
        }
    }

    /// Evaluate against one record
    #[must_use]
    pub fn matches(&self, image: &ImageRecord) -> bool {
        match self {
            Self::All => true,
            Self::HasTag(tag) => image.tags.contains_tag(tag),
            Self::CapturedAfter(epoch) => image
                .captured_at
                .is_some_and(|ts| to_epoch(ts) > *epoch),
            Self::PathContains(substring) => image.path.contains(substring.as_str()),
            Self::And(items) => items.iter().all(|p| p.matches(image)),
            Self::Or(items) => items.iter().any(|p| p.matches(image)),
            Self::Not(inner) => !inner.matches(image),
        }
    }

    /// True if the predicate only inspects the path
    #[must_use]
    pub fn is_path_only(&self) -> bool {
        match self {
            Self::PathContains(_) => true,
            Self::All | Self::HasTag(_) | Self::CapturedAfter(_) => false,
            Self::And(items) | Self::Or(items) => items.iter().all(Self::is_path_only),
            Self::Not(inner) => inner.is_path_only(),
        }
    }

    /// Evaluate a path-only predicate against a bare path
    ///
    /// Non-path leaves evaluate to false; check [`Predicate::is_path_only`]
    /// first.
    #[must_use]
    pub fn matches_path(&self, path: &str) -> bool {
        match self {
            Self::PathContains(substring) => path.contains(substring.as_str()),
            Self::And(items) => items.iter().all(|p| p.matches_path(path)),
            Self::Or(items) => items.iter().any(|p| p.matches_path(path)),
            Self::Not(inner) => !inner.matches_path(path),
            Self::All | Self::HasTag(_) | Self::CapturedAfter(_) => false,
        }
    }

    /// Rough evaluation cost, used to order AND clauses
    #[must_use]
    pub fn cost(&self) -> u8 {
        match self {
            Self::HasTag(_) => 0,
            Self::CapturedAfter(_) => 1,
            Self::And(_) | Self::Or(_) | Self::Not(_) if self.is_path_only() => 3,
            Self::And(_) | Self::Or(_) | Self::Not(_) => 2,
            Self::PathContains(_) => 3,
            Self::All => 4,
        }
    }
}

/// The substring as given, plus the form with `prefix/` removed
fn path_variants(substring: &str, prefix: Option<&str>) -> Vec<String> {
    let mut variants = vec![substring.to_string()];
    if let Some(prefix) = prefix
        && let Some(rest) = substring.strip_prefix(prefix)
        && (rest.starts_with('/') || prefix.ends_with('/'))
    {
        let rest = rest.trim_start_matches('/');
        if !rest.is_empty() && rest != substring {
            variants.push(rest.to_string());
        }
    }
    variants
}
