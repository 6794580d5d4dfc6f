//! Filter criteria and their compiled predicate form
//!
//! [`FilterCriteria`] is what the command line collects: required tags,
//! excluded tags, a since threshold and path substrings. It compiles into a
//! [`Predicate`], a small AND/OR/NOT tree that a backend evaluates. The
//! sled-backed evaluator lives in [`crate::db::query`]; [`Predicate::matches`]
//! evaluates the same tree against a single in-memory record.

pub mod predicate;

pub use predicate::Predicate;

use chrono::NaiveDateTime;
use std::collections::BTreeSet;

/// Filter criteria for one query
///
/// All active conditions are ANDed. An empty criteria matches every image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Every one of these tags must be present (under any category)
    pub required_tags: BTreeSet<String>,

    /// Any one of these tags removes the image
    pub excluded_tags: BTreeSet<String>,

    /// Capture time must be strictly later than this
    pub since: Option<NaiveDateTime>,

    /// Path must contain at least one of these substrings
    pub path_substrings: Vec<String>,
}

impl FilterCriteria {
    /// Create a new filter criteria builder
    #[must_use]
    pub fn builder() -> FilterCriteriaBuilder {
        FilterCriteriaBuilder::default()
    }

    /// True when no condition is active
    #[must_use]
    pub fn is_unfiltered(&self) -> bool {
        self.required_tags.is_empty()
            && self.excluded_tags.is_empty()
            && self.since.is_none()
            && self.path_substrings.is_empty()
    }
}

/// Builder for [`FilterCriteria`]
#[derive(Debug, Default)]
pub struct FilterCriteriaBuilder {
    criteria: FilterCriteria,
}

impl FilterCriteriaBuilder {
    /// Require a tag
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.criteria.required_tags.insert(tag.into());
        self
    }

    /// Require several tags
    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.criteria
            .required_tags
            .extend(tags.into_iter().map(Into::into));
        self
    }

    /// Exclude a tag
    #[must_use]
    pub fn exclude(mut self, tag: impl Into<String>) -> Self {
        self.criteria.excluded_tags.insert(tag.into());
        self
    }

    /// Exclude several tags
    #[must_use]
    pub fn excludes<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.criteria
            .excluded_tags
            .extend(tags.into_iter().map(Into::into));
        self
    }

    /// Only images captured after `when`
    #[must_use]
    pub const fn since(mut self, when: NaiveDateTime) -> Self {
        self.criteria.since = Some(when);
        self
    }

    /// Add a path substring
    #[must_use]
    pub fn path(mut self, substring: impl Into<String>) -> Self {
        self.criteria.path_substrings.push(substring.into());
        self
    }

    /// Add several path substrings
    #[must_use]
    pub fn paths<I, S>(mut self, substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.criteria
            .path_substrings
            .extend(substrings.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn build(self) -> FilterCriteria {
        self.criteria
    }
}
