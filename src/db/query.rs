//! Predicate evaluation against the materialized store
//!
//! Leaves map onto the store's indices:
//! - `HasTag` is a prefix scan of `tag_index`
//! - `CapturedAfter` is a range scan of `time_index`
//! - `PathContains` filters image paths
//!
//! AND clauses are evaluated cheapest first; once a candidate set exists,
//! path-only clauses filter it in place instead of scanning every path.
//! Negated clauses are subtracted last.

use super::{DbError, Store};
use crate::query::{FilterCriteria, Predicate};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

impl Store {
    /// Evaluate a predicate to the set of matching paths
    ///
    /// # Errors
    ///
    /// Returns `DbError` if any index scan fails.
    pub fn evaluate(&self, predicate: &Predicate) -> Result<BTreeSet<String>, DbError> {
        match predicate {
            Predicate::All => Ok(self.list_all_paths()?.into_iter().collect()),
            Predicate::HasTag(tag) => self.paths_with_tag(tag),
            Predicate::CapturedAfter(epoch) => self.paths_captured_after(*epoch),
            Predicate::PathContains(_) => Ok(self
                .list_all_paths()?
                .into_iter()
                .filter(|path| predicate.matches_path(path))
                .collect()),
            Predicate::Or(items) => {
                let mut paths = BTreeSet::new();
                for item in items {
                    paths.extend(self.evaluate(item)?);
                }
                Ok(paths)
            }
            Predicate::Not(inner) => {
                let excluded = self.evaluate(inner)?;
                let mut paths = self.evaluate(&Predicate::All)?;
                paths.retain(|path| !excluded.contains(path));
                Ok(paths)
            }
            Predicate::And(items) => self.evaluate_and(items),
        }
    }

    fn evaluate_and(&self, items: &[Predicate]) -> Result<BTreeSet<String>, DbError> {
        let (negated, mut positive): (Vec<&Predicate>, Vec<&Predicate>) =
            items.iter().partition(|p| matches!(p, Predicate::Not(_)));
        positive.sort_by_key(|p| p.cost());

        let mut candidates: Option<BTreeSet<String>> = None;
        for clause in positive {
            let next = match candidates.take() {
                None => self.evaluate(clause)?,
                Some(mut current) if clause.is_path_only() => {
                    current.retain(|path| clause.matches_path(path));
                    current
                }
                Some(current) => {
                    let matched = self.evaluate(clause)?;
                    current.into_iter().filter(|p| matched.contains(p)).collect()
                }
            };
            let empty = next.is_empty();
            candidates = Some(next);
            if empty {
                return Ok(BTreeSet::new());
            }
        }

        let mut paths = match candidates {
            Some(paths) => paths,
            None => self.evaluate(&Predicate::All)?,
        };
        for clause in negated {
            if let Predicate::Not(inner) = clause {
                let excluded = self.evaluate(inner)?;
                paths.retain(|path| !excluded.contains(path));
            }
        }
        Ok(paths)
    }

    /// Paths matching the criteria, ascending
    ///
    /// # Errors
    ///
    /// Returns `DbError` if evaluation fails.
    pub fn select_paths(
        &self,
        criteria: &FilterCriteria,
        index_dir: Option<&Path>,
    ) -> Result<Vec<String>, DbError> {
        let predicate = Predicate::compile(criteria, index_dir);
        debug!(?predicate, "evaluating query");

        if criteria.since.is_some() {
            let undated = self.count_undated();
            if undated > 0 {
                warn!("{undated} image(s) without a capture time skipped by the since filter");
            }
        }

        let paths = self.evaluate(&predicate)?;
        debug!(matched = paths.len(), "query finished");
        Ok(paths.into_iter().collect())
    }

    /// Distinct `(tag, category)` pairs carried by the matching images,
    /// ordered by tag then category
    ///
    /// # Errors
    ///
    /// Returns `DbError` if evaluation or a tag scan fails.
    pub fn select_tags(
        &self,
        criteria: &FilterCriteria,
        index_dir: Option<&Path>,
    ) -> Result<Vec<(String, String)>, DbError> {
        if criteria.is_unfiltered() {
            return self.list_all_tags();
        }
        let mut tags = BTreeSet::new();
        for path in self.select_paths(criteria, index_dir)? {
            for (category, tag) in self.tag_rows_of(&path)? {
                tags.insert((tag, category));
            }
        }
        Ok(tags.into_iter().collect())
    }
}
