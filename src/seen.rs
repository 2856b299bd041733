use crate::question::Question;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Ids already shown to the user. Persisted as a plain sequence of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeenSet {
    ids: BTreeSet<String>,
}

impl SeenSet {
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.ids.iter()
    }

    /// Add the resolved id of every question. Returns whether anything was new.
    pub fn mark(&mut self, questions: &[Question]) -> bool {
        questions
            .iter()
            .fold(false, |changed, q| self.ids.insert(q.resolved_id()) || changed)
    }

    pub fn coverage(&self, pool: &[Question]) -> Coverage {
        let total = pool.len();
        let seen = pool
            .iter()
            .filter(|q| self.contains(&q.resolved_id()))
            .count();
        Coverage {
            seen,
            unseen: total - seen,
            total,
        }
    }
}

impl<S: Into<String>> FromIterator<S> for SeenSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Coverage counters for one pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Coverage {
    pub seen: usize,
    pub unseen: usize,
    pub total: usize,
}

impl Coverage {
    pub fn percent_seen(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.seen as f64 / self.total as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(id: &str) -> Question {
        Question {
            id: Some(id.to_string()),
            topic: None,
            prompt: format!("prompt {id}"),
            options: vec!["yes".to_string(), "no".to_string()],
            correct: BTreeSet::from([0]),
            explanations: Default::default(),
        }
    }

    #[test]
    fn test_mark_reports_change_once() {
        let mut seen = SeenSet::default();
        let questions = vec![q("a"), q("b")];
        assert!(seen.mark(&questions));
        assert!(!seen.mark(&questions));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_mark_partial_overlap_is_a_change() {
        let mut seen: SeenSet = ["a"].into_iter().collect();
        assert!(seen.mark(&[q("a"), q("c")]));
        assert!(seen.contains("c"));
    }

    #[test]
    fn test_coverage_counts_only_pool_members() {
        let seen: SeenSet = ["a", "zzz"].into_iter().collect();
        let coverage = seen.coverage(&[q("a"), q("b"), q("c")]);
        assert_eq!(
            coverage,
            Coverage {
                seen: 1,
                unseen: 2,
                total: 3
            }
        );
        assert!((coverage.percent_seen() - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_empty_pool_coverage() {
        let coverage = SeenSet::default().coverage(&[]);
        assert_eq!(coverage, Coverage::default());
        assert_eq!(coverage.percent_seen(), 0.0);
    }

    #[test]
    fn test_serializes_as_sequence() {
        let seen: SeenSet = ["b", "a"].into_iter().collect();
        assert_eq!(serde_json::to_string(&seen).unwrap(), r#"["a","b"]"#);
    }
}
