use crate::question::Question;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Defaults of the practice format: 54 questions in 135 minutes
pub const DEFAULT_EXAM_SIZE: usize = 54;
pub const DEFAULT_TIME_LIMIT_SECS: u64 = 135 * 60;

/// How an attempt is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub desired_count: usize,
    pub topic: Option<String>,
    pub time_limit_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            desired_count: DEFAULT_EXAM_SIZE,
            topic: None,
            time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicScore {
    pub correct: usize,
    pub attempted: usize,
}

impl TopicScore {
    pub fn percent(&self) -> f64 {
        crate::history::score_pct(self.correct, self.attempted)
    }
}

/// Result of submitting the current answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
}

/// Everything needed to resume an attempt after a restart.
///
/// This is the persisted snapshot: the exam is stored as full questions so a
/// bank edit between runs cannot change what the attempt is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub exam: Vec<Question>,
    pub index: usize,
    /// Selected option indices, one entry per exam question
    pub selections: Vec<BTreeSet<usize>>,
    pub locked: bool,
    pub correct: usize,
    pub attempted: usize,
    pub started_at: DateTime<Utc>,
    pub time_limit_secs: u64,
    pub time_left_secs: u64,
    pub topic: Option<String>,
    pub desired_count: usize,
    #[serde(default)]
    pub topic_breakdown: BTreeMap<String, TopicScore>,
}

impl SessionState {
    pub fn new(exam: Vec<Question>, config: &SessionConfig, now: DateTime<Utc>) -> Self {
        let selections = vec![BTreeSet::new(); exam.len()];
        Self {
            exam,
            index: 0,
            selections,
            locked: false,
            correct: 0,
            attempted: 0,
            started_at: now,
            time_limit_secs: config.time_limit_secs,
            time_left_secs: config.time_limit_secs,
            topic: config.topic.clone(),
            desired_count: config.desired_count,
            topic_breakdown: BTreeMap::new(),
        }
    }

    pub fn current(&self) -> Option<&Question> {
        self.exam.get(self.index)
    }

    pub fn current_selection(&self) -> Option<&BTreeSet<usize>> {
        self.selections.get(self.index)
    }

    pub fn is_time_up(&self) -> bool {
        self.time_left_secs == 0
    }

    pub fn is_done(&self) -> bool {
        self.is_time_up() || self.index >= self.exam.len()
    }

    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from((now - self.started_at).num_seconds()).unwrap_or(0)
    }

    /// Select or deselect an option. Single-select questions replace the
    /// selection. Returns whether anything changed.
    pub fn toggle_option(&mut self, option: usize) -> bool {
        if self.locked || self.is_done() {
            return false;
        }
        let Some(question) = self.exam.get(self.index) else {
            return false;
        };
        if option >= question.options.len() {
            return false;
        }
        let multi = question.is_multi_select();
        let Some(selection) = self.selections.get_mut(self.index) else {
            return false;
        };

        if multi {
            if !selection.remove(&option) {
                selection.insert(option);
            }
            true
        } else if selection.len() == 1 && selection.contains(&option) {
            false
        } else {
            selection.clear();
            selection.insert(option);
            true
        }
    }

    /// Replace the current selection wholesale, e.g. from typed letters.
    pub fn set_selection(&mut self, options: BTreeSet<usize>) -> bool {
        if self.locked || self.is_done() {
            return false;
        }
        let Some(question) = self.exam.get(self.index) else {
            return false;
        };
        if options.iter().any(|o| *o >= question.options.len()) {
            return false;
        }
        if !question.is_multi_select() && options.len() > 1 {
            return false;
        }
        match self.selections.get_mut(self.index) {
            Some(selection) if *selection != options => {
                *selection = options;
                true
            }
            _ => false,
        }
    }

    /// Lock in the current selection and score it
    pub fn submit(&mut self) -> Option<AnswerOutcome> {
        if self.locked || self.is_done() {
            return None;
        }
        let question = self.exam.get(self.index)?;
        let selection = self.selections.get(self.index)?;
        if selection.is_empty() {
            return None;
        }

        let correct = question.is_correct(selection);
        let topic = question.topic_label().to_string();

        self.locked = true;
        self.attempted += 1;
        if correct {
            self.correct += 1;
        }
        let score = self.topic_breakdown.entry(topic).or_default();
        score.attempted += 1;
        if correct {
            score.correct += 1;
        }

        Some(AnswerOutcome { correct })
    }

    /// Move past the current question. Unanswered questions may be skipped.
    pub fn advance(&mut self) -> bool {
        if self.index >= self.exam.len() {
            return false;
        }
        self.locked = false;
        self.index += 1;
        true
    }

    /// Recompute remaining time from the start timestamp. Running out locks
    /// the current question. Returns whether the state changed.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        let time_left = self.time_limit_secs.saturating_sub(self.elapsed_secs(now));
        let mut changed = time_left != self.time_left_secs;
        self.time_left_secs = time_left;

        if time_left == 0 && !self.locked {
            self.locked = true;
            changed = true;
        }
        changed
    }

    /// Per-topic rows ordered by most attempted, then weakest score
    pub fn breakdown_rows(&self) -> Vec<(&str, TopicScore)> {
        let mut rows: Vec<(&str, TopicScore)> = self
            .topic_breakdown
            .iter()
            .map(|(topic, score)| (topic.as_str(), *score))
            .collect();
        rows.sort_by(|a, b| {
            b.1.attempted.cmp(&a.1.attempted).then(
                a.1.percent()
                    .partial_cmp(&b.1.percent())
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        });
        rows
    }
}
