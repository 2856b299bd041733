//! Coverage scheduler: serves every unseen question once, in shuffled order,
//! before anything repeats.

use crate::error::StoreError;
use crate::queue::DeliveryQueue;
use crate::question::Question;
use crate::seen::Coverage;
use crate::store::{KvStore, ProgressStore};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};

/// Output of [`Scheduler::build_exam`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exam {
    /// Presentation order for the attempt
    pub questions: Vec<Question>,
    /// Unseen questions in the pool before this exam was drawn
    pub remaining_unseen: usize,
}

impl Exam {
    pub fn ids(&self) -> Vec<String> {
        self.questions.iter().map(Question::resolved_id).collect()
    }
}

/// Owns the persisted scheduling state (seen set and delivery queue).
///
/// There is a single global queue. A topic filter change does not get its own
/// queue; the shared one is sanitized against whatever pool is passed in.
#[derive(Debug)]
pub struct Scheduler<S: KvStore> {
    store: ProgressStore<S>,
}

impl<S: KvStore> Scheduler<S> {
    pub fn new(store: ProgressStore<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ProgressStore<S> {
        &self.store
    }

    /// Record `questions` as shown. Any change invalidates the queue.
    pub fn mark_seen(&self, questions: &[Question]) -> Result<bool, StoreError> {
        let mut seen = self.store.load_seen();
        let changed = seen.mark(questions);
        if changed {
            self.store.save_seen(&seen)?;
            self.store.clear_queue()?;
            tracing::debug!(seen = seen.len(), "marked questions as seen");
        }
        Ok(changed)
    }

    /// Start a new coverage cycle
    pub fn reset_seen_progress(&self) -> Result<(), StoreError> {
        self.store.clear_seen()?;
        self.store.clear_queue()?;
        tracing::info!("seen progress reset");
        Ok(())
    }

    pub fn coverage(&self, pool: &[Question]) -> Coverage {
        self.store.load_seen().coverage(pool)
    }

    /// Draw an exam of `desired` questions (clamped to `1..=pool.len()`).
    ///
    /// Unseen questions come from the persisted queue first. Once the unseen
    /// population is exhausted the exam is topped up with already-seen
    /// questions in random order. No id appears twice.
    pub fn build_exam<R: Rng + ?Sized>(
        &self,
        pool: &[Question],
        desired: usize,
        rng: &mut R,
    ) -> Result<Exam, StoreError> {
        if pool.is_empty() {
            return Ok(Exam::default());
        }
        let desired = desired.clamp(1, pool.len());

        // Colliding ids collapse onto the first question carrying them.
        let mut by_id: HashMap<String, &Question> = HashMap::with_capacity(pool.len());
        let mut ids = Vec::with_capacity(pool.len());
        for q in pool {
            let id = q.resolved_id();
            if !by_id.contains_key(&id) {
                by_id.insert(id.clone(), q);
                ids.push(id);
            }
        }

        let seen = self.store.load_seen();
        let (unseen, already): (Vec<String>, Vec<String>) =
            ids.into_iter().partition(|id| !seen.contains(id));
        let remaining_unseen = unseen.len();

        let eligible: HashSet<&str> = unseen.iter().map(String::as_str).collect();
        let mut queue = self.store.load_queue();
        queue.sanitize(&eligible);

        if queue.remaining() == 0 && !unseen.is_empty() {
            queue = DeliveryQueue::shuffled(unseen.clone(), rng);
        }

        let mut drawn = queue.draw(desired);

        if drawn.len() < desired {
            let taken: HashSet<&str> = drawn.iter().map(String::as_str).collect();
            let rest: Vec<String> = unseen
                .iter()
                .filter(|id| !taken.contains(id.as_str()))
                .cloned()
                .collect();
            if !rest.is_empty() {
                queue = DeliveryQueue::shuffled(rest, rng);
                let need = desired - drawn.len();
                drawn.extend(queue.draw(need));
            }
        }

        self.store.save_queue(&queue)?;

        let mut taken: HashSet<String> = drawn.iter().cloned().collect();
        let mut questions: Vec<Question> = drawn
            .iter()
            .filter_map(|id| by_id.get(id).map(|q| (*q).clone()))
            .collect();

        if questions.len() < desired {
            let mut fill = already;
            fill.shuffle(rng);
            for id in fill {
                if questions.len() >= desired {
                    break;
                }
                if taken.insert(id.clone()) {
                    if let Some(q) = by_id.get(&id) {
                        questions.push((*q).clone());
                    }
                }
            }
        }

        tracing::debug!(
            desired,
            drawn = questions.len(),
            remaining_unseen,
            queue_len = queue.len(),
            cursor = queue.cursor,
            "built exam"
        );

        Ok(Exam {
            questions,
            remaining_unseen,
        })
    }
}
