use crate::error::StoreError;
use crate::history::HistoryRecord;
use crate::question::Question;
use crate::scheduler::Scheduler;
use crate::session::{AnswerOutcome, SessionConfig, SessionState};
use crate::store::KvStore;
use chrono::{DateTime, Local, Utc};
use rand::Rng;
use std::collections::BTreeSet;

/// Drives one attempt at a time and keeps its snapshot in sync.
///
/// Every answer or navigation change writes the snapshot before returning, so
/// a crash at any point leaves a resumable attempt behind. Clock ticks are
/// only written when they lock the attempt.
#[derive(Debug)]
pub struct Quiz<S: KvStore> {
    scheduler: Scheduler<S>,
    state: Option<SessionState>,
}

impl<S: KvStore> Quiz<S> {
    pub fn new(scheduler: Scheduler<S>) -> Self {
        Self {
            scheduler,
            state: None,
        }
    }

    pub fn scheduler(&self) -> &Scheduler<S> {
        &self.scheduler
    }

    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    /// A persisted attempt that could be resumed. Loading does not resume it.
    pub fn pending_snapshot(&self) -> Option<SessionState> {
        self.scheduler.store().load_snapshot()
    }

    /// Throw away any earlier attempt and build a new exam from `pool`
    pub fn start<R: Rng + ?Sized>(
        &mut self,
        pool: &[Question],
        config: &SessionConfig,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<&SessionState, StoreError> {
        self.scheduler.store().clear_snapshot()?;
        self.state = None;

        let exam = self
            .scheduler
            .build_exam(pool, config.desired_count, rng)?;
        tracing::info!(
            questions = exam.questions.len(),
            remaining_unseen = exam.remaining_unseen,
            topic = config.topic.as_deref().unwrap_or("all"),
            "starting attempt"
        );

        let state = SessionState::new(exam.questions, config, now);
        self.scheduler.store().save_snapshot(&state)?;
        Ok(&*self.state.insert(state))
    }

    /// Restore a previously persisted attempt verbatim
    pub fn resume(&mut self, state: SessionState) -> &SessionState {
        tracing::info!(
            index = state.index,
            questions = state.exam.len(),
            "resuming attempt"
        );
        self.state.insert(state)
    }

    /// Resume whatever snapshot is on disk, if any
    pub fn resume_pending(&mut self) -> Option<&SessionState> {
        let state = self.pending_snapshot()?;
        Some(self.resume(state))
    }

    pub fn toggle_option(&mut self, option: usize) -> Result<bool, StoreError> {
        self.update(|s| s.toggle_option(option))
    }

    pub fn set_selection(&mut self, options: BTreeSet<usize>) -> Result<bool, StoreError> {
        self.update(|s| s.set_selection(options))
    }

    pub fn submit(&mut self) -> Result<Option<AnswerOutcome>, StoreError> {
        let outcome = self.state.as_mut().and_then(SessionState::submit);
        if outcome.is_some() {
            self.persist()?;
        }
        Ok(outcome)
    }

    pub fn advance(&mut self) -> Result<bool, StoreError> {
        self.update(SessionState::advance)
    }

    /// Refresh the clock. Only the time-up lock is persisted; the countdown
    /// itself is recomputed from `started_at` after a resume.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let Some(state) = self.state.as_mut() else {
            return Ok(false);
        };
        let was_locked = state.locked;
        let changed = state.tick(now);
        if state.locked && !was_locked {
            self.persist()?;
        }
        Ok(changed)
    }

    /// Drop the attempt without recording anything
    pub fn abandon(&mut self) -> Result<(), StoreError> {
        if self.state.take().is_some() {
            tracing::info!("attempt abandoned");
        }
        self.scheduler.store().clear_snapshot()
    }

    /// Close the attempt: mark its questions seen, append a history record
    /// and clear the snapshot. Returns `None` when no attempt is active. On a
    /// failed write the attempt stays active and its snapshot stays on disk.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<Option<HistoryRecord>, StoreError> {
        let Some(state) = self.state.take() else {
            return Ok(None);
        };

        match self.close(&state, now) {
            Ok(record) => {
                tracing::info!(
                    attempted = record.attempted,
                    correct = record.correct,
                    score_pct = record.score_pct,
                    "attempt finished"
                );
                Ok(Some(record))
            }
            Err(err) => {
                tracing::warn!(%err, "failed to close attempt, keeping it resumable");
                self.state = Some(state);
                Err(err)
            }
        }
    }

    fn close(&self, state: &SessionState, now: DateTime<Utc>) -> Result<HistoryRecord, StoreError> {
        self.scheduler.mark_seen(&state.exam)?;

        let record = HistoryRecord::new(
            now.with_timezone(&Local),
            state.attempted,
            state.correct,
            state.elapsed_secs(now),
            state.exam.len(),
        );
        self.scheduler.store().append_history(record.clone())?;
        self.scheduler.store().clear_snapshot()?;
        Ok(record)
    }

    fn update<F>(&mut self, f: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut SessionState) -> bool,
    {
        let changed = self.state.as_mut().map(f).unwrap_or(false);
        if changed {
            self.persist()?;
        }
        Ok(changed)
    }

    fn persist(&self) -> Result<(), StoreError> {
        match &self.state {
            Some(state) => self.scheduler.store().save_snapshot(state),
            None => Ok(()),
        }
    }
}
