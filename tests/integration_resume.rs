// Resume an attempt after the process goes away: the snapshot in the SQLite
// file must bring back the same exam order and position.

use std::collections::BTreeSet;

use chrono::{Duration, Utc};
use cyclequiz::{ProgressStore, Question, Quiz, Scheduler, SessionConfig, SqliteStore};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn pool() -> Vec<Question> {
    ["q1", "q2", "q3"]
        .iter()
        .map(|id| Question {
            id: Some(id.to_string()),
            topic: None,
            prompt: format!("what is {id}?"),
            options: vec!["this".into(), "that".into(), "neither".into()],
            correct: BTreeSet::from([0]),
            explanations: Default::default(),
        })
        .collect()
}

fn open_quiz(db: &std::path::Path) -> Quiz<SqliteStore> {
    let store = SqliteStore::open(db).unwrap();
    Quiz::new(Scheduler::new(ProgressStore::new(store)))
}

#[test]
fn resume_restores_index_and_order() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("progress.db");
    let start = Utc::now();
    let config = SessionConfig {
        desired_count: 3,
        topic: None,
        time_limit_secs: 600,
    };

    // First run: answer one question and move to the second
    let (order, selections) = {
        let mut quiz = open_quiz(&db);
        let mut rng = StdRng::seed_from_u64(21);
        quiz.start(&pool(), &config, start, &mut rng).unwrap();
        quiz.toggle_option(0).unwrap();
        quiz.submit().unwrap();
        quiz.advance().unwrap();
        quiz.toggle_option(2).unwrap();
        let state = quiz.state().unwrap();
        (state.exam.clone(), state.selections.clone())
    };

    // Second run: nothing active until the snapshot is resumed
    let mut quiz = open_quiz(&db);
    assert!(quiz.state().is_none());
    let state = quiz.resume_pending().unwrap().clone();

    assert_eq!(state.index, 1);
    assert_eq!(state.exam, order);
    assert_eq!(state.selections, selections);
    assert_eq!((state.correct, state.attempted), (1, 1));
    assert_eq!(state.started_at, start);
}

#[test]
fn resumed_clock_counts_time_spent_away() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("progress.db");
    let start = Utc::now();
    let config = SessionConfig {
        desired_count: 2,
        topic: None,
        time_limit_secs: 300,
    };

    {
        let mut quiz = open_quiz(&db);
        let mut rng = StdRng::seed_from_u64(4);
        quiz.start(&pool(), &config, start, &mut rng).unwrap();
    }

    let mut quiz = open_quiz(&db);
    quiz.resume_pending().unwrap();
    quiz.tick(start + Duration::seconds(120)).unwrap();
    assert_eq!(quiz.state().unwrap().time_left_secs, 180);

    quiz.tick(start + Duration::seconds(900)).unwrap();
    let state = quiz.state().unwrap();
    assert!(state.is_time_up());
    assert!(state.locked);
}

#[test]
fn finished_attempt_leaves_no_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("progress.db");
    let start = Utc::now();

    {
        let mut quiz = open_quiz(&db);
        let mut rng = StdRng::seed_from_u64(8);
        quiz.start(&pool(), &SessionConfig::default(), start, &mut rng)
            .unwrap();
        quiz.finish(start + Duration::seconds(30)).unwrap();
    }

    let quiz = open_quiz(&db);
    assert!(quiz.pending_snapshot().is_none());
    let history = quiz.scheduler().store().load_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].total_questions, 3);
    assert_eq!(quiz.scheduler().coverage(&pool()).seen, 3);
}
