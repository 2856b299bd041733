use std::sync::mpsc;
use std::time::Duration;

use chrono::Utc;
use cyclequiz::app::{run_quiz, LoopExit};
use cyclequiz::runtime::{FixedTicker, QuizEvent, Runner, TestEventSource};
use cyclequiz::{MemoryStore, ProgressStore, QuestionBank, Quiz, Scheduler, SessionConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;

const BANK: &str = r#"[
  {"id": "one", "topic": "Basics", "prompt": "Pick A", "options": ["A", "B"], "correct": [0]},
  {"id": "two", "topic": "Basics", "prompt": "Pick A and C", "options": ["A", "B", "C"], "correct": [0, 2]}
]"#;

fn runner(lines: &[&str]) -> Runner<TestEventSource, FixedTicker> {
    let (tx, rx) = mpsc::channel();
    for line in lines {
        tx.send(QuizEvent::Line(line.to_string())).unwrap();
    }
    tx.send(QuizEvent::Eof).unwrap();
    Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    )
}

// Headless integration: the full quiz loop without a terminal
#[test]
fn headless_attempt_runs_to_results() {
    // Arrange: a two-question bank loaded from JSON
    let bank = QuestionBank::from_json(BANK).unwrap();
    let pool = bank.pool(None);
    let mut quiz = Quiz::new(Scheduler::new(ProgressStore::new(MemoryStore::new())));
    let mut rng = StdRng::seed_from_u64(2);
    let config = SessionConfig {
        desired_count: 2,
        ..SessionConfig::default()
    };
    let order: Vec<String> = quiz
        .start(&pool, &config, Utc::now(), &mut rng)
        .unwrap()
        .exam
        .iter()
        .map(|q| q.prompt.clone())
        .collect();

    // Answer each question correctly in whatever order it was drawn
    let answers: Vec<&str> = order
        .iter()
        .flat_map(|prompt| {
            if prompt == "Pick A" {
                ["a", ""]
            } else {
                ["c, a", ""]
            }
        })
        .collect();

    // Act
    let mut out = Vec::new();
    let exit = run_quiz(&mut quiz, &runner(&answers), &mut out, Utc::now).unwrap();

    // Assert
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Q1/2"));
    assert!(text.contains("(Select ALL that apply. Example: A,C)"));
    assert!(text.contains("Score:     100.0%"));
    assert!(matches!(exit, LoopExit::Finished(ref r) if r.correct == 2 && r.attempted == 2));
    assert_eq!(quiz.scheduler().coverage(&pool).unseen, 0);
}

#[test]
fn headless_skip_then_pause_then_resume() {
    let bank = QuestionBank::from_json(BANK).unwrap();
    let pool = bank.pool(None);
    let mut quiz = Quiz::new(Scheduler::new(ProgressStore::new(MemoryStore::new())));
    let mut rng = StdRng::seed_from_u64(9);
    let config = SessionConfig {
        desired_count: 2,
        ..SessionConfig::default()
    };
    quiz.start(&pool, &config, Utc::now(), &mut rng).unwrap();

    let mut out = Vec::new();
    let exit = run_quiz(&mut quiz, &runner(&["s", "p"]), &mut out, Utc::now).unwrap();
    assert_eq!(exit, LoopExit::Paused);
    assert!(String::from_utf8(out).unwrap().contains("Skipped."));

    let snapshot = quiz.pending_snapshot().unwrap();
    assert_eq!(snapshot.index, 1);
    assert_eq!(snapshot.attempted, 0);

    quiz.resume(snapshot);
    let mut out = Vec::new();
    let exit = run_quiz(&mut quiz, &runner(&["q"]), &mut out, Utc::now).unwrap();
    assert!(matches!(exit, LoopExit::Finished(ref r) if r.attempted == 0));
    assert_eq!(quiz.scheduler().store().load_history().len(), 1);
}
