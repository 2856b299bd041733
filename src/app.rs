//! Line-oriented quiz loop. Reads answers from a [`Runner`], writes plain
//! text to any `Write`.

use crate::error::AppError;
use crate::history::{score_pct, HistoryRecord};
use crate::question::LETTERS;
use crate::quiz::Quiz;
use crate::runtime::{QuizEvent, QuizEventSource, Runner, Ticker};
use crate::session::SessionState;
use crate::store::KvStore;
use crate::util::{fmt_mmss, parse_answer};
use chrono::{DateTime, Utc};
use std::io::Write;

const RULE_WIDTH: usize = 70;

/// How the loop ended
#[derive(Debug, Clone, PartialEq)]
pub enum LoopExit {
    /// The attempt was closed and recorded
    Finished(HistoryRecord),
    /// The user paused or input closed; the snapshot stays for `--resume`
    Paused,
}

/// Run the active attempt of `quiz` until it is finished or paused.
///
/// Commands: letters answer the question, an empty line moves on after an
/// answer was shown, `s` skips, `p` pauses, `q` ends the attempt early.
pub fn run_quiz<S, E, T, W, C>(
    quiz: &mut Quiz<S>,
    runner: &Runner<E, T>,
    out: &mut W,
    now: C,
) -> Result<LoopExit, AppError>
where
    S: KvStore,
    E: QuizEventSource,
    T: Ticker,
    W: Write,
    C: Fn() -> DateTime<Utc>,
{
    let Some(state) = quiz.state() else {
        return Ok(LoopExit::Paused);
    };
    write_intro(out, state)?;

    quiz.tick(now())?;
    if let Some(state) = quiz.state().filter(|s| !s.is_done()) {
        write_question(out, state)?;
    }

    loop {
        if quiz.state().map_or(true, SessionState::is_done) {
            break;
        }

        match runner.step() {
            QuizEvent::Tick => {
                quiz.tick(now())?;
                if quiz.state().is_some_and(SessionState::is_time_up) {
                    writeln!(out, "\nTime is up!")?;
                }
            }
            QuizEvent::Eof => {
                writeln!(out, "\nInput closed. Attempt saved; continue with --resume.")?;
                return Ok(LoopExit::Paused);
            }
            QuizEvent::Line(line) => {
                quiz.tick(now())?;
                if quiz.state().is_some_and(SessionState::is_time_up) {
                    writeln!(out, "\nTime is up!")?;
                    break;
                }
                match handle_line(quiz, out, line.trim())? {
                    Flow::Continue => {}
                    Flow::Pause => {
                        writeln!(out, "Attempt saved; continue with --resume.")?;
                        return Ok(LoopExit::Paused);
                    }
                    Flow::Quit => {
                        writeln!(out, "\nEnding attempt early.")?;
                        break;
                    }
                }
            }
        }
    }

    let state = quiz.state().cloned();
    match quiz.finish(now())? {
        Some(record) => {
            if let Some(state) = state {
                write_results(out, &state)?;
            }
            Ok(LoopExit::Finished(record))
        }
        None => Ok(LoopExit::Paused),
    }
}

enum Flow {
    Continue,
    Pause,
    Quit,
}

fn handle_line<S: KvStore, W: Write>(
    quiz: &mut Quiz<S>,
    out: &mut W,
    line: &str,
) -> Result<Flow, AppError> {
    match line.to_lowercase().as_str() {
        "q" => return Ok(Flow::Quit),
        "p" => return Ok(Flow::Pause),
        _ => {}
    }

    let Some(state) = quiz.state() else {
        return Ok(Flow::Quit);
    };

    if state.locked {
        quiz.advance()?;
        show_next(quiz, out)?;
        return Ok(Flow::Continue);
    }

    if line.eq_ignore_ascii_case("s") {
        writeln!(out, "Skipped.")?;
        quiz.advance()?;
        show_next(quiz, out)?;
        return Ok(Flow::Continue);
    }

    let Some(question) = state.current() else {
        return Ok(Flow::Continue);
    };
    let Some(chosen) = parse_answer(line, question.is_multi_select(), question.options.len())
    else {
        writeln!(out, "Invalid input. Try again (e.g., A or A,C).")?;
        return Ok(Flow::Continue);
    };

    quiz.set_selection(chosen)?;
    if let Some(outcome) = quiz.submit()? {
        if let Some(state) = quiz.state() {
            write_feedback(out, state, outcome.correct)?;
        }
    }
    Ok(Flow::Continue)
}

fn show_next<S: KvStore, W: Write>(quiz: &Quiz<S>, out: &mut W) -> Result<(), AppError> {
    if let Some(state) = quiz.state().filter(|s| !s.is_done()) {
        write_question(out, state)?;
    }
    Ok(())
}

fn write_intro<W: Write>(out: &mut W, state: &SessionState) -> std::io::Result<()> {
    writeln!(out, "\nPractice Assessment")?;
    writeln!(out, "Questions: {}", state.exam.len())?;
    writeln!(out, "Time limit: {} minutes", state.time_limit_secs / 60)?;
    if let Some(topic) = &state.topic {
        writeln!(out, "Topic: {topic}")?;
    }
    writeln!(out, "Answer format: A / B / C / D (or A,C for multi-select).")?;
    writeln!(out, "Type 's' to skip, 'p' to pause, 'q' to finish early.")
}

pub fn write_question<W: Write>(out: &mut W, state: &SessionState) -> std::io::Result<()> {
    let Some(q) = state.current() else {
        return Ok(());
    };
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
    writeln!(
        out,
        "Q{}/{}  |  Topic: {}  |  Time left: {}  |  Score: {}/{}\n",
        state.index + 1,
        state.exam.len(),
        q.topic_label(),
        fmt_mmss(state.time_left_secs),
        state.correct,
        state.attempted
    )?;
    writeln!(out, "{}\n", q.prompt)?;
    for (letter, option) in LETTERS.chars().zip(&q.options) {
        writeln!(out, "  {letter}. {option}")?;
    }
    if q.is_multi_select() {
        writeln!(out, "\n(Select ALL that apply. Example: A,C)")
    } else {
        writeln!(out, "\n(Select ONE answer.)")
    }
}

fn write_feedback<W: Write>(out: &mut W, state: &SessionState, correct: bool) -> std::io::Result<()> {
    let Some(q) = state.current() else {
        return Ok(());
    };
    if correct {
        writeln!(out, "Correct!\n")?;
    } else {
        writeln!(out, "Incorrect. Correct answer: {}\n", q.correct_letters())?;
    }
    for (i, (letter, option)) in LETTERS.chars().zip(&q.options).enumerate() {
        let verdict = if q.correct.contains(&i) { "CORRECT" } else { "WRONG" };
        writeln!(out, "  {letter}. {option}\n     {verdict}: {}", q.explanation(i))?;
    }
    writeln!(out, "\n(Press Enter for the next question)")
}

pub fn write_results<W: Write>(out: &mut W, state: &SessionState) -> std::io::Result<()> {
    writeln!(out, "\n{}", "=".repeat(RULE_WIDTH))?;
    writeln!(out, "RESULTS")?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
    if state.attempted == 0 {
        return writeln!(out, "No questions attempted.");
    }

    writeln!(out, "Attempted: {}", state.attempted)?;
    writeln!(out, "Correct:   {}", state.correct)?;
    writeln!(
        out,
        "Score:     {:.1}%",
        score_pct(state.correct, state.attempted)
    )?;

    writeln!(out, "\nTopic breakdown:")?;
    for (topic, score) in state.breakdown_rows() {
        writeln!(
            out,
            "  {topic:18}  {:2}/{:2}  ({:5.1}%)",
            score.correct,
            score.attempted,
            score.percent()
        )?;
    }
    Ok(())
}
