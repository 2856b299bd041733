use chrono::{Local, Utc};
use clap::Parser;
use cyclequiz::{
    app::{self, LoopExit},
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    runtime::{FixedTicker, Runner, StdinEventSource},
    BankSource, ProgressStore, Question, QuestionBank, Quiz, Scheduler, SqliteStore,
};
use std::{
    error::Error,
    fs,
    io::{self, Write},
    path::PathBuf,
    time::Duration,
};
use tracing_subscriber::EnvFilter;

const TICK_RATE_MS: u64 = 250;
const HISTORY_ROWS: usize = 8;

/// practice quizzes that cover the whole question bank before repeating
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Practice quizzes drawn from a static question bank. Every question is shown once, in shuffled order, before any question repeats. Unfinished attempts can be resumed and finished attempts are kept in a result history."
)]
pub struct Cli {
    /// number of questions per attempt
    #[clap(short = 'n', long)]
    count: Option<usize>,

    /// only ask questions from this topic
    #[clap(short = 't', long)]
    topic: Option<String>,

    /// question bank JSON file (defaults to the built-in bank)
    #[clap(short = 'b', long)]
    bank: Option<PathBuf>,

    /// time limit in minutes
    #[clap(short = 'm', long)]
    minutes: Option<u64>,

    /// directory holding the progress database
    #[clap(long)]
    state_dir: Option<PathBuf>,

    /// continue the unfinished attempt
    #[clap(long, conflicts_with = "fresh")]
    resume: bool,

    /// discard any unfinished attempt and start a new one
    #[clap(long)]
    fresh: bool,

    /// discard the unfinished attempt and exit
    #[clap(long)]
    abandon: bool,

    /// show how much of the pool has been seen
    #[clap(long)]
    coverage: bool,

    /// list topics in the bank
    #[clap(long)]
    topics: bool,

    /// show recent results
    #[clap(long)]
    history: bool,

    /// write the result history as CSV ("-" for stdout)
    #[clap(long, value_name = "PATH")]
    export: Option<PathBuf>,

    /// forget which questions were seen and start a new coverage cycle
    #[clap(long)]
    reset_progress: bool,

    /// store count, topic, minutes and bank as the new defaults
    #[clap(long)]
    save_defaults: bool,
}

impl Cli {
    /// Overlay command line flags on the stored defaults
    fn apply_to(&self, mut cfg: Config) -> Config {
        if let Some(count) = self.count {
            cfg.exam_size = count;
        }
        if let Some(topic) = &self.topic {
            cfg.topic = Some(topic.clone());
        }
        if let Some(minutes) = self.minutes {
            cfg.time_limit_mins = minutes;
        }
        if let Some(bank) = &self.bank {
            cfg.bank = Some(bank.clone());
        }
        cfg
    }

    fn db_path(&self) -> PathBuf {
        match &self.state_dir {
            Some(dir) => AppDirs::db_path_in(dir),
            None => AppDirs::db_path().unwrap_or_else(|| PathBuf::from("cyclequiz_progress.db")),
        }
    }
}

fn bank_source(cfg: &Config) -> BankSource {
    match &cfg.bank {
        Some(path) => BankSource::File(path.clone()),
        None => BankSource::default(),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();

    let config_store = FileConfigStore::new();
    let cfg = cli.apply_to(config_store.load());
    if cli.save_defaults {
        config_store.save(&cfg)?;
        println!("Defaults saved.");
    }

    let db_path = cli.db_path();
    tracing::debug!(path = %db_path.display(), "opening progress store");
    let store = ProgressStore::new(SqliteStore::open(&db_path)?);
    let mut quiz = Quiz::new(Scheduler::new(store));

    let bank = QuestionBank::load_or_empty(&bank_source(&cfg));
    let session_config = cfg.session_config();
    let pool = bank.pool(session_config.topic.as_deref());

    let mut stdout = io::stdout();
    if run_maintenance(&cli, &mut quiz, &bank, &pool, &mut stdout)? {
        return Ok(());
    }

    match quiz.pending_snapshot() {
        Some(snapshot) if cli.resume => {
            quiz.resume(snapshot);
        }
        Some(snapshot) if !cli.fresh => {
            writeln!(
                stdout,
                "An unfinished attempt from {} is saved (question {} of {}).",
                snapshot
                    .started_at
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M"),
                (snapshot.index + 1).min(snapshot.exam.len()),
                snapshot.exam.len()
            )?;
            writeln!(stdout, "Run with --resume to continue it, or --fresh to discard it.")?;
            return Ok(());
        }
        _ => {
            if cli.resume {
                writeln!(stdout, "No unfinished attempt; starting a new one.")?;
            }
            if pool.is_empty() {
                writeln!(stdout, "No questions loaded.")?;
                writeln!(stdout, "Make sure the bank file exists and is a JSON array of questions.")?;
                return Ok(());
            }
            quiz.start(&pool, &session_config, Utc::now(), &mut rand::thread_rng())?;
        }
    }

    let runner = Runner::new(
        StdinEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    if let LoopExit::Finished(_) = app::run_quiz(&mut quiz, &runner, &mut stdout, Utc::now)? {
        let coverage = quiz.scheduler().coverage(&pool);
        writeln!(
            stdout,
            "\nCoverage: {}/{} seen ({:.1}%). Re-run to continue the cycle.",
            coverage.seen,
            coverage.total,
            coverage.percent_seen()
        )?;
    }

    Ok(())
}

/// Handle the one-shot flags. Returns true when nothing else should run.
fn run_maintenance<W: Write>(
    cli: &Cli,
    quiz: &mut Quiz<SqliteStore>,
    bank: &QuestionBank,
    pool: &[Question],
    out: &mut W,
) -> Result<bool, Box<dyn Error>> {
    let mut handled = false;

    if cli.reset_progress {
        quiz.scheduler().reset_seen_progress()?;
        writeln!(out, "Seen progress cleared; every question is eligible again.")?;
        handled = true;
    }

    if cli.abandon {
        quiz.abandon()?;
        writeln!(out, "Unfinished attempt discarded.")?;
        handled = true;
    }

    if cli.coverage {
        let c = quiz.scheduler().coverage(pool);
        writeln!(
            out,
            "Coverage: {}/{} seen ({:.1}%), {} unseen",
            c.seen,
            c.total,
            c.percent_seen(),
            c.unseen
        )?;
        handled = true;
    }

    if cli.topics {
        for (topic, count) in bank.topics() {
            writeln!(out, "{topic:24} {count:4}")?;
        }
        handled = true;
    }

    if cli.history {
        let records = quiz.scheduler().store().load_history();
        if records.is_empty() {
            writeln!(out, "No attempts yet.")?;
        } else {
            writeln!(out, "{:20} {:>8} {:>9} {:>9}", "When", "Score", "Correct", "Duration")?;
            for r in records.iter().take(HISTORY_ROWS) {
                writeln!(
                    out,
                    "{:20} {:>7}% {:>9} {:>8}m",
                    r.timestamp,
                    r.score_pct,
                    format!("{}/{}", r.correct, r.attempted),
                    r.duration_sec / 60
                )?;
            }
        }
        handled = true;
    }

    if let Some(path) = &cli.export {
        let csv = quiz.scheduler().store().export_history();
        if path.as_os_str() == "-" {
            writeln!(out, "{csv}")?;
        } else {
            fs::write(path, csv)?;
            writeln!(out, "History written to {}", path.display())?;
        }
        handled = true;
    }

    Ok(handled)
}
