use chrono::{DateTime, Local};
use csv::{QuoteStyle, WriterBuilder};
use serde::{Deserialize, Serialize};

/// Maximum number of results kept, newest first
pub const HISTORY_CAP: usize = 200;

pub const CSV_HEADER: &str = "timestamp,attempted,correct,score_pct,duration_sec,total_questions";

/// One finished attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: String,
    pub attempted: usize,
    pub correct: usize,
    pub score_pct: f64,
    pub duration_sec: u64,
    pub total_questions: usize,
}

impl HistoryRecord {
    pub fn new(
        finished_at: DateTime<Local>,
        attempted: usize,
        correct: usize,
        duration_sec: u64,
        total_questions: usize,
    ) -> Self {
        Self {
            timestamp: finished_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            attempted,
            correct,
            score_pct: round2(score_pct(correct, attempted)),
            duration_sec,
            total_questions,
        }
    }
}

pub fn score_pct(correct: usize, attempted: usize) -> f64 {
    if attempted == 0 {
        0.0
    } else {
        correct as f64 / attempted as f64 * 100.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Prepend and evict the oldest entries past [`HISTORY_CAP`]
pub fn push_capped(records: &mut Vec<HistoryRecord>, record: HistoryRecord) {
    records.insert(0, record);
    records.truncate(HISTORY_CAP);
}

/// Render records as CSV: a bare header line, then one fully quoted line per
/// record, newline separated with no trailing newline.
pub fn export_csv(records: &[HistoryRecord]) -> String {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for r in records {
        let row = [
            r.timestamp.clone(),
            r.attempted.to_string(),
            r.correct.to_string(),
            r.score_pct.to_string(),
            r.duration_sec.to_string(),
            r.total_questions.to_string(),
        ];
        if let Err(err) = writer.write_record(&row) {
            tracing::warn!(%err, "skipping history row");
        }
    }

    let body = writer
        .into_inner()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default();

    let mut out = String::from(CSV_HEADER);
    let body = body.trim_end_matches('\n');
    if !body.is_empty() {
        out.push('\n');
        out.push_str(body);
    }
    out
}
