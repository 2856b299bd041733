use crate::error::BankError;
use crate::question::Question;
use include_dir::{include_dir, Dir};
use itertools::Itertools;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

static BANK_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/bank");

pub const DEFAULT_BANK: &str = "python";

/// Where the question bank comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankSource {
    Embedded(String),
    File(PathBuf),
}

impl Default for BankSource {
    fn default() -> Self {
        BankSource::Embedded(DEFAULT_BANK.to_string())
    }
}

/// The deduplicated bank. Order is the order of first appearance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionBank {
    pub questions: Vec<Question>,
}

impl QuestionBank {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions: dedupe_by_prompt(questions),
        }
    }

    pub fn load(source: &BankSource) -> Result<Self, BankError> {
        match source {
            BankSource::Embedded(name) => Self::embedded(name),
            BankSource::File(path) => Self::from_path(path),
        }
    }

    /// Load the bank, degrading to an empty one on any failure.
    pub fn load_or_empty(source: &BankSource) -> Self {
        match Self::load(source) {
            Ok(bank) => {
                tracing::debug!(questions = bank.len(), ?source, "loaded question bank");
                bank
            }
            Err(err) => {
                tracing::warn!(%err, ?source, "question bank unavailable, using an empty pool");
                Self::default()
            }
        }
    }

    pub fn embedded(name: &str) -> Result<Self, BankError> {
        let file_name = format!("{name}.json");
        let file = BANK_DIR
            .get_file(&file_name)
            .ok_or_else(|| BankError::MissingEmbedded(file_name.clone()))?;
        let text = file
            .contents_utf8()
            .ok_or_else(|| BankError::MissingEmbedded(file_name.clone()))?;
        Self::from_json(text)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, BankError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| BankError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse a JSON array of questions. Entries that are not objects, have no
    /// prompt, or do not decode are skipped one by one.
    pub fn from_json(text: &str) -> Result<Self, BankError> {
        let Value::Array(entries) = serde_json::from_str::<Value>(text)? else {
            return Err(BankError::NotAnArray);
        };
        let questions = entries
            .into_iter()
            .enumerate()
            .filter(|(_, entry)| has_prompt(entry))
            .filter_map(|(index, entry)| match serde_json::from_value::<Question>(entry) {
                Ok(question) => Some(question),
                Err(err) => {
                    tracing::warn!(index, %err, "skipping malformed question");
                    None
                }
            })
            .collect();
        Ok(Self::new(questions))
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Questions eligible for an exam. `None` or an empty topic means no filter.
    pub fn pool(&self, topic: Option<&str>) -> Vec<Question> {
        match topic.filter(|t| !t.is_empty()) {
            Some(topic) => self
                .questions
                .iter()
                .filter(|q| q.topic_label() == topic)
                .cloned()
                .collect(),
            None => self.questions.clone(),
        }
    }

    /// Topic labels with their question counts, alphabetically.
    pub fn topics(&self) -> Vec<(String, usize)> {
        self.questions
            .iter()
            .map(|q| q.topic_label().to_string())
            .counts()
            .into_iter()
            .sorted()
            .collect()
    }
}

fn has_prompt(entry: &Value) -> bool {
    entry
        .get("prompt")
        .and_then(Value::as_str)
        .is_some_and(|prompt| !prompt.is_empty())
}

/// Keep the first question for each prompt; drop prompt-less records.
pub fn dedupe_by_prompt(questions: Vec<Question>) -> Vec<Question> {
    let mut seen = HashSet::new();
    questions
        .into_iter()
        .filter(|q| !q.prompt.is_empty() && seen.insert(q.prompt.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::BTreeSet;

    fn q(prompt: &str, topic: Option<&str>) -> Question {
        Question {
            id: None,
            topic: topic.map(String::from),
            prompt: prompt.to_string(),
            options: vec!["a".to_string(), "b".to_string()],
            correct: BTreeSet::from([0]),
            explanations: Default::default(),
        }
    }

    #[test]
    fn test_embedded_bank_loads() {
        let bank = QuestionBank::embedded(DEFAULT_BANK).unwrap();
        assert!(!bank.is_empty());
        assert!(bank.questions.iter().all(|q| !q.options.is_empty()));
    }

    #[test]
    fn test_missing_embedded_bank() {
        assert_matches!(
            QuestionBank::embedded("klingon"),
            Err(BankError::MissingEmbedded(_))
        );
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let mut first = q("same", Some("A"));
        first.id = Some("first".to_string());
        let mut second = q("same", Some("B"));
        second.id = Some("second".to_string());

        let bank = QuestionBank::new(vec![first, q("other", None), second, q("", None)]);
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.questions[0].id.as_deref(), Some("first"));
        assert_eq!(bank.questions[1].prompt, "other");
    }

    #[test]
    fn test_pool_topic_filter() {
        let bank = QuestionBank::new(vec![
            q("one", Some("Basics")),
            q("two", Some("OOP")),
            q("three", None),
        ]);
        assert_eq!(bank.pool(None).len(), 3);
        assert_eq!(bank.pool(Some("")).len(), 3);
        assert_eq!(bank.pool(Some("OOP")).len(), 1);
        assert_eq!(bank.pool(Some("General"))[0].prompt, "three");
        assert!(bank.pool(Some("Nope")).is_empty());
    }

    #[test]
    fn test_topics_are_counted_and_sorted() {
        let bank = QuestionBank::new(vec![
            q("one", Some("OOP")),
            q("two", Some("Basics")),
            q("three", Some("OOP")),
        ]);
        assert_eq!(
            bank.topics(),
            vec![("Basics".to_string(), 1), ("OOP".to_string(), 2)]
        );
    }

    #[test]
    fn test_non_array_is_rejected() {
        assert_matches!(
            QuestionBank::from_json(r#"{"prompt": "x"}"#),
            Err(BankError::NotAnArray)
        );
        assert_matches!(QuestionBank::from_json("not json"), Err(BankError::Parse(_)));
    }

    #[test]
    fn test_bad_entries_are_skipped_individually() {
        let bank = QuestionBank::from_json(
            r#"[
                {"id": "a", "prompt": "kept", "options": ["x", "y"], "correct": [0]},
                {"id": "b", "prompt": null, "options": ["x"], "correct": [0]},
                null,
                "just text",
                {"prompt": ""},
                {"prompt": "bad options", "options": "x"}
            ]"#,
        )
        .unwrap();

        assert_eq!(bank.len(), 1);
        assert_eq!(bank.pool(None)[0].id.as_deref(), Some("a"));
    }

    #[test]
    fn test_load_or_empty_on_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questions.json");
        std::fs::write(&path, "[{").unwrap();
        let bank = QuestionBank::load_or_empty(&BankSource::File(path));
        assert!(bank.is_empty());

        let missing = QuestionBank::load_or_empty(&BankSource::File(dir.path().join("nope.json")));
        assert!(missing.is_empty());
    }
}
