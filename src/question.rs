use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub const LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// A single multiple-choice question as it appears in the bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(
        default,
        deserialize_with = "deserialize_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct: BTreeSet<usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub explanations: BTreeMap<usize, String>,
}

impl Question {
    /// Stable identity, see [`resolve_id`].
    pub fn resolved_id(&self) -> String {
        resolve_id(self)
    }

    pub fn is_multi_select(&self) -> bool {
        self.correct.len() > 1
    }

    pub fn topic_label(&self) -> &str {
        match self.topic.as_deref() {
            Some(topic) if !topic.is_empty() => topic,
            _ => "General",
        }
    }

    pub fn explanation(&self, option: usize) -> &str {
        self.explanations
            .get(&option)
            .map(String::as_str)
            .unwrap_or("No explanation provided.")
    }

    /// Exact match against the correct set; partial credit does not exist.
    pub fn is_correct(&self, selected: &BTreeSet<usize>) -> bool {
        !selected.is_empty() && *selected == self.correct
    }

    pub fn correct_letters(&self) -> String {
        letters_for(&self.correct)
    }
}

/// Derive the stable id of a question.
///
/// An explicit id wins verbatim. Otherwise the id is a 32-bit FNV-1a hash of
/// the JSON-encoded `[topic, prompt, options]` tuple, rendered as `q_<hex>`.
/// Distinct questions may collide; nothing detects that.
pub fn resolve_id(question: &Question) -> String {
    if let Some(id) = &question.id {
        return id.clone();
    }

    let topic = question.topic.as_deref().unwrap_or("");
    let serialized =
        serde_json::to_string(&(topic, &question.prompt, &question.options)).unwrap_or_default();

    format!("q_{:x}", fnv1a_32(serialized.as_bytes()))
}

pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

pub fn letters_for(indices: &BTreeSet<usize>) -> String {
    indices
        .iter()
        .filter_map(|i| LETTERS.chars().nth(*i))
        .map(String::from)
        .collect::<Vec<_>>()
        .join(",")
}

// Bank files carry ids as strings or bare numbers.
fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
