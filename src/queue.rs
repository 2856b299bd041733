use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Persisted no-repeat delivery order for currently unseen ids.
///
/// This is a scheduling artifact only. It is sanitized against the live pool
/// and seen set on every read and rebuilt whenever it runs dry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryQueue {
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default)]
    pub cursor: usize,
}

impl DeliveryQueue {
    /// Fisher-Yates permutation of `ids` with the cursor at the front
    pub fn shuffled<R: Rng + ?Sized>(mut ids: Vec<String>, rng: &mut R) -> Self {
        ids.shuffle(rng);
        Self {
            order: ids,
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Ids not yet handed out
    pub fn remaining(&self) -> usize {
        self.order.len().saturating_sub(self.cursor)
    }

    /// Drop ids that are no longer eligible, and duplicates.
    ///
    /// The cursor keeps pointing at the first undrawn id that survives, so ids
    /// already handed out are not served again from this queue.
    pub fn sanitize(&mut self, eligible: &HashSet<&str>) {
        let cursor = self.cursor.min(self.order.len());
        let mut kept = Vec::with_capacity(self.order.len());
        let mut unique = HashSet::new();
        let mut new_cursor = 0;

        for (pos, id) in self.order.drain(..).enumerate() {
            if !eligible.contains(id.as_str()) || !unique.insert(id.clone()) {
                continue;
            }
            if pos < cursor {
                new_cursor += 1;
            }
            kept.push(id);
        }

        self.order = kept;
        self.cursor = new_cursor;
    }

    /// Hand out up to `n` ids from the cursor and advance past them
    pub fn draw(&mut self, n: usize) -> Vec<String> {
        let start = self.cursor.min(self.order.len());
        let end = start + n.min(self.order.len() - start);
        self.cursor = end;
        self.order[start..end].to_vec()
    }
}
