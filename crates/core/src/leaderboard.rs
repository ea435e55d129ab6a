use std::cmp::Ordering;

use serde::Serialize;

use crate::model::{AttemptResult, ResultId};

/// Leaderboard order: higher score first, then earlier submission, then lower id.
///
/// The id step only matters for results stamped at the same instant and keeps
/// the order total.
#[must_use]
pub fn compare(a: &AttemptResult, b: &AttemptResult) -> Ordering {
    b.score()
        .cmp(&a.score())
        .then_with(|| a.submitted_at().cmp(&b.submitted_at()))
        .then_with(|| a.id().cmp(&b.id()))
}

/// Sort a snapshot of results into leaderboard order.
#[must_use]
pub fn rank(results: impl IntoIterator<Item = AttemptResult>) -> Vec<AttemptResult> {
    let mut ordered: Vec<AttemptResult> = results.into_iter().collect();
    ordered.sort_by(compare);
    ordered
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub position: usize,
    pub result: AttemptResult,
}

/// Ranked view over a snapshot of results for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Leaderboard {
    entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    #[must_use]
    pub fn rank(results: impl IntoIterator<Item = AttemptResult>) -> Self {
        let entries = rank(results)
            .into_iter()
            .enumerate()
            .map(|(idx, result)| LeaderboardEntry {
                position: idx + 1,
                result,
            })
            .collect();
        Self { entries }
    }

    /// Keep only the first `n` entries.
    #[must_use]
    pub fn top(mut self, n: usize) -> Self {
        self.entries.truncate(n);
        self
    }

    #[must_use]
    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of a specific result, if it made the board.
    #[must_use]
    pub fn position_of(&self, id: ResultId) -> Option<usize> {
        self.entries
            .iter()
            .find(|entry| entry.result.id() == id)
            .map(|entry| entry.position)
    }
}
