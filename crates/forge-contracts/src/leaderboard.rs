use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_LEADERBOARD_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponSummary {
    pub name: String,
    pub grade: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    #[serde(alias = "player_name")]
    pub player_name: String,
    #[serde(alias = "combat_power")]
    pub combat_power: u64,
    #[serde(default, alias = "survival_time")]
    pub survival_time: u64,
    #[serde(default, alias = "kill_count")]
    pub kill_count: u64,
    #[serde(default)]
    pub weapons: Vec<WeaponSummary>,
}

pub trait LeaderboardStore {
    /// Records an entry; returns its 1-based rank, or `None` when it did not
    /// make the board.
    fn submit(&mut self, entry: LeaderboardEntry) -> Option<usize>;

    fn top(&self, limit: usize) -> Vec<LeaderboardEntry>;
}

/// Top-K board ordered by combat power, earlier submissions first on ties.
#[derive(Debug, Clone)]
pub struct BoundedLeaderboard {
    capacity: usize,
    entries: Vec<LeaderboardEntry>,
}

impl Default for BoundedLeaderboard {
    fn default() -> Self {
        Self::new(DEFAULT_LEADERBOARD_CAPACITY)
    }
}

impl BoundedLeaderboard {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Loads a saved board. A missing file is an empty board; rows that do
    /// not parse are skipped.
    pub fn load(path: &Path, capacity: usize) -> anyhow::Result<Self> {
        let mut board = Self::new(capacity);
        if !path.exists() {
            return Ok(board);
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read leaderboard {}", path.display()))?;
        let parsed: Value = serde_json::from_str(&raw)
            .with_context(|| format!("leaderboard {} is not JSON", path.display()))?;
        let rows = match parsed {
            Value::Array(rows) => rows,
            Value::Object(mut obj) => match obj.remove("entries") {
                Some(Value::Array(rows)) => rows,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        for row in rows {
            if let Ok(entry) = serde_json::from_value::<LeaderboardEntry>(row) {
                board.submit(entry);
            }
        }
        Ok(board)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&self.entries)?)
            .with_context(|| format!("failed to write leaderboard {}", path.display()))?;
        Ok(())
    }
}

impl LeaderboardStore for BoundedLeaderboard {
    fn submit(&mut self, entry: LeaderboardEntry) -> Option<usize> {
        // First slot with strictly lower power, so ties stay behind earlier rows.
        let index = self
            .entries
            .iter()
            .position(|existing| existing.combat_power < entry.combat_power)
            .unwrap_or(self.entries.len());
        if index >= self.capacity {
            return None;
        }
        self.entries.insert(index, entry);
        self.entries.truncate(self.capacity);
        Some(index + 1)
    }

    fn top(&self, limit: usize) -> Vec<LeaderboardEntry> {
        self.entries.iter().take(limit).cloned().collect()
    }
}
