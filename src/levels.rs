use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sparse histogram of engagement level to the number of times it was reached.
///
/// Levels are only stored once reached, so every key and count is at least 1
/// and an empty histogram means "no signal" rather than zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementResult {
    levels: BTreeMap<u32, u32>,
}

impl EngagementResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increase(&mut self, level: u32) {
        self.increase_by(level, 1);
    }

    pub fn increase_by(&mut self, level: u32, amount: u32) {
        if level == 0 || amount == 0 {
            return;
        }
        *self.levels.entry(level).or_insert(0) += amount;
    }

    pub fn merge(&mut self, other: &EngagementResult) {
        for (&level, &count) in &other.levels {
            self.increase_by(level, count);
        }
    }

    pub fn level(&self, level: u32) -> u32 {
        self.levels.get(&level).copied().unwrap_or(0)
    }

    pub fn l1(&self) -> u32 {
        self.level(1)
    }

    pub fn l2(&self) -> u32 {
        self.level(2)
    }

    pub fn l3(&self) -> u32 {
        self.level(3)
    }

    pub fn l4_up(&self) -> u32 {
        self.levels.range(4..).map(|(_, &count)| count).sum()
    }

    pub fn total(&self) -> u32 {
        self.levels.values().sum()
    }

    pub fn max(&self) -> Option<u32> {
        self.levels.keys().next_back().copied()
    }

    pub fn average(&self) -> Option<f64> {
        let count = self.total();
        if count == 0 {
            return None;
        }
        let sum: u64 = self
            .levels
            .iter()
            .map(|(&level, &count)| u64::from(level) * u64::from(count))
            .sum();
        let mean = sum as f64 / f64::from(count);
        Some((mean * 100.0).round() / 100.0)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.levels.iter().map(|(&level, &count)| (level, count))
    }
}
