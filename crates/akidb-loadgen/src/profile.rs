//! Pressure levels and the profile table that resolves them
//!
//! A pressure level is a named intensity tier. The table maps each name to a
//! worker count and batch size, so new tiers can be added from configuration
//! without touching the scheduler or the worker pool.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Built-in intensity tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl PressureLevel {
    /// All built-in levels, lowest first.
    pub const ALL: [PressureLevel; 4] = [Self::Low, Self::Medium, Self::High, Self::Extreme];

    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Extreme => "extreme",
        }
    }

    /// Built-in (workers, batch size) for this level.
    #[must_use]
    pub const fn default_entry(&self) -> ProfileEntry {
        match self {
            Self::Low => ProfileEntry::new(5, 500),
            Self::Medium => ProfileEntry::new(20, 2_000),
            Self::High => ProfileEntry::new(50, 5_000),
            Self::Extreme => ProfileEntry::new(100, 10_000),
        }
    }
}

impl Default for PressureLevel {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for PressureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PressureLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "extreme" => Ok(Self::Extreme),
            _ => Err(()),
        }
    }
}

/// Worker count and batch size for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEntry {
    /// Number of concurrent workers.
    pub workers: usize,

    /// Vectors per insert batch.
    pub batch_size: usize,
}

impl ProfileEntry {
    #[must_use]
    pub const fn new(workers: usize, batch_size: usize) -> Self {
        Self {
            workers,
            batch_size,
        }
    }
}

/// Resolved intensity for a run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureProfile {
    /// Canonical name of the tier that was applied.
    pub level: String,

    /// Number of concurrent workers per phase.
    pub workers: usize,

    /// Vectors per insert batch (maximum batch when ramping).
    pub batch_size: usize,

    /// True when the requested level was unknown or absent and the default
    /// tier was used instead.
    pub defaulted: bool,
}

impl PressureProfile {
    /// Replaces the worker count and/or batch size. Values are clamped to 1.
    #[must_use]
    pub fn with_overrides(mut self, workers: Option<usize>, batch_size: Option<usize>) -> Self {
        if let Some(workers) = workers {
            self.workers = workers.max(1);
        }
        if let Some(batch_size) = batch_size {
            self.batch_size = batch_size.max(1);
        }
        self
    }

    /// Label used in reports, e.g. `"medium (default)"`.
    #[must_use]
    pub fn label(&self) -> String {
        if self.defaulted {
            format!("{} (default)", self.level)
        } else {
            self.level.clone()
        }
    }
}

/// Lookup table from tier name to profile entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileTable {
    entries: BTreeMap<String, ProfileEntry>,
}

impl Default for ProfileTable {
    fn default() -> Self {
        let entries = PressureLevel::ALL
            .iter()
            .map(|level| (level.as_str().to_string(), level.default_entry()))
            .collect();
        Self { entries }
    }
}

impl ProfileTable {
    /// Tier used when the requested name is unknown or absent.
    pub const DEFAULT_LEVEL: PressureLevel = PressureLevel::Medium;

    /// Empty table; [`resolve`](Self::resolve) still falls back to the
    /// built-in medium tier.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Adds or replaces a tier. The name is stored lowercase.
    pub fn insert(&mut self, name: &str, entry: ProfileEntry) {
        self.entries
            .insert(name.trim().to_ascii_lowercase(), entry);
    }

    /// Returns a copy of this table with `overrides` layered on top.
    #[must_use]
    pub fn merged_with(&self, overrides: &BTreeMap<String, ProfileEntry>) -> Self {
        let mut merged = self.clone();
        for (name, entry) in overrides {
            merged.insert(name, *entry);
        }
        merged
    }

    /// Looks up a tier by name (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ProfileEntry> {
        self.entries.get(&name.trim().to_ascii_lowercase())
    }

    /// Tier names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProfileEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Resolves a level name into a profile.
    ///
    /// Unknown or missing names resolve to the medium tier with
    /// `defaulted = true`; this never fails.
    #[must_use]
    pub fn resolve(&self, requested: Option<&str>) -> PressureProfile {
        if let Some(name) = requested {
            let key = name.trim().to_ascii_lowercase();
            if let Some(entry) = self.entries.get(&key) {
                return PressureProfile {
                    level: key,
                    workers: entry.workers,
                    batch_size: entry.batch_size,
                    defaulted: false,
                };
            }
            warn!(
                requested = %name,
                fallback = %Self::DEFAULT_LEVEL,
                "Unknown pressure level, using default"
            );
        }

        let fallback = Self::DEFAULT_LEVEL.as_str();
        let entry = self
            .entries
            .get(fallback)
            .copied()
            .unwrap_or_else(|| Self::DEFAULT_LEVEL.default_entry());

        PressureProfile {
            level: fallback.to_string(),
            workers: entry.workers,
            batch_size: entry.batch_size,
            defaulted: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_levels() {
        let table = ProfileTable::default();

        let low = table.resolve(Some("low"));
        assert_eq!((low.workers, low.batch_size), (5, 500));
        assert!(!low.defaulted);

        let extreme = table.resolve(Some("extreme"));
        assert_eq!((extreme.workers, extreme.batch_size), (100, 10_000));

        let high = table.resolve(Some("high"));
        assert_eq!((high.workers, high.batch_size), (50, 5_000));
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let table = ProfileTable::default();
        let profile = table.resolve(Some("  HiGh "));

        assert_eq!(profile.level, "high");
        assert!(!profile.defaulted);
    }

    #[test]
    fn test_unknown_level_defaults_to_medium() {
        let table = ProfileTable::default();

        let unknown = table.resolve(Some("ludicrous"));
        assert_eq!(unknown.level, "medium");
        assert_eq!((unknown.workers, unknown.batch_size), (20, 2_000));
        assert!(unknown.defaulted);
        assert_eq!(unknown.label(), "medium (default)");

        let absent = table.resolve(None);
        assert!(absent.defaulted);
        assert_eq!(absent.workers, 20);
    }

    #[test]
    fn test_custom_level_from_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert("Soak".to_string(), ProfileEntry::new(8, 250));
        overrides.insert("low".to_string(), ProfileEntry::new(2, 100));

        let table = ProfileTable::default().merged_with(&overrides);

        let soak = table.resolve(Some("soak"));
        assert_eq!((soak.workers, soak.batch_size), (8, 250));
        assert_eq!(table.resolve(Some("low")).workers, 2);
        assert_eq!(table.names().count(), 5);
    }

    #[test]
    fn test_empty_table_falls_back_to_builtin_medium() {
        let profile = ProfileTable::empty().resolve(Some("low"));
        assert!(profile.defaulted);
        assert_eq!((profile.workers, profile.batch_size), (20, 2_000));
    }

    #[test]
    fn test_explicit_overrides_are_clamped() {
        let profile = ProfileTable::default()
            .resolve(Some("low"))
            .with_overrides(Some(0), Some(64));

        assert_eq!(profile.workers, 1);
        assert_eq!(profile.batch_size, 64);
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!("EXTREME".parse::<PressureLevel>(), Ok(PressureLevel::Extreme));
        assert!("normal".parse::<PressureLevel>().is_err());
        assert_eq!(PressureLevel::default(), PressureLevel::Medium);
    }
}
