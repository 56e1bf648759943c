//! Multi-select set of games and its on-disk persistence.

use std::{
    collections::HashSet,
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tracing::debug;

use crate::models::ProcessedGame;

/// Glyph used in summaries for games without a region tag.
const WORLD_GLYPH: &str = "🌍";

/// Display names picked by the user, in the order they were picked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    names: Vec<String>,
}

impl SelectionSet {
    /// Rebuild from a persisted list, dropping duplicates.
    pub fn from_names(names: Vec<String>) -> Self {
        let mut seen = HashSet::new();
        let names = names
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .collect();
        Self { names }
    }

    /// Whether `name` is selected.
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|candidate| candidate == name)
    }

    /// Add `name` if absent, remove it if present. Returns the new membership.
    pub fn toggle(&mut self, name: &str) -> bool {
        if let Some(pos) = self.names.iter().position(|candidate| candidate == name) {
            self.names.remove(pos);
            false
        } else {
            self.names.push(name.to_string());
            true
        }
    }

    /// Drop every selection.
    pub fn clear(&mut self) {
        self.names.clear();
    }

    /// Number of selected names, including ones not in the current list.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Selected names in pick order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Selected games present in `games`, in list order.
    pub fn selected_games<'a>(&self, games: &'a [ProcessedGame]) -> Vec<&'a ProcessedGame> {
        let lookup: HashSet<&str> = self.names.iter().map(String::as_str).collect();
        games
            .iter()
            .filter(|game| lookup.contains(game.display_name.as_str()))
            .collect()
    }

    /// Sum of sizes over every game in `games` whose name is selected.
    pub fn total_size(&self, games: &[ProcessedGame]) -> f64 {
        self.selected_games(games)
            .into_iter()
            .map(ProcessedGame::size_gb)
            .sum()
    }
}

/// Two-decimal rendering used for totals.
pub fn format_gb(value: f64) -> String {
    format!("{value:.2}")
}

/// Price for a selection of `count` games: 10 each up to three, 5 for every extra.
pub fn price_quote(count: usize) -> u32 {
    let count = count as u32;
    match count {
        0 => 0,
        1..=3 => count * 10,
        _ => 30 + (count - 3) * 5,
    }
}

/// Plain-text list of the selection suitable for sharing.
pub fn summary_text(selection: &SelectionSet, games: &[ProcessedGame]) -> String {
    let selected = selection.selected_games(games);
    let total = format_gb(selection.total_size(games));
    let count = selection.len();
    let noun = if count == 1 { "game" } else { "games" };

    let mut text = String::new();
    let _ = writeln!(text, "PS2 GAME LIST");
    let _ = writeln!(text, "Total: {count} {noun}");
    let _ = writeln!(text, "Size: {total} GB");
    let _ = writeln!(text);
    for (index, game) in selected.iter().enumerate() {
        let flag = match game.flag() {
            "" => WORLD_GLYPH,
            flag => flag,
        };
        let _ = writeln!(text, "{flag} {:02}. {}", index + 1, game.display_name);
    }
    text
}

/// Persists the selection as a JSON list of names.
#[derive(Debug, Clone)]
pub struct SelectionStore {
    path: PathBuf,
}

impl SelectionStore {
    /// Store backed by the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Restore the saved selection; a missing file yields an empty set.
    pub fn load(&self) -> Result<SelectionSet> {
        if !self.path.exists() {
            return Ok(SelectionSet::default());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read selection {}", self.path.display()))?;
        let names: Vec<String> = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse selection {}", self.path.display()))?;
        debug!(count = names.len(), "Selection restored");
        Ok(SelectionSet::from_names(names))
    }

    /// Write the selection, creating parent directories if needed.
    pub fn save(&self, selection: &SelectionSet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let serialized =
            serde_json::to_string(selection.names()).context("failed to serialize selection")?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("failed to write selection {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GameRecord;
    use tempfile::tempdir;

    fn game(name: &str, size_gb: f64) -> ProcessedGame {
        ProcessedGame::bundled(GameRecord {
            name: name.to_string(),
            size_gb,
            codes: Vec::new(),
            description: None,
            cover_url: None,
        })
    }

    #[test]
    fn toggle_is_involutive() {
        let mut selection = SelectionSet::from_names(vec!["A".to_string()]);
        let before = selection.clone();
        assert!(selection.toggle("B"));
        assert!(!selection.toggle("B"));
        assert_eq!(selection, before);
        assert!(!selection.toggle("A"));
        assert!(selection.toggle("A"));
        assert_eq!(selection, before);
    }

    #[test]
    fn totals_count_only_listed_games() {
        let games = vec![game("A", 4.0), game("B (BR)", 1.2), game("C", 9.0)];
        let selection =
            SelectionSet::from_names(vec!["A".into(), "B".into(), "Missing".into()]);
        assert_eq!(format_gb(selection.total_size(&games)), "5.20");
        assert_eq!(selection.len(), 3);
        assert_eq!(selection.selected_games(&games).len(), 2);
    }

    #[test]
    fn duplicates_are_dropped_on_restore() {
        let selection = SelectionSet::from_names(vec!["A".into(), "A".into(), "B".into()]);
        assert_eq!(selection.names(), &["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn prices_follow_tiers() {
        assert_eq!(price_quote(0), 0);
        assert_eq!(price_quote(1), 10);
        assert_eq!(price_quote(3), 30);
        assert_eq!(price_quote(4), 35);
        assert_eq!(price_quote(10), 65);
    }

    #[test]
    fn summary_lists_selected_games() {
        let games = vec![game("Okami (USA)", 3.9), game("Ico", 0.6)];
        let selection = SelectionSet::from_names(vec!["Ico".into(), "Okami".into()]);
        let text = summary_text(&selection, &games);
        assert!(text.contains("Total: 2 games"));
        assert!(text.contains("Size: 4.50 GB"));
        assert!(text.contains("🇺🇸 01. Okami"));
        assert!(text.contains("🌍 02. Ico"));
    }

    #[test]
    fn store_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let store = SelectionStore::new(dir.path().join("nested").join("selected.json"));
        assert!(store.load()?.is_empty());

        let mut selection = SelectionSet::default();
        selection.toggle("God of War");
        selection.toggle("Okami");
        store.save(&selection)?;

        let raw = fs::read_to_string(store.path())?;
        assert_eq!(raw, r#"["God of War","Okami"]"#);
        assert_eq!(store.load()?, selection);
        Ok(())
    }
}
