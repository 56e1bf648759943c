//! Game catalog: bundled dataset, remote merge, search and paging.

/// Raw name normalisation and region flags.
pub mod format;
/// Incremental prefix window over the filtered list.
pub mod pagination;
/// Substring search and input debouncing.
pub mod search;

use std::{cmp::Ordering, fs, path::Path, sync::Arc};

use anyhow::{Context, Result};
use parking_lot::RwLock;
use tracing::debug;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::models::{GameRecord, ProcessedGame, RemoteGame};

pub use format::{format_name, Region};
pub use pagination::PageWindow;
pub use search::Debouncer;

const BUNDLED_CATALOG: &str = include_str!("../../data/roms_ps2.json");

/// Parse the catalog compiled into the crate.
pub fn bundled_records() -> Result<Vec<GameRecord>> {
    serde_json::from_str(BUNDLED_CATALOG).context("failed to parse bundled catalog")
}

/// Read a catalog JSON array from disk.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<GameRecord>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse catalog {}", path.display()))
}

/// Thread-safe merge of the bundled and remote game lists.
#[derive(Clone)]
pub struct GameLibrary {
    inner: Arc<RwLock<Inner>>,
}

struct Inner {
    bundled: Vec<ProcessedGame>,
    remote: Vec<RemoteGame>,
    cache: Option<Vec<ProcessedGame>>,
}

impl GameLibrary {
    /// Build a library from bundled records; the remote side starts empty.
    pub fn new(bundled: Vec<GameRecord>) -> Self {
        let mut bundled: Vec<ProcessedGame> =
            bundled.into_iter().map(ProcessedGame::bundled).collect();
        bundled.sort_by(compare_games);
        Self {
            inner: Arc::new(RwLock::new(Inner {
                bundled,
                remote: Vec::new(),
                cache: None,
            })),
        }
    }

    /// Library seeded with the compiled-in catalog.
    pub fn from_bundled() -> Result<Self> {
        Ok(Self::new(bundled_records()?))
    }

    /// Replace the remote side, invalidating the merged list.
    pub fn set_remote(&self, games: Vec<RemoteGame>) {
        let mut inner = self.inner.write();
        debug!(count = games.len(), "Remote games replaced");
        inner.remote = games;
        inner.cache = None;
    }

    /// Number of bundled games.
    pub fn bundled_len(&self) -> usize {
        self.inner.read().bundled.len()
    }

    /// The merged list, sorted by name, computed once per remote update.
    pub fn games(&self) -> Vec<ProcessedGame> {
        if let Some(cache) = self.inner.read().cache.as_ref() {
            return cache.clone();
        }

        let mut inner = self.inner.write();
        if inner.cache.is_none() {
            let mut merged = inner.bundled.clone();
            merged.extend(inner.remote.iter().cloned().map(ProcessedGame::remote));
            merged.sort_by(compare_games);
            inner.cache = Some(merged);
        }
        inner.cache.clone().unwrap_or_default()
    }
}

/// Order games by raw name ignoring case and accents, falling back to the exact name.
pub fn compare_games(a: &ProcessedGame, b: &ProcessedGame) -> Ordering {
    collation_key(&a.record.name)
        .cmp(&collation_key(&b.record.name))
        .then_with(|| a.record.name.cmp(&b.record.name))
}

/// Case- and accent-folded form of a name used for sorting.
pub fn collation_key(name: &str) -> String {
    name.nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GameSource;
    use tempfile::tempdir;

    fn record(name: &str, size_gb: f64) -> GameRecord {
        GameRecord {
            name: name.to_string(),
            size_gb,
            codes: Vec::new(),
            description: None,
            cover_url: None,
        }
    }

    #[test]
    fn bundled_catalog_parses() -> Result<()> {
        let records = bundled_records()?;
        assert!(!records.is_empty());
        assert!(records.iter().all(|record| record.size_gb > 0.0));
        Ok(())
    }

    #[test]
    fn merges_and_sorts_both_sources() {
        let library = GameLibrary::new(vec![record("Zone of the Enders", 2.0), record("ábaco", 1.0)]);
        library.set_remote(vec![RemoteGame {
            id: "r1".to_string(),
            record: record("Burnout 3 (USA).iso", 3.0),
        }]);

        let games = library.games();
        let names: Vec<_> = games.iter().map(|game| game.display_name.as_str()).collect();
        assert_eq!(names, vec!["ábaco", "Burnout 3", "Zone of the Enders"]);
        assert_eq!(games[1].source, GameSource::Remote);
        assert_eq!(library.bundled_len(), 2);

        library.set_remote(Vec::new());
        assert_eq!(library.games().len(), 2);
    }

    #[test]
    fn loads_catalog_from_disk() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("catalog.json");
        fs::write(
            &path,
            r#"[{"nome":"Okami (USA).iso","tamanho_gb":3.9,"codigos":["SLUS-21115"]}]"#,
        )?;
        let records = load_records(&path)?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].codes, vec!["SLUS-21115".to_string()]);
        assert!(load_records(dir.path().join("missing.json")).is_err());
        Ok(())
    }

    #[test]
    fn collation_ignores_case_and_accents() {
        assert_eq!(collation_key("Ação"), "acao");
        assert_eq!(collation_key("ÉPICO"), "epico");
        assert_eq!(collation_key("Ōkami"), "okami");
        assert_eq!(collation_key("Poke\u{301}mon"), "pokemon");
    }

    #[test]
    fn accented_names_sort_with_their_base_letter() {
        let library = GameLibrary::new(vec![
            record("Zone of the Enders", 2.0),
            record("Ōkami", 3.9),
            record("Poke\u{301}mon Decomposed", 1.0),
            record("Pokemon Plain", 1.0),
            record("Ys", 0.5),
            record("Ÿs Ultimate", 0.5),
        ]);
        let games = library.games();
        let names: Vec<&str> = games.iter().map(|game| game.display_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Ōkami",
                "Poke\u{301}mon Decomposed",
                "Pokemon Plain",
                "Ys",
                "Ÿs Ultimate",
                "Zone of the Enders",
            ]
        );
    }
}
