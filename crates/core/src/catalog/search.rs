use std::time::{Duration, Instant};

use crate::models::ProcessedGame;

/// Normalise a query the way it is matched: trimmed and lower-cased.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Whether a game matches an already normalised needle.
pub fn matches(game: &ProcessedGame, needle: &str) -> bool {
    needle.is_empty() || game.search_key.contains(needle)
}

/// Indices of the games whose search key contains the query.
pub fn filter_indices(games: &[ProcessedGame], query: &str) -> Vec<usize> {
    let needle = normalize_query(query);
    games
        .iter()
        .enumerate()
        .filter(|(_, game)| matches(game, &needle))
        .map(|(idx, _)| idx)
        .collect()
}

/// Holds raw search input until it has been stable for the configured delay.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<(String, Instant)>,
}

impl Debouncer {
    /// Create a debouncer with the given quiet period.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Record new input at `now`, restarting the quiet period.
    pub fn input(&mut self, value: impl Into<String>, now: Instant) {
        self.pending = Some((value.into(), now + self.delay));
    }

    /// Return the trimmed input once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        match &self.pending {
            Some((_, deadline)) if now >= *deadline => self
                .pending
                .take()
                .map(|(value, _)| value.trim().to_string()),
            _ => None,
        }
    }

    /// Apply pending input immediately.
    pub fn flush(&mut self) -> Option<String> {
        self.pending
            .take()
            .map(|(value, _)| value.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GameRecord;

    fn games(names: &[&str]) -> Vec<ProcessedGame> {
        names
            .iter()
            .map(|name| {
                ProcessedGame::bundled(GameRecord {
                    name: name.to_string(),
                    size_gb: 1.0,
                    codes: Vec::new(),
                    description: None,
                    cover_url: None,
                })
            })
            .collect()
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let list = games(&["Gran Turismo 4 (USA)", "Grand Theft Auto (BR)", "Okami"]);
        let hits: Vec<_> = filter_indices(&list, "  GRAN ")
            .into_iter()
            .map(|idx| list[idx].display_name.as_str())
            .collect();
        assert_eq!(hits, vec!["Gran Turismo 4", "Grand Theft Auto"]);
        assert_eq!(filter_indices(&list, "").len(), 3);
        // Region tags are not part of the search key.
        assert!(filter_indices(&list, "usa").is_empty());
    }

    #[test]
    fn filtering_is_idempotent() {
        let list = games(&["Tekken 5", "Tekken Tag", "Soulcalibur III"]);
        let once: Vec<ProcessedGame> = filter_indices(&list, "tekken")
            .into_iter()
            .map(|idx| list[idx].clone())
            .collect();
        let twice: Vec<ProcessedGame> = filter_indices(&once, "tekken")
            .into_iter()
            .map(|idx| once[idx].clone())
            .collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn debouncer_waits_for_quiet_period() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(200));
        debouncer.input("m", start);
        debouncer.input("metal ", start + Duration::from_millis(150));
        assert_eq!(debouncer.poll(start + Duration::from_millis(300)), None);
        assert_eq!(
            debouncer.poll(start + Duration::from_millis(350)).as_deref(),
            Some("metal")
        );
        assert_eq!(debouncer.poll(start + Duration::from_millis(900)), None);
    }
}
