//! Catalog screen state: merged list, search, paging, selection and capacity.
//!
//! Every derived value (filtered list, visible window, totals, view state)
//! is recomputed from the cells held here, so callers only ever mutate
//! through the methods below.

use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::{
    capacity::{CapacityEstimate, DriveCapacity},
    catalog::{search, Debouncer, GameLibrary, PageWindow},
    models::ProcessedGame,
    remote::SyncEvent,
    selection::{self, SelectionSet, SelectionStore},
};

/// State of the remote game list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    /// A fetch sequence is running.
    Loading {
        /// Retries already performed.
        retry: usize,
        /// Retries allowed.
        max_retries: usize,
    },
    /// The last fetch succeeded.
    Ready,
    /// Every retry failed.
    Failed(String),
}

/// What the list area should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserView {
    /// First attempt in flight.
    Loading,
    /// Reconnecting after failures.
    Retrying {
        /// Retry in progress.
        retry: usize,
        /// Retries allowed.
        max_retries: usize,
    },
    /// Fetch gave up; offer a manual retry.
    Error(String),
    /// The query matched nothing.
    NoMatches(String),
    /// Show the visible window.
    List,
}

/// Reactive state behind the catalog screen.
pub struct Browser {
    library: GameLibrary,
    games: Vec<ProcessedGame>,
    query_input: String,
    query: String,
    debouncer: Debouncer,
    filtered: Vec<usize>,
    window: PageWindow,
    selection: SelectionSet,
    selection_store: Option<SelectionStore>,
    capacity: Option<DriveCapacity>,
    remote: RemoteStatus,
    refreshing: bool,
}

impl Browser {
    /// Create state over `library`, waiting for the first remote fetch.
    pub fn new(library: GameLibrary, page_size: usize, debounce: Duration) -> Self {
        let games = library.games();
        let filtered = (0..games.len()).collect();
        Self {
            library,
            games,
            query_input: String::new(),
            query: String::new(),
            debouncer: Debouncer::new(debounce),
            filtered,
            window: PageWindow::new(page_size),
            selection: SelectionSet::default(),
            selection_store: None,
            capacity: None,
            remote: RemoteStatus::Loading {
                retry: 0,
                max_retries: 0,
            },
            refreshing: false,
        }
    }

    /// Restore the saved selection and persist future changes to `store`.
    ///
    /// The store stays attached when loading fails, so the next change
    /// replaces the unreadable file.
    pub fn attach_selection_store(&mut self, store: SelectionStore) -> Result<()> {
        let loaded = store.load();
        info!(path = %store.path().display(), "Selection store attached");
        self.selection_store = Some(store);
        self.selection = loaded?;
        info!(count = self.selection.len(), "Selection loaded");
        Ok(())
    }

    // ----- list -----

    /// The full merged list.
    pub fn games(&self) -> &[ProcessedGame] {
        &self.games
    }

    /// Number of games matching the applied query.
    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    /// Games matching the applied query.
    pub fn filtered(&self) -> Vec<&ProcessedGame> {
        self.filtered.iter().map(|idx| &self.games[*idx]).collect()
    }

    /// Number of games in the visible window.
    pub fn visible_len(&self) -> usize {
        self.window.visible_len(self.filtered.len())
    }

    /// The visible window of the filtered list.
    pub fn visible(&self) -> Vec<&ProcessedGame> {
        self.window
            .slice(&self.filtered)
            .iter()
            .map(|idx| &self.games[*idx])
            .collect()
    }

    /// Game at `index` within the visible window.
    pub fn visible_game(&self, index: usize) -> Option<&ProcessedGame> {
        if index >= self.visible_len() {
            return None;
        }
        self.filtered.get(index).map(|idx| &self.games[*idx])
    }

    /// Grow the window by a page if the end of it was reached.
    pub fn end_reached(&mut self) -> bool {
        let grew = self.window.end_reached(self.filtered.len());
        if grew {
            debug!(page = self.window.page(), "Window grew");
        }
        grew
    }

    /// Whether more games exist past the window.
    pub fn has_more(&self) -> bool {
        self.window.has_more(self.filtered.len())
    }

    /// Current page count.
    pub fn page(&self) -> usize {
        self.window.page()
    }

    fn reload(&mut self) {
        self.games = self.library.games();
        self.refilter();
    }

    fn refilter(&mut self) {
        self.filtered = search::filter_indices(&self.games, &self.query);
    }

    // ----- search -----

    /// Text as typed, before debouncing.
    pub fn query_input(&self) -> &str {
        &self.query_input
    }

    /// Query currently applied to the list.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Record typed text; it is applied by [`Browser::tick`] once it settles.
    pub fn set_query_input(&mut self, text: impl Into<String>, now: Instant) {
        self.query_input = text.into();
        self.debouncer.input(self.query_input.clone(), now);
    }

    /// Apply settled input. Returns whether the filtered list changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.debouncer.poll(now) {
            Some(query) => self.apply_query(query),
            None => false,
        }
    }

    /// Apply typed text immediately.
    pub fn commit_query(&mut self) -> bool {
        match self.debouncer.flush() {
            Some(query) => self.apply_query(query),
            None => false,
        }
    }

    /// Clear the search box and the applied query.
    pub fn clear_query(&mut self) -> bool {
        self.query_input.clear();
        self.debouncer.flush();
        self.apply_query(String::new())
    }

    fn apply_query(&mut self, query: String) -> bool {
        if query == self.query {
            return false;
        }
        self.query = query;
        self.refilter();
        debug!(query = %self.query, matches = self.filtered.len(), "Query applied");
        true
    }

    // ----- selection -----

    /// Current selection.
    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// Whether the game with this display name is selected.
    pub fn is_selected(&self, name: &str) -> bool {
        self.selection.contains(name)
    }

    /// Flip membership of `name` and persist. Returns the new membership.
    ///
    /// The in-memory change stands even if saving fails.
    pub fn toggle(&mut self, name: &str) -> Result<bool> {
        let selected = self.selection.toggle(name);
        self.persist_selection()?;
        Ok(selected)
    }

    /// Drop every selection and persist.
    pub fn clear_selection(&mut self) -> Result<()> {
        self.selection.clear();
        self.persist_selection()
    }

    fn persist_selection(&self) -> Result<()> {
        if let Some(store) = &self.selection_store {
            if let Err(err) = store.save(&self.selection) {
                warn!(?err, "Failed to save selection");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Sum of selected sizes over the full list.
    pub fn total_size(&self) -> f64 {
        self.selection.total_size(&self.games)
    }

    /// Total formatted with two decimals.
    pub fn total_label(&self) -> String {
        selection::format_gb(self.total_size())
    }

    /// Selected games present in the list, in list order.
    pub fn selected_games(&self) -> Vec<&ProcessedGame> {
        self.selection.selected_games(&self.games)
    }

    /// Shareable text listing the selection.
    pub fn summary_text(&self) -> String {
        selection::summary_text(&self.selection, &self.games)
    }

    /// Price for the current selection.
    pub fn price_quote(&self) -> u32 {
        selection::price_quote(self.selection.len())
    }

    // ----- capacity -----

    /// Chosen drive, if any.
    pub fn capacity(&self) -> Option<DriveCapacity> {
        self.capacity
    }

    /// Set or clear the drive.
    pub fn set_capacity(&mut self, capacity: Option<DriveCapacity>) {
        self.capacity = capacity;
    }

    /// Choose `capacity`, or clear it when it is already chosen.
    pub fn choose_capacity(&mut self, capacity: DriveCapacity) -> Option<DriveCapacity> {
        self.capacity = capacity.toggle(self.capacity);
        self.capacity
    }

    /// Total compared against the chosen drive.
    pub fn estimate(&self) -> CapacityEstimate {
        CapacityEstimate::new(self.total_size(), self.capacity)
    }

    /// Whether the selection no longer fits.
    pub fn capacity_exceeded(&self) -> bool {
        self.estimate().exceeded
    }

    // ----- remote -----

    /// State of the remote list.
    pub fn remote_status(&self) -> &RemoteStatus {
        &self.remote
    }

    /// Whether a fetch sequence or a refresh is in flight.
    pub fn is_syncing(&self) -> bool {
        self.refreshing || matches!(self.remote, RemoteStatus::Loading { .. })
    }

    /// Mark a manual refresh as started.
    pub fn begin_refresh(&mut self) {
        self.refreshing = true;
    }

    /// Fold a synchroniser event into the state.
    pub fn apply_sync_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Started { retry, max_retries } => {
                self.remote = RemoteStatus::Loading { retry, max_retries };
            }
            SyncEvent::Loaded(games) => {
                self.library.set_remote(games);
                self.reload();
                self.remote = RemoteStatus::Ready;
            }
            SyncEvent::Failed { message, attempts } => {
                warn!(attempts, "Remote list unavailable");
                self.remote = RemoteStatus::Failed(message);
            }
            SyncEvent::Refreshed(games) => {
                self.refreshing = false;
                self.library.set_remote(games);
                self.reload();
                self.remote = RemoteStatus::Ready;
            }
            SyncEvent::RefreshFailed(_) => {
                self.refreshing = false;
            }
        }
    }

    /// What the list area should show.
    pub fn view(&self) -> BrowserView {
        match &self.remote {
            RemoteStatus::Loading { retry: 0, .. } => BrowserView::Loading,
            RemoteStatus::Loading { retry, max_retries } => BrowserView::Retrying {
                retry: *retry,
                max_retries: *max_retries,
            },
            RemoteStatus::Failed(message) => BrowserView::Error(message.clone()),
            RemoteStatus::Ready if self.filtered.is_empty() && !self.query.is_empty() => {
                BrowserView::NoMatches(self.query.clone())
            }
            RemoteStatus::Ready => BrowserView::List,
        }
    }
}
