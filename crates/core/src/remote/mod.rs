//! Remote game store access and synchronisation.

use std::future::Future;

use crate::{error::StoreError, models::GameRecord, models::RemoteGame};

/// Firestore REST client and document codec.
pub mod firestore;
/// Retrying fetch of the remote game list.
pub mod sync;

pub use firestore::FirestoreStore;
pub use sync::{RemoteSync, RetryPolicy, SyncEvent};

/// A document store holding user-added games.
pub trait GameStore: Send + Sync + 'static {
    /// Every game in the store, ordered by name.
    fn list_games(&self) -> impl Future<Output = Result<Vec<RemoteGame>, StoreError>> + Send;

    /// Insert a game with the caller's id token, returning the new document id.
    fn add_game(
        &self,
        game: &GameRecord,
        id_token: &str,
    ) -> impl Future<Output = Result<String, StoreError>> + Send;
}
