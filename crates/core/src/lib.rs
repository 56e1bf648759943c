#![warn(clippy::all, missing_docs)]

//! Core domain logic for the PS2 catalog browser.
//!
//! This crate hosts the game models, the bundled catalog and its merge with
//! the remote store, search and paging, the persisted selection, capacity
//! estimates, administrator sign-in and the add-game form used by the
//! terminal UI.

pub mod auth;
pub mod browser;
pub mod capacity;
pub mod catalog;
pub mod config;
pub mod error;
pub mod form;
pub mod models;
pub mod remote;
pub mod selection;

pub use auth::{Authenticator, CredentialStore, Credentials, Session};
pub use browser::{Browser, BrowserView, RemoteStatus};
pub use capacity::{CapacityEstimate, DriveCapacity};
pub use catalog::GameLibrary;
pub use config::AppConfig;
pub use error::{AuthError, StoreError, ValidationError};
pub use form::{FormField, NewGameForm};
pub use models::{GameRecord, ProcessedGame, RemoteGame};
pub use remote::{FirestoreStore, GameStore, RemoteSync, RetryPolicy, SyncEvent};
pub use selection::{SelectionSet, SelectionStore};
