//! Durable per-credential JSON records and pending OAuth/device-code
//! sessions, plus the small atomic-write primitive the fallback engine
//! (`gproxy-routing`) reuses to persist `fallback.json`.
//!
//! This crate is the sole owner of durable state; every other crate
//! reaches it only through `CredentialStore`/`SessionStore`'s narrow
//! trait surface.

mod atomic;
mod credential;
mod error;
mod session;
mod store;

pub use atomic::{atomic_write_json, read_json_dir_sorted, sanitize_id};
pub use credential::{CredentialRecord, CredentialStatus};
pub use error::StorageError;
pub use session::PendingSession;
pub use store::{CredentialStore, FsCredentialStore, FsSessionStore, SessionStore};
