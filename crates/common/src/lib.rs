//! FollowRank Common Library
//!
//! Shared code for the FollowRank services including:
//! - Configuration management
//! - Error types and handling
//! - Database entities, repository, and the rank store seam
//! - Metrics and observability
//! - Nostr protocol types, npub codec, and the relay gateway
//! - Profile language heuristics

pub mod config;
pub mod db;
pub mod errors;
pub mod language;
pub mod metrics;
pub mod nostr;

// Re-export commonly used types
pub use errors::{AppError, Result};
pub use config::AppConfig;
pub use db::{RankStore, Repository};
pub use nostr::{Event, Filter, PublicKey, RelayGateway};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Event kind for profile metadata
pub const METADATA_KIND: u16 = 0;

/// Event kind for short text notes
pub const TEXT_NOTE_KIND: u16 = 1;

/// Event kind for contact lists (follow lists)
pub const CONTACT_LIST_KIND: u16 = 3;
