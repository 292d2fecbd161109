//! Relay gateway abstraction
//!
//! The ranking core only ever asks two questions of the relay network:
//! "give me the newest N events matching this filter" and "stream me every
//! event matching this filter". Transport details stay behind this trait.

use super::event::{Event, Filter};
use crate::errors::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Finite, non-restartable sequence of events
pub type EventStream = BoxStream<'static, Event>;

#[async_trait]
pub trait RelayGateway: Send + Sync {
    /// Newest events matching `filter`, newest first, at most `limit`
    async fn fetch_latest(&self, filter: Filter, limit: usize) -> Result<Vec<Event>>;

    /// Every event matching `filter` until the relays report end of stored events
    async fn fetch_stream(&self, filter: Filter) -> Result<EventStream>;
}
