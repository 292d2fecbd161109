//! Websocket relay gateway
//!
//! Each query opens one short-lived subscription per configured relay:
//! `REQ` is sent, events are read until `EOSE`/`CLOSED` or the query window
//! elapses, then `CLOSE` is sent and the socket is dropped. Subscriptions are
//! paced by a shared token bucket so a large roster cannot flood the relays.
//!
//! Relays cap how many stored events one `REQ` returns, so streams page
//! backwards: after each `EOSE` the same filter is re-sent with `until` set
//! to the oldest timestamp seen, until a page brings nothing new or the
//! `since` bound is reached.

use super::event::{Event, Filter};
use super::gateway::{EventStream, RelayGateway};
use super::message::{ClientMessage, MessageError, RelayMessage};
use crate::config::RelayConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Token bucket shared by every subscription the gateway opens
type SubscriptionLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Events buffered between relay readers and the consumer
const EVENT_BUFFER: usize = 512;

/// Relay gateway speaking NIP-01 over websockets
pub struct WebSocketGateway {
    urls: Vec<String>,
    connect_timeout: Duration,
    query_timeout: Duration,
    stream_timeout: Duration,
    limiter: Arc<SubscriptionLimiter>,
}

/// How long one subscription may stay open and what it is for
#[derive(Clone, Copy)]
struct Window {
    connect: Duration,
    read: Duration,
    label: &'static str,
    /// Keep paging backwards with `until` after each `EOSE`
    paged: bool,
}

impl WebSocketGateway {
    /// Create a gateway from relay configuration
    pub fn new(config: &RelayConfig) -> Result<Self> {
        if config.urls.is_empty() {
            return Err(AppError::Configuration {
                message: "at least one relay URL is required".to_string(),
            });
        }

        let rps = NonZeroU32::new(config.requests_per_second).ok_or_else(|| AppError::Configuration {
            message: "relay.requests_per_second must be positive".to_string(),
        })?;
        let burst = NonZeroU32::new(config.burst).ok_or_else(|| AppError::Configuration {
            message: "relay.burst must be positive".to_string(),
        })?;
        let quota = Quota::per_second(rps).allow_burst(burst);

        info!(relays = ?config.urls, rps = rps.get(), burst = burst.get(), "Relay gateway initialized");

        Ok(Self {
            urls: config.urls.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            query_timeout: Duration::from_secs(config.query_timeout_secs),
            stream_timeout: Duration::from_secs(config.stream_timeout_secs),
            limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    /// Relay URLs this gateway queries
    pub fn relays(&self) -> &[String] {
        &self.urls
    }
}

#[async_trait]
impl RelayGateway for WebSocketGateway {
    async fn fetch_latest(&self, filter: Filter, limit: usize) -> Result<Vec<Event>> {
        let filter = filter.limit(limit);
        let window = Window {
            connect: self.connect_timeout,
            read: self.query_timeout,
            label: "latest",
            paged: false,
        };

        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let subscriptions = futures::future::join_all(self.urls.iter().map(|url| {
            subscribe(
                url.clone(),
                filter.clone(),
                Arc::clone(&self.limiter),
                window,
                tx.clone(),
            )
        }));
        drop(tx);

        let collect = async {
            let mut events = Vec::new();
            while let Some(event) = rx.recv().await {
                events.push(event);
            }
            events
        };

        let (outcomes, events) = tokio::join!(subscriptions, collect);

        // Partial answers are fine; only fail if every relay failed
        if outcomes.iter().all(|o| o.is_err()) {
            if let Some(Err(first)) = outcomes.into_iter().next() {
                return Err(first);
            }
        }

        Ok(newest_unique(events, limit))
    }

    async fn fetch_stream(&self, filter: Filter) -> Result<EventStream> {
        let window = Window {
            connect: self.connect_timeout,
            read: self.stream_timeout,
            label: "stream",
            paged: true,
        };
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        for url in &self.urls {
            let task = subscribe(url.clone(), filter.clone(), Arc::clone(&self.limiter), window, tx.clone());
            let relay = url.clone();
            tokio::spawn(async move {
                if let Err(e) = task.await {
                    warn!(relay = %relay, error = %e, "Streaming subscription failed");
                }
            });
        }

        // Stream ends once every relay task has dropped its sender
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(stream.boxed())
    }
}

/// Deduplicate by event id, newest first, truncated to `limit`
fn newest_unique(events: Vec<Event>, limit: usize) -> Vec<Event> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Event> = events
        .into_iter()
        .filter(|event| seen.insert(event.id.clone()))
        .collect();

    unique.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    unique.truncate(limit);
    unique
}

/// Run one subscription against one relay, forwarding matching events.
///
/// Returns the number of events forwarded. A read window that elapses after
/// some events arrived is treated as end of stream.
async fn subscribe(
    relay: String,
    filter: Filter,
    limiter: Arc<SubscriptionLimiter>,
    window: Window,
    tx: mpsc::Sender<Event>,
) -> Result<usize> {
    limiter.until_ready().await;
    let start = Instant::now();

    let result = read_subscription(&relay, &filter, window, &tx).await;

    let status = match &result {
        Ok(_) => "ok",
        Err(AppError::RelayTimeout { .. }) => "timeout",
        Err(_) => "error",
    };
    metrics::record_relay_request(window.label, status, start.elapsed().as_secs_f64());

    result
}

/// Where one page of a subscription stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageEnd {
    /// Relay reported end of stored events
    Eose,
    /// Relay closed the subscription or the socket
    Closed,
    /// Read window elapsed
    Deadline,
    /// Receiver dropped
    Abandoned,
}

/// Events seen on one page
#[derive(Debug, Default)]
struct Page {
    fresh: usize,
    oldest: Option<u64>,
}

/// Filter for the page after `page`, or `None` once the window is exhausted.
///
/// The cursor is inclusive so events sharing the boundary timestamp are not
/// lost; already-seen ids are dropped by the caller. A page that brought
/// nothing new ends the walk, which also stops relays that ignore `until`.
fn next_page(filter: &Filter, page: &Page) -> Option<Filter> {
    if page.fresh == 0 {
        return None;
    }
    let oldest = page.oldest?;
    if filter.since.is_some_and(|since| oldest <= since) {
        return None;
    }
    let mut next = filter.clone();
    next.until = Some(oldest);
    Some(next)
}

async fn read_subscription(
    relay: &str,
    filter: &Filter,
    window: Window,
    tx: &mpsc::Sender<Event>,
) -> Result<usize> {
    let relay_error = |message: String| AppError::Relay {
        relay: relay.to_string(),
        message,
    };

    let (mut ws, _) = timeout(window.connect, connect_async(relay))
        .await
        .map_err(|_| AppError::RelayTimeout {
            timeout_ms: window.connect.as_millis() as u64,
        })?
        .map_err(|e| relay_error(e.to_string()))?;

    let deadline = tokio::time::Instant::now() + window.read;
    let mut seen = HashSet::new();
    let mut page_filter = filter.clone();
    let mut forwarded = 0usize;
    let mut pages = 0usize;
    let mut malformed: Option<String> = None;
    let mut last_end;

    loop {
        let subscription_id = Uuid::new_v4().simple().to_string();
        let req = ClientMessage::req(subscription_id.clone(), page_filter.clone())
            .to_json()
            .map_err(|e| relay_error(e.to_string()))?;
        ws.send(Message::text(req))
            .await
            .map_err(|e| relay_error(e.to_string()))?;
        pages += 1;

        let mut page = Page::default();
        let end = loop {
            let frame = match tokio::time::timeout_at(deadline, ws.next()).await {
                Ok(frame) => frame,
                Err(_) => break PageEnd::Deadline,
            };

            let text = match frame {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(_))) | None => break PageEnd::Closed,
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(relay_error(e.to_string())),
            };

            let message = match RelayMessage::from_json(text.as_str()) {
                Ok(message) => message,
                Err(MessageError::InvalidEvent(reason)) => {
                    debug!(relay = %relay, error = %reason, "Skipping malformed event");
                    malformed = Some(reason);
                    continue;
                }
                Err(e) => {
                    debug!(relay = %relay, error = %e, "Ignoring unparseable relay message");
                    continue;
                }
            };

            if let Some(id) = message.subscription_id() {
                if id != subscription_id {
                    continue;
                }
            }

            match message {
                RelayMessage::Event { event, .. } => {
                    if !filter.matches(&event) {
                        continue;
                    }
                    page.oldest = Some(page.oldest.map_or(event.created_at, |o| o.min(event.created_at)));
                    if !seen.insert(event.id.clone()) {
                        continue;
                    }
                    page.fresh += 1;
                    if tx.send(event).await.is_err() {
                        break PageEnd::Abandoned;
                    }
                    forwarded += 1;
                }
                RelayMessage::Eose { .. } => break PageEnd::Eose,
                RelayMessage::Closed { message, .. } => {
                    debug!(relay = %relay, reason = %message, "Relay closed subscription");
                    break PageEnd::Closed;
                }
                RelayMessage::Notice { message } => {
                    debug!(relay = %relay, notice = %message, "Relay notice");
                }
                RelayMessage::Ok { .. } => {}
            }
        };

        // Best effort: the relay forgets the subscription either way
        if let Ok(close) = ClientMessage::close(subscription_id).to_json() {
            let _ = ws.send(Message::text(close)).await;
        }

        last_end = end;
        if !window.paged || end != PageEnd::Eose {
            break;
        }
        match next_page(&page_filter, &page) {
            Some(next) => page_filter = next,
            None => break,
        }
    }

    let _ = ws.close(None).await;

    if forwarded == 0 {
        if let Some(message) = malformed {
            return Err(AppError::InvalidEvent { message });
        }
        if last_end == PageEnd::Deadline {
            return Err(AppError::RelayTimeout {
                timeout_ms: window.read.as_millis() as u64,
            });
        }
    }

    debug!(relay = %relay, forwarded, pages, end = ?last_end, "Subscription finished");
    Ok(forwarded)
}
