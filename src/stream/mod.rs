//! Supervised streaming connection to the article feed.
//!
//! One long-lived worker per stream drives a connect → run → close → wait
//! cycle until stopped:
//!
//! ```text
//! ┌──────────────┐      ┌─────────────┐      ┌──────────────┐
//! │ StreamHandle │─────▶│ StreamActor │─────▶│   finlight   │
//! │  (caller)    │ stop │ (background)│  wss │    server    │
//! └──────────────┘      └──────┬──────┘      └──────────────┘
//!                              │
//!            ping keeper · pong watchdog · rotation timer
//! ```
//!
//! Reconnection runs on two axes: an exponential delay for transient
//! failures and a server-imposed forced-wait floor (rate limit, blocked
//! user, admin kick). A bounded set of recent article identifiers
//! suppresses replays across connection rotations.
//!
//! The enriched and raw streams share this engine and differ only in their
//! [`StreamVariant`]: endpoint path suffix, log prefix, payload transform,
//! and whether duplicate filtering applies.

mod actor;
mod backoff;
mod client;
mod dedupe;
pub mod protocol;
mod variant;

pub use client::{ArticleStream, CloseEvent, RawArticleStream, StreamBuilder, StreamHandle};
pub use variant::{Enriched, Raw, StreamVariant};
