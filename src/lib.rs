//! # finlight-client
//!
//! Rust client for the [finlight.me](https://finlight.me) financial-news
//! platform.
//!
//! Three surfaces share one configuration:
//!
//! - **REST** — [`RestClient`] for request/response article search, with
//!   retry on transient status codes.
//! - **Webhooks** — [`verify_webhook_signature`] for HMAC-SHA256 delivery
//!   verification.
//! - **Streaming** — [`ArticleStream`] / [`RawArticleStream`], a supervised
//!   duplex connection with heartbeats, reactive and proactive reconnection,
//!   per-error backoff, and duplicate suppression across reconnects.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use finlight_client::{ApiConfig, ArticleStream};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApiConfig::new(std::env::var("FINLIGHT_API_KEY")?);
//!
//!     let handle = ArticleStream::new(config)
//!         .params(serde_json::json!({ "sources": ["reuters.com"] }))?
//!         .connect(|article| {
//!             println!("{} {}", article.source.as_deref().unwrap_or("?"), article.link);
//!         })?;
//!
//!     handle.install_signal_handler();
//!     handle.join().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod rest;
pub mod stream;
pub mod webhook;

pub use config::ApiConfig;
pub use error::{FinlightError, FinlightResult};
pub use models::{Article, ArticlesPage, Company, RawArticle};
pub use rest::{GetArticlesParams, RestClient};
pub use stream::{
    ArticleStream, CloseEvent, Enriched, Raw, RawArticleStream, StreamBuilder, StreamHandle,
    StreamVariant,
};
pub use webhook::verify_webhook_signature;
