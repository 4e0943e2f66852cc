//! User-facing stream API.
//!
//! [`StreamBuilder`] configures one stream; [`StreamHandle`] is the cheap
//! handle the caller keeps for shutdown. The two public flavors,
//! [`ArticleStream`] and [`RawArticleStream`], share one engine and differ
//! only in their [`StreamVariant`].

use std::{marker::PhantomData, sync::Arc};

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{
    actor::StreamActor,
    variant::{Enriched, Raw, StreamVariant},
};
use crate::{
    config::ApiConfig,
    error::{FinlightError, FinlightResult},
};

/// Details of a transport close, passed to the `on_close` hook.
#[derive(Clone, Debug)]
pub struct CloseEvent {
    /// Close code, when one was involved.
    pub code: Option<u16>,
    /// Human-readable close reason.
    pub reason: String,
}

/// Builder for the enriched article stream.
pub type ArticleStream = StreamBuilder<Enriched>;

/// Builder for the raw article stream.
pub type RawArticleStream = StreamBuilder<Raw>;

/// Configures and launches one supervised stream.
///
/// # Example
///
/// ```rust,no_run
/// use finlight_client::{ApiConfig, ArticleStream};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ApiConfig::new(std::env::var("FINLIGHT_API_KEY")?);
///     let handle = ArticleStream::new(config)
///         .params(serde_json::json!({ "sources": ["reuters.com"] }))?
///         .connect(|article| println!("{}", article.link))?;
///
///     handle.install_signal_handler();
///     handle.join().await;
///     Ok(())
/// }
/// ```
pub struct StreamBuilder<V: StreamVariant> {
    config: ApiConfig,
    params: Value,
    on_close: Option<Arc<dyn Fn(&CloseEvent) + Send + Sync>>,
    _variant: PhantomData<V>,
}

impl<V: StreamVariant> StreamBuilder<V> {
    /// Create a builder with an empty subscription descriptor.
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            params: Value::Object(serde_json::Map::new()),
            on_close: None,
            _variant: PhantomData,
        }
    }

    /// Set the subscription parameters sent in the first outbound frame.
    ///
    /// The parameters are fixed for the life of the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` does not serialize to a JSON object.
    pub fn params(mut self, params: impl Serialize) -> FinlightResult<Self> {
        let value = serde_json::to_value(params)?;
        if !value.is_object() {
            return Err(FinlightError::config(
                "Subscription parameters must be a JSON object",
            ));
        }
        self.params = value;
        Ok(self)
    }

    /// Register a hook fired after every transport close.
    #[must_use]
    pub fn on_close(mut self, hook: impl Fn(&CloseEvent) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(hook));
        self
    }

    /// Spawn the supervisor and start streaming into `sink`.
    ///
    /// The sink is invoked synchronously from the message-handling context:
    /// a slow sink stalls inbound processing and will eventually trip the
    /// pong watchdog. Back-pressure is the caller's concern. A panicking
    /// sink is not caught and takes the supervisor task down with it.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn connect<F>(self, sink: F) -> FinlightResult<StreamHandle>
    where
        F: FnMut(V::Article) + Send + 'static,
    {
        self.config.validate().map_err(FinlightError::config)?;

        let stop = CancellationToken::new();
        let actor = StreamActor::<V>::new(
            Arc::new(self.config),
            self.params,
            Box::new(sink),
            self.on_close,
            stop.clone(),
        );
        let task = tokio::spawn(actor.run());

        Ok(StreamHandle { stop, task })
    }
}

/// Handle to a running stream.
#[derive(Debug)]
pub struct StreamHandle {
    stop: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl StreamHandle {
    /// Request a graceful stop.
    ///
    /// Idempotent and callable from any context; the supervisor drains its
    /// timers, closes the live transport, and exits.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Whether stop has been requested or a permanent-stop condition fired.
    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Wait for the supervisor to finish.
    pub async fn join(self) {
        let _ = self.task.await;
    }

    /// Opt in to stopping this stream on Ctrl-C.
    ///
    /// Only requests a graceful stop; exiting the process stays with the
    /// caller.
    pub fn install_signal_handler(&self) {
        let stop = self.stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping stream");
                stop.cancel();
            }
        });
    }
}
