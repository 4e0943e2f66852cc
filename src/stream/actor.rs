//! Connection actor for the article stream.
//!
//! The actor runs in a background task and handles:
//! - Connection establishment and the subscription handshake
//! - Reactive reconnection with exponential backoff and server-imposed
//!   forced-wait floors
//! - Proactive rotation before the infrastructure's connection-age ceiling
//! - Heartbeat (application-level ping/pong) and the pong watchdog
//! - Routing inbound frames and delivering articles to the caller's sink

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde_json::Value;
use tokio::{
    net::TcpStream,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Message,
        client::IntoClientRequest,
        http::HeaderValue,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    backoff::ReconnectPolicy,
    client::CloseEvent,
    dedupe::{RECENT_IDS_CAPACITY, RecentIds},
    protocol::{
        BLOCKED_WINDOW_MS, CLOSE_ADMIN_KICK, CLOSE_BLOCKED, CLOSE_NORMAL, CLOSE_POLICY_VIOLATION,
        CLOSE_RATE_LIMITED, CLOSE_ROTATION, DEFAULT_KICK_RETRY_MS, ErrorClass,
        RATE_LIMIT_WINDOW_MS, ServerFrame, classify_error_message, parse_frame, ping_frame,
        subscription_frame,
    },
    variant::StreamVariant,
};
use crate::{
    config::ApiConfig,
    error::{FinlightError, FinlightResult},
    rest::CLIENT_VERSION,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// How often the pong watchdog checks for heartbeat silence.
const WATCHDOG_PERIOD: Duration = Duration::from_secs(5);

/// What a routed frame asks the session loop to do next.
enum FrameAction {
    Continue,
    Close {
        code: u16,
        reason: &'static str,
        permanent: bool,
    },
}

/// How a session ended, for the close hook and the supervisor's next step.
struct SessionSummary {
    event: CloseEvent,
    permanent: bool,
}

impl SessionSummary {
    fn transient(code: Option<u16>, reason: &str) -> Self {
        Self {
            event: CloseEvent {
                code,
                reason: reason.to_string(),
            },
            permanent: false,
        }
    }

    fn permanent(code: Option<u16>, reason: &str) -> Self {
        Self {
            event: CloseEvent {
                code,
                reason: reason.to_string(),
            },
            permanent: true,
        }
    }
}

/// The supervised worker behind one stream.
///
/// Owns the transport, the timers, the backoff state, and the duplicate
/// filter; the public handle only shares the stop token.
pub(crate) struct StreamActor<V: StreamVariant> {
    config: Arc<ApiConfig>,
    params: Value,
    sink: Box<dyn FnMut(V::Article) + Send>,
    on_close: Option<Arc<dyn Fn(&CloseEvent) + Send + Sync>>,
    stop: CancellationToken,
    policy: ReconnectPolicy,
    recent: RecentIds,
    lease_id: Option<String>,
}

impl<V: StreamVariant> StreamActor<V> {
    pub(crate) fn new(
        config: Arc<ApiConfig>,
        params: Value,
        sink: Box<dyn FnMut(V::Article) + Send>,
        on_close: Option<Arc<dyn Fn(&CloseEvent) + Send + Sync>>,
        stop: CancellationToken,
    ) -> Self {
        let policy = ReconnectPolicy::new(config.base_reconnect_delay, config.max_reconnect_delay);
        Self {
            config,
            params,
            sink,
            on_close,
            stop,
            policy,
            recent: RecentIds::new(RECENT_IDS_CAPACITY),
            lease_id: None,
        }
    }

    /// Run the supervisor until stopped or a permanent-stop condition holds.
    pub(crate) async fn run(mut self) {
        let endpoint = format!(
            "{}{}",
            self.config.wss_url.trim_end_matches('/'),
            V::PATH_SUFFIX
        );
        info!(stream = V::LOG_PREFIX, url = %endpoint, "Starting stream supervisor");

        loop {
            if self.stop.is_cancelled() {
                break;
            }

            match Self::open_transport(&self.config, &self.stop, &endpoint).await {
                Ok(Some(ws)) => {
                    self.policy.on_open();
                    info!(stream = V::LOG_PREFIX, "Connected");
                    let summary = self.run_session(ws).await;
                    info!(
                        stream = V::LOG_PREFIX,
                        code = ?summary.event.code,
                        reason = %summary.event.reason,
                        lease_id = ?self.lease_id,
                        "Session closed"
                    );
                    if let Some(hook) = &self.on_close {
                        hook(&summary.event);
                    }
                    if summary.permanent {
                        break;
                    }
                }
                Ok(None) => break, // stop observed while connecting
                Err(e) => {
                    warn!(stream = V::LOG_PREFIX, error = %e, "Connection failed");
                    if e.to_string().contains("429") {
                        self.policy.force_wait_until(
                            Instant::now() + Duration::from_millis(RATE_LIMIT_WINDOW_MS),
                        );
                    }
                }
            }

            if self.stop.is_cancelled() {
                break;
            }
            let delay = self.policy.next_delay(Instant::now());
            debug!(
                stream = V::LOG_PREFIX,
                delay_ms = delay.as_millis() as u64,
                "Waiting before reconnect"
            );
            tokio::select! {
                _ = self.stop.cancelled() => break,
                _ = time::sleep(delay) => {}
            }
        }

        info!(stream = V::LOG_PREFIX, "Stream supervisor stopped");
    }

    /// Open the transport with the handshake headers.
    ///
    /// Returns `Ok(None)` when stop was requested mid-connect.
    async fn open_transport(
        config: &ApiConfig,
        stop: &CancellationToken,
        endpoint: &str,
    ) -> FinlightResult<Option<WsStream>> {
        let mut request = endpoint.into_client_request()?;
        let headers = request.headers_mut();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&config.api_key)
                .map_err(|_| FinlightError::config("API key is not a valid header value"))?,
        );
        headers.insert("x-client-version", HeaderValue::from_static(CLIENT_VERSION));
        if config.takeover {
            headers.insert("x-takeover", HeaderValue::from_static("true"));
        }

        debug!(stream = V::LOG_PREFIX, url = %endpoint, "Opening transport");
        tokio::select! {
            _ = stop.cancelled() => Ok(None),
            result = connect_async(request) => {
                let (ws, _response) = result?;
                Ok(Some(ws))
            }
        }
    }

    /// Drive one session from subscription frame to close.
    ///
    /// The three timer activities live on this stack frame, so returning
    /// from here cancels them before the next connect can begin.
    async fn run_session(&mut self, ws: WsStream) -> SessionSummary {
        let (mut write, mut read) = ws.split();
        let session_start = Instant::now();
        let mut last_pong = Instant::now();
        let client_nonce = Uuid::new_v4().to_string();
        self.lease_id = None;

        let frame = subscription_frame(&self.params, &client_nonce);
        if let Err(e) = write.send(Message::Text(frame.into())).await {
            warn!(stream = V::LOG_PREFIX, error = %e, "Failed to send subscription frame");
            return SessionSummary::transient(None, "subscription send failed");
        }
        debug!(stream = V::LOG_PREFIX, client_nonce = %client_nonce, "Subscription frame sent");

        let mut ping_timer = time::interval_at(
            session_start + self.config.ping_interval,
            self.config.ping_interval,
        );
        ping_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut watchdog = time::interval_at(session_start + WATCHDOG_PERIOD, WATCHDOG_PERIOD);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let rotation = time::sleep_until(session_start + self.config.connection_lifetime);
        tokio::pin!(rotation);

        loop {
            tokio::select! {
                _ = self.stop.cancelled() => {
                    Self::send_close(&mut write, CLOSE_NORMAL, "Client stopped").await;
                    return SessionSummary::permanent(Some(CLOSE_NORMAL), "client stopped");
                }

                message = read.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        match self.handle_frame(text.as_str(), &client_nonce, &mut last_pong) {
                            FrameAction::Continue => {}
                            FrameAction::Close { code, reason, permanent } => {
                                Self::send_close(&mut write, code, reason).await;
                                if permanent {
                                    self.stop.cancel();
                                    return SessionSummary::permanent(Some(code), reason);
                                }
                                return SessionSummary::transient(Some(code), reason);
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = write.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.as_ref().map(|f| u16::from(f.code));
                        let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                        warn!(stream = V::LOG_PREFIX, ?code, %reason, "Server closed connection");
                        if code == Some(CLOSE_POLICY_VIOLATION) {
                            self.stop.cancel();
                            return SessionSummary::permanent(code, "blocked by server");
                        }
                        return SessionSummary::transient(code, "server close");
                    }
                    Some(Ok(_)) => {} // binary and transport pongs are not part of the protocol
                    Some(Err(e)) => {
                        warn!(stream = V::LOG_PREFIX, error = %e, "Transport error");
                        return SessionSummary::transient(None, "transport error");
                    }
                    None => {
                        warn!(stream = V::LOG_PREFIX, "Transport closed by remote");
                        return SessionSummary::transient(None, "connection closed");
                    }
                },

                _ = ping_timer.tick() => {
                    let now_ms = Utc::now().timestamp_millis();
                    if let Err(e) = write.send(Message::Text(ping_frame(now_ms).into())).await {
                        warn!(stream = V::LOG_PREFIX, error = %e, "Failed to send ping");
                        return SessionSummary::transient(None, "ping send failed");
                    }
                }

                _ = watchdog.tick() => {
                    if last_pong.elapsed() > self.config.pong_timeout {
                        warn!(stream = V::LOG_PREFIX, "Pong timeout, recycling connection");
                        let _ = write.send(Message::Close(None)).await;
                        return SessionSummary::transient(None, "pong timeout");
                    }
                }

                _ = &mut rotation => {
                    info!(stream = V::LOG_PREFIX, "Proactive rotation");
                    Self::send_close(&mut write, CLOSE_ROTATION, "Proactive rotation").await;
                    return SessionSummary::transient(Some(CLOSE_ROTATION), "proactive rotation");
                }
            }
        }
    }

    /// Route one inbound text frame.
    fn handle_frame(
        &mut self,
        text: &str,
        client_nonce: &str,
        last_pong: &mut Instant,
    ) -> FrameAction {
        let frame = match parse_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(stream = V::LOG_PREFIX, error = %e, "Dropping malformed frame");
                return FrameAction::Continue;
            }
        };

        match frame {
            ServerFrame::Pong { t } => {
                *last_pong = Instant::now();
                if let Some(t) = t {
                    let rtt_ms = Utc::now().timestamp_millis() as f64 - t;
                    debug!(stream = V::LOG_PREFIX, rtt_ms, "Pong received");
                }
                FrameAction::Continue
            }
            ServerFrame::Admit(admit) => {
                if let Some(echoed) = admit.client_nonce.as_deref() {
                    if echoed != client_nonce {
                        warn!(
                            stream = V::LOG_PREFIX,
                            sent = %client_nonce,
                            echoed = %echoed,
                            "Client nonce mismatch in admit"
                        );
                    }
                }
                debug!(
                    stream = V::LOG_PREFIX,
                    lease_id = ?admit.lease_id,
                    server_now = ?admit.server_now,
                    "Admitted"
                );
                self.lease_id = admit.lease_id;
                FrameAction::Continue
            }
            ServerFrame::Preempted(preempted) => {
                info!(
                    stream = V::LOG_PREFIX,
                    reason = ?preempted.reason,
                    new_lease_id = ?preempted.new_lease_id,
                    "Preempted by server"
                );
                FrameAction::Close {
                    code: CLOSE_NORMAL,
                    reason: "Preempted by server",
                    permanent: true,
                }
            }
            ServerFrame::Article { data } => {
                match V::transform(data) {
                    Ok(article) => {
                        if let Some(id) = V::article_id(&article) {
                            if !self.recent.insert(&id) {
                                debug!(stream = V::LOG_PREFIX, id = %id, "Dropping replayed article");
                                return FrameAction::Continue;
                            }
                        }
                        (self.sink)(article);
                    }
                    Err(e) => {
                        warn!(stream = V::LOG_PREFIX, error = %e, "Dropping undecodable article");
                    }
                }
                FrameAction::Continue
            }
            ServerFrame::AdminKick(kick) => {
                let retry_ms = kick
                    .retry_after
                    .filter(|&ms| ms > 0.0)
                    .map_or(DEFAULT_KICK_RETRY_MS, |ms| ms as u64);
                warn!(stream = V::LOG_PREFIX, retry_ms, "Admin kick");
                self.policy
                    .force_wait_until(Instant::now() + Duration::from_millis(retry_ms));
                FrameAction::Close {
                    code: CLOSE_ADMIN_KICK,
                    reason: "Admin kick",
                    permanent: false,
                }
            }
            ServerFrame::Error { message } => match classify_error_message(&message) {
                ErrorClass::RateLimited => {
                    warn!(stream = V::LOG_PREFIX, %message, "Rate limited");
                    self.policy.force_wait_until(
                        Instant::now() + Duration::from_millis(RATE_LIMIT_WINDOW_MS),
                    );
                    FrameAction::Close {
                        code: CLOSE_RATE_LIMITED,
                        reason: "Rate limited",
                        permanent: false,
                    }
                }
                ErrorClass::Blocked => {
                    warn!(stream = V::LOG_PREFIX, %message, "User blocked");
                    self.policy
                        .force_wait_until(Instant::now() + Duration::from_millis(BLOCKED_WINDOW_MS));
                    FrameAction::Close {
                        code: CLOSE_BLOCKED,
                        reason: "User blocked",
                        permanent: false,
                    }
                }
                ErrorClass::Other => {
                    warn!(stream = V::LOG_PREFIX, %message, "Server error frame");
                    FrameAction::Continue
                }
            },
            ServerFrame::Unknown { action } => {
                debug!(stream = V::LOG_PREFIX, %action, "Ignoring unknown action");
                FrameAction::Continue
            }
        }
    }

    async fn send_close(write: &mut WsSink, code: u16, reason: &'static str) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.into(),
        };
        if let Err(e) = write.send(Message::Close(Some(frame))).await {
            debug!(stream = V::LOG_PREFIX, error = %e, "Close frame not delivered");
        }
    }
}
