//! Application-level frames exchanged over the article stream.
//!
//! Inbound frames are JSON objects discriminated by a string `action` field.
//! Decoding is two-step (raw JSON, then typed payload) so that an unknown
//! action degrades to [`ServerFrame::Unknown`] instead of an error.

use serde::Deserialize;
use serde_json::Value;

// Close codes observed on the wire.
/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;
/// Policy violation; the server will not accept this credential again.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// Server overloaded; try again later.
pub const CLOSE_TRY_AGAIN_LATER: u16 = 1013;
/// Client-initiated proactive rotation.
pub const CLOSE_ROTATION: u16 = 4000;
/// Client-initiated close after a rate-limit error frame.
pub const CLOSE_RATE_LIMITED: u16 = 4001;
/// Client-initiated close after a blocked-user error frame.
pub const CLOSE_BLOCKED: u16 = 4002;
/// Client-initiated close after an admin kick.
pub const CLOSE_ADMIN_KICK: u16 = 4003;

/// Forced-wait window after a rate-limit error frame.
pub(crate) const RATE_LIMIT_WINDOW_MS: u64 = 60_000;
/// Forced-wait window after a blocked-user error frame.
pub(crate) const BLOCKED_WINDOW_MS: u64 = 3_600_000;
/// Default forced-wait window after an admin kick.
pub(crate) const DEFAULT_KICK_RETRY_MS: u64 = 900_000;

/// Admission acknowledgement for a subscription.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmitFrame {
    pub lease_id: Option<String>,
    pub server_now: Option<f64>,
    pub client_nonce: Option<String>,
}

/// Server-initiated replacement of this session.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreemptedFrame {
    pub reason: Option<String>,
    pub new_lease_id: Option<String>,
}

/// Operator-initiated disconnect with an optional retry window.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminKickFrame {
    /// Milliseconds to hold off before reconnecting.
    pub retry_after: Option<f64>,
}

/// A decoded inbound frame.
#[derive(Clone, Debug)]
pub enum ServerFrame {
    /// Heartbeat reply; `t` echoes the ping's send time in unix-ms.
    Pong { t: Option<f64> },
    Admit(AdmitFrame),
    Preempted(PreemptedFrame),
    /// Article payload, still in wire form.
    Article { data: Value },
    AdminKick(AdminKickFrame),
    /// Error notice; the message text selects the reconnect class.
    Error { message: String },
    /// Anything with an unrecognized (or missing) action.
    Unknown { action: String },
}

/// Decode one inbound text frame.
///
/// # Errors
///
/// Returns the JSON error for malformed frames; callers log and drop these
/// without tearing the session down.
pub fn parse_frame(text: &str) -> Result<ServerFrame, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    let action = value
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let frame = match action {
        "pong" => ServerFrame::Pong {
            t: value.get("t").and_then(Value::as_f64),
        },
        "admit" => ServerFrame::Admit(serde_json::from_value(value)?),
        "preempted" => ServerFrame::Preempted(serde_json::from_value(value)?),
        "sendArticle" => ServerFrame::Article {
            data: value.get("data").cloned().unwrap_or(Value::Null),
        },
        "admin_kick" => ServerFrame::AdminKick(serde_json::from_value(value)?),
        "error" => ServerFrame::Error {
            message: value
                .get("data")
                .and_then(Value::as_str)
                .or_else(|| value.get("error").and_then(Value::as_str))
                .unwrap_or_default()
                .to_string(),
        },
        other => ServerFrame::Unknown {
            action: other.to_string(),
        },
    };
    Ok(frame)
}

/// Reconnect class selected by an inbound error frame's message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ErrorClass {
    RateLimited,
    Blocked,
    Other,
}

pub(crate) fn classify_error_message(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    if lower.contains("limit") {
        ErrorClass::RateLimited
    } else if lower.contains("blocked") {
        ErrorClass::Blocked
    } else {
        ErrorClass::Other
    }
}

/// Build the heartbeat frame for the given unix-ms send time.
pub(crate) fn ping_frame(now_ms: i64) -> String {
    serde_json::json!({ "action": "ping", "t": now_ms }).to_string()
}

/// Build the first outbound frame: the caller's subscription parameters
/// merged with a fresh client nonce.
pub(crate) fn subscription_frame(params: &Value, client_nonce: &str) -> String {
    let mut object = params.as_object().cloned().unwrap_or_default();
    object.insert(
        "clientNonce".to_string(),
        Value::String(client_nonce.to_string()),
    );
    Value::Object(object).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_pong_with_rtt_marker() {
        match parse_frame(r#"{"action":"pong","t":1700000000123.0}"#).unwrap() {
            ServerFrame::Pong { t } => assert_eq!(t, Some(1_700_000_000_123.0)),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_parse_admit() {
        let frame =
            parse_frame(r#"{"action":"admit","leaseId":"L1","serverNow":5,"clientNonce":"n"}"#)
                .unwrap();
        match frame {
            ServerFrame::Admit(admit) => {
                assert_eq!(admit.lease_id.as_deref(), Some("L1"));
                assert_eq!(admit.server_now, Some(5.0));
                assert_eq!(admit.client_nonce.as_deref(), Some("n"));
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_parse_send_article_extracts_data() {
        let frame = parse_frame(r#"{"action":"sendArticle","data":{"link":"a"}}"#).unwrap();
        match frame {
            ServerFrame::Article { data } => assert_eq!(data["link"], "a"),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_prefers_data_over_error_field() {
        match parse_frame(r#"{"action":"error","data":"rate limit","error":"x"}"#).unwrap() {
            ServerFrame::Error { message } => assert_eq!(message, "rate limit"),
            other => panic!("unexpected frame: {other:?}"),
        }
        match parse_frame(r#"{"action":"error","error":"blocked"}"#).unwrap() {
            ServerFrame::Error { message } => assert_eq!(message, "blocked"),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_and_missing_actions() {
        assert!(matches!(
            parse_frame(r#"{"action":"telemetry"}"#).unwrap(),
            ServerFrame::Unknown { action } if action == "telemetry"
        ));
        assert!(matches!(
            parse_frame(r#"{"foo":1}"#).unwrap(),
            ServerFrame::Unknown { action } if action.is_empty()
        ));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(parse_frame("{not json").is_err());
    }

    #[test]
    fn test_error_classification_is_case_insensitive() {
        assert_eq!(
            classify_error_message("Rate LIMIT exceeded"),
            ErrorClass::RateLimited
        );
        assert_eq!(classify_error_message("user Blocked"), ErrorClass::Blocked);
        assert_eq!(classify_error_message("oops"), ErrorClass::Other);
    }

    #[test]
    fn test_subscription_frame_injects_nonce() {
        let params = json!({"sources": ["reuters"]});
        let frame: Value = serde_json::from_str(&subscription_frame(&params, "nonce-1")).unwrap();
        assert_eq!(frame["clientNonce"], "nonce-1");
        assert_eq!(frame["sources"][0], "reuters");
    }

    #[test]
    fn test_ping_frame_shape() {
        let frame: Value = serde_json::from_str(&ping_frame(42)).unwrap();
        assert_eq!(frame["action"], "ping");
        assert_eq!(frame["t"], 42);
    }
}
