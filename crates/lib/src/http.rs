//! Outbound JSON POST with per-call timeout, cancellation and trace-header forwarding.

use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Header carrying the operation id across services.
pub const OPERATION_ID_HEADER: &str = "operationID";

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("encoding request body for {url}: {source}")]
    Encode {
        url: String,
        source: serde_json::Error,
    },
    #[error("invalid header {name}")]
    Header { name: String },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },
    #[error("reading response body from {url} failed: {source}")]
    Body {
        url: String,
        source: reqwest::Error,
    },
    #[error("request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },
    #[error("request to {url} cancelled")]
    Cancelled { url: String },
}

/// Response envelope shared by the platform's admin, chat and IM APIs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub err_code: i32,
    #[serde(default)]
    pub err_msg: String,
    #[serde(default)]
    pub err_dlt: String,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// `Err((code, message))` when the service reported a failure.
    pub fn into_result(self) -> Result<Option<T>, (i32, String)> {
        if self.err_code != 0 {
            let msg = if self.err_dlt.is_empty() {
                self.err_msg
            } else {
                format!("{}: {}", self.err_msg, self.err_dlt)
            };
            return Err((self.err_code, msg));
        }
        Ok(self.data)
    }
}

/// Per-invocation call context: the operation id forwarded to collaborators and
/// the cancellation token every outbound call observes.
#[derive(Debug, Clone)]
pub struct CallContext {
    operation_id: Option<String>,
    cancel: CancellationToken,
}

/// Trimmed operation id, or `None` when it is blank or cannot be sent as a header value.
pub fn usable_operation_id(raw: &str) -> Option<&str> {
    let id = raw.trim();
    if id.is_empty() || HeaderValue::from_str(id).is_err() {
        return None;
    }
    Some(id)
}

impl CallContext {
    pub fn new(operation_id: Option<String>, cancel: CancellationToken) -> Self {
        let operation_id = operation_id
            .as_deref()
            .and_then(usable_operation_id)
            .map(str::to_string);
        Self {
            operation_id,
            cancel,
        }
    }

    /// Context with no operation id and a fresh, never-cancelled token.
    pub fn background() -> Self {
        Self::new(None, CancellationToken::new())
    }

    pub fn operation_id(&self) -> Option<&str> {
        self.operation_id.as_deref()
    }
}

/// POST `body` as JSON to `url` with `headers`, returning the raw response body.
///
/// When `timeout_secs > 0` the call runs in a child scope of `ctx` that is cancelled after
/// that many seconds; cancelling `ctx` aborts the call either way. The HTTP status is not
/// interpreted: callers decode the service envelope themselves.
pub async fn post_json<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    ctx: &CallContext,
    url: &str,
    headers: &[(&str, &str)],
    body: &T,
    timeout_secs: u64,
) -> Result<Vec<u8>, TransportError> {
    let payload = serde_json::to_vec(body).map_err(|source| TransportError::Encode {
        url: url.to_string(),
        source,
    })?;

    let mut req = client.post(url);
    if let Some(op) = ctx.operation_id() {
        req = req.header(OPERATION_ID_HEADER, op);
    }
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| TransportError::Header {
            name: name.to_string(),
        })?;
        let value = HeaderValue::from_str(value).map_err(|_| TransportError::Header {
            name: name.to_string(),
        })?;
        req = req.header(name, value);
    }
    req = req
        .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
        .body(payload);

    let call = async {
        let res = req.send().await.map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })?;
        log::debug!("POST {} -> {}", url, res.status());
        res.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|source| TransportError::Body {
                url: url.to_string(),
                source,
            })
    };

    let scope = ctx.cancel.child_token();
    let bounded = async {
        match timeout_secs {
            0 => call.await,
            secs => match tokio::time::timeout(Duration::from_secs(secs), call).await {
                Ok(res) => res,
                Err(_) => Err(TransportError::Timeout {
                    url: url.to_string(),
                    secs,
                }),
            },
        }
    };

    tokio::select! {
        biased;
        _ = scope.cancelled() => Err(TransportError::Cancelled { url: url.to_string() }),
        res = bounded => res,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn blank_operation_id_is_dropped() {
        let ctx = CallContext::new(Some("  ".to_string()), CancellationToken::new());
        assert_eq!(ctx.operation_id(), None);
        let ctx = CallContext::new(Some("op-1".to_string()), CancellationToken::new());
        assert_eq!(ctx.operation_id(), Some("op-1"));
    }

    #[test]
    fn operation_id_with_control_characters_is_dropped() {
        assert_eq!(usable_operation_id("op\n1"), None);
        assert_eq!(usable_operation_id(" op-é "), Some("op-é"));
        let ctx = CallContext::new(Some("op\r\n1".to_string()), CancellationToken::new());
        assert_eq!(ctx.operation_id(), None);
    }

    #[tokio::test]
    async fn post_json_without_usable_operation_id_still_reaches_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/echo")
            .match_header("operationID", mockito::Matcher::Missing)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let ctx = CallContext::new(Some("op\n1".to_string()), CancellationToken::new());
        let url = format!("{}/echo", server.url());
        let bytes = post_json(&reqwest::Client::new(), &ctx, &url, &[], &serde_json::json!({}), 5)
            .await
            .unwrap();
        assert_eq!(bytes, b"{}");
        mock.assert_async().await;
    }

    #[test]
    fn envelope_error_code_is_reported() {
        let env: ApiEnvelope<serde_json::Value> = serde_json::from_str(
            r#"{"errCode":1004,"errMsg":"RecordNotFoundError","errDlt":"no such account"}"#,
        )
        .unwrap();
        assert_eq!(
            env.into_result().unwrap_err(),
            (1004, "RecordNotFoundError: no such account".to_string())
        );

        let env: ApiEnvelope<serde_json::Value> =
            serde_json::from_str(r#"{"errCode":0,"errMsg":"","errDlt":""}"#).unwrap();
        assert_eq!(env.into_result().unwrap(), None);
    }

    #[tokio::test]
    async fn post_json_sends_headers_and_returns_raw_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/echo")
            .match_header("operationID", "op-42")
            .match_header("token", "abc")
            .match_header("content-type", "application/json; charset=utf-8")
            .match_body(Matcher::Json(serde_json::json!({ "question": "ping" })))
            .with_status(200)
            .with_body(r#"{"data":"pong"}"#)
            .create_async()
            .await;

        let ctx = CallContext::new(Some("op-42".to_string()), CancellationToken::new());
        let url = format!("{}/echo", server.url());
        let body = serde_json::json!({ "question": "ping" });
        let bytes = post_json(
            &reqwest::Client::new(),
            &ctx,
            &url,
            &[("token", "abc")],
            &body,
            5,
        )
        .await
        .unwrap();

        assert_eq!(&bytes[..], br#"{"data":"pong"}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn post_json_returns_body_for_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/fail")
            .with_status(500)
            .with_body("oops")
            .create_async()
            .await;

        let url = format!("{}/fail", server.url());
        let bytes = post_json(
            &reqwest::Client::new(),
            &CallContext::background(),
            &url,
            &[],
            &serde_json::json!({}),
            5,
        )
        .await
        .unwrap();
        assert_eq!(&bytes[..], b"oops");
    }

    #[tokio::test]
    async fn post_json_times_out_on_silent_server() {
        // Accepts the connection (kernel backlog) but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/slow", listener.local_addr().unwrap());

        let err = post_json(
            &reqwest::Client::new(),
            &CallContext::background(),
            &url,
            &[],
            &serde_json::json!({}),
            1,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TransportError::Timeout { secs: 1, .. }), "{err}");
        drop(listener);
    }

    #[tokio::test]
    async fn post_json_aborts_when_context_cancelled() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/slow", listener.local_addr().unwrap());
        let token = CancellationToken::new();
        let ctx = CallContext::new(None, token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        });
        let err = post_json(
            &reqwest::Client::new(),
            &ctx,
            &url,
            &[],
            &serde_json::json!({}),
            0,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TransportError::Cancelled { .. }), "{err}");
        canceller.await.unwrap();
        drop(listener);
    }
}
