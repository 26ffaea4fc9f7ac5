//! Storefront order API client.
//!
//! The PHP backends expose a `GET <base>/<endpoint>?id=<order id>` route that
//! answers with JSON. Depending on the storefront the order sits at the top
//! level, under `order`/`commande`/`data`, or inside a one-element array; the
//! `success: false` envelope carries an error message.

use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::context::SessionContext;
use crate::error::{InvoiceError, Result};

/// Default timeout for API requests (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const ORDER_ENVELOPE_KEYS: &[&str] = &["order", "commande", "data", "result"];

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the storefront API base URL:
/// - ensure a scheme is present (https, or http for localhost)
/// - strip trailing slashes
pub fn normalize_api_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

/// Convert a reqwest error into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach storefront API at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid storefront API URL: {url}");
    }
    if err.is_decode() {
        return format!("Storefront API at {url} did not return valid JSON");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Convert an HTTP status code into a user-friendly message.
fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        401 => "Session expired or not signed in".to_string(),
        403 => "Not allowed to view this order".to_string(),
        404 => "Order not found".to_string(),
        s if s >= 500 => format!("Storefront server error (HTTP {s})"),
        s => format!("Unexpected response from storefront (HTTP {s})"),
    }
}

/// Extract the order object from a response body.
pub fn unwrap_order_payload(body: Value) -> Result<Value> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let message = body
            .get("message")
            .or_else(|| body.get("error"))
            .and_then(Value::as_str)
            .unwrap_or("request rejected by storefront");
        return Err(InvoiceError::Api(message.to_string()));
    }

    let mut current = body;
    // Envelopes can nest (`{"data": {"order": {...}}}`).
    for _ in 0..3 {
        let inner = ORDER_ENVELOPE_KEYS
            .iter()
            .find_map(|key| current.get(*key).filter(|v| v.is_object() || v.is_array()))
            .cloned();
        match inner {
            Some(next) => current = next,
            None => break,
        }
    }

    if let Value::Array(mut entries) = current {
        if entries.is_empty() {
            return Err(InvoiceError::Api("Order not found".to_string()));
        }
        current = entries.swap_remove(0);
    }

    if current.is_object() {
        Ok(current)
    } else {
        Err(InvoiceError::InvalidOrder(
            "response does not contain an order object".to_string(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OrderClient {
    client: Client,
    base_url: String,
    endpoint: String,
}

impl OrderClient {
    pub fn new(base_url: &str, endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InvoiceError::Api(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: normalize_api_url(base_url),
            endpoint: endpoint.trim().trim_start_matches('/').to_string(),
        })
    }

    pub fn order_url(&self) -> String {
        format!("{}/{}", self.base_url, self.endpoint)
    }

    /// Fetch one order by id. A signed-in session scopes the request with
    /// `user_id` (and `role`) the way the storefront pages do.
    pub async fn fetch_order(&self, order_id: &str, session: &SessionContext) -> Result<Value> {
        let order_id = order_id.trim();
        if order_id.is_empty() {
            return Err(InvoiceError::Api("Order id is empty".to_string()));
        }

        let url = self.order_url();
        let mut query: Vec<(&str, &str)> = vec![("id", order_id)];
        if let Some(user_id) = session.user_id.as_deref() {
            query.push(("user_id", user_id));
            query.push(("role", session.role.as_str()));
        }

        debug!(url = %url, order_id, "Fetching order");
        let start = Instant::now();
        let resp = self
            .client
            .get(&url)
            .query(&query)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| InvoiceError::Api(friendly_error(&self.base_url, &e)))?;

        let status = resp.status();
        let latency = start.elapsed().as_millis() as u64;
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body_text)
                .ok()
                .and_then(|json| {
                    json.get("message")
                        .or_else(|| json.get("error"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| status_error(status));
            warn!(status = status.as_u16(), latency_ms = latency, "Order fetch failed: {message}");
            return Err(InvoiceError::Api(message));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| InvoiceError::Api(friendly_error(&self.base_url, &e)))?;
        info!(order_id, latency_ms = latency, "Order fetched");
        unwrap_order_payload(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Role;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one HTTP response and hand back the raw request line.
    async fn one_shot_server(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.expect("read request");
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket
                .write_all(response.as_bytes())
                .await
                .expect("write response");
            request.lines().next().unwrap_or_default().to_string()
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn normalizes_base_urls() {
        assert_eq!(normalize_api_url("shop.example.tn/api/"), "https://shop.example.tn/api");
        assert_eq!(normalize_api_url("localhost:8080//"), "http://localhost:8080");
        assert_eq!(normalize_api_url(" http://10.0.0.2 "), "http://10.0.0.2");
    }

    #[test]
    fn maps_status_codes_to_messages() {
        assert_eq!(status_error(StatusCode::NOT_FOUND), "Order not found");
        assert_eq!(
            status_error(StatusCode::BAD_GATEWAY),
            "Storefront server error (HTTP 502)"
        );
        assert!(status_error(StatusCode::IM_A_TEAPOT).contains("418"));
    }

    #[test]
    fn unwraps_common_envelopes() {
        let order = json!({"id": 1});
        assert_eq!(unwrap_order_payload(json!({"id": 1})).expect("bare"), order);
        assert_eq!(
            unwrap_order_payload(json!({"success": true, "order": {"id": 1}})).expect("order"),
            order
        );
        assert_eq!(
            unwrap_order_payload(json!({"data": {"commande": {"id": 1}}})).expect("nested"),
            order
        );
        assert_eq!(
            unwrap_order_payload(json!({"data": [{"id": 1}, {"id": 2}]})).expect("array"),
            order
        );
    }

    #[test]
    fn surfaces_backend_rejections() {
        let err = unwrap_order_payload(json!({"success": false, "message": "Commande introuvable"}))
            .expect_err("rejected");
        assert_eq!(err.to_string(), "Commande introuvable");
        assert!(matches!(
            unwrap_order_payload(json!({"data": []})),
            Err(InvoiceError::Api(_))
        ));
        assert!(matches!(
            unwrap_order_payload(json!("nope")),
            Err(InvoiceError::InvalidOrder(_))
        ));
    }

    #[test]
    fn builds_order_url_from_parts() {
        let client = OrderClient::new("shop.example.tn/api/", "/get_order.php", DEFAULT_TIMEOUT)
            .expect("client");
        assert_eq!(client.order_url(), "https://shop.example.tn/api/get_order.php");
    }

    #[tokio::test]
    async fn fetches_and_unwraps_order_with_session_scope() {
        let (base, server) = one_shot_server(
            "HTTP/1.1 200 OK",
            r#"{"success":true,"order":{"numero_commande":"CMD-9"}}"#,
        )
        .await;
        let client = OrderClient::new(&base, "get_order.php", Duration::from_secs(5)).expect("client");
        let session = SessionContext::signed_in("42", Role::Customer);
        let order = client.fetch_order("9", &session).await.expect("fetch");
        assert_eq!(order["numero_commande"], "CMD-9");

        let request_line = server.await.expect("server task");
        assert!(request_line.starts_with("GET /get_order.php?"), "{request_line}");
        assert!(request_line.contains("id=9"));
        assert!(request_line.contains("user_id=42"));
        assert!(request_line.contains("role=customer"));
    }

    #[tokio::test]
    async fn anonymous_fetch_sends_only_the_id() {
        let (base, server) = one_shot_server("HTTP/1.1 200 OK", r#"{"id":"3"}"#).await;
        let client = OrderClient::new(&base, "get_order.php", Duration::from_secs(5)).expect("client");
        client
            .fetch_order("3", &SessionContext::anonymous())
            .await
            .expect("fetch");
        let request_line = server.await.expect("server task");
        assert!(!request_line.contains("user_id"));
    }

    #[tokio::test]
    async fn http_errors_prefer_backend_message() {
        let (base, _server) = one_shot_server(
            "HTTP/1.1 403 Forbidden",
            r#"{"error":"Accès refusé"}"#,
        )
        .await;
        let client = OrderClient::new(&base, "get_order.php", Duration::from_secs(5)).expect("client");
        let err = client
            .fetch_order("1", &SessionContext::anonymous())
            .await
            .expect_err("forbidden");
        assert_eq!(err.to_string(), "Accès refusé");
    }

    #[tokio::test]
    async fn empty_order_id_is_rejected_without_network() {
        let client = OrderClient::new("localhost:1", "get_order.php", DEFAULT_TIMEOUT).expect("client");
        assert!(client
            .fetch_order("  ", &SessionContext::anonymous())
            .await
            .is_err());
    }
}
