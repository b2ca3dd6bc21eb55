//! Transport seam between the pipeline and the webhook endpoint.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use http::Request;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

use super::wire::WirePayload;

/// Outcome of one transmission attempt. Transports never fail with an
/// error type; every failure mode is a value the pipeline can act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportResult {
    /// The endpoint accepted the payload.
    Delivered,
    /// The endpoint answered with a non-success status. The connection
    /// works; the payload or the endpoint state is the problem.
    Rejected { status: u16 },
    /// The request never completed: DNS, TLS, timeout, refused socket.
    /// Taken as evidence the client is offline.
    NetworkError { message: String },
}

impl TransportResult {
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, TransportResult::Delivered)
    }

    #[must_use]
    pub fn is_network_error(&self) -> bool {
        matches!(self, TransportResult::NetworkError { .. })
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, payload: &WirePayload) -> TransportResult;
}

type WebhookClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// HTTPS transport posting JSON to the configured webhook URL.
pub struct HttpTransport {
    endpoint: String,
    client: WebhookClient,
}

impl HttpTransport {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        let https = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(https);
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: &WirePayload) -> TransportResult {
        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(err) => {
                return TransportResult::NetworkError {
                    message: format!("payload serialization failed: {err}"),
                };
            },
        };

        let request = match Request::builder()
            .method("POST")
            .uri(&self.endpoint)
            .header("content-type", "application/json")
            .header("user-agent", "cohort/0.1")
            .body(Full::new(Bytes::from(body)))
        {
            Ok(request) => request,
            Err(err) => {
                return TransportResult::NetworkError {
                    message: format!("request build failed: {err}"),
                };
            },
        };

        match self.client.request(request).await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    debug!(status = status.as_u16(), "webhook accepted payload");
                    return TransportResult::Delivered;
                }
                let detail = match response.into_body().collect().await {
                    Ok(collected) => {
                        let bytes = collected.to_bytes();
                        String::from_utf8_lossy(&bytes[..bytes.len().min(200)]).into_owned()
                    },
                    Err(_) => String::new(),
                };
                warn!(
                    status = status.as_u16(),
                    detail, "webhook rejected payload"
                );
                TransportResult::Rejected {
                    status: status.as_u16(),
                }
            },
            Err(err) => {
                debug!(error = %err, "webhook request failed to complete");
                TransportResult::NetworkError {
                    message: err.to_string(),
                }
            },
        }
    }
}

/// Scripted transport for tests and embedders that stub delivery.
///
/// Results are served from the enqueued script first, then from the
/// default result. Every payload handed to [`send`](Transport::send) is
/// recorded in arrival order.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<TransportResult>>,
    default: Mutex<TransportResult>,
    sent: Mutex<Vec<WirePayload>>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn delivering() -> Self {
        Self::with_default(TransportResult::Delivered)
    }

    #[must_use]
    pub fn rejecting(status: u16) -> Self {
        Self::with_default(TransportResult::Rejected { status })
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_default(TransportResult::NetworkError {
            message: message.into(),
        })
    }

    fn with_default(default: TransportResult) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: Mutex::new(default),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Queues one scripted result ahead of the default.
    pub fn enqueue(&self, result: TransportResult) {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(result);
    }

    /// Replaces the default served once the script is exhausted.
    pub fn set_default(&self, result: TransportResult) {
        *self
            .default
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = result;
    }

    #[must_use]
    pub fn sent(&self) -> Vec<WirePayload> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, payload: &WirePayload) -> TransportResult {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(payload.clone());
        let scripted = self
            .script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        match scripted {
            Some(result) => result,
            None => self
                .default
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::observation::OutboundObservation;
    use crate::delivery::wire::{payload_for, SenderIdentity};

    fn payload() -> WirePayload {
        let observation = OutboundObservation::new("page_view", "CalmHeron1204");
        let sender = SenderIdentity {
            username: "Cohort".to_string(),
            avatar_url: None,
        };
        payload_for(&observation, &sender)
    }

    #[tokio::test]
    async fn script_runs_before_default() {
        let transport = ScriptedTransport::delivering();
        transport.enqueue(TransportResult::Rejected { status: 500 });
        transport.enqueue(TransportResult::NetworkError {
            message: "refused".to_string(),
        });

        let p = payload();
        assert_eq!(
            transport.send(&p).await,
            TransportResult::Rejected { status: 500 }
        );
        assert!(transport.send(&p).await.is_network_error());
        assert!(transport.send(&p).await.is_delivered());
        assert_eq!(transport.sent_count(), 3);
    }

    #[tokio::test]
    async fn default_can_be_swapped_mid_test() {
        let transport = ScriptedTransport::failing("down");
        let p = payload();
        assert!(transport.send(&p).await.is_network_error());

        transport.set_default(TransportResult::Delivered);
        assert!(transport.send(&p).await.is_delivered());
    }

    #[tokio::test]
    async fn recorded_payloads_keep_order() {
        let transport = ScriptedTransport::delivering();
        for kind in ["first", "second", "third"] {
            let observation = OutboundObservation::new(kind, "CalmHeron1204");
            let sender = SenderIdentity {
                username: "Cohort".to_string(),
                avatar_url: None,
            };
            transport.send(&payload_for(&observation, &sender)).await;
        }
        let titles: Vec<String> = transport
            .sent()
            .iter()
            .map(|p| p.embeds[0].title.clone())
            .collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);
    }
}
