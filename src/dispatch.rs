//! Notification delivery
//!
//! Fans filtered notifications out to every interested subscriber's channels.
//! Delivery is sequential and fail-fast: the first failed webhook aborts the
//! remaining deliveries and is returned to the caller. Preview mode renders
//! exactly the same requests but never touches the network.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use tracing::{info, info_span, warn, Instrument};

use crate::config::{ChannelType, NotifierConfig};
use crate::error::{DeliveryError, Result};
use crate::notification::{Notification, NotificationKind};
use crate::render::{render, SlackPayload, Stage};
use crate::settings::HttpSettings;

/// Longest response body kept in a delivery error
const MAX_ERROR_BODY: usize = 200;

/// A fully rendered webhook call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRequest {
    pub endpoint: String,
    pub headers: BTreeMap<String, String>,
    /// Compact JSON payload
    pub body: String,
}

/// Sends webhook requests
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post(&self, request: &WebhookRequest) -> std::result::Result<(), DeliveryError>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new(settings: &HttpSettings) -> std::result::Result<Self, DeliveryError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| DeliveryError::Client(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn post(&self, request: &WebhookRequest) -> std::result::Result<(), DeliveryError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &request.headers {
            let invalid = || DeliveryError::InvalidHeader {
                endpoint: request.endpoint.clone(),
                name: name.clone(),
            };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.insert(header_name, header_value);
        }

        let response = self
            .http
            .post(&request.endpoint)
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| DeliveryError::Transport {
                endpoint: request.endpoint.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                endpoint: request.endpoint.clone(),
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Render and report, but send nothing
    pub preview: bool,
    pub stage: Stage,
    /// Link to the change under review (e.g. a pull request)
    pub action_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Sent,
    Previewed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub subscriber: String,
    pub kind: NotificationKind,
    pub request: WebhookRequest,
    pub mode: DeliveryMode,
}

/// Every delivery made (or previewed) by one dispatch call, in order
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub deliveries: Vec<Delivery>,
}

impl DispatchReport {
    pub fn sent(&self) -> usize {
        self.count(DeliveryMode::Sent)
    }

    pub fn previewed(&self) -> usize {
        self.count(DeliveryMode::Previewed)
    }

    fn count(&self, mode: DeliveryMode) -> usize {
        self.deliveries.iter().filter(|d| d.mode == mode).count()
    }
}

/// Deliver `notifications` to subscribers x channels x wanted notifications
pub async fn dispatch(
    config: &NotifierConfig,
    notifications: &[Notification],
    options: &DispatchOptions,
    transport: &dyn WebhookTransport,
) -> Result<DispatchReport> {
    let mut report = DispatchReport::default();

    for (name, subscriber) in config.owners.iter() {
        for channel in &subscriber.channels {
            if channel.transport != ChannelType::Slack {
                warn!(
                    "Subscriber '{}' has unsupported channel type '{}', skipping",
                    name, channel.transport
                );
                continue;
            }

            let wanted = notifications
                .iter()
                .filter(|n| n.is_routable() && config.wants(name, subscriber, n));

            for notification in wanted {
                let action_url = options.action_url.as_deref();
                let Some(message) = render(config, notification, options.stage, action_url) else {
                    continue;
                };

                let request = WebhookRequest {
                    endpoint: channel.webhook.clone(),
                    headers: channel.headers.clone(),
                    body: serde_json::to_string(&SlackPayload::from(&message))?,
                };

                let mode = if options.preview {
                    info!("[DRY RUN] Would send {} to {}", notification.kind, request.endpoint);
                    DeliveryMode::Previewed
                } else {
                    let span =
                        info_span!("deliver", subscriber = name, endpoint = %request.endpoint);
                    transport.post(&request).instrument(span).await?;
                    info!("Sent {} to {}", notification.kind, request.endpoint);
                    DeliveryMode::Sent
                };

                report.deliveries.push(Delivery {
                    subscriber: name.to_string(),
                    kind: notification.kind.clone(),
                    request,
                    mode,
                });
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use chrono::{TimeZone, Utc};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::error::NotifierError;
    use crate::notification::{Metadata, Owner, ResourceKind, ResourceRef};

    /// Records every request; fails for endpoints listed in `failing`
    #[derive(Default)]
    struct RecordingTransport {
        requests: Mutex<Vec<WebhookRequest>>,
        failing: Vec<String>,
    }

    impl RecordingTransport {
        fn failing(endpoint: &str) -> Self {
            Self {
                failing: vec![endpoint.to_string()],
                ..Default::default()
            }
        }

        fn endpoints(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.endpoint.clone())
                .collect()
        }
    }

    #[async_trait]
    impl WebhookTransport for RecordingTransport {
        async fn post(&self, request: &WebhookRequest) -> std::result::Result<(), DeliveryError> {
            self.requests.lock().unwrap().push(request.clone());
            if self.failing.contains(&request.endpoint) {
                return Err(DeliveryError::Status {
                    endpoint: request.endpoint.clone(),
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    const CONFIGURATION: &str = r#"
eventcatalog_url: https://eventcatalog.example.com
owners:
  dboyne:
    events:
      - consumer-added
    channels:
      - type: slack
        webhook: https://hooks.example.com/first
        headers:
          X-Source: eventcatalog
      - type: teams
        webhook: https://hooks.example.com/teams
  payments-team:
    events:
      - consumer-added
      - consumer-removed
    channels:
      - type: slack
        webhook: https://hooks.example.com/second
"#;

    fn config() -> NotifierConfig {
        NotifierConfig::from_yaml_str(CONFIGURATION, |_| None).unwrap()
    }

    fn notification(kind: NotificationKind) -> Notification {
        let resource = ResourceRef {
            id: "PaymentComplete".to_string(),
            name: "Payment Complete".to_string(),
            version: Some("0.0.2".to_string()),
            kind: ResourceKind::Event,
            owners: vec![Owner::new("dboyne")],
        };
        let consumer = ResourceRef {
            id: "PaymentService".to_string(),
            name: "Payment Service".to_string(),
            version: Some("0.0.1".to_string()),
            kind: ResourceKind::Service,
            owners: vec![Owner::new("dboyne")],
        };
        let metadata = Metadata {
            timestamp: Utc.with_ymd_and_hms(2025, 7, 23, 9, 49, 1).unwrap(),
            catalog_path: PathBuf::from("/catalog"),
            environment: None,
        };
        Notification::new(kind, resource, consumer, metadata)
    }

    fn live() -> DispatchOptions {
        DispatchOptions::default()
    }

    #[tokio::test]
    async fn test_sends_to_interested_subscribers_in_order() {
        let transport = RecordingTransport::default();
        let notifications = vec![
            notification(NotificationKind::ConsumerAdded),
            notification(NotificationKind::ConsumerRemoved),
        ];

        let report = dispatch(&config(), &notifications, &live(), &transport).await.unwrap();

        assert_eq!(
            transport.endpoints(),
            vec![
                "https://hooks.example.com/first",
                "https://hooks.example.com/second",
                "https://hooks.example.com/second",
            ]
        );
        assert_eq!(report.sent(), 3);
        assert_eq!(report.deliveries[2].kind, NotificationKind::ConsumerRemoved);

        let requests = transport.requests.lock().unwrap();
        let first = &requests[0];
        assert_eq!(
            first.headers.get("X-Source").map(String::as_str),
            Some("eventcatalog")
        );
        let body: serde_json::Value = serde_json::from_str(&first.body).unwrap();
        assert_eq!(body["text"], "🆕 EventCatalog - ✉️ New Event Consumer Added");
    }

    #[tokio::test]
    async fn test_first_failure_stops_dispatch() {
        let transport = RecordingTransport::failing("https://hooks.example.com/first");
        let notifications = vec![notification(NotificationKind::ConsumerAdded)];

        let err = dispatch(&config(), &notifications, &live(), &transport).await.unwrap_err();

        assert_eq!(transport.endpoints(), vec!["https://hooks.example.com/first"]);
        match err {
            NotifierError::Delivery(e) => {
                assert_eq!(e.endpoint(), Some("https://hooks.example.com/first"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_preview_makes_no_calls() {
        let transport = RecordingTransport::failing("https://hooks.example.com/first");
        let notifications = vec![
            notification(NotificationKind::ConsumerAdded),
            notification(NotificationKind::ConsumerRemoved),
        ];
        let options = DispatchOptions {
            preview: true,
            ..Default::default()
        };

        let preview = dispatch(&config(), &notifications, &options, &transport).await.unwrap();
        assert!(transport.endpoints().is_empty());
        assert_eq!(preview.previewed(), 3);

        let recorder = RecordingTransport::default();
        let sent = dispatch(&config(), &notifications[1..], &live(), &recorder)
            .await
            .unwrap();
        assert_eq!(preview.deliveries[2].request, sent.deliveries[0].request);
    }

    #[tokio::test]
    async fn test_unrenderable_and_unowned_notifications_are_skipped() {
        let transport = RecordingTransport::default();
        let mut unowned = notification(NotificationKind::ConsumerAdded);
        unowned.resource.owners.clear();
        let unknown = notification(NotificationKind::from("consumer-added-v2"));

        let report = dispatch(&config(), &[unowned, unknown], &live(), &transport).await.unwrap();
        assert!(report.deliveries.is_empty());
        assert!(transport.endpoints().is_empty());
    }

    /// Whether `received` holds the request head and its full body
    fn request_complete(received: &[u8]) -> bool {
        let Some(end) = received.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let head = String::from_utf8_lossy(&received[..end]);
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        received.len() >= end + 4 + length
    }

    /// Answers a single request with `404 no_service`, returning the webhook URL
    async fn serve_not_found() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            while !request_complete(&received) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }

            let body = "no_service";
            let response = format!(
                "HTTP/1.1 404 Not Found\r\n\
                 content-type: text/plain\r\n\
                 content-length: {}\r\n\
                 connection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}/hook", addr)
    }

    fn webhook_request(endpoint: &str) -> WebhookRequest {
        WebhookRequest {
            endpoint: endpoint.to_string(),
            headers: BTreeMap::from([("X-Source".to_string(), "eventcatalog".to_string())]),
            body: r#"{"text":"hello"}"#.to_string(),
        }
    }

    #[tokio::test]
    async fn test_http_error_status_is_reported() {
        let endpoint = serve_not_found().await;
        let transport = HttpTransport::new(&HttpSettings::default()).unwrap();

        let err = transport.post(&webhook_request(&endpoint)).await.unwrap_err();
        match err {
            DeliveryError::Status {
                endpoint: failed,
                status,
                body,
            } => {
                assert_eq!(failed, endpoint);
                assert_eq!(status, 404);
                assert_eq!(body, "no_service");
            }
            other => panic!("Expected Status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/hook", listener.local_addr().unwrap());
        drop(listener);

        let settings = HttpSettings {
            timeout_secs: 2,
            ..HttpSettings::default()
        };
        let transport = HttpTransport::new(&settings).unwrap();

        let err = transport.post(&webhook_request(&endpoint)).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Transport { .. }));
        assert_eq!(err.endpoint(), Some(endpoint.as_str()));
    }
}
