//! GitHub `repository_dispatch` notifier.
//!
//! POSTs `{event_type, client_payload: {cluster, intents}}` to
//! `/repos/{owner}/{repo}/dispatches`. GitHub answers 204 on success.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{error, info};

use super::{DispatchError, Dispatcher, NotificationPayload};
use crate::config::DispatchConfig;

const ACCEPT: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("egress-intents/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct DispatchRequest<'a> {
    event_type: &'a str,
    client_payload: ClientPayload<'a>,
}

#[derive(Debug, Serialize)]
struct ClientPayload<'a> {
    cluster: &'a str,
    intents: &'a [NotificationPayload],
}

/// GitHub repository dispatch notifier.
pub struct GithubDispatcher {
    client: Client,
    endpoint: String,
    event_type: String,
    cluster: String,
    token: String,
}

impl GithubDispatcher {
    /// Create a dispatcher for `cluster`. The HTTP client carries the
    /// configured timeout, independent of any backend timeout.
    pub fn new(config: &DispatchConfig, cluster: &str) -> Result<Self, DispatchError> {
        if config.owner.trim().is_empty() || config.repo.trim().is_empty() {
            return Err(DispatchError::Config(
                "dispatch owner and repo must be set".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            event_type: config.event_type_for(cluster),
            cluster: cluster.to_string(),
            token: config.token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn body<'a>(&'a self, intents: &'a [NotificationPayload]) -> DispatchRequest<'a> {
        DispatchRequest {
            event_type: &self.event_type,
            client_payload: ClientPayload {
                cluster: &self.cluster,
                intents,
            },
        }
    }
}

#[async_trait]
impl Dispatcher for GithubDispatcher {
    async fn dispatch(&self, intents: &[NotificationPayload]) -> Result<(), DispatchError> {
        let body = serde_json::to_vec(&self.body(intents))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .bearer_auth(&self.token)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            info!(
                endpoint = %self.endpoint,
                event_type = %self.event_type,
                intent_count = intents.len(),
                "Dispatch event triggered successfully"
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        error!(
            endpoint = %self.endpoint,
            status = %status,
            body = %body,
            "Failed to trigger dispatch"
        );
        Err(DispatchError::UnexpectedStatus {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        })
    }

    fn name(&self) -> &str {
        "github"
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    use super::*;

    /// Serve exactly one HTTP request with `response`, handing back the raw
    /// request text.
    pub(crate) async fn serve_once(response: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                    let length = head
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });

        (format!("http://{}", addr), rx)
    }

    fn config(url: &str) -> DispatchConfig {
        DispatchConfig {
            enabled: true,
            url: url.to_string(),
            owner: "acme".to_string(),
            repo: "policies".to_string(),
            token: "s3cret".to_string(),
            ..Default::default()
        }
    }

    fn payloads() -> Vec<NotificationPayload> {
        vec![NotificationPayload {
            client_name: "pay-svc".to_string(),
            client_namespace: "default".to_string(),
            client_kind: "Deployment".to_string(),
            dns_name: "api.stripe.com".to_string(),
        }]
    }

    #[test]
    fn test_missing_repo_fails() {
        let mut config = config("api.github.com");
        config.repo = String::new();
        assert!(matches!(
            GithubDispatcher::new(&config, "prod"),
            Err(DispatchError::Config(_))
        ));
    }

    #[test]
    fn test_body_shape() {
        let dispatcher = GithubDispatcher::new(&config("api.github.com"), "prod").unwrap();
        let intents = payloads();
        let json = serde_json::to_value(dispatcher.body(&intents)).unwrap();

        assert_eq!(json["event_type"], "prod-recieveNewIntents");
        assert_eq!(json["client_payload"]["cluster"], "prod");
        assert_eq!(
            json["client_payload"]["intents"][0]["dns_name"],
            "api.stripe.com"
        );
        assert_eq!(
            dispatcher.endpoint(),
            "https://api.github.com/repos/acme/policies/dispatches"
        );
    }

    #[tokio::test]
    async fn test_dispatch_success_on_204() {
        let (url, request) = serve_once("HTTP/1.1 204 No Content\r\nconnection: close\r\n\r\n").await;
        let dispatcher = GithubDispatcher::new(&config(&url), "prod").unwrap();

        dispatcher.dispatch(&payloads()).await.unwrap();

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /repos/acme/policies/dispatches "));
        let lower = request.to_lowercase();
        assert!(lower.contains("authorization: bearer s3cret"));
        assert!(lower.contains("content-type: application/json"));
        assert!(lower.contains("accept: application/vnd.github+json"));
        assert!(request.contains("\"event_type\":\"prod-recieveNewIntents\""));
        assert!(request.contains("\"dns_name\":\"api.stripe.com\""));
    }

    #[tokio::test]
    async fn test_dispatch_500_is_an_error() {
        let (url, _request) = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 4\r\nconnection: close\r\n\r\noops",
        )
        .await;
        let dispatcher = GithubDispatcher::new(&config(&url), "prod").unwrap();

        let err = dispatcher.dispatch(&payloads()).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::UnexpectedStatus { status: 500, ref body } if body == "oops"
        ));
    }

    #[tokio::test]
    async fn test_dispatch_200_is_not_success() {
        let (url, _request) =
            serve_once("HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n").await;
        let dispatcher = GithubDispatcher::new(&config(&url), "prod").unwrap();

        assert!(matches!(
            dispatcher.dispatch(&payloads()).await,
            Err(DispatchError::UnexpectedStatus { status: 200, .. })
        ));
    }

    #[tokio::test]
    async fn test_dispatch_connection_refused() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let dispatcher =
            GithubDispatcher::new(&config(&format!("http://127.0.0.1:{}", port)), "prod").unwrap();

        assert!(matches!(
            dispatcher.dispatch(&payloads()).await,
            Err(DispatchError::Http(_))
        ));
    }
}
