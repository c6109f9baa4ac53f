//! Webhook update source.
//!
//! ```text
//! Telegram ──POST {path}──► axum ──► secret check ──► decode ──► intake
//! ```
//!
//! The webhook is registered with `setWebhook` before the listener starts.
//! When a secret token is configured, requests without the matching
//! `X-Telegram-Bot-Api-Secret-Token` header are rejected with 401.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use gavel_core::Update;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use crate::client::TelegramClient;
use crate::error::TelegramResult;
use crate::model::TgUpdate;

pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Where the webhook listens and how it is registered.
#[derive(Debug, Clone)]
pub struct WebhookOptions {
    /// Public URL registered with Telegram, path included.
    pub public_url: String,
    /// Local `host:port` to bind.
    pub bind_addr: String,
    /// Route that receives updates.
    pub path: String,
    pub certificate: Option<PathBuf>,
    pub secret_token: Option<String>,
}

struct WebhookState {
    intake: mpsc::Sender<Update>,
    secret_token: Option<String>,
}

/// Serves the webhook endpoint until cancelled.
pub struct WebhookServer {
    client: Arc<TelegramClient>,
    options: WebhookOptions,
}

impl WebhookServer {
    pub fn new(client: Arc<TelegramClient>, options: WebhookOptions) -> Self {
        Self { client, options }
    }

    /// Registers the webhook, binds the listener and serves until `token`
    /// is cancelled.
    pub async fn run(self, intake: mpsc::Sender<Update>, token: CancellationToken) -> TelegramResult<()> {
        self.client
            .set_webhook(
                &self.options.public_url,
                self.options.certificate.as_deref(),
                self.options.secret_token.as_deref(),
            )
            .await?;

        let listener = TcpListener::bind(&self.options.bind_addr).await?;
        serve(listener, &self.options.path, intake, self.options.secret_token, token).await
    }
}

/// Serves the update route on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    path: &str,
    intake: mpsc::Sender<Update>,
    secret_token: Option<String>,
    token: CancellationToken,
) -> TelegramResult<()> {
    let addr = listener.local_addr()?;
    let router = router(path, intake, secret_token);
    info!(addr = %addr, path = %path, "Webhook listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(token.cancelled_owned())
        .await?;

    info!(addr = %addr, "Webhook stopped");
    Ok(())
}

fn router(path: &str, intake: mpsc::Sender<Update>, secret_token: Option<String>) -> Router {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    let state = Arc::new(WebhookState {
        intake,
        secret_token,
    });
    Router::new()
        .route(&path, post(receive_update))
        .with_state(state)
}

async fn receive_update(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(expected) = &state.secret_token {
        let given = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        if given != Some(expected.as_str()) {
            warn!("Webhook request with missing or wrong secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let update: TgUpdate = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, len = body.len(), "Undecodable webhook payload");
            return StatusCode::BAD_REQUEST;
        }
    };
    trace!(update_id = update.update_id, "Webhook update received");

    if state.intake.send(update.into()).await.is_err() {
        error!("Intake closed, rejecting webhook update");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use serde_json::json;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::client::tests::mock_api;
    use crate::error::TelegramError;

    async fn start(
        secret: Option<&str>,
    ) -> (SocketAddr, mpsc::Receiver<Update>, CancellationToken, JoinHandle<TelegramResult<()>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let task = tokio::spawn(serve(
            listener,
            "webhook",
            tx,
            secret.map(str::to_string),
            token.clone(),
        ));
        (addr, rx, token, task)
    }

    fn update_body(id: i64) -> serde_json::Value {
        json!({
            "update_id": id,
            "message": { "message_id": 1, "chat": { "id": 9, "type": "private" }, "text": "/start" }
        })
    }

    #[tokio::test]
    async fn test_updates_reach_intake() {
        let (addr, mut rx, token, task) = start(None).await;
        let http = reqwest::Client::new();

        let response = http
            .post(format!("http://{addr}/webhook"))
            .json(&update_body(41))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(rx.recv().await.unwrap().id, 41);

        let response = http
            .post(format!("http://{addr}/webhook"))
            .body("not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        drop(http);
        token.cancel();
        tokio_test::assert_ok!(task.await.unwrap());
    }

    #[tokio::test]
    async fn test_secret_token_is_enforced() {
        let (addr, mut rx, token, task) = start(Some("s3cret")).await;
        let http = reqwest::Client::new();

        let response = http
            .post(format!("http://{addr}/webhook"))
            .json(&update_body(1))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

        let response = http
            .post(format!("http://{addr}/webhook"))
            .header(SECRET_TOKEN_HEADER, "s3cret")
            .json(&update_body(2))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(rx.recv().await.unwrap().id, 2);

        drop(http);
        token.cancel();
        tokio_test::assert_ok!(task.await.unwrap());
    }

    #[tokio::test]
    async fn test_registration_failure_is_returned() {
        let api = mock_api(|_, _| {
            json!({ "ok": false, "error_code": 400, "description": "Bad Request: bad webhook" })
        })
        .await;
        let server = WebhookServer::new(
            Arc::new(api.client()),
            WebhookOptions {
                public_url: "https://example.com/webhook".to_string(),
                bind_addr: "127.0.0.1:0".to_string(),
                path: "/webhook".to_string(),
                certificate: None,
                secret_token: Some("s3cret".to_string()),
            },
        );
        let (tx, _rx) = mpsc::channel(1);
        let result = server.run(tx, CancellationToken::new()).await;
        assert!(matches!(result, Err(TelegramError::Api { code: 400, .. })));

        let calls = api.calls.lock().unwrap();
        assert_eq!(calls[0].0, "setWebhook");
        assert_eq!(calls[0].1["secret_token"], "s3cret");
    }
}
