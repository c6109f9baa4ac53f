//! Bot API client and its [`Transport`] implementation.
//!
//! Every method is a `POST {api_url}/bot{token}/{method}` with a JSON body
//! (multipart for `setWebhook` with a certificate). Responses are unwrapped
//! from the `{ok, result, description, error_code, parameters}` envelope.
//!
//! The token is part of the request URL, so URLs are stripped from
//! `reqwest` errors before they can reach a log line.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use gavel_core::{
    ApiError, ApiResult, Chat, ChatId, ChatMember, InlineKeyboard, MessageId, MessageRef,
    OutgoingMessage, ParseMode, Transport, User, UserId,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, ClientBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, trace};

use crate::convert::parse_mode;
use crate::error::{TelegramError, TelegramResult};
use crate::model::{
    ALLOWED_UPDATES, ApiResponse, EditMessageTextParams, GetUpdatesParams, InlineKeyboardMarkup,
    SendMessageParams, TgChat, TgChatMember, TgMessage, TgUpdate, TgUser,
};

/// Timeout for ordinary API calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Slack added on top of the long-poll timeout for `getUpdates`.
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Bot API client.
pub struct TelegramClient {
    http: Client,
    base_url: String,
    closed: AtomicBool,
}

impl TelegramClient {
    /// Creates a client for `token` against `api_url` (usually
    /// `https://api.telegram.org`).
    pub fn new(token: &str, api_url: &str) -> TelegramResult<Self> {
        Self::with_timeout(token, api_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates with a custom request timeout.
    pub fn with_timeout(token: &str, api_url: &str, timeout: Duration) -> TelegramResult<Self> {
        let http = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| TelegramError::Http(e.without_url()))?;

        Ok(Self {
            http,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            closed: AtomicBool::new(false),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    fn ensure_open(&self) -> TelegramResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TelegramError::Closed);
        }
        Ok(())
    }

    /// Calls `method` with a JSON body.
    pub async fn call<P, T>(&self, method: &str, params: &P) -> TelegramResult<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call_with_timeout(method, params, None).await
    }

    async fn call_with_timeout<P, T>(
        &self,
        method: &str,
        params: &P,
        timeout: Option<Duration>,
    ) -> TelegramResult<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.ensure_open()?;
        trace!(method, "Bot API call");

        let mut request = self.http.post(self.endpoint(method)).json(params);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|e| TelegramError::Http(e.without_url()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TelegramError::Http(e.without_url()))?;
        decode(status, &body)
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout: Duration) -> TelegramResult<Vec<TgUpdate>> {
        let params = GetUpdatesParams {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: ALLOWED_UPDATES,
        };
        self.call_with_timeout("getUpdates", &params, Some(timeout + POLL_GRACE))
            .await
    }

    /// Removes any webhook so that `getUpdates` works.
    pub async fn delete_webhook(&self) -> TelegramResult<()> {
        let _: bool = self
            .call("deleteWebhook", &json!({ "drop_pending_updates": false }))
            .await?;
        debug!("Webhook removed");
        Ok(())
    }

    /// Registers `url` as the webhook, uploading a self-signed certificate
    /// when one is given.
    pub async fn set_webhook(
        &self,
        url: &str,
        certificate: Option<&Path>,
        secret_token: Option<&str>,
    ) -> TelegramResult<()> {
        let _: bool = match certificate {
            None => {
                let mut params = json!({ "url": url, "allowed_updates": ALLOWED_UPDATES });
                if let Some(secret) = secret_token {
                    params["secret_token"] = Value::from(secret);
                }
                self.call("setWebhook", &params).await?
            }
            Some(path) => {
                self.ensure_open()?;
                let bytes = tokio::fs::read(path).await?;
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "certificate.pem".to_string());

                let mut form = Form::new()
                    .text("url", url.to_string())
                    .text("allowed_updates", serde_json::to_string(ALLOWED_UPDATES)?)
                    .part("certificate", Part::bytes(bytes).file_name(file_name));
                if let Some(secret) = secret_token {
                    form = form.text("secret_token", secret.to_string());
                }

                let response = self
                    .http
                    .post(self.endpoint("setWebhook"))
                    .multipart(form)
                    .send()
                    .await
                    .map_err(|e| TelegramError::Http(e.without_url()))?;
                let status = response.status().as_u16();
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| TelegramError::Http(e.without_url()))?;
                decode(status, &body)?
            }
        };
        info!(url, certificate = certificate.is_some(), "Webhook registered");
        Ok(())
    }
}

/// Unwraps a response envelope.
fn decode<T: DeserializeOwned>(status: u16, body: &[u8]) -> TelegramResult<T> {
    let envelope: ApiResponse<T> = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(_) if !(200..300).contains(&status) => {
            return Err(TelegramError::api(status, "unexpected response body", None));
        }
        Err(e) => return Err(e.into()),
    };

    if envelope.ok {
        return envelope
            .result
            .ok_or_else(|| TelegramError::api(status, "response has no result", None));
    }

    Err(TelegramError::api(
        envelope.error_code.unwrap_or(status),
        envelope
            .description
            .unwrap_or_else(|| "unknown error".to_string()),
        envelope.parameters.and_then(|p| p.retry_after),
    ))
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send_message(&self, message: OutgoingMessage) -> ApiResult<MessageRef> {
        let params = SendMessageParams {
            chat_id: message.chat_id,
            text: message.text,
            parse_mode: message.parse_mode.map(parse_mode),
            reply_markup: message.keyboard.map(InlineKeyboardMarkup::from),
            reply_to_message_id: message.reply_to,
            disable_web_page_preview: message.disable_link_preview,
        };
        let sent: TgMessage = self.call("sendMessage", &params).await?;
        Ok(MessageRef {
            chat_id: sent.chat.id,
            message_id: sent.message_id,
        })
    }

    async fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        mode: Option<ParseMode>,
        keyboard: Option<InlineKeyboard>,
    ) -> ApiResult<()> {
        let params = EditMessageTextParams {
            chat_id,
            message_id,
            text,
            parse_mode: mode.map(parse_mode),
            reply_markup: keyboard.map(InlineKeyboardMarkup::from),
        };
        // The result is the edited message, or `true` for inline messages.
        let _: Value = self.call("editMessageText", &params).await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> ApiResult<()> {
        let params = json!({ "chat_id": chat_id, "message_id": message_id });
        match self.call::<_, bool>("deleteMessage", &params).await {
            Ok(_) => Ok(()),
            Err(TelegramError::Api {
                code: 400 | 403,
                description,
                ..
            }) => Err(ApiError::not_found(description)),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_chat(&self, chat_id: ChatId) -> ApiResult<Chat> {
        let chat: TgChat = self.call("getChat", &json!({ "chat_id": chat_id })).await?;
        Ok(chat.into())
    }

    async fn get_chat_member(&self, chat_id: ChatId, user_id: UserId) -> ApiResult<ChatMember> {
        let params = json!({ "chat_id": chat_id, "user_id": user_id });
        let member: TgChatMember = self.call("getChatMember", &params).await?;
        Ok(member.into())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> ApiResult<()> {
        let mut params = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            params["text"] = Value::from(text);
        }
        let _: bool = self.call("answerCallbackQuery", &params).await?;
        Ok(())
    }

    async fn get_me(&self) -> ApiResult<User> {
        let me: TgUser = self.call("getMe", &json!({})).await?;
        Ok(me.into())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Telegram client closed");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::{Path as UrlPath, State};
    use axum::routing::post;
    use tokio::net::TcpListener;

    use super::*;

    pub(crate) const TOKEN: &str = "123456TEST";

    type Responder = Arc<dyn Fn(&str, &Value) -> Value + Send + Sync>;

    /// A fake Bot API recording every call as `(method, params)`.
    pub(crate) struct MockApi {
        pub addr: SocketAddr,
        pub calls: Arc<Mutex<Vec<(String, Value)>>>,
    }

    impl MockApi {
        pub(crate) fn url(&self) -> String {
            format!("http://{}", self.addr)
        }

        pub(crate) fn client(&self) -> TelegramClient {
            TelegramClient::new(TOKEN, &self.url()).unwrap()
        }

        pub(crate) fn methods(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(method, _)| method.clone())
                .collect()
        }
    }

    pub(crate) async fn mock_api(
        responder: impl Fn(&str, &Value) -> Value + Send + Sync + 'static,
    ) -> MockApi {
        #[derive(Clone)]
        struct MockState {
            responder: Responder,
            calls: Arc<Mutex<Vec<(String, Value)>>>,
        }

        async fn handle(
            State(state): State<MockState>,
            UrlPath(method): UrlPath<String>,
            body: Bytes,
        ) -> axum::Json<Value> {
            let params = serde_json::from_slice(&body).unwrap_or(Value::Null);
            let reply = (state.responder)(&method, &params);
            state.calls.lock().unwrap().push((method, params));
            axum::Json(reply)
        }

        let calls = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            responder: Arc::new(responder),
            calls: calls.clone(),
        };
        let router = Router::new()
            .route(&format!("/bot{TOKEN}/{{method}}"), post(handle))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        MockApi { addr, calls }
    }

    fn ok(result: Value) -> Value {
        json!({ "ok": true, "result": result })
    }

    fn message(chat_id: i64, message_id: i64) -> Value {
        json!({ "message_id": message_id, "chat": { "id": chat_id, "type": "group" } })
    }

    #[tokio::test]
    async fn test_send_message_payload() {
        let api = mock_api(|_, params| ok(message(params["chat_id"].as_i64().unwrap(), 77))).await;
        let client = api.client();

        let keyboard = InlineKeyboard::single(gavel_core::InlineButton::callback("Back", "help_back"));
        let sent = client
            .send_message(
                OutgoingMessage::new(-100, "*hi*")
                    .markdown()
                    .keyboard(keyboard)
                    .reply_to(5),
            )
            .await
            .unwrap();
        assert_eq!(
            sent,
            MessageRef {
                chat_id: -100,
                message_id: 77
            }
        );

        let calls = api.calls.lock().unwrap();
        let (method, params) = &calls[0];
        assert_eq!(method, "sendMessage");
        assert_eq!(params["parse_mode"], "Markdown");
        assert_eq!(params["reply_to_message_id"], 5);
        assert_eq!(
            params["reply_markup"]["inline_keyboard"][0][0]["callback_data"],
            "help_back"
        );
        assert!(params.get("disable_web_page_preview").is_none());
    }

    #[tokio::test]
    async fn test_error_envelopes() {
        let api = mock_api(|method, _| match method {
            "getChat" => json!({ "ok": false, "error_code": 400, "description": "Bad Request: chat not found" }),
            "sendMessage" => json!({
                "ok": false,
                "error_code": 429,
                "description": "Too Many Requests: retry after 5",
                "parameters": { "retry_after": 5 }
            }),
            "deleteMessage" => json!({ "ok": false, "error_code": 400, "description": "Bad Request: message to delete not found" }),
            _ => json!({ "ok": false, "error_code": 403, "description": "Forbidden: bot was kicked" }),
        })
        .await;
        let client = api.client();

        assert!(matches!(
            client.get_chat(-1).await,
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            client.send_message(OutgoingMessage::new(-1, "x")).await,
            Err(ApiError::RateLimited { retry_after: 5 })
        ));
        let err = client.delete_message(-1, 3).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFoundOrForbidden(_)));
        assert!(err.is_benign());
        assert!(matches!(
            client.get_chat_member(-1, 2).await,
            Err(ApiError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_get_me_and_member() {
        let api = mock_api(|method, _| match method {
            "getMe" => ok(json!({ "id": 1, "is_bot": true, "first_name": "Gavel", "username": "gavel_bot" })),
            "getChatMember" => ok(json!({
                "user": { "id": 2, "first_name": "Bob" },
                "status": "creator"
            })),
            _ => ok(json!(true)),
        })
        .await;
        let client = api.client();

        let me = client.get_me().await.unwrap();
        assert_eq!(me.username.as_deref(), Some("gavel_bot"));

        let member = client.get_chat_member(-1, 2).await.unwrap();
        assert!(member.status.is_admin());
        assert!(member.can_delete());

        tokio_test::assert_ok!(client.answer_callback("q1", Some("done")).await);
        let calls = api.calls.lock().unwrap();
        assert_eq!(calls[2].1["text"], "done");
    }

    #[tokio::test]
    async fn test_closed_client_rejects_calls() {
        let api = mock_api(|_, _| ok(json!(true))).await;
        let client = api.client();
        client.close().await;
        assert!(matches!(client.get_me().await, Err(ApiError::NotConnected)));
        assert!(api.methods().is_empty());
    }

    #[test]
    fn test_decode_non_json_failure() {
        let err = decode::<bool>(502, b"<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, TelegramError::Api { code: 502, .. }));

        let err = decode::<bool>(200, b"not json").unwrap_err();
        assert!(matches!(err, TelegramError::Decode(_)));
    }
}
