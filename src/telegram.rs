//! Minimal Telegram Bot API client.
//!
//! Only the handful of methods the bot needs are wrapped. Every call is a
//! `POST {api_url}/bot{token}/{method}` and every response is the standard
//! envelope:
//!
//! ```json
//! { "ok": true, "result": ... }
//! { "ok": false, "description": "Bad Request: chat not found" }
//! ```
//!
//! All traffic can be routed through a proxy (`http`, `https` or `socks5`)
//! configured in `[telegram].proxy`.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use gifbot_core::gateway::DeliveryGateway;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::TelegramConfig;

// ============ Wire types ============

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub inline_query: Option<InlineQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub animation: Option<FileRef>,
    /// Telegram files some GIF uploads as documents.
    #[serde(default)]
    pub document: Option<FileRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileRef {
    pub file_id: String,
}

/// One entry of an `answerInlineQuery` result list.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InlineResult {
    /// A previously uploaded animation, referenced by its file id.
    Mpeg4Gif { id: String, mpeg4_file_id: String },
    Article {
        id: String,
        title: String,
        input_message_content: InputTextContent,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct InputTextContent {
    pub message_text: String,
}

impl InlineResult {
    pub fn article(id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        InlineResult::Article {
            id: id.into(),
            title: text.clone(),
            input_message_content: InputTextContent { message_text: text },
        }
    }
}

// ============ Client ============

pub struct BotApi {
    client: reqwest::Client,
    base: String,
}

impl BotApi {
    /// Build a client from `[telegram]` config, resolving the token and proxy.
    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        let token = config.resolve_token()?;

        // Long polls hold the connection for up to `poll_timeout_secs`.
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 30));
        if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.is_empty()) {
            let proxy = reqwest::Proxy::all(proxy)
                .with_context(|| format!("Invalid telegram.proxy: {}", proxy))?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build()?;

        Ok(Self::with_client(client, &config.api_url, &token))
    }

    pub fn with_client(client: reqwest::Client, api_url: &str, token: &str) -> Self {
        Self {
            client,
            base: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base, method)
    }

    async fn decode<T: DeserializeOwned>(method: &str, resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        let body = resp.text().await?;
        let parsed: ApiResponse<T> = serde_json::from_str(&body)
            .with_context(|| format!("{}: unexpected response ({}): {}", method, status, body))?;
        if !parsed.ok {
            bail!(
                "{} failed: {}",
                method,
                parsed.description.unwrap_or_else(|| status.to_string())
            );
        }
        parsed
            .result
            .ok_or_else(|| anyhow!("{}: response has no result", method))
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &serde_json::Value) -> Result<T> {
        let resp = self
            .client
            .post(self.url(method))
            .json(body)
            .send()
            .await
            .with_context(|| format!("{} request failed", method))?;
        Self::decode(method, resp).await
    }

    /// Long-poll for updates with `update_id >= offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &serde_json::json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message", "inline_query"],
            }),
        )
        .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let _: Message = self
            .call(
                "sendMessage",
                &serde_json::json!({ "chat_id": chat_id, "text": text }),
            )
            .await?;
        Ok(())
    }

    /// Send an already uploaded animation by its file id.
    pub async fn send_animation(&self, chat_id: i64, file_id: &str) -> Result<()> {
        let _: Message = self
            .call(
                "sendAnimation",
                &serde_json::json!({ "chat_id": chat_id, "animation": file_id }),
            )
            .await?;
        Ok(())
    }

    /// Upload the file at `path` as an animation to `chat_id` and return the
    /// file id Telegram assigned to it.
    pub async fn upload_animation(&self, chat_id: i64, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "animation.gif".to_string());

        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("animation", Part::bytes(bytes).file_name(file_name));

        let resp = self
            .client
            .post(self.url("sendAnimation"))
            .multipart(form)
            .send()
            .await
            .context("sendAnimation upload failed")?;
        let message: Message = Self::decode("sendAnimation", resp).await?;

        message
            .animation
            .or(message.document)
            .map(|f| f.file_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow!("sendAnimation: response carries no file id"))
    }

    pub async fn answer_inline_query(&self, query_id: &str, results: &[InlineResult]) -> Result<()> {
        let _: bool = self
            .call(
                "answerInlineQuery",
                &serde_json::json!({ "inline_query_id": query_id, "results": results }),
            )
            .await?;
        Ok(())
    }
}

// ============ Delivery gateway ============

/// Uploads assets by posting them to a service chat.
///
/// Inline query answers can only reference files Telegram already knows, so
/// every upload goes to the configured service chat and the resulting file id
/// is reused from then on, for messages and inline answers alike.
pub struct TelegramGateway {
    api: Arc<BotApi>,
    service_chat_id: i64,
}

impl TelegramGateway {
    pub fn new(api: Arc<BotApi>, service_chat_id: i64) -> Self {
        Self {
            api,
            service_chat_id,
        }
    }
}

#[async_trait]
impl DeliveryGateway for TelegramGateway {
    async fn upload_asset(&self, path: &Path) -> Result<String> {
        self.api.upload_animation(self.service_chat_id, path).await
    }
}
