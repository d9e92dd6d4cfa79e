use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    result: Option<SentMessage>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Outcome of one `sendMessage` call that reached the Telegram API.
///
/// `Rejected` carries Telegram's own HTTP status (e.g. 429 for rate
/// limiting) so the relay can pass it through verbatim. Transport failures
/// and undecodable bodies are `Err` instead.
#[derive(Debug)]
pub enum SendOutcome {
    Sent { message_id: i64 },
    Rejected { status: u16, description: String },
}

pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    /// `base_url` is normally `https://api.telegram.org`; tests point it at
    /// a local fake server.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub async fn send_message(
        &self,
        token: &str,
        chat_id: &str,
        text: &str,
        parse_mode: &str,
    ) -> Result<SendOutcome> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, token);
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode,
        };

        // The URL embeds the bot token, so log the chat id only.
        debug!("Forwarding sendMessage for chat {}", chat_id);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Telegram")?;

        let status = response.status().as_u16();
        let api: ApiResponse = response
            .json()
            .await
            .context("Failed to parse Telegram response")?;

        if api.ok {
            let message_id = api
                .result
                .map(|r| r.message_id)
                .context("Telegram response missing result")?;
            Ok(SendOutcome::Sent { message_id })
        } else {
            Ok(SendOutcome::Rejected {
                status,
                description: api
                    .description
                    .unwrap_or_else(|| "Unknown Telegram error".to_string()),
            })
        }
    }
}
