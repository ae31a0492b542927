//! Telegram Bot API delivery.
//!
//! One `sendMessage` call per recipient, in configured order. A failing
//! recipient is logged and never blocks the rest; nothing is retried.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{info, instrument, warn};

use alphawatch_shared::{AlphaWatchError, Result, TelegramConfig};

/// Longest slice of an error response body kept for logs.
const MAX_ERROR_BODY: usize = 200;

// ---------------------------------------------------------------------------
// Message types
// ---------------------------------------------------------------------------

/// A single inline-keyboard link button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkButton {
    pub text: String,
    pub url: String,
}

/// Rich-text (Telegram HTML) message with an optional link button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub button: Option<LinkButton>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            button: None,
        }
    }

    pub fn with_button(mut self, text: impl Into<String>, url: impl Into<String>) -> Self {
        self.button = Some(LinkButton {
            text: text.into(),
            url: url.into(),
        });
        self
    }
}

/// Per-recipient outcome of one [`TelegramNotifier::send`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: Vec<String>,
    /// `(chat_id, error message)`.
    pub failed: Vec<(String, String)>,
}

impl DispatchReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// `sendMessage` request body.
#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboard<'a>>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboard<'a> {
    inline_keyboard: [[&'a LinkButton; 1]; 1],
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Sends messages to a fixed list of chats through one bot.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    /// Embeds the bot token; never printed.
    endpoint: String,
    chat_ids: Vec<String>,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("endpoint", &"<redacted>")
            .field("chat_ids", &self.chat_ids)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    /// Build a notifier for `config.chat_ids` authenticated with `token`.
    pub fn new(config: &TelegramConfig, token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.send_timeout_secs))
            .build()
            .map_err(|e| AlphaWatchError::Dispatch(format!("failed to build HTTP client: {e}")))?;

        if config.chat_ids.is_empty() {
            warn!("no Telegram chat ids configured, alerts will go nowhere");
        }

        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{token}/sendMessage",
                config.api_base.trim_end_matches('/')
            ),
            chat_ids: config.chat_ids.clone(),
        })
    }

    /// Number of configured recipients.
    pub fn recipient_count(&self) -> usize {
        self.chat_ids.len()
    }

    /// Deliver `message` to every recipient, sequentially.
    #[instrument(skip_all, fields(recipients = self.chat_ids.len()))]
    pub async fn send(&self, message: &OutboundMessage) -> DispatchReport {
        let mut report = DispatchReport::default();

        for chat_id in &self.chat_ids {
            match self.send_one(chat_id, message).await {
                Ok(()) => {
                    info!(%chat_id, "alert delivered");
                    report.delivered.push(chat_id.clone());
                }
                Err(e) => {
                    warn!(%chat_id, error = %e, "alert delivery failed");
                    report.failed.push((chat_id.clone(), e.to_string()));
                }
            }
        }

        report
    }

    async fn send_one(&self, chat_id: &str, message: &OutboundMessage) -> Result<()> {
        let body = SendMessage {
            chat_id,
            text: &message.text,
            parse_mode: "HTML",
            disable_web_page_preview: false,
            reply_markup: message.button.as_ref().map(|button| InlineKeyboard {
                inline_keyboard: [[button]],
            }),
        };

        // The endpoint embeds the bot token, so reqwest errors are stripped of the URL.
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AlphaWatchError::Dispatch(e.without_url().to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        let snippet: String = text.chars().take(MAX_ERROR_BODY).collect();
        Err(AlphaWatchError::Dispatch(format!("HTTP {status}: {snippet}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TOKEN: &str = "123:TEST";

    fn config_for(uri: &str, chat_ids: &[&str]) -> TelegramConfig {
        TelegramConfig {
            api_base: uri.to_string(),
            chat_ids: chat_ids.iter().map(|s| s.to_string()).collect(),
            ..TelegramConfig::default()
        }
    }

    #[tokio::test]
    async fn sends_html_message_with_button() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/bot123:TEST/sendMessage"))
            .and(wiremock::matchers::body_partial_json(json!({
                "chat_id": "1001",
                "text": "<b>hi</b>",
                "parse_mode": "HTML",
                "reply_markup": {
                    "inline_keyboard": [[{ "text": "Open", "url": "https://example.com/feed" }]]
                }
            })))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::new(&config_for(&server.uri(), &["1001"]), TOKEN).unwrap();
        let message = OutboundMessage::text("<b>hi</b>").with_button("Open", "https://example.com/feed");
        let report = notifier.send(&message).await;

        assert_eq!(report.delivered, vec!["1001"]);
        assert!(report.all_delivered());
    }

    #[tokio::test]
    async fn plain_message_has_no_markup() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::new(&config_for(&server.uri(), &["1"]), TOKEN).unwrap();
        notifier.send(&OutboundMessage::text("started")).await;

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("reply_markup").is_none());
        assert_eq!(body["disable_web_page_preview"], json!(false));
    }

    #[tokio::test]
    async fn partial_failure_reaches_every_recipient() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::body_partial_json(json!({"chat_id": "1"})))
            .respond_with(
                wiremock::ResponseTemplate::new(403)
                    .set_body_string(r#"{"ok":false,"description":"Forbidden: bot was blocked by the user"}"#),
            )
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::body_partial_json(json!({"chat_id": "2"})))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let notifier =
            TelegramNotifier::new(&config_for(&server.uri(), &["1", "2"]), TOKEN).unwrap();
        let report = notifier.send(&OutboundMessage::text("alert")).await;

        assert_eq!(report.delivered, vec!["2"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "1");
        assert!(report.failed[0].1.contains("403"));
        assert!(report.failed[0].1.contains("blocked"));
    }

    #[tokio::test]
    async fn unreachable_api_is_reported_without_token() {
        // Nothing listens on port 9 locally.
        let config = config_for("http://127.0.0.1:9", &["1"]);
        let notifier = TelegramNotifier::new(&config, TOKEN).unwrap();
        let report = notifier.send(&OutboundMessage::text("alert")).await;

        assert!(report.delivered.is_empty());
        assert!(!report.failed[0].1.contains(TOKEN));
    }

    #[test]
    fn debug_output_hides_token() {
        let notifier =
            TelegramNotifier::new(&config_for("https://api.telegram.org", &["1001"]), TOKEN).unwrap();
        let printed = format!("{notifier:?}");
        assert!(!printed.contains(TOKEN));
        assert!(printed.contains("1001"));
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let notifier =
            TelegramNotifier::new(&config_for("https://api.telegram.org/", &[]), TOKEN).unwrap();
        assert_eq!(notifier.endpoint, "https://api.telegram.org/bot123:TEST/sendMessage");
        assert_eq!(notifier.recipient_count(), 0);
    }
}
