use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::notify::ChatSender;
use crate::errors::ChatError;

pub const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api";

/// Body of `chat.postMessage`.
#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
}

/// Envelope every Slack Web API method answers with.
#[derive(Debug, Deserialize)]
pub struct SlackResponse {
    pub ok: bool,
    pub error: Option<String>,
}

impl SlackResponse {
    pub fn into_result(self) -> Result<(), ChatError> {
        if self.ok {
            Ok(())
        } else {
            Err(ChatError::Api(
                self.error.unwrap_or_else(|| "unknown_error".to_string()),
            ))
        }
    }
}

/// Slack Web API client posting plain-text messages.
pub struct SlackClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl SlackClient {
    pub fn new(api_url: &str, token: &str) -> Result<Self, ChatError> {
        if token.trim().is_empty() {
            return Err(ChatError::NotConfigured("missing Slack API token".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl ChatSender for SlackClient {
    async fn send(&self, channel: &str, text: &str) -> Result<(), ChatError> {
        let resp = self
            .client
            .post(format!("{}/chat.postMessage", self.api_url))
            .bearer_auth(&self.token)
            .json(&PostMessage { channel, text })
            .send()
            .await
            .map_err(ChatError::Transport)?;

        let resp = resp.error_for_status().map_err(ChatError::Transport)?;
        resp.json::<SlackResponse>()
            .await
            .map_err(ChatError::Transport)?
            .into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_response() {
        let resp: SlackResponse = serde_json::from_str(r#"{"ok": true, "ts": "1.2"}"#).unwrap();
        assert!(resp.into_result().is_ok());
    }

    #[test]
    fn test_error_response_maps_to_api_error() {
        let resp: SlackResponse =
            serde_json::from_str(r#"{"ok": false, "error": "channel_not_found"}"#).unwrap();
        match resp.into_result() {
            Err(ChatError::Api(code)) => assert_eq!(code, "channel_not_found"),
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_client_requires_token() {
        assert!(matches!(
            SlackClient::new(DEFAULT_SLACK_API_URL, "  "),
            Err(ChatError::NotConfigured(_))
        ));
        assert!(SlackClient::new(DEFAULT_SLACK_API_URL, "xoxb-1").is_ok());
    }

    #[test]
    fn test_post_message_body() {
        let body = serde_json::to_value(PostMessage {
            channel: "#billing",
            text: "hello",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"channel": "#billing", "text": "hello"}));
    }
}
