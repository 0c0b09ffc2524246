use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::RelayError;

const API_BASE: &str = "https://api.telegram.org";

/// Where relay messages go.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<(), RelayError>;

    async fn send_document(&self, filename: &str, contents: Vec<u8>) -> Result<(), RelayError>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Chat {
    pub id: i64,
    pub first_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
}

#[derive(Debug, Deserialize)]
struct Update {
    message: Option<Message>,
}

fn unwrap_response<T>(
    method: &'static str,
    status: u16,
    body: &str,
) -> Result<Option<T>, RelayError>
where
    T: for<'de> Deserialize<'de>,
{
    let parsed: ApiResponse<T> =
        serde_json::from_str(body).map_err(|e| RelayError::Malformed(e.to_string()))?;
    if !parsed.ok {
        return Err(RelayError::Api {
            method,
            status,
            description: parsed.description.unwrap_or_else(|| "no description".to_string()),
        });
    }
    Ok(parsed.result)
}

/// Chat of the most recent update that carries a message.
pub fn latest_chat(updates_body: &str) -> Result<Option<Chat>, RelayError> {
    let updates: Vec<Update> = unwrap_response("getUpdates", 200, updates_body)?.unwrap_or_default();
    Ok(updates
        .into_iter()
        .rev()
        .find_map(|u| u.message.map(|m| m.chat)))
}

pub struct TelegramClient {
    http: Client,
    token: String,
    chat_id: Option<String>,
    parse_mode: Option<String>,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self, RelayError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            token: token.to_string(),
            chat_id: None,
            parse_mode: None,
        })
    }

    pub fn with_chat(mut self, chat_id: &str, parse_mode: Option<String>) -> Self {
        self.chat_id = Some(chat_id.to_string());
        self.parse_mode = parse_mode;
        self
    }

    fn url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", API_BASE, self.token, method)
    }

    fn chat(&self) -> Result<&str, RelayError> {
        self.chat_id.as_deref().ok_or(RelayError::MissingChatId)
    }

    async fn finish(
        &self,
        method: &'static str,
        res: reqwest::Response,
    ) -> Result<(), RelayError> {
        let status = res.status().as_u16();
        let body = res.text().await?;
        unwrap_response::<serde_json::Value>(method, status, &body)?;
        debug!(method, status, "telegram call ok");
        Ok(())
    }

    pub async fn get_updates(&self) -> Result<Option<Chat>, RelayError> {
        let res = self.http.get(self.url("getUpdates")).send().await?;
        let status = res.status().as_u16();
        let body = res.text().await?;
        if status != 200 {
            // error bodies use the same envelope
            unwrap_response::<serde_json::Value>("getUpdates", status, &body)?;
        }
        latest_chat(&body)
    }

    pub async fn send_to(&self, chat_id: i64, text: &str) -> Result<(), RelayError> {
        let res = self
            .http
            .post(self.url("sendMessage"))
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await?;
        self.finish("sendMessage", res).await
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send_text(&self, text: &str) -> Result<(), RelayError> {
        let mut payload = json!({ "chat_id": self.chat()?, "text": text });
        if let Some(mode) = &self.parse_mode {
            payload["parse_mode"] = json!(mode);
        }

        let res = self
            .http
            .post(self.url("sendMessage"))
            .json(&payload)
            .send()
            .await?;
        self.finish("sendMessage", res).await?;
        info!(chars = text.chars().count(), "message sent");
        Ok(())
    }

    async fn send_document(&self, filename: &str, contents: Vec<u8>) -> Result<(), RelayError> {
        let size = contents.len();
        let part = Part::bytes(contents)
            .file_name(filename.to_string())
            .mime_str("application/json")?;
        let form = Form::new()
            .text("chat_id", self.chat()?.to_string())
            .part("document", part);

        let res = self
            .http
            .post(self.url("sendDocument"))
            .multipart(form)
            .send()
            .await?;
        self.finish("sendDocument", res).await?;
        info!(filename, bytes = size, "document sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_the_latest_chat() {
        let body = r#"{"ok":true,"result":[
            {"update_id":1,"message":{"message_id":1,"chat":{"id":100,"first_name":"Old"},"text":"hi"}},
            {"update_id":2,"edited_message":{"message_id":1,"chat":{"id":999},"text":"edit"}},
            {"update_id":3,"message":{"message_id":2,"chat":{"id":200,"first_name":"New","username":"new_user"},"text":"/start"}}
        ]}"#;
        let chat = latest_chat(body).unwrap().unwrap();
        assert_eq!(chat.id, 200);
        assert_eq!(chat.first_name.as_deref(), Some("New"));
        assert_eq!(chat.username.as_deref(), Some("new_user"));
    }

    #[test]
    fn no_updates_means_no_chat() {
        assert_eq!(latest_chat(r#"{"ok":true,"result":[]}"#).unwrap(), None);
    }

    #[test]
    fn api_errors_carry_the_description() {
        let err = latest_chat(r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#)
            .unwrap_err();
        match err {
            RelayError::Api { description, .. } => assert_eq!(description, "Unauthorized"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(latest_chat("<html>"), Err(RelayError::Malformed(_))));
    }
}
