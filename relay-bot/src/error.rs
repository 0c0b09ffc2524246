use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("bot token is not set (TELEGRAM_BOT_TOKEN)")]
    MissingToken,

    #[error("chat id is not set (TELEGRAM_CHAT_ID); run `relay-bot chat-id` to find it")]
    MissingChatId,

    #[error("telegram request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("telegram {method} failed with status {status}: {description}")]
    Api {
        method: &'static str,
        status: u16,
        description: String,
    },

    #[error("unexpected telegram response: {0}")]
    Malformed(String),
}
