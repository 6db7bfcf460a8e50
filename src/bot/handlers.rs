use crate::bot::flow::{ChatReplier, ConversationFlow};
use crate::bot::state::State;
use crate::bot::views::{parse_selection, results_keyboard, BotView, DefaultBotView};
use crate::catalog::SearchHit;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::{
    dispatching::dialogue::InMemStorage,
    prelude::*,
    types::InputFile,
    utils::command::BotCommands,
};
use tracing::{debug, info, warn};
use url::Url;

/// Dialogue handle used by all handlers
pub type BotDialogue = Dialogue<State, InMemStorage<State>>;

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Start the bot and show welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Show usage
    #[command(description = "Show usage.")]
    Help,
}

/// Telegram-backed [`ChatReplier`] bound to one chat
pub struct TelegramReplier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramReplier {
    /// Create a replier sending into `chat_id`
    pub const fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl ChatReplier for TelegramReplier {
    async fn send_text(&self, text: &str) -> Result<()> {
        self.bot.send_message(self.chat_id, text).await?;
        Ok(())
    }

    async fn send_photo(&self, photo_url: &str, caption: &str) -> Result<()> {
        let url = Url::parse(photo_url).map_err(|e| anyhow!("Invalid poster URL: {e}"))?;
        self.bot
            .send_photo(self.chat_id, InputFile::url(url))
            .caption(caption)
            .await?;
        Ok(())
    }

    async fn send_results(&self, text: &str, hits: &[SearchHit], limit: usize) -> Result<()> {
        self.bot
            .send_message(self.chat_id, text)
            .reply_markup(results_keyboard(hits, limit))
            .await?;
        Ok(())
    }
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> u64 {
    msg.from.as_ref().map_or(0, |u| u.id.0)
}

/// Start / help handler
///
/// # Errors
///
/// Returns an error if the dialogue cannot be reset or the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message, dialogue: BotDialogue) -> Result<()> {
    info!("User {} initiated /start.", get_user_id_safe(&msg));

    dialogue
        .update(State::AwaitingQuery)
        .await
        .map_err(|e| anyhow!(e.to_string()))?;

    bot.send_message(msg.chat.id, DefaultBotView::welcome_message())
        .await?;
    Ok(())
}

/// Free-text query handler
///
/// # Errors
///
/// Returns an error if a reply cannot be sent or the dialogue cannot be updated.
pub async fn handle_text(
    bot: Bot,
    msg: Message,
    flow: Arc<ConversationFlow>,
    dialogue: BotDialogue,
) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let user_id = get_user_id_safe(&msg);
    let replier = TelegramReplier::new(bot, msg.chat.id);

    let next = flow.handle_query(&replier, user_id, text).await?;
    dialogue
        .update(next)
        .await
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

/// Reply to messages without text (stickers, photos, ...)
///
/// # Errors
///
/// Returns an error if the hint cannot be sent.
pub async fn handle_non_text(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, DefaultBotView::text_only_hint())
        .await?;
    Ok(())
}

/// Answer a callback query, logging (not propagating) a failure.
///
/// Returns `true` if Telegram accepted the answer.
pub async fn acknowledge(bot: &Bot, q: &CallbackQuery) -> bool {
    match bot.answer_callback_query(q.id.clone()).await {
        Ok(_) => true,
        Err(e) => {
            warn!(user_id = q.from.id.0, "Failed to answer callback query: {e}");
            false
        }
    }
}

/// Inline result selection handler
///
/// # Errors
///
/// Returns an error if a reply cannot be sent or the dialogue cannot be updated.
pub async fn handle_selection(
    bot: Bot,
    q: CallbackQuery,
    flow: Arc<ConversationFlow>,
    dialogue: BotDialogue,
) -> Result<()> {
    // Stop the button's loading spinner whatever happens next
    acknowledge(&bot, &q).await;

    let Some(catalog_id) = q.data.as_deref().and_then(parse_selection) else {
        debug!(data = ?q.data, "Ignoring unknown callback data");
        return Ok(());
    };

    let user_id = q.from.id.0;
    let chat_id = q
        .message
        .as_ref()
        .map_or_else(|| ChatId::from(q.from.id), |m| m.chat().id);
    let replier = TelegramReplier::new(bot, chat_id);

    let next = flow.handle_selection(&replier, user_id, catalog_id).await?;
    dialogue
        .update(next)
        .await
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn callback_query() -> CallbackQuery {
        serde_json::from_value(serde_json::json!({
            "id": "4382bfdwdsb323b2d9",
            "from": {"id": 7, "is_bot": false, "first_name": "Ali"},
            "chat_instance": "-42",
            "data": "select|tt1375666"
        }))
        .expect("callback query")
    }

    async fn bot_for(server: &Server) -> Bot {
        let api = Url::parse(&server.url()).expect("api url");
        Bot::new("123456:TEST").set_api_url(api)
    }

    #[tokio::test]
    async fn test_acknowledge_reports_rejection() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", Matcher::Regex("(?i)answercallbackquery".to_string()))
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":false,"error_code":400,"description":"Bad Request: query is too old"}"#)
            .create_async()
            .await;

        assert!(!acknowledge(&bot_for(&server).await, &callback_query()).await);
    }

    #[tokio::test]
    async fn test_acknowledge_success() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", Matcher::Regex("(?i)answercallbackquery".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"result":true}"#)
            .create_async()
            .await;

        assert!(acknowledge(&bot_for(&server).await, &callback_query()).await);
    }
}
