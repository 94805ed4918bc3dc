//! Admin console over Telegram: review buttons on new-order messages and a
//! handful of back-office commands.

mod callback;
mod command;

pub use callback::Callback;
use command::Command;
use teloxide::{
  dispatching::{HandlerExt, UpdateFilterExt},
  prelude::*,
  types::{CallbackQuery, ChatId, Message, MessageId, ParseMode, Update},
};

use crate::{prelude::*, state::AppState};

pub struct Plugin;

#[async_trait]
impl super::Plugin for Plugin {
  fn name(&self) -> &'static str {
    "telegram"
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let bot = app.bot.clone().context("Telegram bot token is not configured")?;
    info!("Starting Telegram bot...");

    let handler = teloxide::dptree::entry()
      .branch(Update::filter_message().filter_command::<Command>().endpoint({
        let app = app.clone();
        move |bot: Bot, msg: Message, cmd: Command| {
          let app = app.clone();
          let user_id = msg.from.as_ref().map_or(msg.chat.id.0, |u| u.id.0 as i64);
          let bot = ReplyBot::new(bot, user_id, msg.chat.id, msg.id);
          command::handle(app, bot, cmd)
        }
      }))
      .branch(Update::filter_callback_query().endpoint({
        let app = app.clone();
        move |bot: Bot, query: CallbackQuery| {
          let app = app.clone();
          on_callback(app, bot, query)
        }
      }));

    Dispatcher::builder(bot, handler).build().dispatch().await;
    Ok(())
  }
}

async fn on_callback(
  app: Arc<AppState>,
  bot: Bot,
  query: CallbackQuery,
) -> ResponseResult<()> {
  bot.answer_callback_query(query.id.clone()).await?;

  if let Some(data) = query.data.as_deref()
    && let Some(msg) = query.message.as_ref()
  {
    let bot = ReplyBot::new(bot, query.from.id.0 as i64, msg.chat().id, msg.id());
    callback::handle(app, bot, data).await?;
  }
  Ok(())
}

#[derive(Debug, Clone)]
struct ReplyBot {
  inner: Bot,
  user_id: i64,
  chat_id: ChatId,
  message_id: MessageId,
}

impl ReplyBot {
  fn new(inner: Bot, user_id: i64, chat_id: ChatId, message_id: MessageId) -> Self {
    Self { inner, user_id, chat_id, message_id }
  }

  async fn reply_html(&self, text: impl Into<String>) -> ResponseResult<()> {
    for chunk in utils::chunk_message(&text.into(), 0) {
      self
        .inner
        .send_message(self.chat_id, chunk)
        .parse_mode(ParseMode::Html)
        .await?;
    }
    Ok(())
  }

  /// Replaces the message the pressed button belongs to, dropping its keyboard.
  async fn edit_html(&self, text: impl Into<String>) -> ResponseResult<()> {
    self
      .inner
      .edit_message_text(self.chat_id, self.message_id, text.into())
      .parse_mode(ParseMode::Html)
      .await?;
    Ok(())
  }
}
