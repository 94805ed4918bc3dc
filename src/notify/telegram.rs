//! Admin chat notifications through the Telegram bot.

use teloxide::{
  prelude::*,
  types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode},
  utils::html::escape,
};

use super::{Messenger, NewOrder, OrderApproved, OrderRejected};
use crate::{plugins::telegram::Callback, prelude::*};

pub struct Telegram {
  bot: Bot,
  chat: ChatId,
}

impl Telegram {
  pub fn new(bot: Bot, chat: ChatId) -> Self {
    Self { bot, chat }
  }

  async fn send(&self, text: String, keyboard: Option<InlineKeyboardMarkup>) -> bool {
    let mut request =
      self.bot.send_message(self.chat, text).parse_mode(ParseMode::Html);
    if let Some(keyboard) = keyboard {
      request = request.reply_markup(keyboard);
    }

    match request.await {
      Ok(_) => true,
      Err(err) => {
        warn!("Telegram notification to {} failed: {err}", self.chat);
        false
      }
    }
  }
}

pub fn review_keyboard(order_id: Uuid) -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![vec![
    InlineKeyboardButton::callback(
      "✅ Approve",
      Callback::Approve(order_id).to_data(),
    ),
    InlineKeyboardButton::callback(
      "❌ Reject",
      Callback::Reject(order_id).to_data(),
    ),
  ]])
}

#[async_trait]
impl Messenger for Telegram {
  async fn send_new_order_notification(&self, order: &NewOrder) -> bool {
    let text = format!(
      "🛒 <b>New order awaiting review</b>\n\n\
      <b>Order:</b> <code>{}</code>\n\
      <b>Customer:</b> {} ({})\n\
      <b>Package:</b> {}\n\
      <b>Amount:</b> {}\n\
      <b>Transfer memo:</b> <code>{}</code>\n\
      <b>Created:</b> {}",
      order.order_number,
      escape(&order.user_name),
      escape(&order.user_email),
      escape(&order.package_name),
      utils::format_money(order.amount, &order.currency),
      order.transfer_content,
      utils::format_date(order.created_at),
    );

    self.send(text, Some(review_keyboard(order.order_id))).await
  }

  async fn send_order_approved_notification(&self, info: &OrderApproved) -> bool {
    let text = format!(
      "✅ <b>Order approved</b>\n\n\
      <b>Order:</b> <code>{}</code>\n\
      <b>Customer:</b> {}\n\
      <b>License:</b> <code>{}</code>\n\
      <b>By:</b> {}",
      info.order_number,
      escape(&info.user_name),
      info.license_key,
      escape(&info.approved_by),
    );

    self.send(text, None).await
  }

  async fn send_order_rejected_notification(&self, info: &OrderRejected) -> bool {
    let text = format!(
      "❌ <b>Order rejected</b>\n\n\
      <b>Order:</b> <code>{}</code>\n\
      <b>Customer:</b> {}\n\
      <b>Reason:</b> {}\n\
      <b>By:</b> {}",
      info.order_number,
      escape(&info.user_name),
      escape(&info.reason),
      escape(&info.rejected_by),
    );

    self.send(text, None).await
  }
}
