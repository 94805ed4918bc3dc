use teloxide::{prelude::*, utils::html::escape};

use super::ReplyBot;
use crate::{prelude::*, state::AppState, sv::order::Approval};

const REJECTED_FROM_CHAT: &str = "Rejected by admin via Telegram";

/// Review buttons attached to new-order messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callback {
  Approve(Uuid),
  Reject(Uuid),
}

impl Callback {
  pub fn to_data(&self) -> String {
    match self {
      Callback::Approve(id) => format!("approve_{id}"),
      Callback::Reject(id) => format!("reject_{id}"),
    }
  }

  pub fn from_data(data: &str) -> Option<Self> {
    if let Some(id) = data.strip_prefix("approve_") {
      return Uuid::parse_str(id).ok().map(Callback::Approve);
    }
    if let Some(id) = data.strip_prefix("reject_") {
      return Uuid::parse_str(id).ok().map(Callback::Reject);
    }
    None
  }
}

pub async fn handle(
  app: Arc<AppState>,
  bot: ReplyBot,
  data: &str,
) -> ResponseResult<()> {
  let Some(callback) = Callback::from_data(data) else {
    debug!("Ignoring unknown callback `{data}`");
    return Ok(());
  };

  if !app.is_admin_chat(bot.user_id) {
    warn!("Callback from non-admin {}", bot.user_id);
    return bot.reply_html("⛔ You are not allowed to review orders.").await;
  }

  let sv = app.sv();
  let admin = match sv.user.admin_for_telegram(bot.user_id).await {
    Ok(admin) => admin,
    Err(err) => {
      error!("No admin account for Telegram user {}: {err}", bot.user_id);
      return bot.reply_html("⚠️ No admin account is linked to this chat.").await;
    }
  };

  let text = match callback {
    Callback::Approve(id) => {
      match sv.order.approve(id, admin.id, Approval::default()).await {
        Ok(approved) => format!(
          "✅ <b>Order {} approved</b>\n\n\
          <b>License:</b> <code>{}</code>\n\
          <b>Valid until:</b> {}\n\
          <b>By:</b> {}",
          approved.order.order_number,
          approved.license.license_key,
          utils::format_date(approved.license.end_date),
          escape(&admin.name),
        ),
        Err(err) => format!("⚠️ Approval failed: {}", escape(&err.to_string())),
      }
    }
    Callback::Reject(id) => {
      match sv.order.reject(id, admin.id, REJECTED_FROM_CHAT).await {
        Ok(order) => format!(
          "❌ <b>Order {} rejected</b>\n\n<b>By:</b> {}",
          order.order_number,
          escape(&admin.name),
        ),
        Err(err) => format!("⚠️ Rejection failed: {}", escape(&err.to_string())),
      }
    }
  };

  bot.edit_html(text).await
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn callback_data_round_trips_order_ids() {
    let id = Uuid::new_v4();

    assert_eq!(Callback::Approve(id).to_data(), format!("approve_{id}"));
    assert_eq!(Callback::from_data(&format!("reject_{id}")), Some(Callback::Reject(id)));
    assert_eq!(Callback::from_data("approve_not-a-uuid"), None);
    assert_eq!(Callback::from_data("profile"), None);
  }

  #[test]
  fn callback_data_fits_telegram_limit() {
    // Bot API caps callback data at 64 bytes
    assert!(Callback::Reject(Uuid::new_v4()).to_data().len() <= 64);
  }
}
