use teloxide::{
  prelude::*,
  utils::{
    command::{BotCommands, ParseError},
    html::escape,
  },
};

use super::ReplyBot;
use crate::{
  entity::{OrderStatus, user},
  prelude::*,
  state::{AppState, Services},
  sv::{
    Paging,
    order::{Approval, OrderFilter},
  },
};

/// `<target> <free text>`, the text part required.
fn parse_target_and_text(
  input: String,
) -> std::result::Result<(String, String), ParseError> {
  let (target, text) = input.trim().split_once(' ').unwrap_or((input.trim(), ""));
  if target.is_empty() || text.trim().is_empty() {
    return Err(ParseError::IncorrectFormat(
      "Usage: /reject <order> <reason>".into(),
    ));
  }
  Ok((target.to_string(), text.trim().to_string()))
}

/// `<key> [reason]`
fn parse_revoke(input: String) -> std::result::Result<(String, String), ParseError> {
  let (key, reason) = input.trim().split_once(' ').unwrap_or((input.trim(), ""));
  if key.is_empty() {
    return Err(ParseError::IncorrectFormat("Usage: /revoke <key> [reason]".into()));
  }
  Ok((key.to_string(), reason.trim().to_string()))
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
  Start,
  Help,
  /// Orders waiting for review
  Orders,
  Approve(String),
  #[command(parse_with = parse_target_and_text)]
  Reject { order: String, reason: String },
  License(String),
  #[command(parse_with = parse_revoke)]
  Revoke { key: String, reason: String },
  #[command(parse_with = "split")]
  Extend { key: String, months: i32 },
  Reset(String),
  /// Open an HTTP admin session
  Token,
}

const ADMIN_HELP: &str = "\
<b>📋 Admin Commands</b>

<b>Orders:</b>
/orders - Orders waiting for review
/approve &lt;order&gt; - Approve and mint the license
/reject &lt;order&gt; &lt;reason&gt; - Reject an order

<b>Licenses:</b>
/license &lt;key&gt; - License details and devices
/revoke &lt;key&gt; [reason] - Revoke a license
/extend &lt;key&gt; &lt;months&gt; - Extend a license
/reset &lt;key&gt; - Deactivate every device

<b>System:</b>
/token - Open an admin session for the HTTP API
/help - Show this message";

pub async fn handle(
  app: Arc<AppState>,
  bot: ReplyBot,
  cmd: Command,
) -> ResponseResult<()> {
  if !app.is_admin_chat(bot.user_id) {
    return bot
      .reply_html("This bot is reserved for administrators.")
      .await;
  }

  let sv = app.sv();
  let admin = match sv.user.admin_for_telegram(bot.user_id).await {
    Ok(admin) => admin,
    Err(err) => {
      error!("No admin account for Telegram user {}: {err}", bot.user_id);
      return bot.reply_html("⚠️ No admin account is linked to this chat.").await;
    }
  };

  let reply = match run(&sv, &admin, cmd).await {
    Ok(text) => text,
    Err(err) => format!("⚠️ {}", escape(&err.to_string())),
  };
  bot.reply_html(reply).await
}

async fn run(sv: &Services<'_>, admin: &user::Model, cmd: Command) -> Result<String> {
  match cmd {
    Command::Start | Command::Help => Ok(ADMIN_HELP.to_string()),
    Command::Orders => {
      let filter = OrderFilter { status: Some(OrderStatus::Processing), search: None };
      let page = sv.order.list(filter, Paging::default()).await?;
      if page.items.is_empty() {
        return Ok("No orders waiting for review.".into());
      }

      let mut text = format!("<b>🧾 Orders to review ({})</b>\n", page.total);
      for row in page.items {
        text.push_str(&format!(
          "\n<code>{}</code> {} · {} · {}",
          row.order.order_number,
          escape(row.user_email.as_deref().unwrap_or("?")),
          escape(row.package_name.as_deref().unwrap_or("?")),
          utils::format_money(row.order.amount, &row.order.currency),
        ));
      }
      Ok(text)
    }
    Command::Approve(target) => {
      let order = sv.order.find(&target).await?;
      let approved = sv.order.approve(order.id, admin.id, Approval::default()).await?;
      Ok(format!(
        "✅ Order <code>{}</code> approved\nLicense: <code>{}</code>",
        approved.order.order_number, approved.license.license_key,
      ))
    }
    Command::Reject { order, reason } => {
      let order = sv.order.find(&order).await?;
      let order = sv.order.reject(order.id, admin.id, &reason).await?;
      Ok(format!("❌ Order <code>{}</code> rejected", order.order_number))
    }
    Command::License(key) => {
      let license = sv.license.by_key(&key).await?;
      let detail = sv.license.detail(license.id).await?;
      let owner = detail.user.as_ref().map_or("?".to_string(), |u| u.email.clone());
      let package = detail.package.as_ref().map_or("?".to_string(), |p| p.name.clone());
      let active: Vec<_> = detail.devices.iter().filter(|d| d.is_active).collect();

      let mut text = format!(
        "🔑 <code>{}</code>\n\n\
        <b>Status:</b> {}\n\
        <b>Owner:</b> {}\n\
        <b>Package:</b> {}\n\
        <b>Valid:</b> {} → {}\n\
        <b>Devices:</b> {}/{}",
        detail.license.license_key,
        detail.license.status.to_value(),
        escape(&owner),
        escape(&package),
        utils::format_date(detail.license.start_date),
        utils::format_date(detail.license.end_date),
        active.len(),
        detail.license.max_devices,
      );
      for device in active {
        text.push_str(&format!(
          "\n• {} ({})",
          escape(&device.device_name),
          escape(&device.device_os),
        ));
      }
      Ok(text)
    }
    Command::Revoke { key, reason } => {
      let license = sv.license.by_key(&key).await?;
      let license = sv.license.revoke(license.id, &reason).await?;
      Ok(format!("⛔ License <code>{}</code> revoked", license.license_key))
    }
    Command::Extend { key, months } => {
      let license = sv.license.by_key(&key).await?;
      let license = sv.license.extend(license.id, months, admin.id).await?;
      Ok(format!(
        "📅 License <code>{}</code> now valid until {}",
        license.license_key,
        utils::format_date(license.end_date),
      ))
    }
    Command::Reset(key) => {
      let license = sv.license.by_key(&key).await?;
      let count = sv.device.reset_all(license.id).await?;
      Ok(format!("🔄 Deactivated {count} device(s) on <code>{}</code>", license.license_key))
    }
    Command::Token => {
      let session = sv.session.open(admin.id, None).await?;
      Ok(format!(
        "🔐 Bearer token: <code>{}</code>\nValid until {}",
        session.id,
        utils::format_date(session.expires_at),
      ))
    }
  }
}
