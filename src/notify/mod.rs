//! Outbound notifications. Every send is best-effort: implementations log
//! their own failures and report them as `false`, never as errors.

mod email;
mod telegram;

pub use email::{Email, Provider};
pub use telegram::Telegram;

use crate::prelude::*;

#[derive(Debug, Clone)]
pub struct LicenseMail {
  pub to: String,
  pub user_name: String,
  pub license_key: String,
  pub package_name: String,
  pub expiry: DateTime,
}

#[derive(Debug, Clone)]
pub struct OtpMail {
  pub to: String,
  pub user_name: String,
  pub otp: String,
  /// Lets the owner recognize which machine is about to lose its seat
  pub device_name: String,
}

#[derive(Debug, Clone)]
pub struct ReminderMail {
  pub to: String,
  pub user_name: String,
  pub package_name: String,
  pub expiry: DateTime,
  pub days_remaining: i64,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
  pub order_id: Uuid,
  pub order_number: String,
  pub user_name: String,
  pub user_email: String,
  pub package_name: String,
  pub amount: Decimal,
  pub currency: String,
  pub transfer_content: String,
  pub created_at: DateTime,
}

#[derive(Debug, Clone)]
pub struct OrderApproved {
  pub order_number: String,
  pub user_name: String,
  pub license_key: String,
  pub approved_by: String,
}

#[derive(Debug, Clone)]
pub struct OrderRejected {
  pub order_number: String,
  pub user_name: String,
  pub reason: String,
  pub rejected_by: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
  async fn send_license_email(&self, mail: &LicenseMail) -> bool;

  async fn send_otp_email(&self, mail: &OtpMail) -> bool;

  async fn send_expiration_reminder_email(&self, mail: &ReminderMail) -> bool;
}

/// Admin-facing chat channel.
#[async_trait]
pub trait Messenger: Send + Sync {
  async fn send_new_order_notification(&self, order: &NewOrder) -> bool;

  async fn send_order_approved_notification(&self, info: &OrderApproved) -> bool;

  async fn send_order_rejected_notification(&self, info: &OrderRejected) -> bool;
}

/// Chat channel used when no bot token is configured.
pub struct Silent;

#[async_trait]
impl Messenger for Silent {
  async fn send_new_order_notification(&self, order: &NewOrder) -> bool {
    debug!("Chat disabled, new order {} not announced", order.order_number);
    false
  }

  async fn send_order_approved_notification(&self, info: &OrderApproved) -> bool {
    debug!("Chat disabled, approval of {} not announced", info.order_number);
    false
  }

  async fn send_order_rejected_notification(&self, info: &OrderRejected) -> bool {
    debug!("Chat disabled, rejection of {} not announced", info.order_number);
    false
  }
}

#[derive(Clone)]
pub struct Notify {
  pub mail: Arc<dyn Mailer>,
  pub chat: Arc<dyn Messenger>,
}

impl Notify {
  pub fn new(mail: Arc<dyn Mailer>, chat: Arc<dyn Messenger>) -> Self {
    Self { mail, chat }
  }
}
