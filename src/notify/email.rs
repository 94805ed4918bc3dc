//! E-mail delivery through a console sink or an HTTP mail API.

use reqwest::Client;

use super::{LicenseMail, Mailer, OtpMail, ReminderMail};
use crate::prelude::*;

const BRAND: &str = "VEO3 AI";

#[derive(Debug, Clone)]
pub enum Provider {
  /// Log the message instead of sending it
  Console,
  /// SendGrid-style JSON API
  Http { url: String, api_key: String },
}

#[derive(Debug)]
struct Message {
  to: String,
  subject: String,
  body: String,
}

pub struct Email {
  provider: Provider,
  from: String,
  public_url: String,
  client: Client,
}

impl Email {
  pub fn new(provider: Provider, from: String, public_url: String) -> Self {
    Self { provider, from, public_url, client: Client::new() }
  }

  async fn deliver(&self, message: Message) -> bool {
    let to = message.to.clone();
    let subject = message.subject.clone();

    match self.try_deliver(message).await {
      Ok(()) => {
        info!("Email sent to {to}: {subject}");
        true
      }
      Err(err) => {
        warn!("Failed to send email to {to}: {err:#}");
        false
      }
    }
  }

  async fn try_deliver(&self, message: Message) -> anyhow::Result<()> {
    match &self.provider {
      Provider::Console => {
        info!(
          to = %message.to,
          from = %self.from,
          subject = %message.subject,
          "Email (console provider)\n{}",
          message.body
        );
        Ok(())
      }
      Provider::Http { url, api_key } => {
        let body = json::json!({
          "personalizations": [{ "to": [{ "email": message.to }] }],
          "from": { "email": self.from, "name": BRAND },
          "subject": message.subject,
          "content": [{ "type": "text/plain", "value": message.body }],
        });

        let response = self
          .client
          .post(url)
          .bearer_auth(api_key)
          .json(&body)
          .send()
          .await
          .context("mail API unreachable")?;

        let status = response.status();
        if !status.is_success() {
          let text = response.text().await.unwrap_or_default();
          anyhow::bail!("mail API returned {status}: {text}");
        }
        Ok(())
      }
    }
  }
}

#[async_trait]
impl Mailer for Email {
  async fn send_license_email(&self, mail: &LicenseMail) -> bool {
    let body = format!(
      "Hi {name},\n\n\
      Thank you for your purchase of {package}.\n\n\
      Your license key:\n\n    {key}\n\n\
      Valid until: {expiry}\n\n\
      Download the app and activate it with this key: {url}\n\n\
      {BRAND}",
      name = mail.user_name,
      package = mail.package_name,
      key = mail.license_key,
      expiry = utils::format_date(mail.expiry),
      url = self.public_url,
    );

    self
      .deliver(Message {
        to: mail.to.clone(),
        subject: format!("Your {BRAND} License Key"),
        body,
      })
      .await
  }

  async fn send_otp_email(&self, mail: &OtpMail) -> bool {
    let body = format!(
      "Hi {name},\n\n\
      A request was made to deactivate the device \"{device}\" from your license.\n\n\
      Your verification code: {otp}\n\n\
      If you did not request this, ignore this email; the device stays active.\n\n\
      {BRAND}",
      name = mail.user_name,
      device = mail.device_name,
      otp = mail.otp,
    );

    self
      .deliver(Message {
        to: mail.to.clone(),
        subject: format!("Device Deactivation OTP - {BRAND}"),
        body,
      })
      .await
  }

  async fn send_expiration_reminder_email(&self, mail: &ReminderMail) -> bool {
    let body = format!(
      "Hi {name},\n\n\
      Your {package} subscription expires on {expiry} ({days} days left).\n\n\
      Renew at {url} to keep using the app without interruption.\n\n\
      {BRAND}",
      name = mail.user_name,
      package = mail.package_name,
      expiry = utils::format_date(mail.expiry),
      days = mail.days_remaining,
      url = self.public_url,
    );

    self
      .deliver(Message {
        to: mail.to.clone(),
        subject: format!(
          "Your {BRAND} Subscription Expires in {} Days",
          mail.days_remaining
        ),
        body,
      })
      .await
  }
}
