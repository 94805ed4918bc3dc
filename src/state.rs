use std::{collections::HashSet, env};

use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use teloxide::{Bot, types::ChatId};

use crate::{
  ephemeral::{Ephemeral, Memory},
  notify::{self, Email, Notify, Provider, Silent, Telegram},
  prelude::*,
  seats::Seats,
  sv,
  token::Tokens,
};

#[derive(Debug, Clone)]
pub struct Config {
  pub database_url: String,
  pub port: u16,
  pub token_secret: String,
  pub token_ttl: Duration,
  pub order_ttl: Duration,
  pub otp_ttl: Duration,
  pub session_ttl: Duration,
  pub reminder_window_days: i64,
  pub activity_retention_days: i64,
  pub currency: String,
  pub public_url: String,
  pub bot_token: Option<String>,
  /// Chat receiving order notifications
  pub admin_chat_id: Option<i64>,
  /// Telegram accounts allowed to run admin commands
  pub admins: HashSet<i64>,
  pub email_provider: Provider,
  pub email_from: String,
  pub admin_email: Option<String>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      database_url: String::from("sqlite:keyforge.db?mode=rwc"),
      port: 3000,
      token_secret: String::new(),
      token_ttl: Duration::from_secs(24 * 3600),
      order_ttl: Duration::from_secs(24 * 3600),
      otp_ttl: Duration::from_secs(10 * 60),
      session_ttl: Duration::from_secs(24 * 3600),
      reminder_window_days: 7,
      activity_retention_days: 90,
      currency: String::from("VND"),
      public_url: String::from("http://localhost:3000"),
      bot_token: None,
      admin_chat_id: None,
      admins: HashSet::new(),
      email_provider: Provider::Console,
      email_from: String::from("noreply@veo3ai.com"),
      admin_email: None,
    }
  }
}

fn var(name: &str) -> Option<String> {
  env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn duration_var(name: &str, default: Duration) -> anyhow::Result<Duration> {
  match var(name) {
    Some(raw) => humantime::parse_duration(&raw)
      .with_context(|| format!("{name} is not a duration: {raw}")),
    None => Ok(default),
  }
}

fn parsed_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
  T: std::str::FromStr,
  T::Err: std::error::Error + Send + Sync + 'static,
{
  match var(name) {
    Some(raw) => {
      raw.parse().with_context(|| format!("{name} has invalid value: {raw}"))
    }
    None => Ok(default),
  }
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    let base = Self::default();

    let token_secret =
      var("DEVICE_TOKEN_SECRET").context("DEVICE_TOKEN_SECRET not set")?;

    let admins = match var("ADMIN_IDS") {
      Some(raw) => raw
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|id| id.trim().parse().context("Invalid Admin ID format"))
        .collect::<anyhow::Result<_>>()?,
      None => HashSet::new(),
    };

    let email_provider = match var("EMAIL_PROVIDER").as_deref() {
      None | Some("console") => Provider::Console,
      Some("http") => Provider::Http {
        url: var("EMAIL_API_URL").context("EMAIL_API_URL not set")?,
        api_key: var("EMAIL_API_KEY").context("EMAIL_API_KEY not set")?,
      },
      Some(other) => anyhow::bail!("Unknown EMAIL_PROVIDER `{other}`"),
    };

    Ok(Self {
      database_url: var("DATABASE_URL").unwrap_or(base.database_url),
      port: parsed_var("PORT", base.port)?,
      token_secret,
      token_ttl: duration_var("DEVICE_TOKEN_TTL", base.token_ttl)?,
      order_ttl: duration_var("ORDER_TTL", base.order_ttl)?,
      otp_ttl: duration_var("OTP_TTL", base.otp_ttl)?,
      session_ttl: duration_var("SESSION_TTL", base.session_ttl)?,
      reminder_window_days: parsed_var(
        "REMINDER_WINDOW_DAYS",
        base.reminder_window_days,
      )?,
      activity_retention_days: parsed_var(
        "ACTIVITY_RETENTION_DAYS",
        base.activity_retention_days,
      )?,
      currency: var("CURRENCY").unwrap_or(base.currency),
      public_url: var("PUBLIC_URL").unwrap_or(base.public_url),
      bot_token: var("TELOXIDE_TOKEN"),
      admin_chat_id: var("TELEGRAM_ADMIN_CHAT_ID")
        .map(|id| id.parse().context("Invalid TELEGRAM_ADMIN_CHAT_ID"))
        .transpose()?,
      admins,
      email_provider,
      email_from: var("EMAIL_FROM").unwrap_or(base.email_from),
      admin_email: var("ADMIN_EMAIL"),
    })
  }
}

pub struct Services<'a> {
  pub user: sv::User<'a>,
  pub session: sv::Session<'a>,
  pub package: sv::Package<'a>,
  pub order: sv::Order<'a>,
  pub license: sv::License<'a>,
  pub device: sv::Device<'a>,
  pub usage: sv::Usage<'a>,
}

pub struct AppState {
  pub db: DatabaseConnection,
  pub bot: Option<Bot>,
  pub config: Config,
  pub notify: Notify,
  pub store: Arc<Memory>,
  pub tokens: Tokens,
  pub seats: Seats,
}

impl AppState {
  pub async fn new(config: Config) -> anyhow::Result<Self> {
    info!("Connecting to database...");
    let db = Database::connect(&config.database_url)
      .await
      .context("Failed to connect to database")?;

    info!("Running migrations...");
    Migrator::up(&db, None).await.context("Failed to run migrations")?;

    let bot = config.bot_token.as_deref().map(Bot::new);

    let mail = Arc::new(Email::new(
      config.email_provider.clone(),
      config.email_from.clone(),
      config.public_url.clone(),
    ));
    let chat: Arc<dyn notify::Messenger> = match (&bot, config.admin_chat_id) {
      (Some(bot), Some(chat)) => Arc::new(Telegram::new(bot.clone(), ChatId(chat))),
      _ => {
        warn!("Telegram admin chat not configured, order notifications disabled");
        Arc::new(Silent)
      }
    };

    let app = Self::from_parts(db, bot, config, Notify::new(mail, chat));
    app.bootstrap().await?;
    Ok(app)
  }

  pub fn from_parts(
    db: DatabaseConnection,
    bot: Option<Bot>,
    config: Config,
    notify: Notify,
  ) -> Self {
    let tokens = Tokens::new(&config.token_secret, config.token_ttl);
    Self {
      db,
      bot,
      config,
      notify,
      store: Arc::new(Memory::new()),
      tokens,
      seats: Seats::new(),
    }
  }

  async fn bootstrap(&self) -> anyhow::Result<()> {
    let sv = self.sv();

    let seeded = sv.package.seed_defaults().await?;
    if seeded > 0 {
      info!("Seeded {seeded} default packages");
    }

    if let Some(email) = &self.config.admin_email {
      // the lowest configured id is linked so bot actions are attributed
      let tg_user_id = self.config.admins.iter().min().copied();
      let admin = sv.user.ensure_admin(email, "Administrator", tg_user_id).await?;
      info!("Admin account: {}", admin.email);
    }

    Ok(())
  }

  pub fn sv(&self) -> Services<'_> {
    let store: &dyn Ephemeral = &*self.store;

    Services {
      user: sv::User::new(&self.db),
      session: sv::Session::new(&self.db, store, self.config.session_ttl),
      package: sv::Package::new(&self.db),
      order: sv::Order::new(&self.db, &self.notify, &self.config),
      license: sv::License::new(&self.db, &*self.notify.mail),
      device: sv::Device::new(
        &self.db,
        store,
        &self.tokens,
        &self.seats,
        &*self.notify.mail,
        self.config.otp_ttl,
      ),
      usage: sv::Usage::new(&self.db),
    }
  }

  pub fn is_admin_chat(&self, tg_user_id: i64) -> bool {
    self.config.admins.contains(&tg_user_id)
  }
}
