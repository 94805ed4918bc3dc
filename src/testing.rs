//! Fixtures shared by the service tests: a migrated sqlite database, a
//! recording notifier and shortcuts for the rows most tests need.

use std::{
  ops::Deref,
  sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
  },
};

use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database};
use tempfile::TempDir;

use crate::{
  entity::{license, order, package, user},
  notify::{
    LicenseMail, Mailer, Messenger, NewOrder, Notify, OrderApproved,
    OrderRejected, OtpMail, ReminderMail,
  },
  prelude::*,
  state::{AppState, Config},
  sv::{license::ManualGrant, order::OrderRequest, user::Registration},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
  License,
  Otp,
  Reminder,
  NewOrder,
  Approved,
  Rejected,
}

/// Captures every notification attempt instead of delivering it.
#[derive(Default)]
pub struct Recorder {
  sent: Mutex<Vec<(Kind, String)>>,
  failing: AtomicBool,
}

impl Recorder {
  fn push(&self, kind: Kind, payload: String) -> bool {
    self.sent.lock().unwrap().push((kind, payload));
    !self.failing.load(Ordering::SeqCst)
  }

  pub fn count(&self, kind: Kind) -> usize {
    self.sent.lock().unwrap().iter().filter(|(k, _)| *k == kind).count()
  }

  pub fn last_otp(&self) -> Option<String> {
    self
      .sent
      .lock()
      .unwrap()
      .iter()
      .rev()
      .find(|(kind, _)| *kind == Kind::Otp)
      .map(|(_, otp)| otp.clone())
  }

  /// Later sends are still recorded but report failure.
  pub fn fail_all(&self) {
    self.failing.store(true, Ordering::SeqCst);
  }
}

#[async_trait]
impl Mailer for Recorder {
  async fn send_license_email(&self, mail: &LicenseMail) -> bool {
    self.push(Kind::License, mail.license_key.clone())
  }

  async fn send_otp_email(&self, mail: &OtpMail) -> bool {
    self.push(Kind::Otp, mail.otp.clone())
  }

  async fn send_expiration_reminder_email(&self, mail: &ReminderMail) -> bool {
    self.push(Kind::Reminder, mail.to.clone())
  }
}

#[async_trait]
impl Messenger for Recorder {
  async fn send_new_order_notification(&self, order: &NewOrder) -> bool {
    self.push(Kind::NewOrder, order.order_number.clone())
  }

  async fn send_order_approved_notification(&self, info: &OrderApproved) -> bool {
    self.push(Kind::Approved, info.order_number.clone())
  }

  async fn send_order_rejected_notification(&self, info: &OrderRejected) -> bool {
    self.push(Kind::Rejected, info.order_number.clone())
  }
}

pub struct TestApp {
  app: Arc<AppState>,
  pub sent: Arc<Recorder>,
  _dir: Option<TempDir>,
}

impl Deref for TestApp {
  type Target = AppState;

  fn deref(&self) -> &AppState {
    &self.app
  }
}

impl TestApp {
  /// Handle for code that wants the state the way the plugins get it.
  pub fn shared(&self) -> Arc<AppState> {
    self.app.clone()
  }
}

fn config() -> Config {
  Config { token_secret: "test-secret".into(), ..Config::default() }
}

async fn build(url: &str, config: Config, dir: Option<TempDir>) -> TestApp {
  let mut options = ConnectOptions::new(url);
  options.sqlx_logging(false);
  if dir.is_none() {
    // every pooled connection to `:memory:` would be its own database
    options.max_connections(1).min_connections(1);
  }

  let db = Database::connect(options).await.unwrap();
  Migrator::up(&db, None).await.unwrap();

  let sent = Arc::new(Recorder::default());
  let notify = Notify::new(sent.clone(), sent.clone());

  TestApp {
    app: Arc::new(AppState::from_parts(db, None, config, notify)),
    sent,
    _dir: dir,
  }
}

/// Fresh in-memory database, migrated but not seeded.
pub async fn app() -> TestApp {
  build("sqlite::memory:", config(), None).await
}

pub async fn app_with(tweak: impl FnOnce(&mut Config)) -> TestApp {
  let mut config = config();
  tweak(&mut config);
  build("sqlite::memory:", config, None).await
}

/// File-backed database with a real connection pool, for tests that race.
pub async fn file_app() -> TestApp {
  let dir = tempfile::tempdir().unwrap();
  let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
  build(&url, config(), Some(dir)).await
}

pub async fn user(db: &DatabaseConnection, email: &str) -> user::Model {
  crate::sv::User::new(db)
    .register(Registration {
      email: email.into(),
      name: "Test Buyer".into(),
      ..Default::default()
    })
    .await
    .unwrap()
}

pub async fn admin(db: &DatabaseConnection) -> user::Model {
  crate::sv::User::new(db)
    .ensure_admin("admin@example.com", "Administrator", Some(1))
    .await
    .unwrap()
}

pub async fn package(
  db: &DatabaseConnection,
  months: i32,
  max_devices: i32,
  videos: i32,
) -> package::Model {
  let now = now();
  let slug = format!("plan-{}", &Uuid::new_v4().simple().to_string()[..8]);

  package::ActiveModel {
    id: Set(Uuid::new_v4()),
    name: Set(format!("Plan {slug}")),
    slug: Set(slug),
    description: Set(None),
    original_price: Set(Decimal::new(599_000, 0)),
    sale_price: Set(Decimal::new(499_000, 0)),
    discount_percent: Set(17),
    duration_months: Set(months),
    videos_per_month: Set(videos),
    keywords_tracking: Set(10),
    api_calls_per_month: Set(1000),
    max_devices: Set(max_devices),
    is_popular: Set(false),
    is_active: Set(true),
    sort_order: Set(0),
    created_at: Set(now),
    updated_at: Set(now),
  }
  .insert(db)
  .await
  .unwrap()
}

pub async fn license(
  app: &AppState,
  user: &user::Model,
  package: &package::Model,
) -> license::Model {
  app
    .sv()
    .license
    .generate(ManualGrant {
      user_id: user.id,
      package_id: package.id,
      max_devices: None,
      admin_id: None,
    })
    .await
    .unwrap()
}

pub fn request(package: &package::Model) -> OrderRequest {
  OrderRequest {
    package_id: package.id,
    payment_method: None,
    delivery_method: None,
    delivery_contact: None,
  }
}

/// Order the buyer has already declared as paid.
pub async fn processing_order(
  app: &AppState,
  user: &user::Model,
  package: &package::Model,
) -> order::Model {
  let sv = app.sv();
  let created = sv.order.create(user.id, request(package)).await.unwrap();
  sv.order.confirm(user.id, created.order.id).await.unwrap()
}

pub async fn set_end_date(db: &DatabaseConnection, id: Uuid, end_date: DateTime) {
  license::Entity::update_many()
    .set(license::ActiveModel { end_date: Set(end_date), ..Default::default() })
    .filter(license::Column::Id.eq(id))
    .exec(db)
    .await
    .unwrap();
}

pub async fn set_order_expiry(db: &DatabaseConnection, id: Uuid, expires_at: DateTime) {
  order::Entity::update_many()
    .set(order::ActiveModel { expires_at: Set(expires_at), ..Default::default() })
    .filter(order::Column::Id.eq(id))
    .exec(db)
    .await
    .unwrap();
}
