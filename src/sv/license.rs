//! License lifecycle: minting, validation, revocation, extension and the
//! expiry/reminder sweeps.
//!
//! Every mint path stores `ACTIVE`. "Activated" means a device has been bound
//! and is tracked separately through `activated_at`.

use sea_orm::Condition;
use serde::{Deserialize, Serialize};

use super::{
  Page, Paging,
  usage::{Activity, Limits, Usage},
};
use crate::{
  entity::{
    LicenseStatus, OrderStatus, PaymentMethod, device, license, order, package,
    user,
  },
  keygen,
  notify::{Mailer, ReminderMail},
  prelude::*,
};

const MAX_KEY_ATTEMPTS: usize = 8;

#[derive(Debug, Clone)]
pub struct NewLicense {
  pub user_id: Uuid,
  pub order_id: Uuid,
  pub package_id: Uuid,
  pub max_devices: Option<i32>,
  pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
  pub name: String,
  #[serde(flatten)]
  pub limits: Limits,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
  pub id: Uuid,
  pub license_key: String,
  pub status: LicenseStatus,
  pub start_date: DateTime,
  pub end_date: DateTime,
  pub max_devices: i32,
  pub package: PackageInfo,
}

impl Summary {
  pub fn new(license: &license::Model, package: &package::Model) -> Self {
    Self {
      id: license.id,
      license_key: license.license_key.clone(),
      status: license.status,
      start_date: license.start_date,
      end_date: license.end_date,
      max_devices: license.max_devices,
      package: PackageInfo {
        name: package.name.clone(),
        limits: Limits::from(package),
      },
    }
  }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Validity {
  pub valid: bool,
  pub license: Summary,
  pub active_devices: u64,
  pub days_remaining: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualGrant {
  pub user_id: Uuid,
  pub package_id: Uuid,
  pub max_devices: Option<i32>,
  #[serde(skip)]
  pub admin_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseUpdate {
  pub max_devices: Option<i32>,
  pub end_date: Option<DateTime>,
  pub status: Option<LicenseStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LicenseFilter {
  pub status: Option<LicenseStatus>,
  pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRow {
  #[serde(flatten)]
  pub license: license::Model,
  pub user_email: Option<String>,
  pub user_name: Option<String>,
  pub active_devices: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseDetail {
  #[serde(flatten)]
  pub license: license::Model,
  pub user: Option<user::Model>,
  pub package: Option<package::Model>,
  pub order_number: Option<String>,
  pub devices: Vec<device::Model>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedLicense {
  #[serde(flatten)]
  pub license: license::Model,
  pub package_name: String,
  pub active_devices: u64,
  pub days_remaining: i64,
}

/// The plan a buyer is currently entitled to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
  pub has_active_subscription: bool,
  pub subscription: Option<CurrentPlan>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPlan {
  pub license_key: String,
  pub package: PackageInfo,
  pub description: Option<String>,
  pub start_date: DateTime,
  pub end_date: DateTime,
  pub days_remaining: i64,
  pub max_devices: i32,
}

/// Revoked beats expired; expiry is by date even when the sweep lags.
pub fn ensure_usable(license: &license::Model, now: DateTime) -> Result<()> {
  if license.status == LicenseStatus::Revoked {
    return Err(Error::LicenseRevoked);
  }
  if license.is_expired_at(now) {
    return Err(Error::LicenseExpired);
  }
  Ok(())
}

pub async fn active_devices<C: ConnectionTrait>(
  conn: &C,
  license_id: Uuid,
) -> Result<u64> {
  let count = device::Entity::find()
    .filter(device::Column::LicenseId.eq(license_id))
    .filter(device::Column::IsActive.eq(true))
    .count(conn)
    .await?;
  Ok(count)
}

fn check_seats(max_devices: i32) -> Result<i32> {
  if max_devices < 1 {
    return Err(Error::InvalidInput("maxDevices must be at least 1".into()));
  }
  Ok(max_devices)
}

pub struct License<'a> {
  db: &'a DatabaseConnection,
  mail: &'a dyn Mailer,
}

impl<'a> License<'a> {
  pub fn new(db: &'a DatabaseConnection, mail: &'a dyn Mailer) -> Self {
    Self { db, mail }
  }

  async fn unique_key<C: ConnectionTrait>(conn: &C) -> Result<String> {
    for _ in 0..MAX_KEY_ATTEMPTS {
      let key = keygen::license_key();
      let taken = license::Entity::find()
        .filter(license::Column::LicenseKey.eq(key.as_str()))
        .count(conn)
        .await?
        > 0;
      if !taken {
        return Ok(key);
      }
      warn!("License key collision, regenerating");
    }
    Err(Error::Internal("Could not generate a unique license key".into()))
  }

  /// Mint a license for `order_id`. Runs on whatever connection it is given
  /// so order approval can call it inside its transaction.
  pub async fn mint<C: ConnectionTrait>(
    conn: &C,
    new: NewLicense,
  ) -> Result<license::Model> {
    let package = package::Entity::find_by_id(new.package_id)
      .one(conn)
      .await?
      .ok_or(Error::PackageNotFound)?;

    let max_devices = check_seats(new.max_devices.unwrap_or(package.max_devices))?;
    let key = Self::unique_key(conn).await?;

    let start = now();
    let end = utils::add_months(start, package.duration_months)?;

    let license = license::ActiveModel {
      id: Set(Uuid::new_v4()),
      license_key: Set(key),
      user_id: Set(new.user_id),
      order_id: Set(new.order_id),
      package_id: Set(package.id),
      start_date: Set(start),
      end_date: Set(end),
      duration_months: Set(package.duration_months),
      max_devices: Set(max_devices),
      status: Set(LicenseStatus::Active),
      activated_at: Set(None),
      revoked_at: Set(None),
      revoked_reason: Set(None),
      reminded_at: Set(None),
      created_by_id: Set(new.created_by),
      created_at: Set(start),
      updated_at: Set(start),
    }
    .insert(conn)
    .await?;

    info!(
      "License minted: {} for order {} ({} months, {} seats)",
      license.license_key, license.order_id, license.duration_months, max_devices
    );
    Ok(license)
  }

  pub async fn get(&self, id: Uuid) -> Result<license::Model> {
    license::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::LicenseNotFound)
  }

  /// Shape-checked lookup; malformed keys never reach the database.
  pub async fn by_key(&self, key: &str) -> Result<license::Model> {
    let key = key.trim();
    if !keygen::is_valid_license_key(key) {
      return Err(Error::InvalidInput("Invalid license key format".into()));
    }

    license::Entity::find()
      .filter(license::Column::LicenseKey.eq(key))
      .one(self.db)
      .await?
      .ok_or(Error::LicenseNotFound)
  }

  async fn package_of(&self, license: &license::Model) -> Result<package::Model> {
    package::Entity::find_by_id(license.package_id)
      .one(self.db)
      .await?
      .ok_or(Error::PackageNotFound)
  }

  pub async fn summary(&self, license: &license::Model) -> Result<Summary> {
    let package = self.package_of(license).await?;
    Ok(Summary::new(license, &package))
  }

  pub async fn validate(&self, key: &str) -> Result<Validity> {
    let license = self.by_key(key).await?;
    let now = now();
    ensure_usable(&license, now)?;

    Ok(Validity {
      valid: true,
      active_devices: active_devices(self.db, license.id).await?,
      days_remaining: license.days_remaining(now),
      license: self.summary(&license).await?,
    })
  }

  /// Terminal from any state.
  pub async fn revoke(&self, id: Uuid, reason: &str) -> Result<license::Model> {
    let license = self.get(id).await?;
    let reason = match reason.trim() {
      "" => "Revoked by admin",
      reason => reason,
    };

    let now = now();
    let license = license::ActiveModel {
      status: Set(LicenseStatus::Revoked),
      revoked_at: Set(Some(now)),
      revoked_reason: Set(Some(reason.to_string())),
      updated_at: Set(now),
      ..license.into()
    }
    .update(self.db)
    .await?;

    info!("License revoked: {} ({reason})", license.license_key);
    Ok(license)
  }

  /// Push the end date out by whole calendar months and reopen the license.
  /// Revoked licenses stay revoked.
  pub async fn extend(
    &self,
    id: Uuid,
    months: i32,
    admin_id: Uuid,
  ) -> Result<license::Model> {
    if months < 1 {
      return Err(Error::InvalidInput("months must be at least 1".into()));
    }

    let txn = self.db.begin().await?;

    let license = license::Entity::find_by_id(id)
      .one(&txn)
      .await?
      .ok_or(Error::LicenseNotFound)?;

    if license.status == LicenseStatus::Revoked {
      return Err(Error::LicenseRevoked);
    }

    let previous_end = license.end_date;
    let end_date = utils::add_months(previous_end, months)?;
    let duration = license.duration_months + months;

    let license = license::ActiveModel {
      end_date: Set(end_date),
      duration_months: Set(duration),
      status: Set(LicenseStatus::Active),
      reminded_at: Set(None),
      updated_at: Set(now()),
      ..license.into()
    }
    .update(&txn)
    .await?;

    Usage::record(
      &txn,
      Activity {
        user_id: admin_id,
        license_id: Some(license.id),
        action_type: "license_extended".into(),
        detail: Some(json::json!({
          "months": months,
          "previousEndDate": previous_end,
          "newEndDate": end_date,
        })),
        ip: None,
      },
    )
    .await?;

    txn.commit().await?;

    info!(
      "License extended: {} by {months} month(s), now ends {}",
      license.license_key,
      utils::format_date(end_date)
    );
    Ok(license)
  }

  /// ACTIVE (or legacy UNUSED) licenses past their end date become EXPIRED.
  pub async fn expire_due(&self, now: DateTime) -> Result<u64> {
    let result = license::Entity::update_many()
      .set(license::ActiveModel {
        status: Set(LicenseStatus::Expired),
        updated_at: Set(now),
        ..Default::default()
      })
      .filter(
        license::Column::Status
          .is_in([LicenseStatus::Active, LicenseStatus::Unused]),
      )
      .filter(license::Column::EndDate.lt(now))
      .exec(self.db)
      .await?;

    if result.rows_affected > 0 {
      info!("Expired {} license(s)", result.rows_affected);
    }
    Ok(result.rows_affected)
  }

  /// Email owners of licenses ending within `window_days`. A license is
  /// reminded at most once per UTC day; failed sends are retried next run.
  pub async fn remind_expiring(
    &self,
    now: DateTime,
    window_days: i64,
  ) -> Result<usize> {
    let horizon = now + TimeDelta::days(window_days);
    let today = utils::start_of_day(now);

    let due = license::Entity::find()
      .filter(license::Column::Status.eq(LicenseStatus::Active))
      .filter(license::Column::EndDate.gt(now))
      .filter(license::Column::EndDate.lte(horizon))
      .filter(
        Condition::any()
          .add(license::Column::RemindedAt.is_null())
          .add(license::Column::RemindedAt.lt(today)),
      )
      .find_also_related(user::Entity)
      .all(self.db)
      .await?;

    let mut sent = 0;
    for (license, user) in due {
      let Some(user) = user else { continue };
      let package = self.package_of(&license).await?;

      let delivered = self
        .mail
        .send_expiration_reminder_email(&ReminderMail {
          to: user.email.clone(),
          user_name: user.name.clone(),
          package_name: package.name.clone(),
          expiry: license.end_date,
          days_remaining: license.days_remaining(now),
        })
        .await;

      if !delivered {
        warn!("Reminder for license {} not delivered", license.license_key);
        continue;
      }

      license::Entity::update_many()
        .set(license::ActiveModel {
          reminded_at: Set(Some(now)),
          ..Default::default()
        })
        .filter(license::Column::Id.eq(license.id))
        .exec(self.db)
        .await?;
      sent += 1;
    }

    if sent > 0 {
      info!("Sent {sent} expiration reminder(s)");
    }
    Ok(sent)
  }

  /// Admin grant outside the purchase flow, backed by a synthetic COMPLETED
  /// order with a zero amount.
  pub async fn generate(&self, grant: ManualGrant) -> Result<license::Model> {
    let txn = self.db.begin().await?;

    user::Entity::find_by_id(grant.user_id)
      .one(&txn)
      .await?
      .ok_or(Error::UserNotFound)?;
    let package = package::Entity::find_by_id(grant.package_id)
      .one(&txn)
      .await?
      .ok_or(Error::PackageNotFound)?;

    let now = now();
    let tag = format!("MANUAL-{}", now.format("%Y%m%d%H%M%S%3f"));
    let suffix = Uuid::new_v4().simple().to_string();

    let order = order::ActiveModel {
      id: Set(Uuid::new_v4()),
      order_number: Set(format!("{tag}-{}", &suffix[..6])),
      user_id: Set(grant.user_id),
      package_id: Set(package.id),
      amount: Set(Decimal::ZERO),
      currency: Set(String::from("VND")),
      payment_method: Set(PaymentMethod::Manual),
      transfer_content: Set(format!("{tag}-{}", &suffix[6..12])),
      status: Set(OrderStatus::Completed),
      delivery_method: Set(None),
      delivery_contact: Set(None),
      delivered_at: Set(None),
      user_confirmed_at: Set(None),
      approved_at: Set(Some(now)),
      approved_by_id: Set(grant.admin_id),
      rejected_at: Set(None),
      rejected_by_id: Set(None),
      rejection_reason: Set(None),
      admin_notes: Set(Some("Manually generated license".into())),
      license_id: Set(None),
      expires_at: Set(now),
      created_at: Set(now),
      updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    let license = Self::mint(
      &txn,
      NewLicense {
        user_id: grant.user_id,
        order_id: order.id,
        package_id: package.id,
        max_devices: grant.max_devices,
        created_by: grant.admin_id,
      },
    )
    .await?;

    order::ActiveModel { license_id: Set(Some(license.id)), ..order.into() }
      .update(&txn)
      .await?;

    txn.commit().await?;
    Ok(license)
  }

  pub async fn update(
    &self,
    id: Uuid,
    patch: LicenseUpdate,
  ) -> Result<license::Model> {
    let license = self.get(id).await?;

    if license.status == LicenseStatus::Revoked
      && patch.status.is_some_and(|status| status != LicenseStatus::Revoked)
    {
      return Err(Error::LicenseRevoked);
    }

    let now = now();
    let mut model: license::ActiveModel = license.clone().into();

    if let Some(max_devices) = patch.max_devices {
      model.max_devices = Set(check_seats(max_devices)?);
    }
    if let Some(end_date) = patch.end_date {
      if end_date < license.start_date {
        return Err(Error::InvalidInput(
          "endDate cannot precede startDate".into(),
        ));
      }
      model.end_date = Set(end_date);
    }
    if let Some(status) = patch.status
      && status != license.status
    {
      model.status = Set(status);
      if status == LicenseStatus::Revoked {
        model.revoked_at = Set(Some(now));
        model.revoked_reason = Set(Some("Revoked by admin".into()));
      }
    }
    model.updated_at = Set(now);

    Ok(model.update(self.db).await?)
  }

  pub async fn list(
    &self,
    filter: LicenseFilter,
    paging: Paging,
  ) -> Result<Page<LicenseRow>> {
    let mut query = license::Entity::find()
      .find_also_related(user::Entity)
      .order_by_desc(license::Column::CreatedAt);

    if let Some(status) = filter.status {
      query = query.filter(license::Column::Status.eq(status));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim)
      && !search.is_empty()
    {
      query = query.filter(
        Condition::any()
          .add(license::Column::LicenseKey.contains(search.to_uppercase()))
          .add(user::Column::Email.contains(search.to_lowercase())),
      );
    }

    let paginator = query.paginate(self.db, paging.limit());
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(paging.page() - 1).await?;

    let mut items = Vec::with_capacity(rows.len());
    for (license, user) in rows {
      items.push(LicenseRow {
        active_devices: active_devices(self.db, license.id).await?,
        user_email: user.as_ref().map(|u| u.email.clone()),
        user_name: user.map(|u| u.name),
        license,
      });
    }

    Ok(Page::new(items, paging, total))
  }

  pub async fn detail(&self, id: Uuid) -> Result<LicenseDetail> {
    let license = self.get(id).await?;

    let user = user::Entity::find_by_id(license.user_id).one(self.db).await?;
    let package = package::Entity::find_by_id(license.package_id).one(self.db).await?;
    let order = order::Entity::find_by_id(license.order_id).one(self.db).await?;
    let devices = self.devices(id).await?;

    Ok(LicenseDetail {
      user,
      package,
      order_number: order.map(|o| o.order_number),
      devices,
      license,
    })
  }

  /// Every device ever bound, newest first.
  pub async fn devices(&self, id: Uuid) -> Result<Vec<device::Model>> {
    let devices = device::Entity::find()
      .filter(device::Column::LicenseId.eq(id))
      .order_by_desc(device::Column::ActivatedAt)
      .all(self.db)
      .await?;
    Ok(devices)
  }

  pub async fn by_user(&self, user_id: Uuid) -> Result<Vec<OwnedLicense>> {
    let now = now();
    let rows = license::Entity::find()
      .filter(license::Column::UserId.eq(user_id))
      .order_by_desc(license::Column::CreatedAt)
      .find_also_related(package::Entity)
      .all(self.db)
      .await?;

    let mut owned = Vec::with_capacity(rows.len());
    for (license, package) in rows {
      owned.push(OwnedLicense {
        package_name: package.map(|p| p.name).unwrap_or_default(),
        active_devices: active_devices(self.db, license.id).await?,
        days_remaining: license.days_remaining(now).max(0),
        license,
      });
    }
    Ok(owned)
  }

  /// Latest-ending ACTIVE license that has not run out yet.
  pub async fn current_for(&self, user_id: Uuid) -> Result<Subscription> {
    let now = now();
    let current = license::Entity::find()
      .filter(license::Column::UserId.eq(user_id))
      .filter(license::Column::Status.eq(LicenseStatus::Active))
      .filter(license::Column::EndDate.gt(now))
      .order_by_desc(license::Column::EndDate)
      .find_also_related(package::Entity)
      .one(self.db)
      .await?;

    let Some((license, Some(package))) = current else {
      return Ok(Subscription { has_active_subscription: false, subscription: None });
    };

    let limits = Limits::from(&package);
    Ok(Subscription {
      has_active_subscription: true,
      subscription: Some(CurrentPlan {
        days_remaining: license.days_remaining(now),
        package: PackageInfo { name: package.name, limits },
        description: package.description,
        license_key: license.license_key,
        start_date: license.start_date,
        end_date: license.end_date,
        max_devices: license.max_devices,
      }),
    })
  }

  /// Devices of one of the caller's own licenses.
  pub async fn user_devices(
    &self,
    user_id: Uuid,
    license_id: Uuid,
  ) -> Result<Vec<device::Model>> {
    let license = self.get(license_id).await?;
    if license.user_id != user_id {
      return Err(Error::Forbidden);
    }
    self.devices(license_id).await
  }
}
