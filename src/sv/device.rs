//! Device registry: binds hardware fingerprints to licenses under the seat
//! limit and issues the device-scoped tokens the desktop client runs on.

use serde::{Deserialize, Serialize};

use super::license::{PackageInfo, Summary, active_devices, ensure_usable};
use crate::{
  entity::{LicenseStatus, device, license, package, user},
  ephemeral::Ephemeral,
  keygen,
  notify::{Mailer, OtpMail},
  prelude::*,
  seats::Seats,
  token::{Grant, Tokens},
};

const REASON_USER_OTP: &str = "User requested via OTP";
const REASON_ADMIN_REMOVED: &str = "Admin removed";
const REASON_ADMIN_RESET: &str = "Admin reset all devices";

fn otp_key(license_id: Uuid, device_id: Uuid) -> String {
  format!("deactivate_otp:{license_id}:{device_id}")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activation {
  pub license_key: String,
  pub hardware_id: String,
  pub device_name: String,
  #[serde(rename = "deviceOS")]
  pub device_os: String,
  #[serde(skip)]
  pub ip: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activated {
  pub token: String,
  pub expires_in: u64,
  pub license: Summary,
  pub device: device::Model,
  /// Hardware was already bound; no seat was consumed
  pub already_active: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verified {
  pub valid: bool,
  pub license: Summary,
  pub days_remaining: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Refreshed {
  pub token: String,
  pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseState {
  pub id: Uuid,
  pub license_key: String,
  pub status: LicenseStatus,
  pub start_date: DateTime,
  pub end_date: DateTime,
  pub days_remaining: i64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SeatUsage {
  pub active: u64,
  pub max: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseInfo {
  pub license: LicenseState,
  pub package: PackageInfo,
  pub devices: SeatUsage,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEntry {
  #[serde(flatten)]
  pub device: device::Model,
  pub is_current: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceList {
  pub devices: Vec<DeviceEntry>,
  pub current_device: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpSent {
  pub message: &'static str,
  pub expires_in: u64,
}

pub struct Device<'a> {
  db: &'a DatabaseConnection,
  store: &'a dyn Ephemeral,
  tokens: &'a Tokens,
  seats: &'a Seats,
  mail: &'a dyn Mailer,
  otp_ttl: Duration,
}

impl<'a> Device<'a> {
  pub fn new(
    db: &'a DatabaseConnection,
    store: &'a dyn Ephemeral,
    tokens: &'a Tokens,
    seats: &'a Seats,
    mail: &'a dyn Mailer,
    otp_ttl: Duration,
  ) -> Self {
    Self { db, store, tokens, seats, mail, otp_ttl }
  }

  async fn license(&self, id: Uuid) -> Result<license::Model> {
    license::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::LicenseNotFound)
  }

  async fn package(&self, license: &license::Model) -> Result<package::Model> {
    package::Entity::find_by_id(license.package_id)
      .one(self.db)
      .await?
      .ok_or(Error::PackageNotFound)
  }

  async fn owned_device(&self, license_id: Uuid, device_id: Uuid) -> Result<device::Model> {
    device::Entity::find_by_id(device_id)
      .filter(device::Column::LicenseId.eq(license_id))
      .one(self.db)
      .await?
      .ok_or(Error::DeviceNotFound)
  }

  /// Retired rows keep their original deactivation record.
  async fn bound_device(&self, license_id: Uuid, device_id: Uuid) -> Result<device::Model> {
    let device = self.owned_device(license_id, device_id).await?;
    if !device.is_active {
      return Err(Error::DeviceNotFound);
    }
    Ok(device)
  }

  /// Bind `hardware_id` to the license, or refresh it if it is already
  /// bound. The seat count and the insert happen under the license's lock
  /// inside one transaction.
  pub async fn activate(&self, req: Activation) -> Result<Activated> {
    let hardware_id = req.hardware_id.trim();
    if hardware_id.is_empty() || hardware_id.len() > 255 {
      return Err(Error::InvalidInput("hardwareId must be 1-255 characters".into()));
    }
    let key = req.license_key.trim();
    if !keygen::is_valid_license_key(key) {
      return Err(Error::InvalidInput("Invalid license key format".into()));
    }

    let license = license::Entity::find()
      .filter(license::Column::LicenseKey.eq(key))
      .one(self.db)
      .await?
      .ok_or(Error::LicenseNotFound)?;

    let now = now();
    ensure_usable(&license, now)?;

    let _seat = self.seats.lock(license.id).await;
    let txn = self.db.begin().await?;

    // re-read under the lock; a revoke may have landed meanwhile
    let license = license::Entity::find_by_id(license.id)
      .one(&txn)
      .await?
      .ok_or(Error::LicenseNotFound)?;
    ensure_usable(&license, now)?;

    let existing = device::Entity::find()
      .filter(device::Column::LicenseId.eq(license.id))
      .filter(device::Column::HardwareId.eq(hardware_id))
      .one(&txn)
      .await?;

    let (device, license, already_active) = match existing {
      Some(device) if device.is_active => {
        let ip = req.ip.clone().or_else(|| device.ip_address.clone());
        let device = device::ActiveModel {
          last_login_at: Set(Some(now)),
          ip_address: Set(ip),
          ..device.into()
        }
        .update(&txn)
        .await?;
        (device, license, true)
      }
      existing => {
        let used = active_devices(&txn, license.id).await?;
        if used >= u64::try_from(license.max_devices).unwrap_or(0) {
          return Err(Error::DeviceLimitReached { used, max: license.max_devices });
        }

        let device = match existing {
          // same hardware, previously deactivated: revive the row
          Some(device) => {
            device::ActiveModel {
              device_name: Set(req.device_name.clone()),
              device_os: Set(req.device_os.clone()),
              is_active: Set(true),
              activated_at: Set(now),
              last_login_at: Set(Some(now)),
              ip_address: Set(req.ip.clone()),
              deactivated_at: Set(None),
              deactivated_reason: Set(None),
              ..device.into()
            }
            .update(&txn)
            .await?
          }
          None => {
            device::ActiveModel {
              id: Set(Uuid::new_v4()),
              license_id: Set(license.id),
              hardware_id: Set(hardware_id.to_string()),
              device_name: Set(req.device_name.clone()),
              device_os: Set(req.device_os.clone()),
              is_active: Set(true),
              activated_at: Set(now),
              last_login_at: Set(Some(now)),
              ip_address: Set(req.ip.clone()),
              deactivated_at: Set(None),
              deactivated_reason: Set(None),
            }
            .insert(&txn)
            .await?
          }
        };

        let license = if license.activated_at.is_none()
          || license.status == LicenseStatus::Unused
        {
          let activated_at = license.activated_at.unwrap_or(now);
          license::ActiveModel {
            status: Set(LicenseStatus::Active),
            activated_at: Set(Some(activated_at)),
            updated_at: Set(now),
            ..license.into()
          }
          .update(&txn)
          .await?
        } else {
          license
        };

        (device, license, false)
      }
    };

    txn.commit().await?;

    if already_active {
      debug!("Device {hardware_id} re-activated on {}", license.license_key);
    } else {
      info!(
        "Device activated: {} ({}) on {}",
        device.device_name, hardware_id, license.license_key
      );
    }

    let token = self.tokens.issue(Grant {
      license_id: license.id,
      hardware_id: hardware_id.to_string(),
      user_id: license.user_id,
    })?;
    let package = self.package(&license).await?;

    Ok(Activated {
      token,
      expires_in: self.tokens.ttl().as_secs(),
      license: Summary::new(&license, &package),
      device,
      already_active,
    })
  }

  pub async fn verify(&self, grant: &Grant) -> Result<Verified> {
    let license = self.license(grant.license_id).await?;
    let now = now();
    ensure_usable(&license, now)?;

    let bound = device::Entity::find()
      .filter(device::Column::LicenseId.eq(license.id))
      .filter(device::Column::HardwareId.eq(grant.hardware_id.as_str()))
      .filter(device::Column::IsActive.eq(true))
      .count(self.db)
      .await?
      > 0;
    if !bound {
      return Err(Error::DeviceNotFound);
    }

    let package = self.package(&license).await?;
    Ok(Verified {
      valid: true,
      days_remaining: license.days_remaining(now),
      license: Summary::new(&license, &package),
    })
  }

  /// New token for the same grant; nothing is issued unless `verify` passes.
  pub async fn refresh(&self, grant: Grant) -> Result<Refreshed> {
    self.verify(&grant).await?;
    Ok(Refreshed {
      token: self.tokens.issue(grant)?,
      expires_in: self.tokens.ttl().as_secs(),
    })
  }

  pub async fn license_info(&self, grant: &Grant) -> Result<LicenseInfo> {
    let license = self.license(grant.license_id).await?;
    let package = self.package(&license).await?;
    let active = active_devices(self.db, license.id).await?;

    Ok(LicenseInfo {
      license: LicenseState {
        id: license.id,
        days_remaining: license.days_remaining(now()),
        license_key: license.license_key,
        status: license.status,
        start_date: license.start_date,
        end_date: license.end_date,
      },
      package: PackageInfo {
        name: package.name.clone(),
        limits: (&package).into(),
      },
      devices: SeatUsage { active, max: license.max_devices },
    })
  }

  pub async fn list(&self, grant: &Grant) -> Result<DeviceList> {
    let devices = device::Entity::find()
      .filter(device::Column::LicenseId.eq(grant.license_id))
      .order_by_desc(device::Column::ActivatedAt)
      .all(self.db)
      .await?;

    Ok(DeviceList {
      devices: devices
        .into_iter()
        .map(|device| DeviceEntry {
          is_current: device.is_active && device.hardware_id == grant.hardware_id,
          device,
        })
        .collect(),
      current_device: grant.hardware_id.clone(),
    })
  }

  /// Mail the owner a one-time code naming the device about to be removed.
  pub async fn request_otp(&self, grant: &Grant, device_id: Uuid) -> Result<OtpSent> {
    let device = self.bound_device(grant.license_id, device_id).await?;

    let (_, owner) = license::Entity::find_by_id(grant.license_id)
      .find_also_related(user::Entity)
      .one(self.db)
      .await?
      .ok_or(Error::LicenseNotFound)?;
    let owner = owner.ok_or(Error::UserNotFound)?;

    let otp = keygen::otp();
    self.store.set(&otp_key(grant.license_id, device.id), otp.clone(), self.otp_ttl).await?;

    let sent = self
      .mail
      .send_otp_email(&OtpMail {
        to: owner.email,
        user_name: owner.name,
        otp,
        device_name: device.device_name,
      })
      .await;
    if !sent {
      warn!("Deactivation OTP for device {device_id} was not delivered");
    }

    Ok(OtpSent {
      message: "OTP sent to your registered email",
      expires_in: self.otp_ttl.as_secs(),
    })
  }

  pub async fn deactivate(
    &self,
    grant: &Grant,
    device_id: Uuid,
    otp: &str,
    current_hardware_id: &str,
  ) -> Result<device::Model> {
    let device = self.bound_device(grant.license_id, device_id).await?;

    if device.hardware_id == current_hardware_id {
      return Err(Error::CannotDeactivateCurrentDevice);
    }

    let otp = otp.trim();
    if otp.len() != 6 || !otp.chars().all(|c| c.is_ascii_digit()) {
      return Err(Error::InvalidInput("OTP must be 6 digits".into()));
    }

    let key = otp_key(grant.license_id, device.id);
    let Some(expected) = self.store.get(&key).await? else {
      return Err(Error::OtpExpired);
    };
    if expected != otp {
      return Err(Error::InvalidOtp);
    }

    let device = Self::retire(self.db, device, REASON_USER_OTP).await?;
    self.store.delete(&key).await?;

    info!("Device deactivated by owner: {} ({})", device.device_name, device.hardware_id);
    Ok(device)
  }

  async fn retire(
    db: &DatabaseConnection,
    device: device::Model,
    reason: &str,
  ) -> Result<device::Model> {
    let device = device::ActiveModel {
      is_active: Set(false),
      deactivated_at: Set(Some(now())),
      deactivated_reason: Set(Some(reason.to_string())),
      ..device.into()
    }
    .update(db)
    .await?;
    Ok(device)
  }

  /// Operator path, no OTP.
  pub async fn admin_remove(
    &self,
    license_id: Uuid,
    device_id: Uuid,
  ) -> Result<device::Model> {
    let device = self.bound_device(license_id, device_id).await?;
    let device = Self::retire(self.db, device, REASON_ADMIN_REMOVED).await?;

    info!("Device removed by admin: {} from license {license_id}", device.hardware_id);
    Ok(device)
  }

  pub async fn reset_all(&self, license_id: Uuid) -> Result<u64> {
    self.license(license_id).await?;

    let result = device::Entity::update_many()
      .set(device::ActiveModel {
        is_active: Set(false),
        deactivated_at: Set(Some(now())),
        deactivated_reason: Set(Some(REASON_ADMIN_RESET.to_string())),
        ..Default::default()
      })
      .filter(device::Column::LicenseId.eq(license_id))
      .filter(device::Column::IsActive.eq(true))
      .exec(self.db)
      .await?;

    info!("Reset {} device(s) on license {license_id}", result.rows_affected);
    Ok(result.rows_affected)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing;

  fn activation(key: &str, hardware_id: &str) -> Activation {
    Activation {
      license_key: key.into(),
      hardware_id: hardware_id.into(),
      device_name: format!("PC {hardware_id}"),
      device_os: "Windows 11".into(),
      ip: Some("203.0.113.7".into()),
    }
  }

  async fn device_rows(app: &testing::TestApp, license_id: Uuid) -> u64 {
    device::Entity::find()
      .filter(device::Column::LicenseId.eq(license_id))
      .count(&app.db)
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn second_machine_hits_single_seat_limit() {
    let app = testing::app().await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 1, 30).await;
    let license = testing::license(&app, &user, &package).await;
    let sv = app.sv();

    let first = sv.device.activate(activation(&license.license_key, "hw-a")).await.unwrap();
    assert!(!first.already_active);
    assert_eq!(app.tokens.verify(&first.token).unwrap().hardware_id, "hw-a");

    let err = sv.device.activate(activation(&license.license_key, "hw-b")).await.unwrap_err();
    assert!(matches!(err, Error::DeviceLimitReached { used: 1, max: 1 }));
    assert_eq!(err.to_string(), "Device limit reached: 1/1 devices used");
  }

  #[tokio::test]
  async fn reactivating_same_hardware_is_idempotent() {
    let app = testing::app().await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 1, 30).await;
    let license = testing::license(&app, &user, &package).await;
    let sv = app.sv();

    let first = sv.device.activate(activation(&license.license_key, "hw-a")).await.unwrap();
    let again = sv.device.activate(activation(&license.license_key, "hw-a")).await.unwrap();

    assert!(again.already_active);
    assert_eq!(again.device.id, first.device.id);
    assert_eq!(device_rows(&app, license.id).await, 1);
    assert_eq!(active_devices(&app.db, license.id).await.unwrap(), 1);
  }

  #[tokio::test]
  async fn first_bind_stamps_activation_and_upgrades_legacy_rows() {
    let app = testing::app().await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 1, 30).await;
    let license = testing::license(&app, &user, &package).await;
    let sv = app.sv();

    license::ActiveModel { status: Set(LicenseStatus::Unused), ..license.clone().into() }
      .update(&app.db)
      .await
      .unwrap();

    let activated =
      sv.device.activate(activation(&license.license_key, "hw-a")).await.unwrap();
    assert_eq!(activated.license.status, LicenseStatus::Active);

    let stored = sv.license.get(license.id).await.unwrap();
    assert_eq!(stored.status, LicenseStatus::Active);
    assert!(stored.activated_at.is_some());
  }

  #[tokio::test]
  async fn deactivated_hardware_revives_its_row_within_the_limit() {
    let app = testing::app().await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 1, 30).await;
    let license = testing::license(&app, &user, &package).await;
    let sv = app.sv();

    let first = sv.device.activate(activation(&license.license_key, "hw-a")).await.unwrap();
    sv.device.admin_remove(license.id, first.device.id).await.unwrap();

    sv.device.activate(activation(&license.license_key, "hw-b")).await.unwrap();
    assert!(matches!(
      sv.device.activate(activation(&license.license_key, "hw-a")).await,
      Err(Error::DeviceLimitReached { .. })
    ));

    assert_eq!(sv.device.reset_all(license.id).await.unwrap(), 1);
    let revived = sv.device.activate(activation(&license.license_key, "hw-a")).await.unwrap();
    assert_eq!(revived.device.id, first.device.id);
    assert!(revived.device.deactivated_reason.is_none());
    assert_eq!(device_rows(&app, license.id).await, 2);
  }

  #[tokio::test]
  async fn terminal_licenses_refuse_activation() {
    let app = testing::app().await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 2, 30).await;
    let expired = testing::license(&app, &user, &package).await;
    let revoked = testing::license(&app, &user, &package).await;
    let sv = app.sv();

    testing::set_end_date(&app.db, expired.id, now() - TimeDelta::minutes(5)).await;
    sv.license.revoke(revoked.id, "refund").await.unwrap();

    assert!(matches!(
      sv.device.activate(activation(&expired.license_key, "hw-a")).await,
      Err(Error::LicenseExpired)
    ));
    assert!(matches!(
      sv.device.activate(activation(&revoked.license_key, "hw-a")).await,
      Err(Error::LicenseRevoked)
    ));
    assert!(matches!(
      sv.device.activate(activation("ZZZZ-ZZZZ-ZZZZ-ZZZZ", "hw-a")).await,
      Err(Error::LicenseNotFound)
    ));
  }

  #[tokio::test]
  async fn remote_removal_fails_verify_and_refresh() {
    let app = testing::app().await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 1, 30).await;
    let license = testing::license(&app, &user, &package).await;
    let sv = app.sv();

    let activated = sv.device.activate(activation(&license.license_key, "hw-a")).await.unwrap();
    let grant = app.tokens.verify(&activated.token).unwrap();

    let verified = sv.device.verify(&grant).await.unwrap();
    assert!(verified.valid);
    assert!(verified.days_remaining >= 28);
    assert!(sv.device.refresh(grant.clone()).await.is_ok());

    sv.device.admin_remove(license.id, activated.device.id).await.unwrap();
    assert!(matches!(sv.device.verify(&grant).await, Err(Error::DeviceNotFound)));
    assert!(matches!(sv.device.refresh(grant).await, Err(Error::DeviceNotFound)));
  }

  #[tokio::test]
  async fn info_and_listing_describe_seats() {
    let app = testing::app().await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 2, 30).await;
    let license = testing::license(&app, &user, &package).await;
    let sv = app.sv();

    let a = sv.device.activate(activation(&license.license_key, "hw-a")).await.unwrap();
    sv.device.activate(activation(&license.license_key, "hw-b")).await.unwrap();
    let grant = app.tokens.verify(&a.token).unwrap();

    let info = sv.device.license_info(&grant).await.unwrap();
    assert_eq!(info.devices.active, 2);
    assert_eq!(info.devices.max, 2);
    assert_eq!(info.package.limits.videos_per_month, 30);

    let list = sv.device.list(&grant).await.unwrap();
    assert_eq!(list.devices.len(), 2);
    let current: Vec<_> = list.devices.iter().filter(|d| d.is_current).collect();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].device.hardware_id, "hw-a");
  }

  #[tokio::test]
  async fn otp_gates_remote_deactivation() {
    let app = testing::app().await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 2, 30).await;
    let license = testing::license(&app, &user, &package).await;
    let sv = app.sv();

    let here = sv.device.activate(activation(&license.license_key, "hw-a")).await.unwrap();
    let there = sv.device.activate(activation(&license.license_key, "hw-b")).await.unwrap();
    let grant = app.tokens.verify(&here.token).unwrap();

    sv.device.request_otp(&grant, there.device.id).await.unwrap();
    let otp = app.sent.last_otp().unwrap();
    let wrong = if otp == "111111" { "222222" } else { "111111" };

    assert!(matches!(
      sv.device.deactivate(&grant, there.device.id, wrong, "hw-a").await,
      Err(Error::InvalidOtp)
    ));

    sv.device.request_otp(&grant, here.device.id).await.unwrap();
    let own_otp = app.sent.last_otp().unwrap();
    assert!(matches!(
      sv.device.deactivate(&grant, here.device.id, &own_otp, "hw-a").await,
      Err(Error::CannotDeactivateCurrentDevice)
    ));

    let removed = sv.device.deactivate(&grant, there.device.id, &otp, "hw-a").await.unwrap();
    assert!(!removed.is_active);
    assert_eq!(removed.deactivated_reason.as_deref(), Some(REASON_USER_OTP));

    // single use
    assert!(!app.store.exists(&otp_key(license.id, there.device.id)).await.unwrap());
    assert!(matches!(
      sv.device.deactivate(&grant, there.device.id, &otp, "hw-a").await,
      Err(Error::DeviceNotFound)
    ));
  }

  #[tokio::test]
  async fn retired_devices_keep_their_deactivation_record() {
    let app = testing::app().await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 2, 30).await;
    let license = testing::license(&app, &user, &package).await;
    let sv = app.sv();

    let here = sv.device.activate(activation(&license.license_key, "hw-a")).await.unwrap();
    let there = sv.device.activate(activation(&license.license_key, "hw-b")).await.unwrap();
    let grant = app.tokens.verify(&here.token).unwrap();

    sv.device.request_otp(&grant, there.device.id).await.unwrap();
    let otp = app.sent.last_otp().unwrap();
    assert_eq!(sv.device.reset_all(license.id).await.unwrap(), 2);

    assert!(matches!(
      sv.device.deactivate(&grant, there.device.id, &otp, "hw-a").await,
      Err(Error::DeviceNotFound)
    ));
    assert!(matches!(
      sv.device.request_otp(&grant, there.device.id).await,
      Err(Error::DeviceNotFound)
    ));
    assert!(matches!(
      sv.device.admin_remove(license.id, there.device.id).await,
      Err(Error::DeviceNotFound)
    ));

    let row = device::Entity::find_by_id(there.device.id).one(&app.db).await.unwrap().unwrap();
    assert!(!row.is_active);
    assert_eq!(row.deactivated_reason.as_deref(), Some(REASON_ADMIN_RESET));
  }

  #[tokio::test]
  async fn otp_past_its_ttl_is_expired() {
    let app = testing::app_with(|config| config.otp_ttl = Duration::ZERO).await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 2, 30).await;
    let license = testing::license(&app, &user, &package).await;
    let sv = app.sv();

    let here = sv.device.activate(activation(&license.license_key, "hw-a")).await.unwrap();
    let there = sv.device.activate(activation(&license.license_key, "hw-b")).await.unwrap();
    let grant = app.tokens.verify(&here.token).unwrap();

    sv.device.request_otp(&grant, there.device.id).await.unwrap();
    let otp = app.sent.last_otp().unwrap();

    assert!(matches!(
      sv.device.deactivate(&grant, there.device.id, &otp, "hw-a").await,
      Err(Error::OtpExpired)
    ));
  }

  #[tokio::test]
  async fn foreign_devices_are_not_found() {
    let app = testing::app().await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 1, 30).await;
    let mine = testing::license(&app, &user, &package).await;
    let theirs = testing::license(&app, &user, &package).await;
    let sv = app.sv();

    let a = sv.device.activate(activation(&mine.license_key, "hw-a")).await.unwrap();
    let b = sv.device.activate(activation(&theirs.license_key, "hw-b")).await.unwrap();
    let grant = app.tokens.verify(&a.token).unwrap();

    assert!(matches!(
      sv.device.request_otp(&grant, b.device.id).await,
      Err(Error::DeviceNotFound)
    ));
    assert!(matches!(
      sv.device.admin_remove(mine.id, b.device.id).await,
      Err(Error::DeviceNotFound)
    ));
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn concurrent_activations_never_exceed_seats() {
    let app = Arc::new(testing::file_app().await);
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 2, 30).await;
    let license = testing::license(&app, &user, &package).await;

    let attempts = (0..8).map(|i| {
      let app = app.clone();
      let key = license.license_key.clone();
      tokio::spawn(async move {
        app.sv().device.activate(activation(&key, &format!("hw-{i}"))).await
      })
    });

    let mut granted = 0;
    let mut refused = 0;
    for result in futures::future::join_all(attempts).await {
      match result.unwrap() {
        Ok(_) => granted += 1,
        Err(Error::DeviceLimitReached { used, max }) => {
          assert_eq!((used, max), (2, 2));
          refused += 1;
        }
        Err(err) => panic!("unexpected error: {err}"),
      }
    }

    assert_eq!(granted, 2);
    assert_eq!(refused, 6);
    assert_eq!(active_devices(&app.db, license.id).await.unwrap(), 2);
  }
}
