//! License entity - time-bounded entitlement minted from an order

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Every mint path stores `Active`. `Unused` is only read back from rows
/// written before that policy, and device activation upgrades them.
#[derive(
  Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicenseStatus {
  #[sea_orm(string_value = "UNUSED")]
  Unused,
  #[sea_orm(string_value = "ACTIVE")]
  Active,
  #[sea_orm(string_value = "EXPIRED")]
  Expired,
  #[sea_orm(string_value = "REVOKED")]
  Revoked,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "licenses")]
#[serde(rename_all = "camelCase")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  #[sea_orm(unique)]
  pub license_key: String,
  pub user_id: Uuid,
  #[sea_orm(unique)]
  pub order_id: Uuid,
  pub package_id: Uuid,
  pub start_date: DateTime,
  pub end_date: DateTime,
  pub duration_months: i32,
  pub max_devices: i32,
  pub status: LicenseStatus,
  /// First device bind; independent of `status`
  pub activated_at: Option<DateTime>,
  pub revoked_at: Option<DateTime>,
  pub revoked_reason: Option<String>,
  pub reminded_at: Option<DateTime>,
  pub created_by_id: Option<Uuid>,
  pub created_at: DateTime,
  pub updated_at: DateTime,
}

impl Model {
  /// Expiry is decided by date; the stored status may lag behind the sweep.
  pub fn is_expired_at(&self, now: DateTime) -> bool {
    self.status == LicenseStatus::Expired || self.end_date < now
  }

  pub fn days_remaining(&self, now: DateTime) -> i64 {
    let secs = (self.end_date - now).num_seconds();
    // ceil towards +inf for whole days
    secs.div_euclid(86_400) + i64::from(secs.rem_euclid(86_400) > 0)
  }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "super::user::Entity",
    from = "Column::UserId",
    to = "super::user::Column::Id"
  )]
  User,
  #[sea_orm(
    belongs_to = "super::package::Entity",
    from = "Column::PackageId",
    to = "super::package::Column::Id"
  )]
  Package,
  #[sea_orm(
    belongs_to = "super::order::Entity",
    from = "Column::OrderId",
    to = "super::order::Column::Id"
  )]
  Order,
  #[sea_orm(has_many = "super::device::Entity")]
  Devices,
}

impl Related<super::user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::User.def()
  }
}

impl Related<super::package::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Package.def()
  }
}

impl Related<super::order::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Order.def()
  }
}

impl Related<super::device::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Devices.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
