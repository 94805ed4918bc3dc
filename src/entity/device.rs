//! License device - one hardware seat bound to a license

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "license_devices")]
#[serde(rename_all = "camelCase")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub license_id: Uuid,
  /// Opaque fingerprint generated by the desktop client
  pub hardware_id: String,
  pub device_name: String,
  #[serde(rename = "deviceOS")]
  pub device_os: String,
  pub is_active: bool,
  pub activated_at: DateTime,
  pub last_login_at: Option<DateTime>,
  pub ip_address: Option<String>,
  pub deactivated_at: Option<DateTime>,
  pub deactivated_reason: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "super::license::Entity",
    from = "Column::LicenseId",
    to = "super::license::Column::Id"
  )]
  License,
}

impl Related<super::license::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::License.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
