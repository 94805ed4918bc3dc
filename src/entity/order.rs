//! Order entity - one purchase attempt tracked through manual payment review

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::ContactMethod;

#[derive(
  Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
  #[sea_orm(string_value = "PENDING")]
  Pending,
  #[sea_orm(string_value = "PROCESSING")]
  Processing,
  #[sea_orm(string_value = "COMPLETED")]
  Completed,
  #[sea_orm(string_value = "REJECTED")]
  Rejected,
  #[sea_orm(string_value = "EXPIRED")]
  Expired,
}

impl OrderStatus {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Completed | Self::Rejected | Self::Expired)
  }
}

#[derive(
  Clone,
  Copy,
  Debug,
  Default,
  PartialEq,
  Eq,
  EnumIter,
  DeriveActiveEnum,
  Serialize,
  Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
  #[default]
  #[sea_orm(string_value = "VND_BANK_TRANSFER")]
  VndBankTransfer,
  #[sea_orm(string_value = "USDT")]
  Usdt,
  /// Synthetic orders backing admin-generated licenses
  #[sea_orm(string_value = "MANUAL")]
  Manual,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
#[serde(rename_all = "camelCase")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  #[sea_orm(unique)]
  pub order_number: String,
  pub user_id: Uuid,
  pub package_id: Uuid,
  /// Snapshot of the package sale price at creation time
  pub amount: Decimal,
  pub currency: String,
  pub payment_method: PaymentMethod,
  #[sea_orm(unique)]
  pub transfer_content: String,
  pub status: OrderStatus,
  pub delivery_method: Option<ContactMethod>,
  pub delivery_contact: Option<String>,
  pub delivered_at: Option<DateTime>,
  pub user_confirmed_at: Option<DateTime>,
  pub approved_at: Option<DateTime>,
  pub approved_by_id: Option<Uuid>,
  pub rejected_at: Option<DateTime>,
  pub rejected_by_id: Option<Uuid>,
  pub rejection_reason: Option<String>,
  pub admin_notes: Option<String>,
  pub license_id: Option<Uuid>,
  pub expires_at: DateTime,
  pub created_at: DateTime,
  pub updated_at: DateTime,
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

impl ActiveModelBehavior for ActiveModel {}
