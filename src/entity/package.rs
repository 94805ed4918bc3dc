//! Package entity - purchasable plan templates

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "packages")]
#[serde(rename_all = "camelCase")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  #[sea_orm(unique)]
  pub slug: String,
  pub name: String,
  pub description: Option<String>,
  pub original_price: Decimal,
  pub sale_price: Decimal,
  pub discount_percent: i32,
  pub duration_months: i32,
  /// `0` means unlimited for every quota field
  pub videos_per_month: i32,
  pub keywords_tracking: i32,
  pub api_calls_per_month: i32,
  pub max_devices: i32,
  pub is_popular: bool,
  pub is_active: bool,
  pub sort_order: i32,
  pub created_at: DateTime,
  pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "super::order::Entity")]
  Orders,
  #[sea_orm(has_many = "super::license::Entity")]
  Licenses,
}

impl Related<super::order::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Orders.def()
  }
}

impl Related<super::license::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Licenses.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
