use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

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
pub enum Role {
  #[default]
  #[sea_orm(string_value = "USER")]
  User,
  #[sea_orm(string_value = "ADMIN")]
  Admin,
}

/// Channel a user wants their license delivered through.
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
pub enum ContactMethod {
  #[default]
  #[sea_orm(string_value = "EMAIL")]
  Email,
  #[sea_orm(string_value = "TELEGRAM")]
  Telegram,
  #[sea_orm(string_value = "ZALO")]
  Zalo,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
#[serde(rename_all = "camelCase")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  #[sea_orm(unique)]
  pub email: String,
  pub name: String,
  pub phone: Option<String>,
  pub role: Role,
  pub preferred_contact_method: ContactMethod,
  pub telegram_contact: Option<String>,
  pub zalo_contact: Option<String>,
  /// Telegram account id, set for admins who act through the bot
  pub tg_user_id: Option<i64>,
  pub created_at: DateTime,
}

impl Model {
  pub fn is_admin(&self) -> bool {
    self.role == Role::Admin
  }

  /// Contact handle for `method`, falling back to the e-mail address.
  pub fn contact_for(&self, method: ContactMethod) -> String {
    let handle = match method {
      ContactMethod::Email => None,
      ContactMethod::Telegram => self.telegram_contact.as_ref(),
      ContactMethod::Zalo => self.zalo_contact.as_ref(),
    };
    handle.unwrap_or(&self.email).clone()
  }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "super::order::Entity")]
  Orders,
  #[sea_orm(has_many = "super::license::Entity")]
  Licenses,
  #[sea_orm(has_many = "super::session::Entity")]
  Sessions,
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

impl Related<super::session::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Sessions.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
