use sea_orm_migration::prelude::*;

use super::m20260301_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Sessions::Table)
          .if_not_exists()
          .col(ColumnDef::new(Sessions::Id).uuid().not_null().primary_key())
          .col(ColumnDef::new(Sessions::UserId).uuid().not_null())
          .col(
            ColumnDef::new(Sessions::Status)
              .string()
              .not_null()
              .default("ACTIVE"),
          )
          .col(ColumnDef::new(Sessions::IpAddress).string().null())
          .col(ColumnDef::new(Sessions::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Sessions::ExpiresAt).date_time().not_null())
          .col(ColumnDef::new(Sessions::SupersededAt).date_time().null())
          .col(ColumnDef::new(Sessions::ClosedAt).date_time().null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_sessions_user")
              .from(Sessions::Table, Sessions::UserId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_sessions_user")
          .table(Sessions::Table)
          .col(Sessions::UserId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Sessions::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Sessions {
  Table,
  Id,
  UserId,
  Status,
  IpAddress,
  CreatedAt,
  ExpiresAt,
  SupersededAt,
  ClosedAt,
}
