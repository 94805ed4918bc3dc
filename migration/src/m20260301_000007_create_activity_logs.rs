use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(ActivityLogs::Table)
          .if_not_exists()
          .col(ColumnDef::new(ActivityLogs::Id).uuid().not_null().primary_key())
          .col(ColumnDef::new(ActivityLogs::UserId).uuid().not_null())
          .col(ColumnDef::new(ActivityLogs::LicenseId).uuid().null())
          .col(ColumnDef::new(ActivityLogs::ActionType).string().not_null())
          .col(ColumnDef::new(ActivityLogs::ActionDetail).json().null())
          .col(ColumnDef::new(ActivityLogs::IpAddress).string().null())
          .col(ColumnDef::new(ActivityLogs::CreatedAt).date_time().not_null())
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_activity_logs_license_created")
          .table(ActivityLogs::Table)
          .col(ActivityLogs::LicenseId)
          .col(ActivityLogs::CreatedAt)
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_activity_logs_created")
          .table(ActivityLogs::Table)
          .col(ActivityLogs::CreatedAt)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(ActivityLogs::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum ActivityLogs {
  Table,
  Id,
  UserId,
  LicenseId,
  ActionType,
  ActionDetail,
  IpAddress,
  CreatedAt,
}
