use sea_orm_migration::prelude::*;

use super::{
  m20260301_000001_create_users::Users,
  m20260301_000003_create_packages::Packages,
  m20260301_000004_create_orders::Orders,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Licenses::Table)
          .if_not_exists()
          .col(ColumnDef::new(Licenses::Id).uuid().not_null().primary_key())
          .col(ColumnDef::new(Licenses::LicenseKey).string().not_null().unique_key())
          .col(ColumnDef::new(Licenses::UserId).uuid().not_null())
          // one order mints at most one license
          .col(ColumnDef::new(Licenses::OrderId).uuid().not_null().unique_key())
          .col(ColumnDef::new(Licenses::PackageId).uuid().not_null())
          .col(ColumnDef::new(Licenses::StartDate).date_time().not_null())
          .col(ColumnDef::new(Licenses::EndDate).date_time().not_null())
          .col(ColumnDef::new(Licenses::DurationMonths).integer().not_null())
          .col(ColumnDef::new(Licenses::MaxDevices).integer().not_null().default(1))
          .col(
            ColumnDef::new(Licenses::Status).string().not_null().default("ACTIVE"),
          )
          .col(ColumnDef::new(Licenses::ActivatedAt).date_time().null())
          .col(ColumnDef::new(Licenses::RevokedAt).date_time().null())
          .col(ColumnDef::new(Licenses::RevokedReason).string().null())
          .col(ColumnDef::new(Licenses::RemindedAt).date_time().null())
          .col(ColumnDef::new(Licenses::CreatedById).uuid().null())
          .col(ColumnDef::new(Licenses::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Licenses::UpdatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_licenses_user")
              .from(Licenses::Table, Licenses::UserId)
              .to(Users::Table, Users::Id),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_licenses_order")
              .from(Licenses::Table, Licenses::OrderId)
              .to(Orders::Table, Orders::Id),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_licenses_package")
              .from(Licenses::Table, Licenses::PackageId)
              .to(Packages::Table, Packages::Id),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_licenses_status_end")
          .table(Licenses::Table)
          .col(Licenses::Status)
          .col(Licenses::EndDate)
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_licenses_user")
          .table(Licenses::Table)
          .col(Licenses::UserId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Licenses::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Licenses {
  Table,
  Id,
  LicenseKey,
  UserId,
  OrderId,
  PackageId,
  StartDate,
  EndDate,
  DurationMonths,
  MaxDevices,
  Status,
  ActivatedAt,
  RevokedAt,
  RevokedReason,
  RemindedAt,
  CreatedById,
  CreatedAt,
  UpdatedAt,
}
