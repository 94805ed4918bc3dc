use sea_orm_migration::prelude::*;

use super::m20260301_000005_create_licenses::Licenses;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(LicenseDevices::Table)
          .if_not_exists()
          .col(ColumnDef::new(LicenseDevices::Id).uuid().not_null().primary_key())
          .col(ColumnDef::new(LicenseDevices::LicenseId).uuid().not_null())
          .col(ColumnDef::new(LicenseDevices::HardwareId).string().not_null())
          .col(ColumnDef::new(LicenseDevices::DeviceName).string().not_null())
          .col(ColumnDef::new(LicenseDevices::DeviceOs).string().not_null())
          .col(
            ColumnDef::new(LicenseDevices::IsActive)
              .boolean()
              .not_null()
              .default(true),
          )
          .col(ColumnDef::new(LicenseDevices::ActivatedAt).date_time().not_null())
          .col(ColumnDef::new(LicenseDevices::LastLoginAt).date_time().null())
          .col(ColumnDef::new(LicenseDevices::IpAddress).string().null())
          .col(ColumnDef::new(LicenseDevices::DeactivatedAt).date_time().null())
          .col(ColumnDef::new(LicenseDevices::DeactivatedReason).string().null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_license_devices_license")
              .from(LicenseDevices::Table, LicenseDevices::LicenseId)
              .to(Licenses::Table, Licenses::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("uq_license_devices_hardware")
          .table(LicenseDevices::Table)
          .col(LicenseDevices::LicenseId)
          .col(LicenseDevices::HardwareId)
          .unique()
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(LicenseDevices::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum LicenseDevices {
  Table,
  Id,
  LicenseId,
  HardwareId,
  DeviceName,
  DeviceOs,
  IsActive,
  ActivatedAt,
  LastLoginAt,
  IpAddress,
  DeactivatedAt,
  DeactivatedReason,
}
