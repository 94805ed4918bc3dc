use sea_orm_migration::prelude::*;

use super::{
  m20260301_000001_create_users::Users,
  m20260301_000003_create_packages::Packages,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Orders::Table)
          .if_not_exists()
          .col(ColumnDef::new(Orders::Id).uuid().not_null().primary_key())
          .col(ColumnDef::new(Orders::OrderNumber).string().not_null().unique_key())
          .col(ColumnDef::new(Orders::UserId).uuid().not_null())
          .col(ColumnDef::new(Orders::PackageId).uuid().not_null())
          .col(ColumnDef::new(Orders::Amount).decimal_len(16, 2).not_null())
          .col(ColumnDef::new(Orders::Currency).string().not_null().default("VND"))
          .col(
            ColumnDef::new(Orders::PaymentMethod)
              .string()
              .not_null()
              .default("VND_BANK_TRANSFER"),
          )
          .col(
            ColumnDef::new(Orders::TransferContent)
              .string()
              .not_null()
              .unique_key(),
          )
          .col(
            ColumnDef::new(Orders::Status).string().not_null().default("PENDING"),
          )
          .col(ColumnDef::new(Orders::DeliveryMethod).string().null())
          .col(ColumnDef::new(Orders::DeliveryContact).string().null())
          .col(ColumnDef::new(Orders::DeliveredAt).date_time().null())
          .col(ColumnDef::new(Orders::UserConfirmedAt).date_time().null())
          .col(ColumnDef::new(Orders::ApprovedAt).date_time().null())
          .col(ColumnDef::new(Orders::ApprovedById).uuid().null())
          .col(ColumnDef::new(Orders::RejectedAt).date_time().null())
          .col(ColumnDef::new(Orders::RejectedById).uuid().null())
          .col(ColumnDef::new(Orders::RejectionReason).string().null())
          .col(ColumnDef::new(Orders::AdminNotes).string().null())
          .col(ColumnDef::new(Orders::LicenseId).uuid().null())
          .col(ColumnDef::new(Orders::ExpiresAt).date_time().not_null())
          .col(ColumnDef::new(Orders::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Orders::UpdatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_orders_user")
              .from(Orders::Table, Orders::UserId)
              .to(Users::Table, Users::Id),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_orders_package")
              .from(Orders::Table, Orders::PackageId)
              .to(Packages::Table, Packages::Id),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_orders_status_expiry")
          .table(Orders::Table)
          .col(Orders::Status)
          .col(Orders::ExpiresAt)
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_orders_user")
          .table(Orders::Table)
          .col(Orders::UserId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Orders::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Orders {
  Table,
  Id,
  OrderNumber,
  UserId,
  PackageId,
  Amount,
  Currency,
  PaymentMethod,
  TransferContent,
  Status,
  DeliveryMethod,
  DeliveryContact,
  DeliveredAt,
  UserConfirmedAt,
  ApprovedAt,
  ApprovedById,
  RejectedAt,
  RejectedById,
  RejectionReason,
  AdminNotes,
  LicenseId,
  ExpiresAt,
  CreatedAt,
  UpdatedAt,
}
