use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Packages::Table)
          .if_not_exists()
          .col(ColumnDef::new(Packages::Id).uuid().not_null().primary_key())
          .col(ColumnDef::new(Packages::Slug).string().not_null().unique_key())
          .col(ColumnDef::new(Packages::Name).string().not_null())
          .col(ColumnDef::new(Packages::Description).string().null())
          .col(ColumnDef::new(Packages::OriginalPrice).decimal_len(16, 2).not_null())
          .col(ColumnDef::new(Packages::SalePrice).decimal_len(16, 2).not_null())
          .col(
            ColumnDef::new(Packages::DiscountPercent)
              .integer()
              .not_null()
              .default(0),
          )
          .col(ColumnDef::new(Packages::DurationMonths).integer().not_null())
          .col(
            ColumnDef::new(Packages::VideosPerMonth).integer().not_null().default(0),
          )
          .col(
            ColumnDef::new(Packages::KeywordsTracking)
              .integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(Packages::ApiCallsPerMonth)
              .integer()
              .not_null()
              .default(0),
          )
          .col(ColumnDef::new(Packages::MaxDevices).integer().not_null().default(1))
          .col(
            ColumnDef::new(Packages::IsPopular).boolean().not_null().default(false),
          )
          .col(ColumnDef::new(Packages::IsActive).boolean().not_null().default(true))
          .col(ColumnDef::new(Packages::SortOrder).integer().not_null().default(0))
          .col(ColumnDef::new(Packages::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Packages::UpdatedAt).date_time().not_null())
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Packages::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Packages {
  Table,
  Id,
  Slug,
  Name,
  Description,
  OriginalPrice,
  SalePrice,
  DiscountPercent,
  DurationMonths,
  VideosPerMonth,
  KeywordsTracking,
  ApiCallsPerMonth,
  MaxDevices,
  IsPopular,
  IsActive,
  SortOrder,
  CreatedAt,
  UpdatedAt,
}
