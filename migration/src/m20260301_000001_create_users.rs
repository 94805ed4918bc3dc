use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Users::Table)
          .if_not_exists()
          .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
          .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
          .col(ColumnDef::new(Users::Name).string().not_null())
          .col(ColumnDef::new(Users::Phone).string().null())
          .col(ColumnDef::new(Users::Role).string().not_null().default("USER"))
          .col(
            ColumnDef::new(Users::PreferredContactMethod)
              .string()
              .not_null()
              .default("EMAIL"),
          )
          .col(ColumnDef::new(Users::TelegramContact).string().null())
          .col(ColumnDef::new(Users::ZaloContact).string().null())
          .col(ColumnDef::new(Users::TgUserId).big_integer().null())
          .col(ColumnDef::new(Users::CreatedAt).date_time().not_null())
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Users::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Users {
  Table,
  Id,
  Email,
  Name,
  Phone,
  Role,
  PreferredContactMethod,
  TelegramContact,
  ZaloContact,
  TgUserId,
  CreatedAt,
}
