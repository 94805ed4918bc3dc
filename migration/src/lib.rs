pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_users;
mod m20260301_000002_create_sessions;
mod m20260301_000003_create_packages;
mod m20260301_000004_create_orders;
mod m20260301_000005_create_licenses;
mod m20260301_000006_create_license_devices;
mod m20260301_000007_create_activity_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20260301_000001_create_users::Migration),
      Box::new(m20260301_000002_create_sessions::Migration),
      Box::new(m20260301_000003_create_packages::Migration),
      Box::new(m20260301_000004_create_orders::Migration),
      Box::new(m20260301_000005_create_licenses::Migration),
      Box::new(m20260301_000006_create_license_devices::Migration),
      Box::new(m20260301_000007_create_activity_logs::Migration),
    ]
  }
}
