//! Keyforge - license and subscription server
//!
//! - SeaORM over SQLite for orders, licenses and device seats
//! - Axum HTTP API for buyers, the desktop client and the back office
//! - Teloxide bot for order review
//! - Scheduled sweeps for expiry, reminders and retention

mod entity;
mod ephemeral;
mod error;
mod keygen;
mod notify;
mod plugins;
mod prelude;
mod seats;
mod state;
mod sv;
mod token;
mod utils;

#[cfg(test)]
mod testing;

use plugins::cron::{
  Cron, ExpireLicenses, ExpireOrders, PurgeActivity, PurgeSessions, RemindExpiring,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
  prelude::*,
  state::{AppState, Config},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "keyforge=debug,tower_http=debug,axum=trace,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  info!("Starting Keyforge v{}", env!("CARGO_PKG_VERSION"));

  let config = Config::from_env()?;
  let app = Arc::new(AppState::new(config).await?);

  let handles = plugins::App::new()
    .register(plugins::server::Plugin)
    .register_if(app.bot.is_some(), plugins::telegram::Plugin)
    .register(Cron(ExpireOrders))
    .register(Cron(ExpireLicenses))
    .register(Cron(RemindExpiring))
    .register(Cron(PurgeSessions))
    .register(Cron(PurgeActivity))
    .run(app);

  tokio::signal::ctrl_c().await.context("Failed to listen for shutdown")?;
  info!("Shutting down");

  for handle in handles {
    handle.abort();
  }
  Ok(())
}
