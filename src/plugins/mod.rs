pub mod cron;
pub mod server;
pub mod telegram;

use tokio::task::JoinHandle;

use crate::{prelude::*, state::AppState};

const RESTART_DELAY: Duration = Duration::from_secs(5);

/// Long-running piece of the server: the HTTP API, the bot, a scheduled job.
#[async_trait]
pub trait Plugin: Send + Sync {
  fn name(&self) -> &'static str {
    std::any::type_name::<Self>()
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct App {
  plugins: Vec<Arc<dyn Plugin>>,
}

impl App {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register<P: Plugin + 'static>(mut self, plugin: P) -> Self {
    self.plugins.push(Arc::new(plugin));
    self
  }

  pub fn register_if<P: Plugin + 'static>(self, enabled: bool, plugin: P) -> Self {
    if enabled { self.register(plugin) } else { self }
  }

  /// Spawns every plugin under a supervisor that restarts it when it
  /// returns or panics.
  pub fn run(self, app: Arc<AppState>) -> Vec<JoinHandle<()>> {
    self
      .plugins
      .into_iter()
      .map(|plugin| tokio::spawn(supervise(plugin, app.clone())))
      .collect()
  }
}

async fn supervise(plugin: Arc<dyn Plugin>, app: Arc<AppState>) {
  let name = plugin.name();
  info!("Plugin `{name}` started");

  loop {
    let handle = {
      let (plugin, app) = (plugin.clone(), app.clone());
      tokio::spawn(async move { plugin.start(app).await })
    };

    match handle.await {
      Ok(Ok(())) => warn!("Plugin `{name}` returned, restarting"),
      Ok(Err(err)) => error!("Plugin `{name}` failed: {err:#}"),
      Err(err) if err.is_cancelled() => {
        info!("Plugin `{name}` cancelled");
        break;
      }
      Err(_) => error!("Plugin `{name}` panicked"),
    }

    time::sleep(RESTART_DELAY).await;
  }
}
