//! Short-lived keyed storage for OTPs and session presence.

use std::time::Instant;

use crate::prelude::*;

#[async_trait]
pub trait Ephemeral: Send + Sync {
  async fn get(&self, key: &str) -> Result<Option<String>>;

  async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

  /// Returns whether a live entry was removed.
  async fn delete(&self, key: &str) -> Result<bool>;

  async fn exists(&self, key: &str) -> Result<bool> {
    Ok(self.get(key).await?.is_some())
  }
}

struct Entry {
  value: String,
  expires_at: Instant,
}

impl Entry {
  fn is_live(&self, now: Instant) -> bool {
    now < self.expires_at
  }
}

/// In-process store. Expired entries are invisible immediately and dropped
/// by [`Memory::gc`].
#[derive(Default)]
pub struct Memory {
  entries: DashMap<String, Entry>,
}

impl Memory {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn gc(&self) -> usize {
    let now = Instant::now();
    let mut removed = 0;
    self.entries.retain(|_, entry| {
      let live = entry.is_live(now);
      removed += usize::from(!live);
      live
    });
    removed
  }
}

#[async_trait]
impl Ephemeral for Memory {
  async fn get(&self, key: &str) -> Result<Option<String>> {
    let now = Instant::now();
    Ok(
      self
        .entries
        .get(key)
        .filter(|entry| entry.is_live(now))
        .map(|entry| entry.value.clone()),
    )
  }

  async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
    let expires_at = Instant::now() + ttl;
    self.entries.insert(key.to_string(), Entry { value, expires_at });
    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<bool> {
    let now = Instant::now();
    Ok(self.entries.remove(key).is_some_and(|(_, entry)| entry.is_live(now)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn entries_disappear_after_ttl() {
    let store = Memory::new();

    store.set("otp:a", "123456".into(), Duration::from_secs(60)).await.unwrap();
    store.set("otp:b", "654321".into(), Duration::ZERO).await.unwrap();

    assert_eq!(store.get("otp:a").await.unwrap().as_deref(), Some("123456"));
    assert!(store.get("otp:b").await.unwrap().is_none());
    assert!(!store.exists("otp:b").await.unwrap());

    assert_eq!(store.gc(), 1);
    assert!(store.delete("otp:a").await.unwrap());
    assert!(!store.delete("otp:a").await.unwrap());
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn gc_counts_only_what_it_drops_while_writers_run() {
    let store = Arc::new(Memory::new());
    for i in 0..100 {
      store.set(&format!("stale:{i}"), String::new(), Duration::ZERO).await.unwrap();
    }

    let writer = tokio::spawn({
      let store = store.clone();
      async move {
        for i in 0..1_000 {
          store.set(&format!("live:{i}"), String::new(), Duration::from_secs(60)).await.unwrap();
        }
      }
    });

    let removed = store.gc();
    writer.await.unwrap();

    assert_eq!(removed, 100);
    assert_eq!(store.gc(), 0);
    assert!(store.exists("live:999").await.unwrap());
  }
}
