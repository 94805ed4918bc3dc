//! Per-license locks around the seat check-and-claim.
//!
//! The unique `(license_id, hardware_id)` index stops duplicate rows; this
//! lock stops two different machines from both passing the seat count.

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::prelude::*;

#[derive(Default)]
pub struct Seats {
  locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl Seats {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn lock(&self, license_id: Uuid) -> OwnedMutexGuard<()> {
    let lock = self.locks.entry(license_id).or_default().clone();
    lock.lock_owned().await
  }

  /// Drop locks nobody is holding or waiting on.
  pub fn gc(&self) {
    self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn same_license_is_serialized() {
    let seats = Arc::new(Seats::new());
    let id = Uuid::new_v4();

    let guard = seats.lock(id).await;

    let waiter = {
      let seats = seats.clone();
      tokio::spawn(async move {
        let _guard = seats.lock(id).await;
      })
    };

    time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());

    drop(guard);
    waiter.await.unwrap();

    // other licenses never wait
    let _a = seats.lock(id).await;
    let _b = seats.lock(Uuid::new_v4()).await;
  }

  #[tokio::test]
  async fn gc_keeps_held_locks() {
    let seats = Seats::new();
    let held = Uuid::new_v4();

    let _guard = seats.lock(held).await;
    drop(seats.lock(Uuid::new_v4()).await);

    seats.gc();
    assert_eq!(seats.locks.len(), 1);
    assert!(seats.locks.contains_key(&held));
  }
}
