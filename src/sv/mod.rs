pub mod device;
pub mod license;
pub mod order;
pub mod package;
pub mod session;
pub mod usage;
pub mod user;

pub use device::Device;
pub use license::License;
pub use order::Order;
pub use package::Package;
pub use session::Session;
pub use usage::Usage;
pub use user::User;

use serde::{Deserialize, Serialize};

use crate::prelude::*;

const DEFAULT_PAGE_SIZE: u64 = 20;
const MAX_PAGE_SIZE: u64 = 100;

/// 1-based page request, clamped to sane bounds.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Paging {
  pub page: Option<u64>,
  pub limit: Option<u64>,
}

impl Default for Paging {
  fn default() -> Self {
    Self { page: Some(1), limit: Some(DEFAULT_PAGE_SIZE) }
  }
}

impl Paging {
  pub fn page(&self) -> u64 {
    self.page.unwrap_or(1).max(1)
  }

  pub fn limit(&self) -> u64 {
    self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
  }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
  pub items: Vec<T>,
  pub page: u64,
  pub limit: u64,
  pub total: u64,
  pub total_pages: u64,
}

impl<T> Page<T> {
  pub fn new(items: Vec<T>, paging: Paging, total: u64) -> Self {
    let limit = paging.limit();
    Self {
      items,
      page: paging.page(),
      limit,
      total,
      total_pages: utils::total_pages(total, limit),
    }
  }
}
