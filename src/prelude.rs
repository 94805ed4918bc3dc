pub use std::{collections::HashMap, sync::Arc, time::Duration};

pub use anyhow::Context;
pub use async_trait::async_trait;
pub use chrono::{
  Datelike, Months, NaiveDateTime as DateTime, TimeDelta, TimeZone, Timelike,
  Utc,
};
pub use dashmap::DashMap;
pub use rust_decimal::Decimal;
pub use sea_orm::{
  ActiveModelTrait, ActiveEnum, ColumnTrait, ConnectionTrait, DatabaseConnection,
  EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
  TransactionTrait,
};
pub use tokio::time;
pub use tracing::{debug, error, info, warn};
pub use uuid::Uuid;

pub use crate::error::{Error, Result};
pub(crate) use crate::utils;

pub fn now() -> DateTime {
  Utc::now().naive_utc()
}
