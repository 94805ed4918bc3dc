//! Activity log and monthly quota metering.

use sea_orm::{FromQueryResult, sea_query::Expr};
use serde::Serialize;

use crate::{
  entity::{activity, license, package},
  prelude::*,
};

/// Metered action kinds. Anything unrecognised is logged but never limited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionType {
  VideoCreate,
  KeywordTrack,
  ApiCall,
  Other(String),
}

impl ActionType {
  pub fn parse(raw: &str) -> Self {
    match raw {
      "video_create" => Self::VideoCreate,
      "keyword_track" => Self::KeywordTrack,
      "api_call" => Self::ApiCall,
      other => Self::Other(other.to_string()),
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      Self::VideoCreate => "video_create",
      Self::KeywordTrack => "keyword_track",
      Self::ApiCall => "api_call",
      Self::Other(raw) => raw,
    }
  }

  /// Monthly limit for this action; `None` when it is not metered.
  pub fn quota(&self, limits: &Limits) -> Option<i32> {
    match self {
      Self::VideoCreate => Some(limits.videos_per_month),
      Self::KeywordTrack => Some(limits.keywords_tracking),
      Self::ApiCall => Some(limits.api_calls_per_month),
      Self::Other(_) => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
  pub videos_per_month: i32,
  pub keywords_tracking: i32,
  pub api_calls_per_month: i32,
}

impl From<&package::Model> for Limits {
  fn from(package: &package::Model) -> Self {
    Self {
      videos_per_month: package.videos_per_month,
      keywords_tracking: package.keywords_tracking,
      api_calls_per_month: package.api_calls_per_month,
    }
  }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
  pub usage: HashMap<String, u64>,
  pub limits: Limits,
  pub period_start: DateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitCheck {
  pub can_proceed: bool,
  /// `-1` when unlimited
  pub remaining: i64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit: Option<i32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub used: Option<u64>,
}

impl LimitCheck {
  const UNLIMITED: Self =
    Self { can_proceed: true, remaining: -1, limit: None, used: None };

  pub fn evaluate(action: &ActionType, limits: &Limits, used: u64) -> Self {
    match action.quota(limits) {
      None | Some(0) => Self::UNLIMITED,
      Some(limit) => {
        let remaining = i64::from(limit) - used as i64;
        Self {
          can_proceed: remaining > 0,
          remaining: remaining.max(0),
          limit: Some(limit),
          used: Some(used),
        }
      }
    }
  }
}

#[derive(Debug, Clone)]
pub struct Activity {
  pub user_id: Uuid,
  pub license_id: Option<Uuid>,
  pub action_type: String,
  pub detail: Option<json::Value>,
  pub ip: Option<String>,
}

#[derive(Debug, FromQueryResult)]
struct ActionCount {
  action_type: String,
  count: i64,
}

pub struct Usage<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Usage<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Append one row. Usable inside a caller's transaction.
  pub async fn record<C: ConnectionTrait>(
    conn: &C,
    activity: Activity,
  ) -> Result<activity::Model> {
    let row = activity::ActiveModel {
      id: Set(Uuid::new_v4()),
      user_id: Set(activity.user_id),
      license_id: Set(activity.license_id),
      action_type: Set(activity.action_type),
      action_detail: Set(activity.detail),
      ip_address: Set(activity.ip),
      created_at: Set(now()),
    };
    Ok(row.insert(conn).await?)
  }

  pub async fn log(&self, activity: Activity) -> Result<activity::Model> {
    let action = activity.action_type.trim();
    if action.is_empty() || action.len() > 64 {
      return Err(Error::InvalidInput(
        "actionType must be 1-64 characters".into(),
      ));
    }

    let activity = Activity { action_type: action.to_string(), ..activity };
    Self::record(self.db, activity).await
  }

  async fn limits(&self, license_id: Uuid) -> Result<Limits> {
    let (_, package) = license::Entity::find_by_id(license_id)
      .find_also_related(package::Entity)
      .one(self.db)
      .await?
      .ok_or(Error::LicenseNotFound)?;

    let package = package.ok_or(Error::PackageNotFound)?;
    Ok(Limits::from(&package))
  }

  async fn counts_since(
    &self,
    license_id: Uuid,
    since: DateTime,
  ) -> Result<HashMap<String, u64>> {
    let rows = activity::Entity::find()
      .select_only()
      .column(activity::Column::ActionType)
      .column_as(Expr::col(activity::Column::Id).count(), "count")
      .filter(activity::Column::LicenseId.eq(license_id))
      .filter(activity::Column::CreatedAt.gte(since))
      .group_by(activity::Column::ActionType)
      .into_model::<ActionCount>()
      .all(self.db)
      .await?;

    Ok(
      rows
        .into_iter()
        .map(|row| (row.action_type, row.count.max(0) as u64))
        .collect(),
    )
  }

  /// Per-action counts for the current calendar month plus package quotas.
  pub async fn stats(&self, license_id: Uuid) -> Result<UsageStats> {
    let limits = self.limits(license_id).await?;
    let period_start = utils::start_of_month(now());
    let usage = self.counts_since(license_id, period_start).await?;

    Ok(UsageStats { usage, limits, period_start })
  }

  pub async fn check_limit(
    &self,
    license_id: Uuid,
    action: &ActionType,
  ) -> Result<LimitCheck> {
    let stats = self.stats(license_id).await?;
    let used = stats.usage.get(action.as_str()).copied().unwrap_or(0);

    Ok(LimitCheck::evaluate(action, &stats.limits, used))
  }

  pub async fn purge_older_than(&self, cutoff: DateTime) -> Result<u64> {
    let result = activity::Entity::delete_many()
      .filter(activity::Column::CreatedAt.lt(cutoff))
      .exec(self.db)
      .await?;
    Ok(result.rows_affected)
  }
}
