//! Single-session-per-user login tracking.
//!
//! Opening a session supersedes the user's other live sessions. Each live
//! session is mirrored as `session:{id}` in the ephemeral store, and both the
//! mirror and the row must agree for the session to validate.

use crate::{
  entity::{SessionStatus, session},
  ephemeral::Ephemeral,
  prelude::*,
};

fn store_key(id: Uuid) -> String {
  format!("session:{id}")
}

pub struct Session<'a> {
  db: &'a DatabaseConnection,
  store: &'a dyn Ephemeral,
  ttl: Duration,
}

impl<'a> Session<'a> {
  pub fn new(
    db: &'a DatabaseConnection,
    store: &'a dyn Ephemeral,
    ttl: Duration,
  ) -> Self {
    Self { db, store, ttl }
  }

  pub async fn open(
    &self,
    user_id: Uuid,
    ip: Option<String>,
  ) -> Result<session::Model> {
    let now = now();
    let txn = self.db.begin().await?;

    let superseded: Vec<Uuid> = session::Entity::find()
      .select_only()
      .column(session::Column::Id)
      .filter(session::Column::UserId.eq(user_id))
      .filter(session::Column::Status.eq(SessionStatus::Active))
      .into_tuple()
      .all(&txn)
      .await?;

    if !superseded.is_empty() {
      session::Entity::update_many()
        .set(session::ActiveModel {
          status: Set(SessionStatus::Superseded),
          superseded_at: Set(Some(now)),
          ..Default::default()
        })
        .filter(session::Column::Id.is_in(superseded.clone()))
        .exec(&txn)
        .await?;
    }

    let session = session::ActiveModel {
      id: Set(Uuid::new_v4()),
      user_id: Set(user_id),
      status: Set(SessionStatus::Active),
      ip_address: Set(ip),
      created_at: Set(now),
      expires_at: Set(now + self.ttl),
      superseded_at: Set(None),
      closed_at: Set(None),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    for id in &superseded {
      self.store.delete(&store_key(*id)).await?;
    }
    self.store.set(&store_key(session.id), user_id.to_string(), self.ttl).await?;

    if !superseded.is_empty() {
      info!("User {user_id} signed in again, {} session(s) superseded", superseded.len());
    }
    Ok(session)
  }

  /// Returns the owning user id of a live session.
  pub async fn validate(&self, id: Uuid) -> Result<Uuid> {
    let Some(owner) = self.store.get(&store_key(id)).await? else {
      return Err(Error::AuthRequired);
    };

    let session = session::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::AuthRequired)?;

    if session.status != SessionStatus::Active
      || session.expires_at <= now()
      || owner != session.user_id.to_string()
    {
      return Err(Error::InvalidToken);
    }

    Ok(session.user_id)
  }

  pub async fn close(&self, id: Uuid) -> Result<()> {
    session::Entity::update_many()
      .set(session::ActiveModel {
        status: Set(SessionStatus::Closed),
        closed_at: Set(Some(now())),
        ..Default::default()
      })
      .filter(session::Column::Id.eq(id))
      .filter(session::Column::Status.eq(SessionStatus::Active))
      .exec(self.db)
      .await?;

    self.store.delete(&store_key(id)).await?;
    Ok(())
  }

  pub async fn purge_expired(&self, now: DateTime) -> Result<u64> {
    let result = session::Entity::delete_many()
      .filter(session::Column::ExpiresAt.lt(now))
      .exec(self.db)
      .await?;
    Ok(result.rows_affected)
  }
}
