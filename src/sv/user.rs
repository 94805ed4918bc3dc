use sea_orm::Condition;
use serde::{Deserialize, Serialize};

use super::{Page, Paging, license::active_devices};
use crate::{
  entity::{ContactMethod, LicenseStatus, OrderStatus, Role, license, order, package, user},
  prelude::*,
};

const RECENT_ORDERS: u64 = 10;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
  pub email: String,
  pub name: String,
  pub phone: Option<String>,
  pub preferred_contact_method: Option<ContactMethod>,
  pub telegram_contact: Option<String>,
  pub zalo_contact: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPrefs {
  pub phone: Option<String>,
  pub preferred_contact_method: Option<ContactMethod>,
  pub telegram_contact: Option<String>,
  pub zalo_contact: Option<String>,
}

/// Back-office edit; absent fields stay as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
  pub name: Option<String>,
  pub phone: Option<String>,
  pub role: Option<Role>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
  pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
  #[serde(flatten)]
  pub user: user::Model,
  pub orders: u64,
  pub licenses: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentOrder {
  pub id: Uuid,
  pub order_number: String,
  pub status: OrderStatus,
  pub amount: Decimal,
  pub package_name: Option<String>,
  pub created_at: DateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeldLicense {
  pub id: Uuid,
  pub license_key: String,
  pub status: LicenseStatus,
  pub start_date: DateTime,
  pub end_date: DateTime,
  pub package_name: Option<String>,
  pub active_devices: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
  #[serde(flatten)]
  pub user: user::Model,
  pub orders: Vec<RecentOrder>,
  pub licenses: Vec<HeldLicense>,
}

fn normalize_email(email: &str) -> Result<String> {
  let email = email.trim().to_lowercase();
  match email.split_once('@') {
    Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
      Ok(email)
    }
    _ => Err(Error::InvalidInput(format!("Invalid email address: {email}"))),
  }
}

pub struct User<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> User<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn register(&self, reg: Registration) -> Result<user::Model> {
    let email = normalize_email(&reg.email)?;
    let name = reg.name.trim();
    if name.is_empty() {
      return Err(Error::InvalidInput("Name is required".into()));
    }

    if self.by_email(&email).await?.is_some() {
      return Err(Error::EmailTaken);
    }

    let user = user::ActiveModel {
      id: Set(Uuid::new_v4()),
      email: Set(email),
      name: Set(name.to_string()),
      phone: Set(reg.phone),
      role: Set(Role::User),
      preferred_contact_method: Set(
        reg.preferred_contact_method.unwrap_or_default(),
      ),
      telegram_contact: Set(reg.telegram_contact),
      zalo_contact: Set(reg.zalo_contact),
      tg_user_id: Set(None),
      created_at: Set(now()),
    }
    .insert(self.db)
    .await?;

    info!("User registered: {} ({})", user.email, user.id);
    Ok(user)
  }

  pub async fn by_id(&self, id: Uuid) -> Result<Option<user::Model>> {
    Ok(user::Entity::find_by_id(id).one(self.db).await?)
  }

  pub async fn get(&self, id: Uuid) -> Result<user::Model> {
    self.by_id(id).await?.ok_or(Error::UserNotFound)
  }

  pub async fn by_email(&self, email: &str) -> Result<Option<user::Model>> {
    let user = user::Entity::find()
      .filter(user::Column::Email.eq(email.trim().to_lowercase()))
      .one(self.db)
      .await?;
    Ok(user)
  }

  pub async fn update_contact(
    &self,
    id: Uuid,
    prefs: ContactPrefs,
  ) -> Result<user::Model> {
    let user = self.get(id).await?;

    let mut model: user::ActiveModel = user.into();
    if let Some(phone) = prefs.phone {
      model.phone = Set(Some(phone));
    }
    if let Some(method) = prefs.preferred_contact_method {
      model.preferred_contact_method = Set(method);
    }
    if let Some(handle) = prefs.telegram_contact {
      model.telegram_contact = Set(Some(handle));
    }
    if let Some(handle) = prefs.zalo_contact {
      model.zalo_contact = Set(Some(handle));
    }

    Ok(model.update(self.db).await?)
  }

  /// Create the admin account or promote an existing user.
  pub async fn ensure_admin(
    &self,
    email: &str,
    name: &str,
    tg_user_id: Option<i64>,
  ) -> Result<user::Model> {
    let email = normalize_email(email)?;

    if let Some(user) = self.by_email(&email).await? {
      if user.is_admin() && (tg_user_id.is_none() || user.tg_user_id == tg_user_id) {
        return Ok(user);
      }

      let mut model: user::ActiveModel = user.into();
      model.role = Set(Role::Admin);
      if tg_user_id.is_some() {
        model.tg_user_id = Set(tg_user_id);
      }
      return Ok(model.update(self.db).await?);
    }

    let admin = user::ActiveModel {
      id: Set(Uuid::new_v4()),
      email: Set(email),
      name: Set(name.to_string()),
      phone: Set(None),
      role: Set(Role::Admin),
      preferred_contact_method: Set(ContactMethod::Email),
      telegram_contact: Set(None),
      zalo_contact: Set(None),
      tg_user_id: Set(tg_user_id),
      created_at: Set(now()),
    }
    .insert(self.db)
    .await?;

    info!("Admin account created: {}", admin.email);
    Ok(admin)
  }

  /// Admin account a bot action is attributed to. Falls back to the oldest
  /// admin when the Telegram account is not linked to anyone.
  pub async fn admin_for_telegram(&self, tg_user_id: i64) -> Result<user::Model> {
    let linked = user::Entity::find()
      .filter(user::Column::Role.eq(Role::Admin))
      .filter(user::Column::TgUserId.eq(tg_user_id))
      .one(self.db)
      .await?;

    if let Some(admin) = linked {
      return Ok(admin);
    }

    user::Entity::find()
      .filter(user::Column::Role.eq(Role::Admin))
      .order_by_asc(user::Column::CreatedAt)
      .one(self.db)
      .await?
      .ok_or(Error::UserNotFound)
  }

  pub async fn require_admin(&self, id: Uuid) -> Result<user::Model> {
    let user = self.get(id).await?;
    if !user.is_admin() {
      return Err(Error::Forbidden);
    }
    Ok(user)
  }

  pub async fn list(&self, filter: UserFilter, paging: Paging) -> Result<Page<UserRow>> {
    let mut query = user::Entity::find().order_by_desc(user::Column::CreatedAt);
    if let Some(search) = filter.search.as_deref().map(str::trim)
      && !search.is_empty()
    {
      query = query.filter(
        Condition::any()
          .add(user::Column::Email.contains(search.to_lowercase()))
          .add(user::Column::Name.contains(search)),
      );
    }

    let paginator = query.paginate(self.db, paging.limit());
    let total = paginator.num_items().await?;
    let users = paginator.fetch_page(paging.page() - 1).await?;

    let mut items = Vec::with_capacity(users.len());
    for user in users {
      let orders = order::Entity::find()
        .filter(order::Column::UserId.eq(user.id))
        .count(self.db)
        .await?;
      let licenses = license::Entity::find()
        .filter(license::Column::UserId.eq(user.id))
        .count(self.db)
        .await?;
      items.push(UserRow { user, orders, licenses });
    }

    Ok(Page::new(items, paging, total))
  }

  /// Profile with the latest orders and every license held.
  pub async fn detail(&self, id: Uuid) -> Result<UserDetail> {
    let user = self.get(id).await?;

    let orders = order::Entity::find()
      .filter(order::Column::UserId.eq(id))
      .order_by_desc(order::Column::CreatedAt)
      .limit(RECENT_ORDERS)
      .find_also_related(package::Entity)
      .all(self.db)
      .await?
      .into_iter()
      .map(|(order, package)| RecentOrder {
        id: order.id,
        order_number: order.order_number,
        status: order.status,
        amount: order.amount,
        package_name: package.map(|p| p.name),
        created_at: order.created_at,
      })
      .collect();

    let rows = license::Entity::find()
      .filter(license::Column::UserId.eq(id))
      .order_by_desc(license::Column::CreatedAt)
      .find_also_related(package::Entity)
      .all(self.db)
      .await?;

    let mut licenses = Vec::with_capacity(rows.len());
    for (license, package) in rows {
      licenses.push(HeldLicense {
        active_devices: active_devices(self.db, license.id).await?,
        id: license.id,
        license_key: license.license_key,
        status: license.status,
        start_date: license.start_date,
        end_date: license.end_date,
        package_name: package.map(|p| p.name),
      });
    }

    Ok(UserDetail { user, orders, licenses })
  }

  pub async fn update(&self, id: Uuid, patch: UserUpdate) -> Result<user::Model> {
    let user = self.get(id).await?;

    let mut model: user::ActiveModel = user.into();
    if let Some(name) = patch.name {
      let name = name.trim();
      if name.is_empty() {
        return Err(Error::InvalidInput("Name is required".into()));
      }
      model.name = Set(name.to_string());
    }
    if let Some(phone) = patch.phone {
      model.phone = Set(Some(phone));
    }
    if let Some(role) = patch.role {
      model.role = Set(role);
    }

    let user = model.update(self.db).await?;
    info!("User updated by admin: {} ({:?})", user.email, user.role);
    Ok(user)
  }
}
