//! Order lifecycle: PENDING -> PROCESSING -> COMPLETED | REJECTED, and
//! PENDING -> EXPIRED for orders never confirmed.
//!
//! Status changes are conditional updates on the expected current status, so
//! two racing admins cannot both move the same order.

use sea_orm::Condition;
use serde::{Deserialize, Serialize};

use super::{
  Page, Paging,
  license::{License, NewLicense},
};
use crate::{
  entity::{
    ContactMethod, LicenseStatus, OrderStatus, PaymentMethod, license, order,
    package, user,
  },
  keygen,
  notify::{self, LicenseMail, Notify, OrderApproved, OrderRejected},
  prelude::*,
  state::Config,
};

const MAX_CODE_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
  pub package_id: Uuid,
  pub payment_method: Option<PaymentMethod>,
  pub delivery_method: Option<ContactMethod>,
  pub delivery_contact: Option<String>,
}

/// What the buyer needs to make the bank transfer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInstructions {
  pub order_number: String,
  pub transfer_content: String,
  pub amount: Decimal,
  pub currency: String,
  pub payment_method: PaymentMethod,
  pub expires_at: DateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Created {
  pub order: order::Model,
  pub payment: PaymentInstructions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
  pub max_devices: Option<i32>,
  pub delivery_method: Option<ContactMethod>,
  pub delivery_contact: Option<String>,
  pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Approved {
  pub order: order::Model,
  pub license: license::Model,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
  #[serde(flatten)]
  pub order: order::Model,
  pub package: Option<package::Model>,
  pub license_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
  pub id: Uuid,
  pub order_number: String,
  pub status: OrderStatus,
  pub expires_at: DateTime,
  pub rejection_reason: Option<String>,
  pub license_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
  pub status: Option<OrderStatus>,
  pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRow {
  #[serde(flatten)]
  pub order: order::Model,
  pub user_email: Option<String>,
  pub user_name: Option<String>,
  pub package_name: Option<String>,
}

/// A buyer's own order as listed in their history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PastOrder {
  #[serde(flatten)]
  pub order: order::Model,
  pub package_name: Option<String>,
  pub duration_months: Option<i32>,
  pub license_key: Option<String>,
  pub license_status: Option<LicenseStatus>,
  pub license_end_date: Option<DateTime>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
  #[serde(flatten)]
  pub order: order::Model,
  pub user: Option<user::Model>,
  pub package: Option<package::Model>,
  pub license: Option<license::Model>,
}

pub struct Order<'a> {
  db: &'a DatabaseConnection,
  notify: &'a Notify,
  config: &'a Config,
}

impl<'a> Order<'a> {
  pub fn new(
    db: &'a DatabaseConnection,
    notify: &'a Notify,
    config: &'a Config,
  ) -> Self {
    Self { db, notify, config }
  }

  pub async fn get(&self, id: Uuid) -> Result<order::Model> {
    order::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::OrderNotFound)
  }

  /// Admin lookup by id or by the human-facing order number.
  pub async fn find(&self, id_or_number: &str) -> Result<order::Model> {
    let id_or_number = id_or_number.trim();
    if let Ok(id) = Uuid::parse_str(id_or_number) {
      return self.get(id).await;
    }

    order::Entity::find()
      .filter(order::Column::OrderNumber.eq(id_or_number.to_uppercase()))
      .one(self.db)
      .await?
      .ok_or(Error::OrderNotFound)
  }

  async fn owned(&self, user_id: Uuid, id: Uuid) -> Result<order::Model> {
    let order = self.get(id).await?;
    if order.user_id != user_id {
      return Err(Error::Forbidden);
    }
    Ok(order)
  }

  async fn license_key(&self, order: &order::Model) -> Result<Option<String>> {
    let Some(license_id) = order.license_id else { return Ok(None) };
    let license = license::Entity::find_by_id(license_id).one(self.db).await?;
    Ok(license.map(|l| l.license_key))
  }

  /// Both codes are checked in one query and regenerated together.
  async fn unique_codes(&self, now: DateTime) -> Result<(String, String)> {
    for _ in 0..MAX_CODE_ATTEMPTS {
      let number = keygen::order_number(now);
      let memo = keygen::transfer_content();

      let taken = order::Entity::find()
        .filter(
          Condition::any()
            .add(order::Column::OrderNumber.eq(number.as_str()))
            .add(order::Column::TransferContent.eq(memo.as_str())),
        )
        .count(self.db)
        .await?
        > 0;

      if !taken {
        return Ok((number, memo));
      }
      debug!("Order code collision, regenerating");
    }
    Err(Error::Internal("Could not generate unique order codes".into()))
  }

  pub async fn create(
    &self,
    user_id: Uuid,
    req: OrderRequest,
  ) -> Result<Created> {
    let package = package::Entity::find_by_id(req.package_id)
      .one(self.db)
      .await?
      .ok_or(Error::PackageNotFound)?;
    if !package.is_active {
      return Err(Error::PackageInactive);
    }

    let payment_method = req.payment_method.unwrap_or_default();
    if payment_method == PaymentMethod::Manual {
      return Err(Error::InvalidInput(
        "MANUAL is reserved for admin-issued licenses".into(),
      ));
    }

    user::Entity::find_by_id(user_id)
      .one(self.db)
      .await?
      .ok_or(Error::UserNotFound)?;

    let now = now();
    let (order_number, transfer_content) = self.unique_codes(now).await?;

    let order = order::ActiveModel {
      id: Set(Uuid::new_v4()),
      order_number: Set(order_number),
      user_id: Set(user_id),
      package_id: Set(package.id),
      amount: Set(package.sale_price),
      currency: Set(self.config.currency.clone()),
      payment_method: Set(payment_method),
      transfer_content: Set(transfer_content),
      status: Set(OrderStatus::Pending),
      delivery_method: Set(req.delivery_method),
      delivery_contact: Set(req.delivery_contact.filter(|c| !c.trim().is_empty())),
      delivered_at: Set(None),
      user_confirmed_at: Set(None),
      approved_at: Set(None),
      approved_by_id: Set(None),
      rejected_at: Set(None),
      rejected_by_id: Set(None),
      rejection_reason: Set(None),
      admin_notes: Set(None),
      license_id: Set(None),
      expires_at: Set(now + self.config.order_ttl),
      created_at: Set(now),
      updated_at: Set(now),
    }
    .insert(self.db)
    .await?;

    info!(
      "Order created: {} for {} ({})",
      order.order_number,
      package.slug,
      utils::format_money(order.amount, &order.currency)
    );

    let payment = PaymentInstructions {
      order_number: order.order_number.clone(),
      transfer_content: order.transfer_content.clone(),
      amount: order.amount,
      currency: order.currency.clone(),
      payment_method: order.payment_method,
      expires_at: order.expires_at,
    };
    Ok(Created { order, payment })
  }

  pub async fn get_owned(&self, user_id: Uuid, id: Uuid) -> Result<OrderView> {
    let order = self.owned(user_id, id).await?;
    let package = package::Entity::find_by_id(order.package_id).one(self.db).await?;
    let license_key = self.license_key(&order).await?;

    Ok(OrderView { order, package, license_key })
  }

  pub async fn status(&self, user_id: Uuid, id: Uuid) -> Result<StatusView> {
    let order = self.owned(user_id, id).await?;
    let license_key = self.license_key(&order).await?;

    Ok(StatusView {
      id: order.id,
      order_number: order.order_number,
      status: order.status,
      expires_at: order.expires_at,
      rejection_reason: order.rejection_reason,
      license_key,
    })
  }

  /// Re-read after a conditional update matched nothing.
  async fn status_conflict(
    &self,
    action: &'static str,
    id: Uuid,
    fallback: OrderStatus,
  ) -> Error {
    match order::Entity::find_by_id(id).one(self.db).await {
      Ok(Some(order)) => Error::invalid_status(action, order.status),
      Ok(None) => Error::OrderNotFound,
      Err(_) => Error::invalid_status(action, fallback),
    }
  }

  /// Buyer's "I have paid" declaration. Nothing is verified automatically.
  pub async fn confirm(&self, user_id: Uuid, id: Uuid) -> Result<order::Model> {
    let order = self.owned(user_id, id).await?;

    if order.status != OrderStatus::Pending {
      return Err(Error::invalid_status("confirm", order.status));
    }
    let now = now();
    if order.expires_at <= now {
      return Err(Error::OrderExpired);
    }

    let result = order::Entity::update_many()
      .set(order::ActiveModel {
        status: Set(OrderStatus::Processing),
        user_confirmed_at: Set(Some(now)),
        updated_at: Set(now),
        ..Default::default()
      })
      .filter(order::Column::Id.eq(id))
      .filter(order::Column::Status.eq(OrderStatus::Pending))
      .exec(self.db)
      .await?;
    if result.rows_affected == 0 {
      return Err(self.status_conflict("confirm", id, order.status).await);
    }

    let order = self.get(id).await?;
    info!("Order confirmed by buyer: {}", order.order_number);

    let user = user::Entity::find_by_id(order.user_id).one(self.db).await?;
    let package = package::Entity::find_by_id(order.package_id).one(self.db).await?;

    let sent = self
      .notify
      .chat
      .send_new_order_notification(&notify::NewOrder {
        order_id: order.id,
        order_number: order.order_number.clone(),
        user_name: user.as_ref().map(|u| u.name.clone()).unwrap_or_default(),
        user_email: user.map(|u| u.email).unwrap_or_default(),
        package_name: package.map(|p| p.name).unwrap_or_default(),
        amount: order.amount,
        currency: order.currency.clone(),
        transfer_content: order.transfer_content.clone(),
        created_at: order.created_at,
      })
      .await;
    if !sent {
      warn!("Admins were not notified about order {}", order.order_number);
    }

    Ok(order)
  }

  /// Claims the order, mints its license and links the two in a single
  /// transaction. Notifications go out only after commit.
  pub async fn approve(
    &self,
    id: Uuid,
    admin_id: Uuid,
    approval: Approval,
  ) -> Result<Approved> {
    let order = self.get(id).await?;
    if order.status != OrderStatus::Processing {
      return Err(Error::invalid_status("approve", order.status));
    }

    let admin = user::Entity::find_by_id(admin_id)
      .one(self.db)
      .await?
      .ok_or(Error::UserNotFound)?;
    let user = user::Entity::find_by_id(order.user_id)
      .one(self.db)
      .await?
      .ok_or(Error::UserNotFound)?;

    let method = approval
      .delivery_method
      .or(order.delivery_method)
      .unwrap_or(user.preferred_contact_method);
    // the buyer's handle only applies to the channel it was given for
    let ordered_contact = order
      .delivery_contact
      .clone()
      .filter(|_| order.delivery_method == Some(method));
    let contact = approval
      .delivery_contact
      .clone()
      .filter(|c| !c.trim().is_empty())
      .or(ordered_contact)
      .unwrap_or_else(|| user.contact_for(method));

    let now = now();
    let txn = self.db.begin().await?;

    let claimed = order::Entity::update_many()
      .set(order::ActiveModel {
        status: Set(OrderStatus::Completed),
        approved_at: Set(Some(now)),
        approved_by_id: Set(Some(admin_id)),
        delivery_method: Set(Some(method)),
        delivery_contact: Set(Some(contact.clone())),
        delivered_at: Set(Some(now)),
        admin_notes: Set(approval.admin_notes.clone().or(order.admin_notes.clone())),
        updated_at: Set(now),
        ..Default::default()
      })
      .filter(order::Column::Id.eq(id))
      .filter(order::Column::Status.eq(OrderStatus::Processing))
      .exec(&txn)
      .await?;

    if claimed.rows_affected == 0 {
      let current = order::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .map_or(order.status, |o| o.status);
      return Err(Error::invalid_status("approve", current));
    }

    let license = License::mint(
      &txn,
      NewLicense {
        user_id: order.user_id,
        order_id: order.id,
        package_id: order.package_id,
        max_devices: approval.max_devices,
        created_by: Some(admin_id),
      },
    )
    .await?;

    order::Entity::update_many()
      .set(order::ActiveModel {
        license_id: Set(Some(license.id)),
        ..Default::default()
      })
      .filter(order::Column::Id.eq(id))
      .exec(&txn)
      .await?;

    let order = order::Entity::find_by_id(id)
      .one(&txn)
      .await?
      .ok_or(Error::OrderNotFound)?;

    txn.commit().await?;

    info!(
      "Order approved: {} by {}, license {}",
      order.order_number, admin.email, license.license_key
    );

    let package = package::Entity::find_by_id(order.package_id).one(self.db).await?;
    let package_name = package.map(|p| p.name).unwrap_or_default();

    let mailed = self
      .notify
      .mail
      .send_license_email(&LicenseMail {
        to: user.email.clone(),
        user_name: user.name.clone(),
        license_key: license.license_key.clone(),
        package_name,
        expiry: license.end_date,
      })
      .await;
    if !mailed {
      warn!("License email for order {} was not delivered", order.order_number);
    }

    let announced = self
      .notify
      .chat
      .send_order_approved_notification(&OrderApproved {
        order_number: order.order_number.clone(),
        user_name: user.name.clone(),
        license_key: license.license_key.clone(),
        approved_by: admin.name.clone(),
      })
      .await;
    if !announced {
      debug!("Approval of {} not announced in chat", order.order_number);
    }

    Ok(Approved { order, license })
  }

  pub async fn reject(
    &self,
    id: Uuid,
    admin_id: Uuid,
    reason: &str,
  ) -> Result<order::Model> {
    let reason = reason.trim();
    if reason.is_empty() {
      return Err(Error::InvalidInput("A rejection reason is required".into()));
    }

    let order = self.get(id).await?;
    if order.status != OrderStatus::Processing {
      return Err(Error::invalid_status("reject", order.status));
    }

    let admin = user::Entity::find_by_id(admin_id)
      .one(self.db)
      .await?
      .ok_or(Error::UserNotFound)?;

    let now = now();
    let result = order::Entity::update_many()
      .set(order::ActiveModel {
        status: Set(OrderStatus::Rejected),
        rejected_at: Set(Some(now)),
        rejected_by_id: Set(Some(admin_id)),
        rejection_reason: Set(Some(reason.to_string())),
        updated_at: Set(now),
        ..Default::default()
      })
      .filter(order::Column::Id.eq(id))
      .filter(order::Column::Status.eq(OrderStatus::Processing))
      .exec(self.db)
      .await?;
    if result.rows_affected == 0 {
      return Err(self.status_conflict("reject", id, order.status).await);
    }

    let order = self.get(id).await?;
    info!("Order rejected: {} by {} ({reason})", order.order_number, admin.email);

    let user = user::Entity::find_by_id(order.user_id).one(self.db).await?;
    let announced = self
      .notify
      .chat
      .send_order_rejected_notification(&OrderRejected {
        order_number: order.order_number.clone(),
        user_name: user.map(|u| u.name).unwrap_or_default(),
        reason: reason.to_string(),
        rejected_by: admin.name,
      })
      .await;
    if !announced {
      debug!("Rejection of {} not announced in chat", order.order_number);
    }

    Ok(order)
  }

  /// PENDING orders past their deadline become EXPIRED.
  pub async fn expire_stale(&self, now: DateTime) -> Result<u64> {
    let result = order::Entity::update_many()
      .set(order::ActiveModel {
        status: Set(OrderStatus::Expired),
        updated_at: Set(now),
        ..Default::default()
      })
      .filter(order::Column::Status.eq(OrderStatus::Pending))
      .filter(order::Column::ExpiresAt.lt(now))
      .exec(self.db)
      .await?;

    if result.rows_affected > 0 {
      info!("Expired {} unconfirmed order(s)", result.rows_affected);
    }
    Ok(result.rows_affected)
  }

  pub async fn list(
    &self,
    filter: OrderFilter,
    paging: Paging,
  ) -> Result<Page<OrderRow>> {
    let mut query = order::Entity::find()
      .find_also_related(user::Entity)
      .order_by_desc(order::Column::CreatedAt);

    if let Some(status) = filter.status {
      query = query.filter(order::Column::Status.eq(status));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim)
      && !search.is_empty()
    {
      query = query.filter(
        Condition::any()
          .add(order::Column::OrderNumber.contains(search))
          .add(order::Column::TransferContent.contains(search))
          .add(user::Column::Email.contains(search.to_lowercase())),
      );
    }

    let paginator = query.paginate(self.db, paging.limit());
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(paging.page() - 1).await?;

    let package_ids: Vec<Uuid> = rows.iter().map(|(o, _)| o.package_id).collect();
    let packages: HashMap<Uuid, String> = package::Entity::find()
      .filter(package::Column::Id.is_in(package_ids))
      .all(self.db)
      .await?
      .into_iter()
      .map(|p| (p.id, p.name))
      .collect();

    let items = rows
      .into_iter()
      .map(|(order, user)| OrderRow {
        package_name: packages.get(&order.package_id).cloned(),
        user_email: user.as_ref().map(|u| u.email.clone()),
        user_name: user.map(|u| u.name),
        order,
      })
      .collect();

    Ok(Page::new(items, paging, total))
  }

  pub async fn detail(&self, id: Uuid) -> Result<OrderDetail> {
    let order = self.get(id).await?;

    let user = user::Entity::find_by_id(order.user_id).one(self.db).await?;
    let package = package::Entity::find_by_id(order.package_id).one(self.db).await?;
    let license = match order.license_id {
      Some(license_id) => license::Entity::find_by_id(license_id).one(self.db).await?,
      None => None,
    };

    Ok(OrderDetail { order, user, package, license })
  }

  /// The buyer's orders, newest first.
  pub async fn by_user(&self, user_id: Uuid, paging: Paging) -> Result<Page<PastOrder>> {
    let paginator = order::Entity::find()
      .filter(order::Column::UserId.eq(user_id))
      .order_by_desc(order::Column::CreatedAt)
      .find_also_related(package::Entity)
      .paginate(self.db, paging.limit());
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(paging.page() - 1).await?;

    let license_ids: Vec<Uuid> = rows.iter().filter_map(|(o, _)| o.license_id).collect();
    let licenses: HashMap<Uuid, license::Model> = license::Entity::find()
      .filter(license::Column::Id.is_in(license_ids))
      .all(self.db)
      .await?
      .into_iter()
      .map(|l| (l.id, l))
      .collect();

    let items = rows
      .into_iter()
      .map(|(order, package)| {
        let license = order.license_id.and_then(|id| licenses.get(&id));
        PastOrder {
          package_name: package.as_ref().map(|p| p.name.clone()),
          duration_months: package.map(|p| p.duration_months),
          license_key: license.map(|l| l.license_key.clone()),
          license_status: license.map(|l| l.status),
          license_end_date: license.map(|l| l.end_date),
          order,
        }
      })
      .collect();

    Ok(Page::new(items, paging, total))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{entity::LicenseStatus, testing};

  #[tokio::test]
  async fn creation_snapshots_price_and_issues_unique_codes() {
    let app = testing::app().await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 1, 30).await;
    let sv = app.sv();

    let first = sv.order.create(user.id, testing::request(&package)).await.unwrap();
    assert_eq!(first.order.status, OrderStatus::Pending);
    assert_eq!(first.payment.amount, Decimal::from(499_000));
    assert_eq!(first.payment.currency, "VND");
    assert!(first.payment.transfer_content.starts_with("VEO3"));
    assert!(first.order.expires_at > first.order.created_at);

    package::ActiveModel { sale_price: Set(Decimal::from(1)), ..package.clone().into() }
      .update(&app.db)
      .await
      .unwrap();

    let second = sv.order.create(user.id, testing::request(&package)).await.unwrap();
    assert_ne!(first.order.order_number, second.order.order_number);
    assert_ne!(first.order.transfer_content, second.order.transfer_content);

    let reloaded = sv.order.get(first.order.id).await.unwrap();
    assert_eq!(reloaded.amount, Decimal::from(499_000));
    assert_eq!(second.order.amount, Decimal::from(1));

    let number = first.order.order_number.to_lowercase();
    assert_eq!(sv.order.find(&number).await.unwrap().id, first.order.id);
    assert_eq!(sv.order.find(&second.order.id.to_string()).await.unwrap().id, second.order.id);
    assert!(matches!(sv.order.find("VEO3-00000000-ZZZZ").await, Err(Error::OrderNotFound)));
  }

  #[tokio::test]
  async fn creation_requires_an_active_package() {
    let app = testing::app().await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 1, 30).await;
    let sv = app.sv();

    let mut missing = testing::request(&package);
    missing.package_id = Uuid::new_v4();
    assert!(matches!(
      sv.order.create(user.id, missing).await,
      Err(Error::PackageNotFound)
    ));

    sv.package.deactivate(package.id).await.unwrap();
    assert!(matches!(
      sv.order.create(user.id, testing::request(&package)).await,
      Err(Error::PackageInactive)
    ));
  }

  #[tokio::test]
  async fn confirmation_guards_owner_status_and_deadline() {
    let app = testing::app().await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let stranger = testing::user(&app.db, "stranger@example.com").await;
    let package = testing::package(&app.db, 1, 1, 30).await;
    let sv = app.sv();

    let order = sv.order.create(user.id, testing::request(&package)).await.unwrap().order;

    assert!(matches!(sv.order.confirm(stranger.id, order.id).await, Err(Error::Forbidden)));
    assert!(matches!(sv.order.status(stranger.id, order.id).await, Err(Error::Forbidden)));

    let confirmed = sv.order.confirm(user.id, order.id).await.unwrap();
    assert_eq!(confirmed.status, OrderStatus::Processing);
    assert!(confirmed.user_confirmed_at.is_some());
    assert_eq!(app.sent.count(testing::Kind::NewOrder), 1);

    let err = sv.order.confirm(user.id, order.id).await.unwrap_err();
    assert_eq!(err.to_string(), "Cannot confirm order with status: PROCESSING");

    let late = sv.order.create(user.id, testing::request(&package)).await.unwrap().order;
    testing::set_order_expiry(&app.db, late.id, now() - TimeDelta::minutes(1)).await;
    assert!(matches!(sv.order.confirm(user.id, late.id).await, Err(Error::OrderExpired)));
  }

  #[tokio::test]
  async fn approval_completes_order_and_delivers_license() {
    let app = testing::app().await;
    let admin = testing::admin(&app.db).await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 1, 30).await;
    let sv = app.sv();

    let order = sv.order.create(user.id, testing::request(&package)).await.unwrap().order;
    sv.order.confirm(user.id, order.id).await.unwrap();

    let before = now();
    let Approved { order, license } =
      sv.order.approve(order.id, admin.id, Approval::default()).await.unwrap();

    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.license_id, Some(license.id));
    assert_eq!(order.approved_by_id, Some(admin.id));
    assert_eq!(order.delivery_method, Some(ContactMethod::Email));
    assert_eq!(order.delivery_contact.as_deref(), Some("buyer@example.com"));

    assert_eq!(license.order_id, order.id);
    assert_eq!(license.status, LicenseStatus::Active);
    assert!(license.start_date >= before);
    assert_eq!(license.end_date, utils::add_months(license.start_date, 1).unwrap());

    assert_eq!(app.sent.count(testing::Kind::License), 1);
    assert_eq!(app.sent.count(testing::Kind::Approved), 1);

    let status = sv.order.status(user.id, order.id).await.unwrap();
    assert_eq!(status.license_key.as_deref(), Some(license.license_key.as_str()));
  }

  #[tokio::test]
  async fn approval_honours_overrides() {
    let app = testing::app().await;
    let admin = testing::admin(&app.db).await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 1, 30).await;
    let sv = app.sv();

    let order = testing::processing_order(&app, &user, &package).await;
    let approved = sv
      .order
      .approve(
        order.id,
        admin.id,
        Approval {
          max_devices: Some(3),
          delivery_method: Some(ContactMethod::Zalo),
          delivery_contact: Some("0900000000".into()),
          admin_notes: Some("paid via VCB".into()),
        },
      )
      .await
      .unwrap();

    assert_eq!(approved.license.max_devices, 3);
    assert_eq!(approved.order.delivery_method, Some(ContactMethod::Zalo));
    assert_eq!(approved.order.delivery_contact.as_deref(), Some("0900000000"));
    assert_eq!(approved.order.admin_notes.as_deref(), Some("paid via VCB"));
  }

  #[tokio::test]
  async fn switching_delivery_method_drops_the_ordered_handle() {
    let app = testing::app().await;
    let admin = testing::admin(&app.db).await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 1, 30).await;
    let sv = app.sv();

    let request = OrderRequest {
      delivery_method: Some(ContactMethod::Telegram),
      delivery_contact: Some("@buyer_tg".into()),
      ..testing::request(&package)
    };
    let order = sv.order.create(user.id, request.clone()).await.unwrap().order;
    sv.order.confirm(user.id, order.id).await.unwrap();

    let email = Approval { delivery_method: Some(ContactMethod::Email), ..Default::default() };
    let approved = sv.order.approve(order.id, admin.id, email).await.unwrap();
    assert_eq!(approved.order.delivery_method, Some(ContactMethod::Email));
    assert_eq!(approved.order.delivery_contact.as_deref(), Some("buyer@example.com"));

    // same channel keeps what the buyer typed
    let order = sv.order.create(user.id, request).await.unwrap().order;
    sv.order.confirm(user.id, order.id).await.unwrap();
    let approved = sv.order.approve(order.id, admin.id, Approval::default()).await.unwrap();
    assert_eq!(approved.order.delivery_method, Some(ContactMethod::Telegram));
    assert_eq!(approved.order.delivery_contact.as_deref(), Some("@buyer_tg"));
  }

  #[tokio::test]
  async fn only_processing_orders_can_be_approved() {
    let app = testing::app().await;
    let admin = testing::admin(&app.db).await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 1, 30).await;
    let sv = app.sv();

    let order = sv.order.create(user.id, testing::request(&package)).await.unwrap().order;
    let err = sv.order.approve(order.id, admin.id, Approval::default()).await.unwrap_err();
    assert_eq!(err.to_string(), "Cannot approve order with status: PENDING");

    let order = testing::processing_order(&app, &user, &package).await;
    sv.order.approve(order.id, admin.id, Approval::default()).await.unwrap();
    let err = sv.order.approve(order.id, admin.id, Approval::default()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidOrderStatus { .. }));

    assert_eq!(
      license::Entity::find()
        .filter(license::Column::OrderId.eq(order.id))
        .count(&app.db)
        .await
        .unwrap(),
      1
    );
  }

  #[tokio::test]
  async fn failed_mint_leaves_order_processing() {
    let app = testing::app().await;
    let admin = testing::admin(&app.db).await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 1, 30).await;
    let sv = app.sv();

    let order = testing::processing_order(&app, &user, &package).await;

    // a license already bound to this order makes the mint violate the
    // one-license-per-order constraint
    License::mint(
      &app.db,
      NewLicense {
        user_id: user.id,
        order_id: order.id,
        package_id: package.id,
        max_devices: None,
        created_by: None,
      },
    )
    .await
    .unwrap();

    let result = sv.order.approve(order.id, admin.id, Approval::default()).await;
    assert!(matches!(result, Err(Error::Database(_))));

    let order = sv.order.get(order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
    assert!(order.license_id.is_none());
    assert!(order.approved_at.is_none());
    assert_eq!(app.sent.count(testing::Kind::License), 0);
    assert_eq!(app.sent.count(testing::Kind::Approved), 0);
  }

  #[tokio::test]
  async fn notification_failure_does_not_undo_approval() {
    let app = testing::app().await;
    let admin = testing::admin(&app.db).await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 1, 30).await;
    let sv = app.sv();

    let order = testing::processing_order(&app, &user, &package).await;
    app.sent.fail_all();

    let approved = sv.order.approve(order.id, admin.id, Approval::default()).await.unwrap();
    assert_eq!(approved.order.status, OrderStatus::Completed);
    assert_eq!(app.sent.count(testing::Kind::License), 1);
  }

  #[tokio::test]
  async fn rejection_needs_reason_and_processing_status() {
    let app = testing::app().await;
    let admin = testing::admin(&app.db).await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 1, 30).await;
    let sv = app.sv();

    let order = testing::processing_order(&app, &user, &package).await;

    assert!(matches!(
      sv.order.reject(order.id, admin.id, "  ").await,
      Err(Error::InvalidInput(_))
    ));

    let rejected = sv.order.reject(order.id, admin.id, "no transfer found").await.unwrap();
    assert_eq!(rejected.status, OrderStatus::Rejected);
    assert_eq!(rejected.rejected_by_id, Some(admin.id));
    assert_eq!(rejected.rejection_reason.as_deref(), Some("no transfer found"));
    assert_eq!(app.sent.count(testing::Kind::Rejected), 1);

    let err = sv.order.reject(order.id, admin.id, "again").await.unwrap_err();
    assert_eq!(err.to_string(), "Cannot reject order with status: REJECTED");
  }

  #[tokio::test]
  async fn expiry_sweep_only_touches_stale_pending_orders() {
    let app = testing::app().await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let package = testing::package(&app.db, 1, 1, 30).await;
    let sv = app.sv();

    let stale = sv.order.create(user.id, testing::request(&package)).await.unwrap().order;
    let fresh = sv.order.create(user.id, testing::request(&package)).await.unwrap().order;
    let confirmed = testing::processing_order(&app, &user, &package).await;

    let past = now() - TimeDelta::hours(1);
    testing::set_order_expiry(&app.db, stale.id, past).await;
    testing::set_order_expiry(&app.db, confirmed.id, past).await;

    assert_eq!(sv.order.expire_stale(now()).await.unwrap(), 1);
    assert_eq!(sv.order.expire_stale(now()).await.unwrap(), 0);

    assert_eq!(sv.order.get(stale.id).await.unwrap().status, OrderStatus::Expired);
    assert_eq!(sv.order.get(fresh.id).await.unwrap().status, OrderStatus::Pending);
    assert_eq!(sv.order.get(confirmed.id).await.unwrap().status, OrderStatus::Processing);
  }

  #[tokio::test]
  async fn admin_listing_filters_and_searches() {
    let app = testing::app().await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let other = testing::user(&app.db, "other@example.com").await;
    let package = testing::package(&app.db, 1, 1, 30).await;
    let sv = app.sv();

    let pending = sv.order.create(user.id, testing::request(&package)).await.unwrap().order;
    testing::processing_order(&app, &other, &package).await;

    let processing = sv
      .order
      .list(
        OrderFilter { status: Some(OrderStatus::Processing), ..Default::default() },
        Paging::default(),
      )
      .await
      .unwrap();
    assert_eq!(processing.total, 1);
    assert_eq!(processing.items[0].user_email.as_deref(), Some("other@example.com"));
    assert_eq!(processing.items[0].package_name.as_deref(), Some(package.name.as_str()));

    let by_number = sv
      .order
      .list(
        OrderFilter { search: Some(pending.order_number.clone()), ..Default::default() },
        Paging::default(),
      )
      .await
      .unwrap();
    assert_eq!(by_number.total, 1);
    assert_eq!(by_number.items[0].order.id, pending.id);

    let paged = sv
      .order
      .list(OrderFilter::default(), Paging { page: Some(2), limit: Some(1) })
      .await
      .unwrap();
    assert_eq!(paged.total, 2);
    assert_eq!(paged.total_pages, 2);
    assert_eq!(paged.items.len(), 1);

    let detail = sv.order.detail(pending.id).await.unwrap();
    assert!(detail.license.is_none());
    assert_eq!(detail.user.unwrap().id, user.id);
  }

  #[tokio::test]
  async fn history_lists_own_orders_with_their_licenses() {
    let app = testing::app().await;
    let admin = testing::admin(&app.db).await;
    let user = testing::user(&app.db, "buyer@example.com").await;
    let stranger = testing::user(&app.db, "stranger@example.com").await;
    let package = testing::package(&app.db, 3, 1, 30).await;
    let sv = app.sv();

    let pending = sv.order.create(user.id, testing::request(&package)).await.unwrap().order;
    let paid = testing::processing_order(&app, &user, &package).await;
    let license = sv.order.approve(paid.id, admin.id, Approval::default()).await.unwrap().license;
    sv.order.create(stranger.id, testing::request(&package)).await.unwrap();

    let history = sv.order.by_user(user.id, Paging::default()).await.unwrap();
    assert_eq!(history.total, 2);

    let [newest, oldest] = &history.items[..] else { panic!("expected two orders") };
    assert_eq!(newest.order.id, paid.id);
    assert_eq!(newest.license_key.as_deref(), Some(license.license_key.as_str()));
    assert_eq!(newest.license_status, Some(LicenseStatus::Active));
    assert_eq!(newest.duration_months, Some(3));
    assert_eq!(newest.package_name.as_deref(), Some(package.name.as_str()));

    assert_eq!(oldest.order.id, pending.id);
    assert!(oldest.license_key.is_none());

    let second = sv.order.by_user(user.id, Paging { page: Some(2), limit: Some(1) }).await.unwrap();
    assert_eq!(second.total_pages, 2);
    assert_eq!(second.items[0].order.id, pending.id);
  }
}
