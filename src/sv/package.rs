use crate::{entity::package, prelude::*};

struct Seed {
  slug: &'static str,
  name: &'static str,
  description: &'static str,
  months: i32,
  original: i64,
  sale: i64,
  discount: i32,
  videos: i32,
  keywords: i32,
  api_calls: i32,
  devices: i32,
  popular: bool,
}

#[rustfmt::skip]
const CATALOGUE: [Seed; 5] = [
  Seed { slug: "1-month", name: "1 Month", description: "Basic package for 1 month",
    months: 1, original: 499_000, sale: 499_000, discount: 0,
    videos: 30, keywords: 10, api_calls: 100, devices: 1, popular: false },
  Seed { slug: "2-months", name: "2 Months", description: "Standard package for 2 months",
    months: 2, original: 998_000, sale: 899_000, discount: 10,
    videos: 100, keywords: 25, api_calls: 500, devices: 1, popular: false },
  Seed { slug: "3-months", name: "3 Months", description: "Popular package for 3 months",
    months: 3, original: 1_497_000, sale: 1_199_000, discount: 20,
    videos: 150, keywords: 50, api_calls: 1000, devices: 2, popular: true },
  Seed { slug: "6-months", name: "6 Months", description: "Pro package for 6 months",
    months: 6, original: 2_994_000, sale: 2_099_000, discount: 30,
    videos: 300, keywords: 100, api_calls: 5000, devices: 2, popular: false },
  Seed { slug: "12-months", name: "12 Months", description: "Enterprise package for 1 year",
    months: 12, original: 5_988_000, sale: 3_599_000, discount: 40,
    videos: 0, keywords: 500, api_calls: 0, devices: 3, popular: false },
];

pub struct Package<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Package<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn list_active(&self) -> Result<Vec<package::Model>> {
    let packages = package::Entity::find()
      .filter(package::Column::IsActive.eq(true))
      .order_by_asc(package::Column::SortOrder)
      .all(self.db)
      .await?;
    Ok(packages)
  }

  /// Public lookup by id or slug. Deactivated plans are hidden.
  pub async fn find(&self, id_or_slug: &str) -> Result<package::Model> {
    let query = match Uuid::parse_str(id_or_slug) {
      Ok(id) => package::Entity::find_by_id(id),
      Err(_) => package::Entity::find()
        .filter(package::Column::Slug.eq(id_or_slug.trim().to_lowercase())),
    };

    query
      .filter(package::Column::IsActive.eq(true))
      .one(self.db)
      .await?
      .ok_or(Error::PackageNotFound)
  }

  pub async fn get(&self, id: Uuid) -> Result<package::Model> {
    package::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::PackageNotFound)
  }

  /// Packages are never deleted once orders reference them.
  pub async fn deactivate(&self, id: Uuid) -> Result<package::Model> {
    let package = self.get(id).await?;

    let package = package::ActiveModel {
      is_active: Set(false),
      updated_at: Set(now()),
      ..package.into()
    }
    .update(self.db)
    .await?;

    info!("Package deactivated: {}", package.slug);
    Ok(package)
  }

  /// Insert catalogue entries whose slug does not exist yet.
  pub async fn seed_defaults(&self) -> Result<usize> {
    let now = now();
    let mut inserted = 0;

    for (idx, seed) in CATALOGUE.iter().enumerate() {
      let exists = package::Entity::find()
        .filter(package::Column::Slug.eq(seed.slug))
        .count(self.db)
        .await?
        > 0;
      if exists {
        continue;
      }

      package::ActiveModel {
        id: Set(Uuid::new_v4()),
        slug: Set(seed.slug.to_string()),
        name: Set(seed.name.to_string()),
        description: Set(Some(seed.description.to_string())),
        original_price: Set(Decimal::from(seed.original)),
        sale_price: Set(Decimal::from(seed.sale)),
        discount_percent: Set(seed.discount),
        duration_months: Set(seed.months),
        videos_per_month: Set(seed.videos),
        keywords_tracking: Set(seed.keywords),
        api_calls_per_month: Set(seed.api_calls),
        max_devices: Set(seed.devices),
        is_popular: Set(seed.popular),
        is_active: Set(true),
        sort_order: Set(idx as i32 + 1),
        created_at: Set(now),
        updated_at: Set(now),
      }
      .insert(self.db)
      .await?;

      inserted += 1;
    }

    Ok(inserted)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing;

  #[tokio::test]
  async fn seeding_is_idempotent_and_ordered() {
    let app = testing::app().await;
    let sv = app.sv();

    assert_eq!(sv.package.seed_defaults().await.unwrap(), 5);
    assert_eq!(sv.package.seed_defaults().await.unwrap(), 0);

    let packages = sv.package.list_active().await.unwrap();
    let months: Vec<_> = packages.iter().map(|p| p.duration_months).collect();
    assert_eq!(months, vec![1, 2, 3, 6, 12]);
    assert_eq!(packages[0].sale_price, Decimal::from(499_000));
  }

  #[tokio::test]
  async fn lookup_by_id_or_slug_hides_inactive() {
    let app = testing::app().await;
    let sv = app.sv();
    sv.package.seed_defaults().await.unwrap();

    let by_slug = sv.package.find("3-months").await.unwrap();
    assert!(by_slug.is_popular);
    let by_id = sv.package.find(&by_slug.id.to_string()).await.unwrap();
    assert_eq!(by_id.id, by_slug.id);

    sv.package.deactivate(by_slug.id).await.unwrap();
    assert!(matches!(sv.package.find("3-months").await, Err(Error::PackageNotFound)));
    assert!(!sv.package.get(by_slug.id).await.unwrap().is_active);
  }
}
