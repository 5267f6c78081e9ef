//! Listing repository
//!
//! Reads return the full aggregate: the listing row joined with its seller,
//! vehicle and technical sheet, plus the vehicle's image URLs. Writes only
//! touch the `listings` table and run inside a [`DbTransaction`].

use crate::config::DatabaseDriver;
use crate::db::{DbTransaction, DynDatabasePool};
use crate::models::{Listing, ListingState, ListingType, Seller};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlConnection, MySqlPool, Row, SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

use super::vehicle::{
    load_images_mysql, load_images_sqlite, row_to_vehicle_mysql, row_to_vehicle_sqlite,
    VEHICLE_COLUMNS,
};

/// Listing repository trait
#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<Option<Listing>>;

    /// All listings owned by a seller, newest first
    async fn list_by_seller(&self, seller_id: i64) -> Result<Vec<Listing>>;

    async fn list_by_state_and_type(
        &self,
        state: ListingState,
        kind: ListingType,
    ) -> Result<Vec<Listing>>;

    async fn list_by_state(&self, state: ListingState) -> Result<Vec<Listing>>;

    async fn count(&self) -> Result<i64>;

    async fn count_by_state(&self, state: ListingState) -> Result<i64>;

    async fn count_by_type(&self, kind: ListingType) -> Result<i64>;

    /// Insert (id 0) or update the listing row.
    ///
    /// Seller and vehicle references are taken from the embedded seller and vehicle.
    async fn save(&self, tx: &mut DbTransaction, listing: &Listing) -> Result<Listing>;

    async fn delete(&self, tx: &mut DbTransaction, id: i64) -> Result<()>;
}

/// SQLx-based listing repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxListingRepository {
    pool: DynDatabasePool,
}

impl SqlxListingRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ListingRepository> {
        Arc::new(Self::new(pool))
    }
}

/// Filter applied to the aggregate query
#[derive(Debug, Clone, Copy)]
enum ListingFilter {
    Id(i64),
    Seller(i64),
    State(ListingState),
    StateAndType(ListingState, ListingType),
}

impl ListingFilter {
    fn where_clause(&self) -> &'static str {
        match self {
            ListingFilter::Id(_) => "l.id = ?",
            ListingFilter::Seller(_) => "l.seller_id = ?",
            ListingFilter::State(_) => "l.state = ?",
            ListingFilter::StateAndType(..) => "l.state = ? AND l.listing_type = ?",
        }
    }
}

fn listing_query(filter: ListingFilter) -> String {
    format!(
        r#"
        SELECT l.id, l.description, l.state, l.listing_type, l.created_at, l.updated_at,
               u.id AS seller_id, u.email AS seller_email, u.name AS seller_name,
               u.phone AS seller_phone,
               {}
        FROM listings l
        LEFT JOIN users u ON u.id = l.seller_id
        LEFT JOIN vehicles v ON v.id = l.vehicle_id
        LEFT JOIN technical_sheets t ON t.id = v.technical_sheet_id
        WHERE {}
        ORDER BY l.id DESC
        "#,
        VEHICLE_COLUMNS,
        filter.where_clause()
    )
}

#[async_trait]
impl ListingRepository for SqlxListingRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<Listing>> {
        let listings = self.fetch(ListingFilter::Id(id)).await?;
        Ok(listings.into_iter().next())
    }

    async fn list_by_seller(&self, seller_id: i64) -> Result<Vec<Listing>> {
        self.fetch(ListingFilter::Seller(seller_id)).await
    }

    async fn list_by_state_and_type(
        &self,
        state: ListingState,
        kind: ListingType,
    ) -> Result<Vec<Listing>> {
        self.fetch(ListingFilter::StateAndType(state, kind)).await
    }

    async fn list_by_state(&self, state: ListingState) -> Result<Vec<Listing>> {
        self.fetch(ListingFilter::State(state)).await
    }

    async fn count(&self) -> Result<i64> {
        self.count_where("1 = 1", None).await
    }

    async fn count_by_state(&self, state: ListingState) -> Result<i64> {
        self.count_where("state = ?", Some(state.to_string())).await
    }

    async fn count_by_type(&self, kind: ListingType) -> Result<i64> {
        self.count_where("listing_type = ?", Some(kind.to_string())).await
    }

    async fn save(&self, tx: &mut DbTransaction, listing: &Listing) -> Result<Listing> {
        match tx {
            DbTransaction::Sqlite(tx) => save_listing_sqlite(&mut **tx, listing).await,
            DbTransaction::Mysql(tx) => save_listing_mysql(&mut **tx, listing).await,
        }
    }

    async fn delete(&self, tx: &mut DbTransaction, id: i64) -> Result<()> {
        match tx {
            DbTransaction::Sqlite(tx) => sqlx::query("DELETE FROM listings WHERE id = ?")
                .bind(id)
                .execute(&mut **tx)
                .await
                .map(|_| ()),
            DbTransaction::Mysql(tx) => sqlx::query("DELETE FROM listings WHERE id = ?")
                .bind(id)
                .execute(&mut **tx)
                .await
                .map(|_| ()),
        }
        .context("Failed to delete listing")
    }
}

impl SqlxListingRepository {
    async fn fetch(&self, filter: ListingFilter) -> Result<Vec<Listing>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_listings_sqlite(self.pool.sqlite()?, filter).await,
            DatabaseDriver::Mysql => fetch_listings_mysql(self.pool.mysql()?, filter).await,
        }
    }

    async fn count_where(&self, condition: &str, value: Option<String>) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM listings WHERE {}", condition);
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query_scalar::<sqlx::Sqlite, i64>(&sql);
                if let Some(value) = &value {
                    query = query.bind(value);
                }
                query.fetch_one(self.pool.sqlite()?).await
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query_scalar::<sqlx::MySql, i64>(&sql);
                if let Some(value) = &value {
                    query = query.bind(value);
                }
                query.fetch_one(self.pool.mysql()?).await
            }
        }
        .context("Failed to count listings")?;

        Ok(count)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn fetch_listings_sqlite(pool: &SqlitePool, filter: ListingFilter) -> Result<Vec<Listing>> {
    let sql = listing_query(filter);
    let query = sqlx::query::<sqlx::Sqlite>(&sql);
    let query = match filter {
        ListingFilter::Id(id) | ListingFilter::Seller(id) => query.bind(id),
        ListingFilter::State(state) => query.bind(state.to_string()),
        ListingFilter::StateAndType(state, kind) => {
            query.bind(state.to_string()).bind(kind.to_string())
        }
    };
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to query listings")?;

    let mut listings = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut listing = row_to_listing_sqlite(row)?;
        if let Some(vehicle) = listing.vehicle.as_mut() {
            vehicle.image_urls = load_images_sqlite(pool, vehicle.id).await?;
        }
        listings.push(listing);
    }
    Ok(listings)
}

fn row_to_listing_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Listing> {
    let state_str: String = row.get("state");
    let state = ListingState::from_str(&state_str)
        .with_context(|| format!("Invalid listing state in database: {}", state_str))?;
    let type_str: String = row.get("listing_type");
    let kind = ListingType::from_str(&type_str)
        .with_context(|| format!("Invalid listing type in database: {}", type_str))?;

    let seller_id: Option<i64> = row.get("seller_id");
    let seller = seller_id.map(|id| Seller {
        id,
        email: row.get("seller_email"),
        name: row.get("seller_name"),
        phone: row.get("seller_phone"),
    });

    Ok(Listing {
        id: row.get("id"),
        description: row.get("description"),
        state,
        kind,
        seller,
        vehicle: row_to_vehicle_sqlite(row),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

async fn save_listing_sqlite(conn: &mut SqliteConnection, listing: &Listing) -> Result<Listing> {
    let now = Utc::now();

    if listing.id == 0 {
        let result = sqlx::query(
            r#"
            INSERT INTO listings (description, state, listing_type, seller_id, vehicle_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&listing.description)
        .bind(listing.state.to_string())
        .bind(listing.kind.to_string())
        .bind(listing.seller_id())
        .bind(listing.vehicle_id())
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .context("Failed to insert listing")?;

        return Ok(Listing {
            id: result.last_insert_rowid(),
            created_at: now,
            updated_at: now,
            ..listing.clone()
        });
    }

    sqlx::query(
        r#"
        UPDATE listings
        SET description = ?, state = ?, listing_type = ?, seller_id = ?, vehicle_id = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&listing.description)
    .bind(listing.state.to_string())
    .bind(listing.kind.to_string())
    .bind(listing.seller_id())
    .bind(listing.vehicle_id())
    .bind(now)
    .bind(listing.id)
    .execute(&mut *conn)
    .await
    .context("Failed to update listing")?;

    Ok(Listing {
        updated_at: now,
        ..listing.clone()
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn fetch_listings_mysql(pool: &MySqlPool, filter: ListingFilter) -> Result<Vec<Listing>> {
    let sql = listing_query(filter);
    let query = sqlx::query::<sqlx::MySql>(&sql);
    let query = match filter {
        ListingFilter::Id(id) | ListingFilter::Seller(id) => query.bind(id),
        ListingFilter::State(state) => query.bind(state.to_string()),
        ListingFilter::StateAndType(state, kind) => {
            query.bind(state.to_string()).bind(kind.to_string())
        }
    };
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to query listings")?;

    let mut listings = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut listing = row_to_listing_mysql(row)?;
        if let Some(vehicle) = listing.vehicle.as_mut() {
            vehicle.image_urls = load_images_mysql(pool, vehicle.id).await?;
        }
        listings.push(listing);
    }
    Ok(listings)
}

fn row_to_listing_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Listing> {
    let state_str: String = row.get("state");
    let state = ListingState::from_str(&state_str)
        .with_context(|| format!("Invalid listing state in database: {}", state_str))?;
    let type_str: String = row.get("listing_type");
    let kind = ListingType::from_str(&type_str)
        .with_context(|| format!("Invalid listing type in database: {}", type_str))?;

    let seller_id: Option<i64> = row.get("seller_id");
    let seller = seller_id.map(|id| Seller {
        id,
        email: row.get("seller_email"),
        name: row.get("seller_name"),
        phone: row.get("seller_phone"),
    });

    Ok(Listing {
        id: row.get("id"),
        description: row.get("description"),
        state,
        kind,
        seller,
        vehicle: row_to_vehicle_mysql(row),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

async fn save_listing_mysql(conn: &mut MySqlConnection, listing: &Listing) -> Result<Listing> {
    let now = Utc::now();

    if listing.id == 0 {
        let result = sqlx::query(
            r#"
            INSERT INTO listings (description, state, listing_type, seller_id, vehicle_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&listing.description)
        .bind(listing.state.to_string())
        .bind(listing.kind.to_string())
        .bind(listing.seller_id())
        .bind(listing.vehicle_id())
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .context("Failed to insert listing")?;

        return Ok(Listing {
            id: result.last_insert_id() as i64,
            created_at: now,
            updated_at: now,
            ..listing.clone()
        });
    }

    sqlx::query(
        r#"
        UPDATE listings
        SET description = ?, state = ?, listing_type = ?, seller_id = ?, vehicle_id = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&listing.description)
    .bind(listing.state.to_string())
    .bind(listing.kind.to_string())
    .bind(listing.seller_id())
    .bind(listing.vehicle_id())
    .bind(now)
    .bind(listing.id)
    .execute(&mut *conn)
    .await
    .context("Failed to update listing")?;

    Ok(Listing {
        updated_at: now,
        ..listing.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxUserRepository, SqlxVehicleRepository, UserRepository, VehicleRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole, Vehicle};

    struct Fixture {
        pool: DynDatabasePool,
        repo: SqlxListingRepository,
        seller: Seller,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new(
                "seller@example.com".to_string(),
                "Seller".to_string(),
                "555-0101".to_string(),
                "hash".to_string(),
                UserRole::User,
            ))
            .await
            .unwrap();

        Fixture {
            repo: SqlxListingRepository::new(pool.clone()),
            seller: Seller::from(&user),
            pool,
        }
    }

    async fn insert(fx: &Fixture, state: ListingState, kind: ListingType) -> Listing {
        let vehicles = SqlxVehicleRepository::new(fx.pool.clone());
        let mut tx = fx.pool.begin().await.unwrap();
        let vehicle = vehicles
            .save(
                &mut tx,
                &Vehicle {
                    brand: "Ford".to_string(),
                    image_urls: vec!["/uploads/front.jpg".to_string()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let mut listing = Listing::new("nice car".to_string(), fx.seller.clone(), vehicle);
        listing.state = state;
        listing.kind = kind;
        let saved = fx.repo.save(&mut tx, &listing).await.unwrap();
        tx.commit().await.unwrap();
        saved
    }

    #[tokio::test]
    async fn test_save_and_get_aggregate() {
        let fx = setup().await;
        let saved = insert(&fx, ListingState::Pending, ListingType::User).await;
        assert!(saved.id > 0);

        let found = fx.repo.get_by_id(saved.id).await.unwrap().expect("Listing not found");
        assert_eq!(found.description, "nice car");
        assert_eq!(found.state, ListingState::Pending);
        assert_eq!(found.kind, ListingType::User);
        assert_eq!(found.seller, Some(fx.seller.clone()));

        let vehicle = found.vehicle.expect("Vehicle missing");
        assert_eq!(vehicle.brand, "Ford");
        assert_eq!(vehicle.image_urls, vec!["/uploads/front.jpg"]);
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let fx = setup().await;
        assert!(fx.repo.get_by_id(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_changes_state() {
        let fx = setup().await;
        let mut listing = insert(&fx, ListingState::Pending, ListingType::User).await;

        listing.state = ListingState::Accepted;
        let mut tx = fx.pool.begin().await.unwrap();
        fx.repo.save(&mut tx, &listing).await.unwrap();
        tx.commit().await.unwrap();

        let found = fx.repo.get_by_id(listing.id).await.unwrap().unwrap();
        assert_eq!(found.state, ListingState::Accepted);
    }

    #[tokio::test]
    async fn test_filters_and_counts() {
        let fx = setup().await;
        insert(&fx, ListingState::Pending, ListingType::User).await;
        insert(&fx, ListingState::Accepted, ListingType::User).await;
        insert(&fx, ListingState::Accepted, ListingType::Dealership).await;

        assert_eq!(fx.repo.list_by_seller(fx.seller.id).await.unwrap().len(), 3);
        assert!(fx.repo.list_by_seller(fx.seller.id + 1).await.unwrap().is_empty());
        assert_eq!(fx.repo.list_by_state(ListingState::Pending).await.unwrap().len(), 1);

        let catalog = fx
            .repo
            .list_by_state_and_type(ListingState::Accepted, ListingType::Dealership)
            .await
            .unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].kind, ListingType::Dealership);

        assert_eq!(fx.repo.count().await.unwrap(), 3);
        assert_eq!(fx.repo.count_by_state(ListingState::Accepted).await.unwrap(), 2);
        assert_eq!(fx.repo.count_by_state(ListingState::Rejected).await.unwrap(), 0);
        assert_eq!(fx.repo.count_by_type(ListingType::User).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_listing_without_seller_loads() {
        let fx = setup().await;
        let saved = insert(&fx, ListingState::Pending, ListingType::User).await;
        fx.pool
            .execute("UPDATE listings SET seller_id = NULL")
            .await
            .unwrap();

        let found = fx.repo.get_by_id(saved.id).await.unwrap().unwrap();
        assert!(found.seller.is_none());
        assert!(found.vehicle.is_some());
    }

    #[tokio::test]
    async fn test_delete() {
        let fx = setup().await;
        let saved = insert(&fx, ListingState::Pending, ListingType::User).await;

        let mut tx = fx.pool.begin().await.unwrap();
        fx.repo.delete(&mut tx, saved.id).await.unwrap();
        tx.commit().await.unwrap();

        assert!(fx.repo.get_by_id(saved.id).await.unwrap().is_none());
    }
}
