//! Vehicle repository
//!
//! A vehicle row is stored together with its ordered `vehicle_images` rows.
//! Saving a vehicle replaces its image rows with the current URL list.

use crate::config::DatabaseDriver;
use crate::db::{DbTransaction, DynDatabasePool};
use crate::models::{TechnicalSheet, Vehicle};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlConnection, MySqlPool, Row, SqliteConnection, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait VehicleRepository: Send + Sync {
    /// Vehicle with its technical sheet and image URLs
    async fn get_by_id(&self, id: i64) -> Result<Option<Vehicle>>;

    /// Insert (id 0) or update a vehicle and its image list.
    ///
    /// The technical sheet reference is taken from `vehicle.technical_sheet`,
    /// which must already be saved.
    async fn save(&self, tx: &mut DbTransaction, vehicle: &Vehicle) -> Result<Vehicle>;

    /// Delete a vehicle; its image rows go with it
    async fn delete(&self, tx: &mut DbTransaction, id: i64) -> Result<()>;
}

pub struct SqlxVehicleRepository {
    pool: DynDatabasePool,
}

impl SqlxVehicleRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn VehicleRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl VehicleRepository for SqlxVehicleRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<Vehicle>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_vehicle_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_vehicle_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn save(&self, tx: &mut DbTransaction, vehicle: &Vehicle) -> Result<Vehicle> {
        match tx {
            DbTransaction::Sqlite(tx) => save_vehicle_sqlite(&mut **tx, vehicle).await,
            DbTransaction::Mysql(tx) => save_vehicle_mysql(&mut **tx, vehicle).await,
        }
    }

    async fn delete(&self, tx: &mut DbTransaction, id: i64) -> Result<()> {
        match tx {
            DbTransaction::Sqlite(tx) => {
                // Explicit so image rows go even if foreign keys are off
                sqlx::query("DELETE FROM vehicle_images WHERE vehicle_id = ?")
                    .bind(id)
                    .execute(&mut **tx)
                    .await
                    .context("Failed to delete vehicle images")?;
                sqlx::query("DELETE FROM vehicles WHERE id = ?")
                    .bind(id)
                    .execute(&mut **tx)
                    .await
                    .context("Failed to delete vehicle")?;
            }
            DbTransaction::Mysql(tx) => {
                sqlx::query("DELETE FROM vehicle_images WHERE vehicle_id = ?")
                    .bind(id)
                    .execute(&mut **tx)
                    .await
                    .context("Failed to delete vehicle images")?;
                sqlx::query("DELETE FROM vehicles WHERE id = ?")
                    .bind(id)
                    .execute(&mut **tx)
                    .await
                    .context("Failed to delete vehicle")?;
            }
        }
        Ok(())
    }
}

/// Vehicle and technical sheet columns, aliased so listing queries can share the mappers below.
pub(crate) const VEHICLE_COLUMNS: &str = r#"
    v.id AS vehicle_id, v.brand, v.model, v.price, v.model_year, v.mileage, v.color,
    t.id AS sheet_id, t.engine, t.fuel_type, t.transmission, t.doors, t.power
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_vehicle_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Vehicle>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM vehicles v LEFT JOIN technical_sheets t ON t.id = v.technical_sheet_id WHERE v.id = ?",
        VEHICLE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get vehicle")?;

    let Some(mut vehicle) = row.as_ref().and_then(row_to_vehicle_sqlite) else {
        return Ok(None);
    };
    vehicle.image_urls = load_images_sqlite(pool, vehicle.id).await?;
    Ok(Some(vehicle))
}

/// Map the aliased vehicle columns; `None` when the joined vehicle is absent.
pub(crate) fn row_to_vehicle_sqlite(row: &sqlx::sqlite::SqliteRow) -> Option<Vehicle> {
    let id: Option<i64> = row.get("vehicle_id");
    let sheet_id: Option<i64> = row.get("sheet_id");

    Some(Vehicle {
        id: id?,
        brand: row.get("brand"),
        model: row.get("model"),
        price: row.get("price"),
        year: row.get("model_year"),
        mileage: row.get("mileage"),
        color: row.get("color"),
        image_urls: Vec::new(),
        technical_sheet: sheet_id.map(|id| TechnicalSheet {
            id,
            engine: row.get("engine"),
            fuel_type: row.get("fuel_type"),
            transmission: row.get("transmission"),
            doors: row.get("doors"),
            power: row.get("power"),
        }),
    })
}

pub(crate) async fn load_images_sqlite(pool: &SqlitePool, vehicle_id: i64) -> Result<Vec<String>> {
    sqlx::query_scalar("SELECT url FROM vehicle_images WHERE vehicle_id = ? ORDER BY position")
        .bind(vehicle_id)
        .fetch_all(pool)
        .await
        .context("Failed to load vehicle images")
}

async fn save_vehicle_sqlite(conn: &mut SqliteConnection, vehicle: &Vehicle) -> Result<Vehicle> {
    let sheet_id = vehicle.technical_sheet_id();

    let id = if vehicle.id == 0 {
        sqlx::query(
            r#"
            INSERT INTO vehicles (brand, model, price, model_year, mileage, color, technical_sheet_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&vehicle.brand)
        .bind(&vehicle.model)
        .bind(vehicle.price)
        .bind(vehicle.year)
        .bind(&vehicle.mileage)
        .bind(&vehicle.color)
        .bind(sheet_id)
        .execute(&mut *conn)
        .await
        .context("Failed to insert vehicle")?
        .last_insert_rowid()
    } else {
        sqlx::query(
            r#"
            UPDATE vehicles
            SET brand = ?, model = ?, price = ?, model_year = ?, mileage = ?, color = ?,
                technical_sheet_id = ?
            WHERE id = ?
            "#,
        )
        .bind(&vehicle.brand)
        .bind(&vehicle.model)
        .bind(vehicle.price)
        .bind(vehicle.year)
        .bind(&vehicle.mileage)
        .bind(&vehicle.color)
        .bind(sheet_id)
        .bind(vehicle.id)
        .execute(&mut *conn)
        .await
        .context("Failed to update vehicle")?;
        vehicle.id
    };

    sqlx::query("DELETE FROM vehicle_images WHERE vehicle_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear vehicle images")?;
    for (position, url) in vehicle.image_urls.iter().enumerate() {
        sqlx::query("INSERT INTO vehicle_images (vehicle_id, position, url) VALUES (?, ?, ?)")
            .bind(id)
            .bind(position as i64)
            .bind(url)
            .execute(&mut *conn)
            .await
            .context("Failed to insert vehicle image")?;
    }

    Ok(Vehicle {
        id,
        ..vehicle.clone()
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_vehicle_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Vehicle>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM vehicles v LEFT JOIN technical_sheets t ON t.id = v.technical_sheet_id WHERE v.id = ?",
        VEHICLE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get vehicle")?;

    let Some(mut vehicle) = row.as_ref().and_then(row_to_vehicle_mysql) else {
        return Ok(None);
    };
    vehicle.image_urls = load_images_mysql(pool, vehicle.id).await?;
    Ok(Some(vehicle))
}

pub(crate) fn row_to_vehicle_mysql(row: &sqlx::mysql::MySqlRow) -> Option<Vehicle> {
    let id: Option<i64> = row.get("vehicle_id");
    let sheet_id: Option<i64> = row.get("sheet_id");

    Some(Vehicle {
        id: id?,
        brand: row.get("brand"),
        model: row.get("model"),
        price: row.get("price"),
        year: row.get("model_year"),
        mileage: row.get("mileage"),
        color: row.get("color"),
        image_urls: Vec::new(),
        technical_sheet: sheet_id.map(|id| TechnicalSheet {
            id,
            engine: row.get("engine"),
            fuel_type: row.get("fuel_type"),
            transmission: row.get("transmission"),
            doors: row.get("doors"),
            power: row.get("power"),
        }),
    })
}

pub(crate) async fn load_images_mysql(pool: &MySqlPool, vehicle_id: i64) -> Result<Vec<String>> {
    sqlx::query_scalar("SELECT url FROM vehicle_images WHERE vehicle_id = ? ORDER BY position")
        .bind(vehicle_id)
        .fetch_all(pool)
        .await
        .context("Failed to load vehicle images")
}

async fn save_vehicle_mysql(conn: &mut MySqlConnection, vehicle: &Vehicle) -> Result<Vehicle> {
    let sheet_id = vehicle.technical_sheet_id();

    let id = if vehicle.id == 0 {
        sqlx::query(
            r#"
            INSERT INTO vehicles (brand, model, price, model_year, mileage, color, technical_sheet_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&vehicle.brand)
        .bind(&vehicle.model)
        .bind(vehicle.price)
        .bind(vehicle.year)
        .bind(&vehicle.mileage)
        .bind(&vehicle.color)
        .bind(sheet_id)
        .execute(&mut *conn)
        .await
        .context("Failed to insert vehicle")?
        .last_insert_id() as i64
    } else {
        sqlx::query(
            r#"
            UPDATE vehicles
            SET brand = ?, model = ?, price = ?, model_year = ?, mileage = ?, color = ?,
                technical_sheet_id = ?
            WHERE id = ?
            "#,
        )
        .bind(&vehicle.brand)
        .bind(&vehicle.model)
        .bind(vehicle.price)
        .bind(vehicle.year)
        .bind(&vehicle.mileage)
        .bind(&vehicle.color)
        .bind(sheet_id)
        .bind(vehicle.id)
        .execute(&mut *conn)
        .await
        .context("Failed to update vehicle")?;
        vehicle.id
    };

    sqlx::query("DELETE FROM vehicle_images WHERE vehicle_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear vehicle images")?;
    for (position, url) in vehicle.image_urls.iter().enumerate() {
        sqlx::query("INSERT INTO vehicle_images (vehicle_id, position, url) VALUES (?, ?, ?)")
            .bind(id)
            .bind(position as i64)
            .bind(url)
            .execute(&mut *conn)
            .await
            .context("Failed to insert vehicle image")?;
    }

    Ok(Vehicle {
        id,
        ..vehicle.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxTechnicalSheetRepository, TechnicalSheetRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> (DynDatabasePool, SqlxVehicleRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        (pool.clone(), SqlxVehicleRepository::new(pool))
    }

    fn ford() -> Vehicle {
        Vehicle {
            brand: "Ford".to_string(),
            model: "Focus".to_string(),
            price: Some(12500.0),
            year: Some(2018),
            mileage: "85000".to_string(),
            color: "Blue".to_string(),
            image_urls: vec!["/uploads/a.jpg".to_string(), "/uploads/b.jpg".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_save_with_sheet_and_images() {
        let (pool, repo) = setup().await;
        let sheets = SqlxTechnicalSheetRepository::new(pool.clone());

        let mut tx = pool.begin().await.unwrap();
        let sheet = sheets
            .save(
                &mut tx,
                &TechnicalSheet {
                    engine: "1.6".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let mut vehicle = ford();
        vehicle.technical_sheet = Some(sheet.clone());
        let saved = repo.save(&mut tx, &vehicle).await.expect("Failed to save vehicle");
        tx.commit().await.unwrap();

        let found = repo.get_by_id(saved.id).await.unwrap().expect("Vehicle not found");
        assert_eq!(found.brand, "Ford");
        assert_eq!(found.price, Some(12500.0));
        assert_eq!(found.year, Some(2018));
        assert_eq!(found.image_urls, vec!["/uploads/a.jpg", "/uploads/b.jpg"]);
        assert_eq!(found.technical_sheet, Some(sheet));
    }

    #[tokio::test]
    async fn test_missing_numbers_stay_null() {
        let (pool, repo) = setup().await;

        let mut tx = pool.begin().await.unwrap();
        let saved = repo
            .save(
                &mut tx,
                &Vehicle {
                    brand: "Seat".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let found = repo.get_by_id(saved.id).await.unwrap().unwrap();
        assert_eq!(found.price, None);
        assert_eq!(found.year, None);
        assert!(found.technical_sheet.is_none());
        assert!(found.image_urls.is_empty());
    }

    #[tokio::test]
    async fn test_update_replaces_images_in_order() {
        let (pool, repo) = setup().await;

        let mut tx = pool.begin().await.unwrap();
        let mut saved = repo.save(&mut tx, &ford()).await.unwrap();
        saved.image_urls = vec!["/uploads/c.jpg".to_string()];
        saved.color = "Red".to_string();
        repo.save(&mut tx, &saved).await.unwrap();
        tx.commit().await.unwrap();

        let found = repo.get_by_id(saved.id).await.unwrap().unwrap();
        assert_eq!(found.color, "Red");
        assert_eq!(found.image_urls, vec!["/uploads/c.jpg"]);
    }

    #[tokio::test]
    async fn test_delete_removes_vehicle_and_images() {
        let (pool, repo) = setup().await;

        let mut tx = pool.begin().await.unwrap();
        let saved = repo.save(&mut tx, &ford()).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        repo.delete(&mut tx, saved.id).await.expect("Failed to delete");
        tx.commit().await.unwrap();

        assert!(repo.get_by_id(saved.id).await.unwrap().is_none());
        let images: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vehicle_images")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(images, 0);
    }
}
