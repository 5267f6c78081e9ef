//! Technical sheet repository
//!
//! Writes take a [`DbTransaction`] so that a sheet is only ever persisted
//! together with the vehicle and listing that own it.

use crate::config::DatabaseDriver;
use crate::db::{DbTransaction, DynDatabasePool};
use crate::models::TechnicalSheet;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlConnection, MySqlPool, Row, SqliteConnection, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait TechnicalSheetRepository: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<Option<TechnicalSheet>>;

    /// Insert (id 0) or update a sheet, returning it with its id set
    async fn save(&self, tx: &mut DbTransaction, sheet: &TechnicalSheet) -> Result<TechnicalSheet>;

    async fn delete(&self, tx: &mut DbTransaction, id: i64) -> Result<()>;
}

pub struct SqlxTechnicalSheetRepository {
    pool: DynDatabasePool,
}

impl SqlxTechnicalSheetRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TechnicalSheetRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TechnicalSheetRepository for SqlxTechnicalSheetRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<TechnicalSheet>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_sheet_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_sheet_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn save(&self, tx: &mut DbTransaction, sheet: &TechnicalSheet) -> Result<TechnicalSheet> {
        match tx {
            DbTransaction::Sqlite(tx) => save_sheet_sqlite(&mut **tx, sheet).await,
            DbTransaction::Mysql(tx) => save_sheet_mysql(&mut **tx, sheet).await,
        }
    }

    async fn delete(&self, tx: &mut DbTransaction, id: i64) -> Result<()> {
        match tx {
            DbTransaction::Sqlite(tx) => sqlx::query("DELETE FROM technical_sheets WHERE id = ?")
                .bind(id)
                .execute(&mut **tx)
                .await
                .map(|_| ()),
            DbTransaction::Mysql(tx) => sqlx::query("DELETE FROM technical_sheets WHERE id = ?")
                .bind(id)
                .execute(&mut **tx)
                .await
                .map(|_| ()),
        }
        .context("Failed to delete technical sheet")
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_sheet_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<TechnicalSheet>> {
    let row = sqlx::query(
        "SELECT id, engine, fuel_type, transmission, doors, power FROM technical_sheets WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get technical sheet")?;

    Ok(row.map(|row| TechnicalSheet {
        id: row.get("id"),
        engine: row.get("engine"),
        fuel_type: row.get("fuel_type"),
        transmission: row.get("transmission"),
        doors: row.get("doors"),
        power: row.get("power"),
    }))
}

async fn save_sheet_sqlite(conn: &mut SqliteConnection, sheet: &TechnicalSheet) -> Result<TechnicalSheet> {
    if sheet.id == 0 {
        let result = sqlx::query(
            r#"
            INSERT INTO technical_sheets (engine, fuel_type, transmission, doors, power)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&sheet.engine)
        .bind(&sheet.fuel_type)
        .bind(&sheet.transmission)
        .bind(&sheet.doors)
        .bind(&sheet.power)
        .execute(&mut *conn)
        .await
        .context("Failed to insert technical sheet")?;

        return Ok(TechnicalSheet {
            id: result.last_insert_rowid(),
            ..sheet.clone()
        });
    }

    sqlx::query(
        r#"
        UPDATE technical_sheets
        SET engine = ?, fuel_type = ?, transmission = ?, doors = ?, power = ?
        WHERE id = ?
        "#,
    )
    .bind(&sheet.engine)
    .bind(&sheet.fuel_type)
    .bind(&sheet.transmission)
    .bind(&sheet.doors)
    .bind(&sheet.power)
    .bind(sheet.id)
    .execute(&mut *conn)
    .await
    .context("Failed to update technical sheet")?;

    Ok(sheet.clone())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_sheet_mysql(pool: &MySqlPool, id: i64) -> Result<Option<TechnicalSheet>> {
    let row = sqlx::query(
        "SELECT id, engine, fuel_type, transmission, doors, power FROM technical_sheets WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get technical sheet")?;

    Ok(row.map(|row| TechnicalSheet {
        id: row.get("id"),
        engine: row.get("engine"),
        fuel_type: row.get("fuel_type"),
        transmission: row.get("transmission"),
        doors: row.get("doors"),
        power: row.get("power"),
    }))
}

async fn save_sheet_mysql(conn: &mut MySqlConnection, sheet: &TechnicalSheet) -> Result<TechnicalSheet> {
    if sheet.id == 0 {
        let result = sqlx::query(
            r#"
            INSERT INTO technical_sheets (engine, fuel_type, transmission, doors, power)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&sheet.engine)
        .bind(&sheet.fuel_type)
        .bind(&sheet.transmission)
        .bind(&sheet.doors)
        .bind(&sheet.power)
        .execute(&mut *conn)
        .await
        .context("Failed to insert technical sheet")?;

        return Ok(TechnicalSheet {
            id: result.last_insert_id() as i64,
            ..sheet.clone()
        });
    }

    sqlx::query(
        r#"
        UPDATE technical_sheets
        SET engine = ?, fuel_type = ?, transmission = ?, doors = ?, power = ?
        WHERE id = ?
        "#,
    )
    .bind(&sheet.engine)
    .bind(&sheet.fuel_type)
    .bind(&sheet.transmission)
    .bind(&sheet.doors)
    .bind(&sheet.power)
    .bind(sheet.id)
    .execute(&mut *conn)
    .await
    .context("Failed to update technical sheet")?;

    Ok(sheet.clone())
}
