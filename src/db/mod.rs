//! Database layer
//!
//! This module provides database abstraction for the MyCar listing service.
//! It supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for larger deployments)
//!
//! The database driver is selected based on configuration.
//!
//! # Architecture
//!
//! The database layer uses a trait-based abstraction (`DatabasePool`) that
//! allows the application to work with either SQLite or MySQL without
//! knowing the specific backend. Multi-table writes run inside a
//! [`DbTransaction`] obtained from [`DatabasePool::begin`].
//!
//! # Usage
//!
//! ```ignore
//! use mycar::config::DatabaseConfig;
//! use mycar::db::{create_pool, DatabasePool, migrations};
//!
//! let config = DatabaseConfig::default();
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//!
//! let mut tx = pool.begin().await?;
//! // ... repository writes ...
//! tx.commit().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DbTransaction, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
