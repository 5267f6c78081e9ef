//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for a specific entity.

pub mod listing;
pub mod session;
pub mod technical_sheet;
pub mod user;
pub mod vehicle;

pub use listing::{ListingRepository, SqlxListingRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use technical_sheet::{SqlxTechnicalSheetRepository, TechnicalSheetRepository};
pub use user::{SqlxUserRepository, UserRepository};
pub use vehicle::{SqlxVehicleRepository, VehicleRepository};
