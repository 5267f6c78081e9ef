//! Data models
//!
//! This module contains all data structures used throughout the MyCar listing service.
//! Models represent:
//! - Database entities (Listing, Vehicle, TechnicalSheet, User, Session)
//! - API request/response types
//! - Internal data transfer objects

mod listing;
mod session;
mod technical_sheet;
mod user;
mod vehicle;

pub use listing::{
    Listing, ListingInput, ListingResponse, ListingState, ListingStats, ListingType, Seller,
    UploadedFile,
};
pub use session::Session;
pub use technical_sheet::{TechnicalSheet, TechnicalSheetInput};
pub use user::{CreateUserInput, User, UserRole};
pub use vehicle::{Vehicle, VehicleInput};
