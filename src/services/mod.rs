//! Services layer - Business logic
//!
//! This module contains the business logic of the MyCar platform.
//! Services are responsible for:
//! - Enforcing ownership and moderation rules
//! - Coordinating repositories inside transactions
//! - Handling validation and error cases

pub mod listing;
pub mod media;
pub mod notifier;
pub mod password;
pub mod user;

pub use listing::{ListingService, ListingServiceError};
pub use media::{LocalMediaStore, MediaStore};
pub use notifier::{LogNotifier, Notifier, SmtpNotifier};
pub use password::{hash_password, verify_password};
pub use user::{UserService, UserServiceError};
