//! Listing model
//!
//! A listing ties together a seller, a vehicle and a moderation state.
//!
//! State transitions:
//! - created `PENDING` (user listing) or `ACCEPTED` (dealership listing)
//! - `PENDING` -> `ACCEPTED` / `REJECTED` by an admin
//! - `ACCEPTED` -> `PENDING` when the owner edits it

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::User;
use super::vehicle::{Vehicle, VehicleInput};

/// Moderation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ListingState {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl std::fmt::Display for ListingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Accepted => write!(f, "ACCEPTED"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

impl std::str::FromStr for ListingState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "ACCEPTED" => Ok(Self::Accepted),
            "REJECTED" => Ok(Self::Rejected),
            _ => Err(anyhow::anyhow!("Invalid listing state: {}", s)),
        }
    }
}

/// Who published the listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ListingType {
    /// Submitted by a regular user, moderated
    #[default]
    User,
    /// Published by the dealership itself
    Dealership,
}

impl std::fmt::Display for ListingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "USER"),
            Self::Dealership => write!(f, "DEALERSHIP"),
        }
    }
}

impl std::str::FromStr for ListingType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USER" => Ok(Self::User),
            "DEALERSHIP" => Ok(Self::Dealership),
            _ => Err(anyhow::anyhow!("Invalid listing type: {}", s)),
        }
    }
}

/// Seller summary embedded in a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seller {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub phone: String,
}

impl From<&User> for Seller {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            phone: user.phone.clone(),
        }
    }
}

/// Listing aggregate as loaded from storage
#[derive(Debug, Clone)]
pub struct Listing {
    pub id: i64,
    pub description: String,
    pub state: ListingState,
    pub kind: ListingType,
    /// `None` only when the seller row was removed underneath the listing
    pub seller: Option<Seller>,
    pub vehicle: Option<Vehicle>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    pub fn new(description: String, seller: Seller, vehicle: Vehicle) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            description,
            state: ListingState::Pending,
            kind: ListingType::User,
            seller: Some(seller),
            vehicle: Some(vehicle),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn seller_id(&self) -> Option<i64> {
        self.seller.as_ref().map(|s| s.id)
    }

    pub fn vehicle_id(&self) -> Option<i64> {
        self.vehicle.as_ref().map(|v| v.id)
    }
}

/// Listing payload for create and update
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ListingInput {
    pub description: Option<String>,
    pub vehicle: Option<VehicleInput>,
}

/// Uploaded file handed to the media store
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Listing as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingResponse {
    pub id: i64,
    pub description: String,
    pub state: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub vehicle: Option<Vehicle>,
    pub seller: Option<Seller>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Listing> for ListingResponse {
    fn from(listing: &Listing) -> Self {
        Self {
            id: listing.id,
            description: listing.description.clone(),
            state: listing.state.to_string(),
            kind: listing.kind.to_string(),
            vehicle: listing.vehicle.clone(),
            seller: listing.seller.clone(),
            created_at: listing.created_at.to_rfc3339(),
            updated_at: listing.updated_at.to_rfc3339(),
        }
    }
}

/// Listing counts for the admin dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingStats {
    pub total: i64,
    pub pending: i64,
    pub accepted: i64,
    pub rejected: i64,
    pub by_user: i64,
    pub by_dealership: i64,
}
