//! Listing service
//!
//! Orchestrates the listing lifecycle:
//! - creation with image upload (admins publish directly, everyone else is moderated)
//! - owner edits with a partial field merge
//! - deletion, including "mark as sold"
//! - moderation (approve / reject) and statistics
//!
//! Every mutating operation writes through a single database transaction.
//! Image storage and email notifications happen outside it: images stored for
//! a failed creation are removed again, and notifications are only sent once
//! the transaction has committed.

use crate::db::repositories::{
    ListingRepository, SqlxListingRepository, SqlxTechnicalSheetRepository, SqlxUserRepository,
    SqlxVehicleRepository, TechnicalSheetRepository, UserRepository, VehicleRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{
    Listing, ListingInput, ListingResponse, ListingState, ListingStats, ListingType, Seller,
    TechnicalSheet, TechnicalSheetInput, UploadedFile, User, Vehicle, VehicleInput,
};
use crate::services::media::MediaStore;
use crate::services::notifier::Notifier;
use anyhow::Context;
use std::sync::Arc;

/// Error types for listing service operations
#[derive(Debug, thiserror::Error)]
pub enum ListingServiceError {
    /// Listing or user does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller email does not resolve to a user
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller does not own the listing
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// State transition not allowed
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Stored data breaks an invariant (listing without seller or vehicle)
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// Media store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

type ServiceResult<T> = Result<T, ListingServiceError>;

/// Listing service
pub struct ListingService {
    pool: DynDatabasePool,
    listings: Arc<dyn ListingRepository>,
    vehicles: Arc<dyn VehicleRepository>,
    sheets: Arc<dyn TechnicalSheetRepository>,
    users: Arc<dyn UserRepository>,
    media: Arc<dyn MediaStore>,
    notifier: Arc<dyn Notifier>,
}

impl ListingService {
    pub fn new(
        pool: DynDatabasePool,
        listings: Arc<dyn ListingRepository>,
        vehicles: Arc<dyn VehicleRepository>,
        sheets: Arc<dyn TechnicalSheetRepository>,
        users: Arc<dyn UserRepository>,
        media: Arc<dyn MediaStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            pool,
            listings,
            vehicles,
            sheets,
            users,
            media,
            notifier,
        }
    }

    /// Wire the service with the SQLx repositories for `pool`
    pub fn from_pool(
        pool: DynDatabasePool,
        media: Arc<dyn MediaStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::new(
            pool.clone(),
            SqlxListingRepository::boxed(pool.clone()),
            SqlxVehicleRepository::boxed(pool.clone()),
            SqlxTechnicalSheetRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool),
            media,
            notifier,
        )
    }

    /// Listings owned by the caller.
    pub async fn list(&self, email: &str) -> ServiceResult<Vec<ListingResponse>> {
        let caller = self.caller(email).await?;
        let listings = self
            .listings
            .list_by_seller(caller.id)
            .await
            .context("Failed to list seller listings")?;

        Ok(listings.iter().map(ListingResponse::from).collect())
    }

    /// Accepted listings of one type, for the public catalog.
    pub async fn list_catalog(&self, kind: ListingType) -> ServiceResult<Vec<ListingResponse>> {
        let listings = self
            .listings
            .list_by_state_and_type(ListingState::Accepted, kind)
            .await
            .context("Failed to list catalog")?;

        Ok(listings.iter().map(ListingResponse::from).collect())
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<ListingResponse> {
        let listing = self.find(id).await?;
        Ok(ListingResponse::from(&listing))
    }

    /// Listings waiting for moderation.
    pub async fn list_pending(&self) -> ServiceResult<Vec<ListingResponse>> {
        let listings = self
            .listings
            .list_by_state(ListingState::Pending)
            .await
            .context("Failed to list pending listings")?;

        Ok(listings.iter().map(ListingResponse::from).collect())
    }

    /// Create a listing for the caller.
    ///
    /// Empty files are skipped; the rest are stored in upload order before
    /// anything is written to the database. Admin listings are published as
    /// accepted dealership listings; all others start pending and the seller
    /// is notified.
    pub async fn create(
        &self,
        input: ListingInput,
        files: Vec<UploadedFile>,
        email: &str,
    ) -> ServiceResult<ListingResponse> {
        let seller = self
            .users
            .get_by_email(email)
            .await
            .context("Failed to look up seller")?
            .ok_or_else(|| ListingServiceError::NotFound(format!("User not found: {}", email)))?;

        let mut image_urls = Vec::new();
        for file in files.iter().filter(|f| !f.is_empty()) {
            match self.media.store(file).await {
                Ok(url) => image_urls.push(url),
                Err(e) => {
                    self.discard_images(&image_urls).await;
                    return Err(ListingServiceError::Storage(format!(
                        "Failed to store image: {}",
                        e
                    )));
                }
            }
        }

        let listing = match self.insert_listing(&input, &seller, image_urls.clone()).await {
            Ok(listing) => listing,
            Err(e) => {
                tracing::warn!(seller = %seller.email, "Listing creation failed: {}", e);
                self.discard_images(&image_urls).await;
                return Err(e);
            }
        };

        tracing::info!(
            listing_id = listing.id,
            state = %listing.state,
            kind = %listing.kind,
            "Listing created"
        );
        if !seller.is_admin() {
            self.notify(&listing, "Listing created", "has been received and is waiting for review");
        }

        Ok(ListingResponse::from(&listing))
    }

    async fn insert_listing(
        &self,
        input: &ListingInput,
        seller: &User,
        image_urls: Vec<String>,
    ) -> ServiceResult<Listing> {
        let vehicle_input = input.vehicle.as_ref();
        let sheet_input = vehicle_input.and_then(|v| v.technical_sheet.as_ref());

        let mut tx = self.pool.begin().await?;

        let sheet = self
            .sheets
            .save(&mut tx, &TechnicalSheet::from_input(sheet_input))
            .await?;

        let mut vehicle = Vehicle::from_input(vehicle_input);
        vehicle.technical_sheet = Some(sheet);
        vehicle.image_urls = image_urls;
        let vehicle = self.vehicles.save(&mut tx, &vehicle).await?;

        let mut listing = Listing::new(
            input.description.clone().unwrap_or_default(),
            Seller::from(seller),
            vehicle,
        );
        if seller.is_admin() {
            listing.state = ListingState::Accepted;
            listing.kind = ListingType::Dealership;
        }
        let listing = self.listings.save(&mut tx, &listing).await?;

        tx.commit().await?;
        Ok(listing)
    }

    /// Apply an owner's edits to a listing.
    ///
    /// The caller owns the listing if either the user id or the email
    /// (case-insensitively) matches the seller. Accepted listings go back to
    /// pending; rejected ones stay rejected.
    pub async fn update(
        &self,
        id: i64,
        input: ListingInput,
        email: &str,
    ) -> ServiceResult<ListingResponse> {
        let mut listing = self.find(id).await?;
        let caller = self.caller(email).await?;

        let seller = listing.seller.as_ref().ok_or_else(|| {
            ListingServiceError::DataIntegrity(format!("Listing {} has no seller", id))
        })?;
        let same_id = seller.id == caller.id;
        let same_email = seller.email.to_lowercase() == caller.email.to_lowercase();
        if !same_id && !same_email {
            return Err(ListingServiceError::Forbidden(format!(
                "You can only edit your own listings. Listing seller: {}, current user: {}",
                seller.email, caller.email
            )));
        }

        if listing.state == ListingState::Accepted {
            listing.state = ListingState::Pending;
        }
        merge_text(&mut listing.description, input.description.as_deref());

        let vehicle = listing.vehicle.as_mut().ok_or_else(|| {
            ListingServiceError::DataIntegrity(format!("Listing {} has no vehicle", id))
        })?;
        apply_vehicle_changes(vehicle, input.vehicle.as_ref());

        let mut tx = self.pool.begin().await?;
        let sheet = vehicle.technical_sheet.take().unwrap_or_default();
        vehicle.technical_sheet = Some(self.sheets.save(&mut tx, &sheet).await?);
        *vehicle = self.vehicles.save(&mut tx, vehicle).await?;
        let listing = self.listings.save(&mut tx, &listing).await?;
        tx.commit().await?;

        tracing::info!(listing_id = id, state = %listing.state, "Listing updated");
        Ok(ListingResponse::from(&listing))
    }

    /// Delete a listing together with its vehicle and technical sheet.
    ///
    /// Only the seller, matched by user id, may delete.
    pub async fn delete(&self, id: i64, email: &str) -> ServiceResult<()> {
        let listing = self.find(id).await?;
        let caller = self.caller(email).await?;

        if listing.seller_id() != Some(caller.id) {
            return Err(ListingServiceError::Forbidden(
                "You can only delete your own listings".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        self.listings.delete(&mut tx, listing.id).await?;
        if let Some(vehicle) = &listing.vehicle {
            self.vehicles.delete(&mut tx, vehicle.id).await?;
            if let Some(sheet_id) = vehicle.technical_sheet_id() {
                self.sheets.delete(&mut tx, sheet_id).await?;
            }
        }
        tx.commit().await?;

        if let Some(vehicle) = &listing.vehicle {
            self.discard_images(&vehicle.image_urls).await;
        }

        tracing::info!(listing_id = id, "Listing deleted");
        Ok(())
    }

    /// A sold vehicle is taken off the platform entirely.
    pub async fn mark_sold_and_remove(&self, id: i64, email: &str) -> ServiceResult<()> {
        self.delete(id, email).await
    }

    /// Accept a pending listing.
    pub async fn approve(&self, id: i64) -> ServiceResult<ListingResponse> {
        let listing = self.moderate(id, ListingState::Accepted).await?;
        self.notify(&listing, "Listing approved", "has been approved and is now visible in the catalog");
        Ok(ListingResponse::from(&listing))
    }

    /// Reject a pending listing.
    pub async fn reject(&self, id: i64) -> ServiceResult<ListingResponse> {
        let listing = self.moderate(id, ListingState::Rejected).await?;
        self.notify(&listing, "Listing rejected", "has been rejected by the moderation team");
        Ok(ListingResponse::from(&listing))
    }

    pub async fn stats(&self) -> ServiceResult<ListingStats> {
        Ok(ListingStats {
            total: self.listings.count().await?,
            pending: self.listings.count_by_state(ListingState::Pending).await?,
            accepted: self.listings.count_by_state(ListingState::Accepted).await?,
            rejected: self.listings.count_by_state(ListingState::Rejected).await?,
            by_user: self.listings.count_by_type(ListingType::User).await?,
            by_dealership: self.listings.count_by_type(ListingType::Dealership).await?,
        })
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn find(&self, id: i64) -> ServiceResult<Listing> {
        self.listings
            .get_by_id(id)
            .await
            .context("Failed to get listing")?
            .ok_or_else(|| ListingServiceError::NotFound(format!("Listing not found: {}", id)))
    }

    async fn caller(&self, email: &str) -> ServiceResult<User> {
        self.users
            .get_by_email(email)
            .await
            .context("Failed to look up user")?
            .ok_or_else(|| ListingServiceError::Unauthorized(format!("Unknown user: {}", email)))
    }

    async fn moderate(&self, id: i64, target: ListingState) -> ServiceResult<Listing> {
        let mut listing = self.find(id).await?;
        if listing.state != ListingState::Pending {
            return Err(ListingServiceError::BadRequest(format!(
                "Only pending listings can be moderated, listing {} is {}",
                id, listing.state
            )));
        }
        listing.state = target;

        let mut tx = self.pool.begin().await?;
        let listing = self.listings.save(&mut tx, &listing).await?;
        tx.commit().await?;

        tracing::info!(listing_id = id, state = %listing.state, "Listing moderated");
        Ok(listing)
    }

    fn notify(&self, listing: &Listing, subject: &str, outcome: &str) {
        let Some(seller) = &listing.seller else {
            tracing::warn!(listing_id = listing.id, "Listing has no seller, skipping notification");
            return;
        };
        let title = listing
            .vehicle
            .as_ref()
            .map(|v| format!("{} {}", v.brand, v.model).trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| format!("#{}", listing.id));
        let body = format!("Hello {},\n\nYour listing {} {}.\n\nMyCar", seller.name, title, outcome);

        self.notifier.send(&seller.email, subject, &body);
    }

    /// Best-effort removal of stored images
    async fn discard_images(&self, urls: &[String]) {
        for url in urls {
            if let Err(e) = self.media.remove(url).await {
                tracing::warn!(url = %url, "Failed to remove image: {}", e);
            }
        }
    }
}

/// Overwrite `target` with the trimmed incoming value, unless it is absent or blank.
fn merge_text(target: &mut String, incoming: Option<&str>) {
    if let Some(value) = incoming.map(str::trim).filter(|v| !v.is_empty()) {
        *target = value.to_string();
    }
}

fn apply_vehicle_changes(vehicle: &mut Vehicle, input: Option<&VehicleInput>) {
    let Some(input) = input else {
        return;
    };
    merge_text(&mut vehicle.brand, input.brand.as_deref());
    merge_text(&mut vehicle.model, input.model.as_deref());
    merge_text(&mut vehicle.mileage, input.mileage.as_deref());
    merge_text(&mut vehicle.color, input.color.as_deref());
    if input.price.is_some() {
        vehicle.price = input.price;
    }
    if input.year.is_some() {
        vehicle.year = input.year;
    }

    if let Some(sheet_input) = &input.technical_sheet {
        let sheet = vehicle.technical_sheet.get_or_insert_with(TechnicalSheet::default);
        apply_sheet_changes(sheet, sheet_input);
    }
}

fn apply_sheet_changes(sheet: &mut TechnicalSheet, input: &TechnicalSheetInput) {
    merge_text(&mut sheet.engine, input.engine.as_deref());
    merge_text(&mut sheet.fuel_type, input.fuel_type.as_deref());
    merge_text(&mut sheet.transmission, input.transmission.as_deref());
    merge_text(&mut sheet.doors, input.doors.as_deref());
    merge_text(&mut sheet.power, input.power.as_deref());
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn merge_text_never_stores_blank(existing in ".{0,20}", incoming in proptest::option::of(".{0,20}")) {
            let mut value = existing.clone();
            merge_text(&mut value, incoming.as_deref());

            match incoming.as_deref().map(str::trim) {
                Some(trimmed) if !trimmed.is_empty() => prop_assert_eq!(value, trimmed),
                _ => prop_assert_eq!(value, existing),
            }
        }

        #[test]
        fn numeric_fields_follow_input(price in proptest::option::of(0.0f64..1e7), year in proptest::option::of(1900i32..2100)) {
            let mut vehicle = Vehicle {
                price: Some(1.0),
                year: Some(2000),
                ..Default::default()
            };
            let input = VehicleInput { price, year, ..Default::default() };
            apply_vehicle_changes(&mut vehicle, Some(&input));

            prop_assert_eq!(vehicle.price, price.or(Some(1.0)));
            prop_assert_eq!(vehicle.year, year.or(Some(2000)));
        }
    }
}
