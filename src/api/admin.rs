//! Admin API endpoints
//!
//! Moderation queue and dashboard statistics. Requires the ADMIN role.
//!
//! - GET /api/v1/admin/listings/pending
//! - GET /api/v1/admin/listings/stats
//! - PATCH /api/v1/admin/listings/{id}/approve
//! - PATCH /api/v1/admin/listings/{id}/reject

use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{ListingResponse, ListingStats};

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/listings/pending", get(pending_listings))
        .route("/listings/stats", get(listing_stats))
        .route("/listings/{id}/approve", patch(approve_listing))
        .route("/listings/{id}/reject", patch(reject_listing))
}

/// GET /api/v1/admin/listings/pending - Listings awaiting moderation
async fn pending_listings(
    State(state): State<AppState>,
) -> Result<Json<Vec<ListingResponse>>, ApiError> {
    Ok(Json(state.listing_service.list_pending().await?))
}

/// GET /api/v1/admin/listings/stats - Dashboard statistics
async fn listing_stats(State(state): State<AppState>) -> Result<Json<ListingStats>, ApiError> {
    Ok(Json(state.listing_service.stats().await?))
}

async fn approve_listing(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ListingResponse>, ApiError> {
    Ok(Json(state.listing_service.approve(id).await?))
}

async fn reject_listing(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ListingResponse>, ApiError> {
    Ok(Json(state.listing_service.reject(id).await?))
}
