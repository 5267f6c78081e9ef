//! Listing API endpoints
//!
//! Public:
//! - GET /api/v1/listings/catalog/dealership
//! - GET /api/v1/listings/catalog/user
//! - GET /api/v1/listings/{id}
//!
//! Authenticated:
//! - GET /api/v1/listings/mine
//! - POST /api/v1/listings (multipart)
//! - PUT /api/v1/listings/{id}
//! - DELETE /api/v1/listings/{id}
//! - POST /api/v1/listings/{id}/sold

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::config::UploadConfig;
use crate::models::{ListingInput, ListingResponse, ListingType, UploadedFile};

/// Upper bound on files per listing, used to size the request body limit
const MAX_FILES_PER_LISTING: usize = 10;

/// Build public listing routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/listings/catalog/dealership", get(dealership_catalog))
        .route("/listings/catalog/user", get(user_catalog))
        .route("/listings/{id}", get(get_listing))
}

/// Build protected listing routes (requires auth middleware)
pub fn protected_router(upload_config: &UploadConfig) -> Router<AppState> {
    let body_limit = (upload_config.max_file_size as usize)
        .saturating_mul(MAX_FILES_PER_LISTING)
        .saturating_add(1024 * 1024);

    Router::new()
        .route(
            "/listings",
            post(create_listing).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/listings/mine", get(my_listings))
        .route("/listings/{id}", put(update_listing).delete(delete_listing))
        .route("/listings/{id}/sold", post(mark_sold))
}

/// GET /api/v1/listings/catalog/dealership - Published dealership listings
async fn dealership_catalog(
    State(state): State<AppState>,
) -> Result<Json<Vec<ListingResponse>>, ApiError> {
    Ok(Json(
        state.listing_service.list_catalog(ListingType::Dealership).await?,
    ))
}

/// GET /api/v1/listings/catalog/user - Published private-seller listings
async fn user_catalog(
    State(state): State<AppState>,
) -> Result<Json<Vec<ListingResponse>>, ApiError> {
    Ok(Json(state.listing_service.list_catalog(ListingType::User).await?))
}

async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ListingResponse>, ApiError> {
    Ok(Json(state.listing_service.get_by_id(id).await?))
}

/// GET /api/v1/listings/mine - Listings of the current user
async fn my_listings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<ListingResponse>>, ApiError> {
    Ok(Json(state.listing_service.list(&user.0.email).await?))
}

/// POST /api/v1/listings - Create a listing
///
/// Accepts multipart/form-data with a `listing` field holding the JSON
/// payload and any number of image fields named `files`.
async fn create_listing(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let (input, files) = read_listing_form(multipart, &state.upload_config).await?;

    let listing = state
        .listing_service
        .create(input, files, &user.0.email)
        .await?;

    Ok((StatusCode::CREATED, Json(listing)))
}

/// PUT /api/v1/listings/{id} - Edit an own listing
async fn update_listing(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ListingInput>,
) -> Result<Json<ListingResponse>, ApiError> {
    Ok(Json(
        state
            .listing_service
            .update(id, body, &user.0.email)
            .await?,
    ))
}

/// DELETE /api/v1/listings/{id} - Delete an own listing
async fn delete_listing(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.listing_service.delete(id, &user.0.email).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/listings/{id}/sold - Mark as sold, which removes the listing
async fn mark_sold(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .listing_service
        .mark_sold_and_remove(id, &user.0.email)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Split the creation form into its JSON payload and validated image files.
///
/// Empty file fields are dropped here; type and size are checked against the
/// upload configuration.
async fn read_listing_form(
    mut multipart: Multipart,
    config: &UploadConfig,
) -> Result<(ListingInput, Vec<UploadedFile>), ApiError> {
    let mut input = None;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "listing" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read listing: {}", e)))?;
                let parsed: ListingInput = serde_json::from_str(&text)
                    .map_err(|e| ApiError::bad_request(format!("Invalid listing payload: {}", e)))?;
                input = Some(parsed);
            }
            "files" | "file" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?;

                if data.is_empty() {
                    continue;
                }
                if !config.is_type_allowed(&content_type) {
                    return Err(ApiError::bad_request(format!(
                        "Invalid file type: {}. Allowed types: {:?}",
                        content_type, config.allowed_types
                    )));
                }
                if data.len() as u64 > config.max_file_size {
                    return Err(ApiError::bad_request(format!(
                        "File too large. Maximum size: {} bytes ({} MB)",
                        config.max_file_size,
                        config.max_file_size / 1024 / 1024
                    )));
                }

                files.push(UploadedFile {
                    file_name,
                    content_type,
                    data: data.to_vec(),
                });
            }
            other => tracing::debug!(field = %other, "Ignoring unknown multipart field"),
        }
    }

    let input = input.ok_or_else(|| ApiError::bad_request("Missing listing payload"))?;
    Ok((input, files))
}
