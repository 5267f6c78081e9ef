//! Vehicle model

use serde::{Deserialize, Serialize};

use super::technical_sheet::{TechnicalSheet, TechnicalSheetInput};

/// Vehicle offered by a listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,
    pub brand: String,
    pub model: String,
    pub price: Option<f64>,
    pub year: Option<i32>,
    /// Mileage as entered by the seller
    pub mileage: String,
    pub color: String,
    /// Image URLs in upload order
    pub image_urls: Vec<String>,
    pub technical_sheet: Option<TechnicalSheet>,
}

impl Vehicle {
    /// Build an unsaved vehicle from submitted values.
    ///
    /// Missing text becomes an empty string, missing numbers stay `None`.
    pub fn from_input(input: Option<&VehicleInput>) -> Self {
        let Some(input) = input else {
            return Self::default();
        };
        Self {
            id: 0,
            brand: input.brand.clone().unwrap_or_default(),
            model: input.model.clone().unwrap_or_default(),
            price: input.price,
            year: input.year,
            mileage: input.mileage.clone().unwrap_or_default(),
            color: input.color.clone().unwrap_or_default(),
            image_urls: Vec::new(),
            technical_sheet: None,
        }
    }

    pub fn technical_sheet_id(&self) -> Option<i64> {
        self.technical_sheet.as_ref().map(|s| s.id)
    }
}

/// Vehicle fields as submitted by a client
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VehicleInput {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub price: Option<f64>,
    pub year: Option<i32>,
    pub mileage: Option<String>,
    pub color: Option<String>,
    pub technical_sheet: Option<TechnicalSheetInput>,
}
