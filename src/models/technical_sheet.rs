//! Technical sheet model

use serde::{Deserialize, Serialize};

/// Specification record owned by exactly one vehicle.
///
/// Every field is free text; door count and power come from form inputs and
/// are stored as entered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSheet {
    pub id: i64,
    pub engine: String,
    pub fuel_type: String,
    pub transmission: String,
    pub doors: String,
    pub power: String,
}

impl TechnicalSheet {
    /// Build an unsaved sheet from submitted values. Absent values become empty strings.
    pub fn from_input(input: Option<&TechnicalSheetInput>) -> Self {
        let Some(input) = input else {
            return Self::default();
        };
        Self {
            id: 0,
            engine: input.engine.clone().unwrap_or_default(),
            fuel_type: input.fuel_type.clone().unwrap_or_default(),
            transmission: input.transmission.clone().unwrap_or_default(),
            doors: input.doors.clone().unwrap_or_default(),
            power: input.power.clone().unwrap_or_default(),
        }
    }
}

/// Technical sheet fields as submitted by a client
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TechnicalSheetInput {
    pub engine: Option<String>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub doors: Option<String>,
    pub power: Option<String>,
}
