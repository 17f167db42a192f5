use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Soil profile must contain at least one layer")]
    EmptySoilProfile,

    #[error("Cannot seed: crop '{crop}' is already planted")]
    CropAlreadyPlanted { crop: String },

    #[error("Cannot {operation}: no crop is planted")]
    NoActiveCrop { operation: &'static str },

    #[error("Month index {0} is outside [0, 12)")]
    InvalidMonth(usize),

    #[error("Invalid work step: {0}")]
    InvalidWorkStep(String),

    #[error("Invalid cultivation schedule: {0}")]
    InvalidSchedule(String),
}

pub type Result<T> = std::result::Result<T, SimError>;
