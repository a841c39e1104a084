//! # HitIt Common Library
//!
//! Shared code for the HitIt music-year guessing game services:
//! - Card and track models
//! - QR content classification and card id normalization
//! - Event types (HitItEvent enum)
//! - Configuration loading
//! - Database initialization

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod qr;

pub use error::{Error, Result};
pub use models::{Card, MusicServiceType, Track};
pub use qr::{classify, normalize_card_id, ScanResult};
