//! # HitIt Scanner
//!
//! Scanner service for the HitIt music-year guessing game. A scanned card QR
//! code is resolved to a track; flipping the device face down starts playback
//! in the streaming app or as an in-app preview.
//!
//! - [`scanner`]: the scan → flip → play state machine
//! - [`repository`], [`deezer`]: card and track lookups
//! - [`playback`]: external app vs preview dispatch
//! - [`orientation`], [`platform`]: device collaborators
//! - [`settings`]: persisted preferences
//! - [`api`]: HTTP/SSE control surface

pub mod api;
pub mod config;
pub mod db;
pub mod deezer;
pub mod error;
pub mod orientation;
pub mod platform;
pub mod playback;
pub mod repository;
pub mod scanner;
pub mod settings;

pub use error::{Error, Result};
