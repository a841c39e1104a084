//! Scanner session: QR scan → resolve → flip → play

pub mod session;
pub mod state;

pub use session::{FlipTrigger, ScannerDeps, ScannerSession, SessionOptions};
pub use state::{ScannerUiState, StatusMessage};
