//! HTTP/SSE control API
//!
//! The camera, QR decoding and UI live in a front end; it drives the scanner
//! session through these endpoints and follows state changes over SSE.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, run, AppContext};
