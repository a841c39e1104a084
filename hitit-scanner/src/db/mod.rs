//! Database access for the scanner

pub mod settings;
