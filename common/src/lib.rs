//! Cross-crate primitives for the capot gateway.
//!
//! Every error enum in the workspace records where it was raised through
//! [`ErrorLocation`], so a log line always points at the failing call site.

pub mod error;

pub use error::error_location::ErrorLocation;

#[cfg(test)]
mod tests;
