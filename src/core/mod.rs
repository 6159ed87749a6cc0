//! Core ordered field storage.

/// Resolved and pending field slots.
pub mod store;
