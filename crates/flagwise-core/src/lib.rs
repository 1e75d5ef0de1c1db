//! Flagwise Core
//!
//! Core types and error handling shared across flagwise components.
//!
//! This crate provides:
//! - The three-way [`Flag`] verdict and the [`Classification`] handed to callers
//! - Journal [`Entry`] values as owned by the calling application
//! - Provider tag strings and structured debug traces
//! - Error types and result handling

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    provider, Classification, ClassificationMode, ClassificationTrace, Entry, Flag,
    ProviderAttempt,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{Classification, ClassificationMode, Entry, Flag};
}
