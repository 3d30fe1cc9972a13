//! RateScout Common Types
//!
//! This crate contains shared value types used across RateScout,
//! including currency codes, provider identifiers, validation errors and
//! timing helpers.

pub mod identifiers;
pub mod monetary;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use error::*;
pub use time::*;
