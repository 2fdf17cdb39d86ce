//! Ratefeed Common Types
//!
//! Shared types used across the ratefeed crates: currency codes, rate
//! observations, timestamps and the clock abstraction used for freshness checks.

pub mod currency;
pub mod observation;
pub mod error;
pub mod time;

pub use currency::*;
pub use observation::*;
pub use error::*;
pub use time::*;
