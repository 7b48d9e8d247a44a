//! # gribkit Testkit
//!
//! Test utilities for gribkit.
//!
//! This crate provides:
//! - Forecast-field fixtures and temporary container files
//! - Property-based test generators using proptest
//! - A one-call tracing setup for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gribkit_testkit::prelude::*;
//!
//! #[test]
//! fn reads_every_step() {
//!     init_tracing();
//!     let fixture = TempContainer::forecast();
//!     let container = gribkit_core::Container::open(fixture.path()).unwrap();
//!     assert_eq!(container.len(), STEP_RANGES.len());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
