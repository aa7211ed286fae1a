//! Domain layer shared by the HTTP application and storage crates.
//!
//! Everything here is pure: no I/O, no clocks, no global state.

pub mod analytics;
pub mod pricing;
pub mod tenant;
pub mod types;
pub mod validation;
