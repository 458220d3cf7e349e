//! Mill Common Library
//!
//! Shared foundation for the mill workspace crates: the co-processor
//! shared-RAM slot layout, core motion types, millimeter/step unit
//! conversion, and TOML configuration loading.
//!
//! # Module Structure
//!
//! - [`consts`] - Shared-RAM slot layout and firmware constants
//! - [`types`] - Axes, waypoints, step commands
//! - [`units`] - Millimeter ↔ step conversion
//! - [`config`] - Configuration loading and validation
//! - [`prelude`] - Common re-exports for convenience

pub mod config;
pub mod consts;
pub mod prelude;
pub mod types;
pub mod units;
