//! Step definitions for catalog refresh scenarios.

pub mod then;
pub mod when;
