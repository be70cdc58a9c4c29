//! # Configuration Module
//!
//! This module centralizes all configuration constants for the crate.
//! Constants are grouped by functional area and their interdependencies are
//! documented and enforced through compile-time assertions.
//!
//! ## Why Centralization?
//!
//! The page geometry constants are tightly coupled: the record area offset,
//! the per-entry size ceiling, and the split target all derive from
//! `PAGE_SIZE`. Co-locating them with compile-time checks keeps the derived
//! values from drifting apart when one of them changes.
//!
//! ## Module Organization
//!
//! - [`constants`]: All numeric configuration values with dependency
//!   documentation

pub mod constants;
pub use constants::*;
