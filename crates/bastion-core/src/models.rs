//! Domain models for Bastion.
//!
//! These are the core types shared across all crates.

pub mod audit;
pub mod capability;
pub mod principal;
pub mod role;
pub mod session;
pub mod tenant;
pub mod user;
